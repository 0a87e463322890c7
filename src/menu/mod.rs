//! FAQ menu - content tree, navigation and rendering.

pub mod content;
pub mod dispatcher;
pub mod keyboard;
pub mod navigation;
pub mod render;
pub mod session;
pub mod telegram;


pub use content::ContentStore;
pub use dispatcher::MenuDispatcher;
pub use render::RenderFailure;
pub use session::InMemorySessionStore;
pub use telegram::TelegramClient;
