//! Where navigation stacks live between updates.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::menu::navigation::NavigationStack;

/// Telegram chat ID of a conversation.
pub type ConversationId = i64;

/// Storage for per-conversation navigation stacks.
pub trait SessionStore: Send + Sync {
    /// Stack of `conversation`, or `None` if it never started.
    fn load(&self, conversation: ConversationId) -> impl Future<Output = Option<NavigationStack>> + Send;

    fn save(&self, conversation: ConversationId, stack: NavigationStack) -> impl Future<Output = ()> + Send;
}

/// Sessions kept in process memory; lost on restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    stacks: Mutex<HashMap<ConversationId, NavigationStack>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    async fn load(&self, conversation: ConversationId) -> Option<NavigationStack> {
        self.stacks.lock().await.get(&conversation).cloned()
    }

    async fn save(&self, conversation: ConversationId, stack: NavigationStack) {
        self.stacks.lock().await.insert(conversation, stack);
    }
}

impl<T: SessionStore> SessionStore for Arc<T> {
    fn load(&self, conversation: ConversationId) -> impl Future<Output = Option<NavigationStack>> + Send {
        (**self).load(conversation)
    }

    fn save(&self, conversation: ConversationId, stack: NavigationStack) -> impl Future<Output = ()> + Send {
        (**self).save(conversation, stack)
    }
}
