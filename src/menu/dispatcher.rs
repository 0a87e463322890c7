//! Maps bot events (start, button press, free text) onto the menu.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::menu::content::{ContentStore, ROOT};
use crate::menu::navigation::{NavigationStack, Selection, Transition};
use crate::menu::render::{Messenger, RenderFailure, Renderer};
use crate::menu::session::{ConversationId, SessionStore};

/// Used when Telegram gives us no first name.
pub const DEFAULT_DISPLAY_NAME: &str = "aluno(a)";
pub const USE_BUTTONS: &str = "Por favor, use os botões do menu para navegar. \
    Se o menu sumiu, envie /start para recomeçar.";

pub fn greeting(display_name: Option<&str>) -> String {
    let name = display_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_DISPLAY_NAME);
    format!(
        "Olá, {name}! 👋\nEu sou o assistente virtual da universidade. \
         Posso ajudar com dúvidas financeiras, acadêmicas, administrativas e sobre estágio."
    )
}

pub fn choice_ack(label: &str) -> String {
    format!("Sua escolha: {label}")
}

pub struct MenuDispatcher<S, M> {
    sessions: S,
    renderer: Renderer<M>,
}

impl<S: SessionStore, M: Messenger> MenuDispatcher<S, M> {
    pub fn new(content: Arc<ContentStore>, sessions: S, messenger: M) -> Self {
        Self {
            sessions,
            renderer: Renderer::new(content, messenger),
        }
    }

    /// `/start`: fresh stack, greeting, root menu.
    pub async fn handle_start(
        &self,
        conversation: ConversationId,
        display_name: Option<&str>,
    ) -> Result<(), RenderFailure> {
        info!("Starting menu in chat {}", conversation);
        self.sessions.save(conversation, NavigationStack::new()).await;
        self.renderer.send(conversation, &greeting(display_name)).await?;
        self.renderer.render(conversation, ROOT).await
    }

    /// Inline button press carrying `data` as callback data.
    pub async fn handle_button(
        &self,
        conversation: ConversationId,
        interaction_id: &str,
        data: &str,
    ) -> Result<(), RenderFailure> {
        // The press is answered even if rendering later fails
        if let Err(e) = self.renderer.messenger().acknowledge(interaction_id).await {
            warn!("Failed to acknowledge button press in chat {}: {}", conversation, e);
        }

        let selection = Selection::parse(data);
        if !selection.is_control() {
            let label = self.renderer.content().labels().label_for(data);
            self.renderer.send(conversation, &choice_ack(label)).await?;
        }

        let mut stack = match self.sessions.load(conversation).await {
            Some(stack) => stack,
            None => {
                info!("Button press in chat {} without a session, starting at {}", conversation, ROOT);
                NavigationStack::new()
            }
        };
        let transition = stack.apply(&selection, self.renderer.content());
        debug!("Chat {} stack: {:?}", conversation, stack.keys());
        self.sessions.save(conversation, stack).await;

        match transition {
            Transition::Render(key) => self.renderer.render(conversation, &key).await,
            Transition::NotImplemented(_) => self.renderer.render_not_implemented(conversation).await,
            Transition::Escalate => {
                info!("Chat {} asked to talk to the staff", conversation);
                self.renderer.render_escalation(conversation).await
            }
        }
    }

    /// Free text is never interpreted; it only bootstraps a missing session.
    pub async fn handle_text(
        &self,
        conversation: ConversationId,
        display_name: Option<&str>,
    ) -> Result<(), RenderFailure> {
        if self.sessions.load(conversation).await.is_none() {
            return self.handle_start(conversation, display_name).await;
        }
        self.renderer.send(conversation, USE_BUTTONS).await
    }
}
