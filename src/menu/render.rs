//! Turns a node into the sequence of messages a student sees.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::menu::content::{ContentItem, ContentStore};
use crate::menu::keyboard::{self, Keyboard};
use crate::menu::session::ConversationId;

pub const PROMPT: &str = "Escolha uma opção:";
pub const NOT_AVAILABLE: &str = "⚠️ Conteúdo não disponível.";
pub const NOT_IMPLEMENTED: &str = "🚧 Esta opção ainda não foi implementada. Em breve teremos novidades!";
/// Free text is not read by the bot, so the reply points outside it.
pub const ESCALATION_REPLY: &str = "👩‍💼 Para falar com a equipe, envie um e-mail para \
    atendimento@universidade.edu.br com seu nome completo, seu RA (número de matrícula) e a sua dúvida. \
    Se preferir, abra um chamado na secretaria online: https://secretaria.universidade.edu.br";

/// Outbound side of the bot. Errors are human-readable descriptions.
pub trait Messenger: Send + Sync {
    fn send_text(
        &self,
        conversation: ConversationId,
        text: &str,
    ) -> impl Future<Output = Result<(), String>> + Send;

    fn send_text_with_keyboard(
        &self,
        conversation: ConversationId,
        text: &str,
        keyboard: &Keyboard,
    ) -> impl Future<Output = Result<(), String>> + Send;

    /// Answers a button press so the client stops its loading indicator.
    fn acknowledge(&self, interaction_id: &str) -> impl Future<Output = Result<(), String>> + Send;
}

impl<T: Messenger> Messenger for Arc<T> {
    fn send_text(
        &self,
        conversation: ConversationId,
        text: &str,
    ) -> impl Future<Output = Result<(), String>> + Send {
        (**self).send_text(conversation, text)
    }

    fn send_text_with_keyboard(
        &self,
        conversation: ConversationId,
        text: &str,
        keyboard: &Keyboard,
    ) -> impl Future<Output = Result<(), String>> + Send {
        (**self).send_text_with_keyboard(conversation, text, keyboard)
    }

    fn acknowledge(&self, interaction_id: &str) -> impl Future<Output = Result<(), String>> + Send {
        (**self).acknowledge(interaction_id)
    }
}

/// A message could not be delivered; the rest of the sequence was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFailure {
    pub conversation: ConversationId,
    pub reason: String,
}

impl fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to render menu in chat {}: {}", self.conversation, self.reason)
    }
}

impl std::error::Error for RenderFailure {}

pub struct Renderer<M> {
    content: Arc<ContentStore>,
    messenger: M,
}

impl<M: Messenger> Renderer<M> {
    pub fn new(content: Arc<ContentStore>, messenger: M) -> Self {
        Self { content, messenger }
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    pub fn messenger(&self) -> &M {
        &self.messenger
    }

    /// Text, then each item in order, then the prompt with the node's keyboard.
    pub async fn render(&self, conversation: ConversationId, key: &str) -> Result<(), RenderFailure> {
        let Some(node) = self.content.get(key) else {
            warn!("Render requested for missing node {} in chat {}", key, conversation);
            return self.send_keyboard(conversation, NOT_AVAILABLE, &keyboard::controls()).await;
        };
        let keyboard = keyboard::build(&self.content, key);
        debug!("Rendering {} in chat {} ({} buttons)", key, conversation, keyboard.len());

        self.send(conversation, &node.text).await?;
        for item in &node.items {
            match item {
                ContentItem::Note(text) => self.send(conversation, text).await?,
                ContentItem::Link { title, url } => {
                    self.send_keyboard(conversation, title, &keyboard::link(url)).await?
                }
            }
        }

        if keyboard.is_empty() {
            warn!("Node {} has no options, prompt goes out without buttons", key);
        }
        self.send_keyboard(conversation, PROMPT, &keyboard).await
    }

    /// Fixed placeholder for options without content, with Back and Home only.
    pub async fn render_not_implemented(&self, conversation: ConversationId) -> Result<(), RenderFailure> {
        self.send_keyboard(conversation, NOT_IMPLEMENTED, &keyboard::controls()).await
    }

    pub async fn render_escalation(&self, conversation: ConversationId) -> Result<(), RenderFailure> {
        self.send(conversation, ESCALATION_REPLY).await
    }

    pub async fn send(&self, conversation: ConversationId, text: &str) -> Result<(), RenderFailure> {
        self.messenger
            .send_text(conversation, text)
            .await
            .map_err(|reason| RenderFailure { conversation, reason })
    }

    async fn send_keyboard(
        &self,
        conversation: ConversationId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<(), RenderFailure> {
        self.messenger
            .send_text_with_keyboard(conversation, text, keyboard)
            .await
            .map_err(|reason| RenderFailure { conversation, reason })
    }
}
