//! Forwards warnings and errors to an operator chat.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::Context;

/// Telegram caps messages at 4096 characters.
const MAX_MESSAGE_CHARS: usize = 4000;
/// Lines kept before an early flush.
const MAX_BUFFERED: usize = 20;
const FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Only this crate's warnings reach the operator chat.
pub fn operator_filter() -> Targets {
    Targets::new().with_target("faqbot", Level::WARN)
}

pub struct OperatorLogLayer {
    tx: mpsc::UnboundedSender<String>,
}

impl OperatorLogLayer {
    /// Spawns the sender task; must be called inside a tokio runtime.
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let mut buffer: Vec<String> = Vec::new();
            let mut interval = tokio::time::interval(FLUSH_INTERVAL);

            loop {
                tokio::select! {
                    line = rx.recv() => {
                        match line {
                            Some(line) => {
                                buffer.push(line);
                                if buffer.len() >= MAX_BUFFERED {
                                    flush(&bot, chat_id, &mut buffer).await;
                                }
                            }
                            None => {
                                flush(&bot, chat_id, &mut buffer).await;
                                break;
                            }
                        }
                    }
                    _ = interval.tick() => flush(&bot, chat_id, &mut buffer).await,
                }
            }
        });

        Self { tx }
    }
}

async fn flush(bot: &Bot, chat_id: ChatId, buffer: &mut Vec<String>) {
    if buffer.is_empty() {
        return;
    }
    let text = truncate(&buffer.join("\n"));
    buffer.clear();
    // Not logged through tracing: a failing send would feed itself
    if let Err(e) = bot.send_message(chat_id, text).await {
        eprintln!("Failed to send log to Telegram: {e}");
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() > MAX_MESSAGE_CHARS {
        let truncated: String = text.chars().take(MAX_MESSAGE_CHARS).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}{}", value, self.message);
        } else {
            self.message.push_str(&format!(" {} = {:?}", field.name(), value));
        }
    }
}

/// One line per event: level marker, target, message.
fn format_event(level: Level, target: &str, message: &str) -> String {
    let marker = if level == Level::ERROR { "❌" } else { "⚠️" };
    format!("{marker} [{target}] {message}")
}

impl<S: Subscriber> Layer<S> for OperatorLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = *metadata.level();

        // WARN and ERROR only
        if level > Level::WARN {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        if self.tx.send(format_event(level, metadata.target(), &visitor.message)).is_err() {
            eprintln!("Log channel closed, message dropped");
        }
    }
}
