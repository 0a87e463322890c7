mod config;
mod menu;
mod server;
mod telegram_log;

use std::process::ExitCode;
use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use config::Config;
use menu::{ContentStore, InMemorySessionStore, MenuDispatcher, RenderFailure, TelegramClient};

/// Sent when a menu could not be delivered in full.
const GENERIC_FAILURE: &str = "Desculpe, algo deu errado. Envie /start para recomeçar.";

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Comandos disponíveis:")]
enum Command {
    #[command(description = "abrir o menu principal")]
    Start,
}

struct BotState {
    menu: MenuDispatcher<InMemorySessionStore, TelegramClient>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "faqbot.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("faqbot.log"))
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file in {}: {e}", log_dir.display());
            return ExitCode::FAILURE;
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        let operator_layer = telegram_log::OperatorLogLayer::new(bot.clone(), log_chat_id);
        registry
            .with(operator_layer.with_filter(telegram_log::operator_filter()))
            .init();
    } else {
        registry.init();
    }

    info!("🚀 Starting faqbot...");
    info!("Loaded config from {}", config.config_path.display());

    let content = match ContentStore::load(&config.content_path) {
        Ok(content) => Arc::new(content),
        Err(e) => {
            error!("Failed to load menu content: {e}");
            return ExitCode::FAILURE;
        }
    };

    let state = Arc::new(BotState {
        menu: MenuDispatcher::new(content, InMemorySessionStore::new(), TelegramClient::new(bot.clone())),
    });

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(Update::filter_message().endpoint(handle_text))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build();

    match &config.webhook {
        Some(webhook) => {
            let listener = match server::webhook_listener(bot, webhook).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!("Failed to start webhook: {e}");
                    return ExitCode::FAILURE;
                }
            };
            dispatcher
                .dispatch_with_listener(listener, LoggingErrorHandler::with_custom_text("An error from the webhook listener"))
                .await;
        }
        None => {
            info!("No webhook configured, using long polling");
            if let Err(e) = bot.delete_webhook().await {
                warn!("Failed to delete webhook: {e}");
            }
            dispatcher.dispatch().await;
        }
    }

    info!("Stopped");
    ExitCode::SUCCESS
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command, state: Arc<BotState>) -> ResponseResult<()> {
    match cmd {
        Command::Start => {
            let name = msg.from.as_ref().map(|u| u.first_name.as_str());
            info!("/start in chat {}", msg.chat.id);
            let result = state.menu.handle_start(msg.chat.id.0, name).await;
            report_failure(&bot, msg.chat.id, result).await;
        }
    }
    Ok(())
}

async fn handle_text(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let name = msg.from.as_ref().map(|u| u.first_name.as_str());
    let result = state.menu.handle_text(msg.chat.id.0, name).await;
    report_failure(&bot, msg.chat.id, result).await;
    Ok(())
}

async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<BotState>) -> ResponseResult<()> {
    let chat_id = q
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or_else(|| ChatId::from(q.from.id));

    let Some(data) = q.data.as_deref() else {
        bot.answer_callback_query(q.id.clone()).await.ok();
        return Ok(());
    };

    info!("Button {} pressed in chat {}", data, chat_id);
    let result = state.menu.handle_button(chat_id.0, &q.id.0, data).await;
    report_failure(&bot, chat_id, result).await;
    Ok(())
}

/// Logs a failed render and tells the user something went wrong.
async fn report_failure(bot: &Bot, chat_id: ChatId, result: Result<(), RenderFailure>) {
    if let Err(e) = result {
        error!("{e}");
        if let Err(e) = bot.send_message(chat_id, GENERIC_FAILURE).await {
            warn!("Failed to report failure to chat {}: {e}", chat_id);
        }
    }
}
