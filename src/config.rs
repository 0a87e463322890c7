use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use teloxide::types::ChatId;
use url::Url;

/// Errors that can occur when loading the config file or the menu content.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read a file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// A URL that does not parse.
    InvalidUrl { url: String, source: url::ParseError },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse '{}': {}", path.display(), source)
            }
            Self::InvalidUrl { url, source } => {
                write!(f, "invalid url '{}': {}", url, source)
            }
            Self::Validation(msg) => write!(f, "validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::InvalidUrl { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    /// Falls back to the TELEGRAM_TOKEN environment variable when empty.
    #[serde(default)]
    telegram_bot_token: String,
    /// Path to the menu content JSON.
    content_path: Option<String>,
    /// Directory for state files (logs). Defaults to current directory.
    data_dir: Option<String>,
    /// Chat that receives WARN/ERROR log lines.
    log_chat_id: Option<i64>,
    /// Webhook settings. Without them the bot uses long polling.
    webhook: Option<WebhookFile>,
}

#[derive(Deserialize)]
struct WebhookFile {
    public_url: String,
    /// Falls back to the WEBHOOK_SECRET environment variable when empty.
    #[serde(default)]
    secret: String,
    listen_addr: Option<String>,
}

const DEFAULT_CONTENT_PATH: &str = "content/menu.json";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";

/// Path under the public URL where Telegram posts updates.
pub const WEBHOOK_PATH: &str = "webhook";

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Full URL registered with Telegram (public URL + `/webhook`).
    pub url: Url,
    /// Sent back by Telegram in the `X-Telegram-Bot-Api-Secret-Token` header.
    pub secret: String,
    pub listen_addr: SocketAddr,
}

#[derive(Debug)]
pub struct Config {
    /// Path to the config file.
    pub config_path: PathBuf,
    pub telegram_bot_token: String,
    pub content_path: PathBuf,
    /// Directory for state files (logs).
    pub data_dir: PathBuf,
    pub log_chat_id: Option<ChatId>,
    pub webhook: Option<WebhookConfig>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        let env = |name: &str| std::env::var(name).ok();
        Self::from_file(config_path, file, env)
    }

    fn from_file(
        config_path: PathBuf,
        file: ConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let telegram_bot_token = if file.telegram_bot_token.is_empty() {
            env("TELEGRAM_TOKEN").unwrap_or_default()
        } else {
            file.telegram_bot_token
        };
        if telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token is required (or set TELEGRAM_TOKEN)".into(),
            ));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let valid_token = match telegram_bot_token.split_once(':') {
            Some((id, secret)) => id.parse::<u64>().is_ok() && !secret.is_empty() && !secret.contains(':'),
            None => false,
        };
        if !valid_token {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
            ));
        }

        let webhook = file
            .webhook
            .map(|w| WebhookConfig::from_file(w, &env))
            .transpose()?;

        Ok(Self {
            config_path,
            telegram_bot_token,
            content_path: PathBuf::from(file.content_path.as_deref().unwrap_or(DEFAULT_CONTENT_PATH)),
            data_dir: file.data_dir.map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
            log_chat_id: file.log_chat_id.map(ChatId),
            webhook,
        })
    }
}

impl WebhookConfig {
    fn from_file(file: WebhookFile, env: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let secret = if file.secret.is_empty() {
            env("WEBHOOK_SECRET").unwrap_or_default()
        } else {
            file.secret
        };
        // Telegram accepts 1-256 characters from A-Z, a-z, 0-9, _ and -
        let valid_secret = (1..=256).contains(&secret.len())
            && secret.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_secret {
            return Err(ConfigError::Validation(
                "webhook.secret must be 1-256 characters of A-Z, a-z, 0-9, '_' or '-' (or set WEBHOOK_SECRET)".into(),
            ));
        }

        let base = Url::parse(&file.public_url)
            .map_err(|e| ConfigError::InvalidUrl { url: file.public_url.clone(), source: e })?;
        if base.scheme() != "https" {
            return Err(ConfigError::Validation("webhook.public_url must use https".into()));
        }
        let url = webhook_url(&base)
            .map_err(|e| ConfigError::InvalidUrl { url: file.public_url.clone(), source: e })?;

        let listen_addr = file.listen_addr.as_deref().unwrap_or(DEFAULT_LISTEN_ADDR);
        let listen_addr = listen_addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Validation(format!("webhook.listen_addr '{listen_addr}': {e}")))?;

        Ok(Self { url, secret, listen_addr })
    }
}

/// Appends the webhook path to the public URL, keeping any path prefix it has.
fn webhook_url(base: &Url) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(WEBHOOK_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn assert_err<T>(result: Result<T, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    fn parse(json: &str, env: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let file: ConfigFile = serde_json::from_str(json).unwrap();
        let env: Vec<(String, String)> = env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_file(PathBuf::from("test.json"), file, |name| {
            env.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
        })
    }

    #[test]
    fn test_valid_config() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdefGHIjklMNOpqrsTUVwxyz"
        }"#);
        let config = Config::load(file.path()).expect("should load valid config");
        assert_eq!(config.telegram_bot_token, "123456789:ABCdefGHIjklMNOpqrsTUVwxyz");
        assert_eq!(config.content_path, PathBuf::from("content/menu.json"));
        assert_eq!(config.data_dir, PathBuf::from("."));
        assert!(config.webhook.is_none());
        assert!(config.log_chat_id.is_none());
    }

    #[test]
    fn test_token_from_env() {
        let config = parse("{}", &[("TELEGRAM_TOKEN", "42:secret")]).expect("env token");
        assert_eq!(config.telegram_bot_token, "42:secret");
    }

    #[test]
    fn test_file_token_wins_over_env() {
        let config = parse(r#"{"telegram_bot_token": "1:file"}"#, &[("TELEGRAM_TOKEN", "2:env")]).unwrap();
        assert_eq!(config.telegram_bot_token, "1:file");
    }

    #[test]
    fn test_empty_token() {
        let err = assert_err(parse(r#"{"telegram_bot_token": ""}"#, &[]));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("telegram_bot_token"));
    }

    #[test]
    fn test_invalid_token_format_no_colon() {
        let err = assert_err(parse(r#"{"telegram_bot_token": "invalid_token_no_colon"}"#, &[]));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("invalid"));
    }

    #[test]
    fn test_invalid_token_format_non_numeric_id() {
        let err = assert_err(parse(r#"{"telegram_bot_token": "notanumber:ABCdef"}"#, &[]));
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_invalid_token_format_empty_secret() {
        let err = assert_err(parse(r#"{"telegram_bot_token": "123456789:"}"#, &[]));
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_webhook_config() {
        let config = parse(
            r#"{
                "telegram_bot_token": "1:abc",
                "log_chat_id": -100123,
                "webhook": {
                    "public_url": "https://bot.example.edu/faq",
                    "secret": "s3cr3t_token-1",
                    "listen_addr": "127.0.0.1:9000"
                }
            }"#,
            &[],
        )
        .unwrap();
        let webhook = config.webhook.expect("webhook configured");
        assert_eq!(webhook.url.as_str(), "https://bot.example.edu/faq/webhook");
        assert_eq!(webhook.secret, "s3cr3t_token-1");
        assert_eq!(webhook.listen_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.log_chat_id, Some(ChatId(-100123)));
    }

    #[test]
    fn test_webhook_defaults_and_env_secret() {
        let config = parse(
            r#"{"telegram_bot_token": "1:abc", "webhook": {"public_url": "https://bot.example.edu"}}"#,
            &[("WEBHOOK_SECRET", "from_env")],
        )
        .unwrap();
        let webhook = config.webhook.unwrap();
        assert_eq!(webhook.url.as_str(), "https://bot.example.edu/webhook");
        assert_eq!(webhook.secret, "from_env");
        assert_eq!(webhook.listen_addr.port(), 8000);
    }

    #[test]
    fn test_webhook_missing_secret() {
        let err = assert_err(parse(
            r#"{"telegram_bot_token": "1:abc", "webhook": {"public_url": "https://bot.example.edu"}}"#,
            &[],
        ));
        assert!(err.to_string().contains("webhook.secret"));
    }

    #[test]
    fn test_webhook_secret_bad_chars() {
        let err = assert_err(parse(
            r#"{"telegram_bot_token": "1:abc", "webhook": {"public_url": "https://x.edu", "secret": "no spaces!"}}"#,
            &[],
        ));
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_webhook_requires_https() {
        let err = assert_err(parse(
            r#"{"telegram_bot_token": "1:abc", "webhook": {"public_url": "http://x.edu", "secret": "abc"}}"#,
            &[],
        ));
        assert!(err.to_string().contains("https"));
    }

    #[test]
    fn test_webhook_invalid_url() {
        let err = assert_err(parse(
            r#"{"telegram_bot_token": "1:abc", "webhook": {"public_url": "not a url", "secret": "abc"}}"#,
            &[],
        ));
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn test_webhook_bad_listen_addr() {
        let err = assert_err(parse(
            r#"{"telegram_bot_token": "1:abc", "webhook": {"public_url": "https://x.edu", "secret": "abc", "listen_addr": "localhost"}}"#,
            &[],
        ));
        assert!(err.to_string().contains("listen_addr"));
    }

    #[test]
    fn test_file_not_found() {
        let err = assert_err(Config::load("/nonexistent/path/config.json"));
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let file = write_config("{ invalid json }");
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }
}
