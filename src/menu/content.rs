//! Menu content tree loaded from JSON.
//!
//! The source is a map from node key to node:
//!
//! ```json
//! {
//!   "ROOT": {
//!     "text": "Olá!",
//!     "items": [{"tipo": "nota", "texto": "..."}, {"tipo": "link", "titulo": "...", "url": "https://..."}],
//!     "opcoes": [["Financeiro", "FINANCEIRO"], ["Portal", {"url": "https://..."}]]
//!   }
//! }
//! ```
//!
//! Option targets are resolved once here into [`OptionTarget`]; nothing
//! downstream looks at the raw JSON shape again.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};
use url::Url;

use crate::config::ConfigError;

/// Key of the top-level menu.
pub const ROOT: &str = "ROOT";
/// Callback data of the "home" control.
pub const HOME: &str = "HOME";
/// Callback data of the "back" control.
pub const BACK: &str = "VOLTAR";
/// Option target that asks to talk to the staff.
pub const ESCALATION: &str = "FALAR_COM_EQUIPE";

/// Telegram rejects callback data longer than this.
const MAX_CALLBACK_BYTES: usize = 64;

/// A content block shown after a node's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentItem {
    Note(String),
    Link { title: String, url: Url },
}

/// Where a menu option leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionTarget {
    /// A node in the store.
    Navigate(String),
    /// An external page, opened by the client.
    OpenUrl(Url),
    /// Staff contact request.
    Escalate,
    /// Not a known node; selecting it shows the "not implemented" leaf.
    Unresolved(String),
}

impl OptionTarget {
    /// Callback data sent back by Telegram when this option is pressed.
    pub fn callback_key(&self) -> Option<&str> {
        match self {
            Self::Navigate(key) | Self::Unresolved(key) => Some(key),
            Self::Escalate => Some(ESCALATION),
            Self::OpenUrl(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuOption {
    pub label: String,
    pub target: OptionTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub text: String,
    pub items: Vec<ContentItem>,
    pub options: Vec<MenuOption>,
}

/// Option target key → label of the first option pointing at it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelIndex {
    labels: HashMap<String, String>,
}

impl LabelIndex {
    /// Label for `key`, or the key itself when no option declares it.
    pub fn label_for<'a>(&'a self, key: &'a str) -> &'a str {
        self.labels.get(key).map(String::as_str).unwrap_or(key)
    }

    fn insert(&mut self, key: &str, label: &str) {
        self.labels.entry(key.to_string()).or_insert_with(|| label.to_string());
    }
}

/// Immutable menu tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentStore {
    nodes: HashMap<String, Node>,
    labels: LabelIndex,
}

impl ContentStore {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile { path: path.to_path_buf(), source: e })?;
        let store = Self::parse(path, &source)?;
        info!("Loaded {} menu nodes from {}", store.nodes.len(), path.display());
        Ok(store)
    }

    #[cfg(test)]
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        Self::parse(Path::new("<memory>"), source)
    }

    fn parse(path: &Path, source: &str) -> Result<Self, ConfigError> {
        let raw: RawContent = serde_json::from_str(source)
            .map_err(|e| ConfigError::ParseJson { path: path.to_path_buf(), source: e })?;
        Self::build(raw.0)
    }

    fn build(entries: Vec<(String, RawNode)>) -> Result<Self, ConfigError> {
        let mut keys = HashSet::with_capacity(entries.len());
        for (key, _) in &entries {
            if !keys.insert(key.as_str()) {
                return Err(ConfigError::Validation(format!("duplicate node key '{key}'")));
            }
            if [HOME, BACK, ESCALATION].contains(&key.as_str()) {
                return Err(ConfigError::Validation(format!("'{key}' is reserved and cannot be a node key")));
            }
            check_callback_len(key)?;
        }
        if !keys.contains(ROOT) {
            return Err(ConfigError::Validation(format!("content has no '{ROOT}' node")));
        }

        let mut labels = LabelIndex::default();
        let mut resolved = Vec::with_capacity(entries.len());
        for (key, raw) in &entries {
            let node = resolve_node(key, raw, &keys)?;
            for option in &node.options {
                if let OptionTarget::Unresolved(target) = &option.target {
                    warn!("Option '{}' in {} points to unknown node {}", option.label, key, target);
                }
                if let Some(target) = option.target.callback_key() {
                    labels.insert(target, &option.label);
                }
            }
            resolved.push((key.clone(), node));
        }

        Ok(Self {
            nodes: resolved.into_iter().collect(),
            labels,
        })
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn labels(&self) -> &LabelIndex {
        &self.labels
    }
}

fn resolve_node(key: &str, raw: &RawNode, keys: &HashSet<&str>) -> Result<Node, ConfigError> {
    let text = match raw.text.as_deref() {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        Some(_) => return Err(ConfigError::Validation(format!("node '{key}' has empty text"))),
        None => return Err(ConfigError::Validation(format!("node '{key}' is missing 'text'"))),
    };

    let items = raw
        .items
        .iter()
        .map(|item| match item {
            RawItem::Note { texto } if texto.trim().is_empty() => {
                Err(ConfigError::Validation(format!("node '{key}' has an empty note")))
            }
            RawItem::Note { texto } => Ok(ContentItem::Note(texto.clone())),
            RawItem::Link { titulo, url } => Ok(ContentItem::Link {
                title: titulo.clone(),
                url: parse_url(url)?,
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let options = raw
        .opcoes
        .iter()
        .map(|(label, target)| {
            if label.trim().is_empty() {
                return Err(ConfigError::Validation(format!("node '{key}' has an option without label")));
            }
            Ok(MenuOption {
                label: label.clone(),
                target: resolve_target(key, target, keys)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Node { text, items, options })
}

/// Structured targets: `url` wins over `action`, which wins over `goto`.
fn resolve_target(node: &str, raw: &RawTarget, keys: &HashSet<&str>) -> Result<OptionTarget, ConfigError> {
    match raw {
        RawTarget::Key(key) => resolve_key(node, key, keys),
        RawTarget::Structured { url: Some(url), .. } => Ok(OptionTarget::OpenUrl(parse_url(url)?)),
        RawTarget::Structured { action: Some(key), .. } | RawTarget::Structured { goto: Some(key), .. } => {
            resolve_key(node, key, keys)
        }
        RawTarget::Structured { .. } => Err(ConfigError::Validation(format!(
            "node '{node}' has an option target without 'url', 'action' or 'goto'"
        ))),
    }
}

fn resolve_key(node: &str, key: &str, keys: &HashSet<&str>) -> Result<OptionTarget, ConfigError> {
    if key == HOME || key == BACK {
        return Err(ConfigError::Validation(format!(
            "node '{node}' lists control '{key}' as an option; it is added automatically"
        )));
    }
    if key == ESCALATION {
        return Ok(OptionTarget::Escalate);
    }
    if keys.contains(key) {
        return Ok(OptionTarget::Navigate(key.to_string()));
    }
    if key.starts_with("https://") || key.starts_with("http://") {
        return Ok(OptionTarget::OpenUrl(parse_url(key)?));
    }
    if key.trim().is_empty() {
        return Err(ConfigError::Validation(format!("node '{node}' has an option with an empty target")));
    }
    check_callback_len(key)?;
    Ok(OptionTarget::Unresolved(key.to_string()))
}

fn parse_url(url: &str) -> Result<Url, ConfigError> {
    Url::parse(url).map_err(|e| ConfigError::InvalidUrl { url: url.to_string(), source: e })
}

fn check_callback_len(key: &str) -> Result<(), ConfigError> {
    if key.len() > MAX_CALLBACK_BYTES {
        return Err(ConfigError::Validation(format!(
            "key '{key}' is longer than {MAX_CALLBACK_BYTES} bytes and cannot be used as callback data"
        )));
    }
    Ok(())
}

#[derive(Deserialize)]
struct RawNode {
    text: Option<String>,
    #[serde(default)]
    items: Vec<RawItem>,
    #[serde(default)]
    opcoes: Vec<(String, RawTarget)>,
}

#[derive(Deserialize)]
#[serde(tag = "tipo")]
enum RawItem {
    #[serde(rename = "nota")]
    Note { texto: String },
    #[serde(rename = "link")]
    Link { titulo: String, url: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTarget {
    Key(String),
    Structured {
        url: Option<String>,
        action: Option<String>,
        goto: Option<String>,
    },
}

/// Top-level map kept as a list so duplicate keys are visible.
struct RawContent(Vec<(String, RawNode)>);

impl<'de> Deserialize<'de> for RawContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawContent;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from node key to node")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, RawNode>()? {
                    entries.push(entry);
                }
                Ok(RawContent(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}
