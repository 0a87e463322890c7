//! Keyboards derived from the content tree.

use url::Url;

use crate::menu::content::{ContentStore, OptionTarget, ROOT};

pub const BACK_LABEL: &str = "⬅️ Voltar";
pub const HOME_LABEL: &str = "🏠 Menu inicial";
pub const LINK_LABEL: &str = "🔗 Abrir link";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyboardAction {
    /// Callback carrying a node key (or an unresolved/escalation key).
    Navigate(String),
    OpenUrl(Url),
    GoBack,
    GoHome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardButton {
    pub label: String,
    pub action: KeyboardAction,
}

impl KeyboardButton {
    fn new(label: &str, action: KeyboardAction) -> Self {
        Self { label: label.to_string(), action }
    }

    pub fn is_control(&self) -> bool {
        matches!(self.action, KeyboardAction::GoBack | KeyboardAction::GoHome)
    }
}

/// Ordered buttons; layout into rows is the messenger's job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    buttons: Vec<KeyboardButton>,
}

impl Keyboard {
    pub fn buttons(&self) -> &[KeyboardButton] {
        &self.buttons
    }

    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }
}

/// Keyboard for `key`: its options in order, then Back and Home (except at ROOT).
pub fn build(store: &ContentStore, key: &str) -> Keyboard {
    let mut buttons: Vec<KeyboardButton> = store
        .get(key)
        .map(|node| node.options.as_slice())
        .unwrap_or_default()
        .iter()
        .map(|option| {
            let action = match &option.target {
                OptionTarget::OpenUrl(url) => KeyboardAction::OpenUrl(url.clone()),
                target => KeyboardAction::Navigate(target.callback_key().unwrap_or_default().to_string()),
            };
            KeyboardButton::new(&option.label, action)
        })
        .collect();

    if key != ROOT {
        buttons.extend(controls().buttons);
    }
    Keyboard { buttons }
}

/// Just Back and Home.
pub fn controls() -> Keyboard {
    Keyboard {
        buttons: vec![
            KeyboardButton::new(BACK_LABEL, KeyboardAction::GoBack),
            KeyboardButton::new(HOME_LABEL, KeyboardAction::GoHome),
        ],
    }
}

/// Single button opening an external page.
pub fn link(url: &Url) -> Keyboard {
    Keyboard {
        buttons: vec![KeyboardButton::new(LINK_LABEL, KeyboardAction::OpenUrl(url.clone()))],
    }
}
