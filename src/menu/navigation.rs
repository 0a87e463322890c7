//! Per-conversation navigation stack and the transitions between nodes.

use tracing::warn;

use crate::menu::content::{ContentStore, BACK, ESCALATION, HOME, ROOT};

/// What the user pressed, decoded from callback data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Home,
    Back,
    Escalate,
    Node(String),
}

impl Selection {
    pub fn parse(data: &str) -> Self {
        match data {
            HOME => Self::Home,
            BACK => Self::Back,
            ESCALATION => Self::Escalate,
            key => Self::Node(key.to_string()),
        }
    }

    /// Home and Back are navigation controls, not menu choices.
    pub fn is_control(&self) -> bool {
        matches!(self, Self::Home | Self::Back)
    }
}

/// What to show after a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Render(String),
    NotImplemented(String),
    Escalate,
}

/// History of visited keys. The bottom is always ROOT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationStack {
    keys: Vec<String>,
}

impl NavigationStack {
    pub fn new() -> Self {
        Self { keys: vec![ROOT.to_string()] }
    }

    pub fn top(&self) -> &str {
        self.keys.last().map(String::as_str).unwrap_or(ROOT)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn push(&mut self, key: &str) {
        self.keys.push(key.to_string());
    }

    /// Pops unless only ROOT is left.
    pub fn back(&mut self) {
        if self.keys.len() > 1 {
            self.keys.pop();
        }
    }

    pub fn home(&mut self) {
        self.keys.truncate(1);
    }

    pub fn apply(&mut self, selection: &Selection, store: &ContentStore) -> Transition {
        match selection {
            Selection::Home => {
                self.home();
                Transition::Render(ROOT.to_string())
            }
            Selection::Back => {
                self.back();
                let top = self.top();
                if store.contains(top) {
                    Transition::Render(top.to_string())
                } else {
                    Transition::NotImplemented(top.to_string())
                }
            }
            Selection::Escalate => Transition::Escalate,
            Selection::Node(key) => {
                self.push(key);
                if store.contains(key) {
                    Transition::Render(key.clone())
                } else {
                    warn!("Selected menu option {} has no content yet (stack: {:?})", key, self.keys);
                    Transition::NotImplemented(key.clone())
                }
            }
        }
    }
}

impl Default for NavigationStack {
    fn default() -> Self {
        Self::new()
    }
}
