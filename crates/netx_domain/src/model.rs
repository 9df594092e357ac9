use derive_more::derive::Display;
use serde::{Deserialize, Serialize};
use strum_macros::EnumString;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, Hash, Eq, PartialOrd, Ord, Display)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn new<T: Into<String>>(id: T) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ModelId {
    fn from(value: String) -> Self {
        ModelId(value)
    }
}

impl From<&str> for ModelId {
    fn from(value: &str) -> Self {
        ModelId(value.to_string())
    }
}

/// Context-window class of a model. Decides how many packets of a capture
/// fit into its prompt.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContextWindow {
    Small,
    Big,
}

/// Packet budget per context-window class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketLimits {
    pub small: usize,
    pub big: usize,
}

impl PacketLimits {
    pub fn for_window(&self, window: ContextWindow) -> usize {
        match window {
            ContextWindow::Small => self.small,
            ContextWindow::Big => self.big,
        }
    }
}
