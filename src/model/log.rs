//! Event log vocabulary shared by every engine.
//!
//! Each engine emits its own record type; metrics only see them through
//! [`LogEntry`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::profile::Decision;

/// What happened in one log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "publish")]
    Publish,
    #[serde(rename = "forward")]
    Forward,
    #[serde(rename = "modify")]
    Modify,
    #[serde(rename = "ignore")]
    Ignore,
    /// Delivery to a node that already received the message (reach engine).
    #[serde(rename = "forward (repeated)")]
    ForwardRepeated,
    #[serde(rename = "infect")]
    Infect,
    #[serde(rename = "recover")]
    Recover,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Publish => "publish",
            Action::Forward => "forward",
            Action::Modify => "modify",
            Action::Ignore => "ignore",
            Action::ForwardRepeated => "forward (repeated)",
            Action::Infect => "infect",
            Action::Recover => "recover",
        }
    }

    /// Responses counted by relay-style activity metrics.
    pub fn is_relay_response(&self) -> bool {
        matches!(self, Action::Forward | Action::Modify | Action::Ignore)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Decision> for Action {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Forward => Action::Forward,
            Decision::Modify => Action::Modify,
            Decision::Ignore => Action::Ignore,
        }
    }
}

/// Read-only view of a log record.
pub trait LogEntry {
    /// 1-based timestep.
    fn t(&self) -> u32;
    fn action(&self) -> Action;
    fn sender(&self) -> Option<&str>;
    fn receiver(&self) -> Option<&str>;
    fn publisher(&self) -> Option<&str> {
        None
    }
}

impl<E: LogEntry + ?Sized> LogEntry for &E {
    fn t(&self) -> u32 { (**self).t() }
    fn action(&self) -> Action { (**self).action() }
    fn sender(&self) -> Option<&str> { (**self).sender() }
    fn receiver(&self) -> Option<&str> { (**self).receiver() }
    fn publisher(&self) -> Option<&str> { (**self).publisher() }
}
