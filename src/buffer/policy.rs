use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rule used to shed messages once the queue holds more than its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscardPolicy {
    /// Drop the message at the head of the queue
    #[default]
    Oldest,
    /// Refuse the message that was just added
    Newest,
    /// Never drop; the queue grows without bound
    None,
}

impl DiscardPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscardPolicy::Oldest => "oldest",
            DiscardPolicy::Newest => "newest",
            DiscardPolicy::None => "none",
        }
    }
}

impl fmt::Display for DiscardPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscardPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "oldest" => Ok(DiscardPolicy::Oldest),
            "newest" => Ok(DiscardPolicy::Newest),
            "none" => Ok(DiscardPolicy::None),
            other => Err(format!(
                "unknown discard policy '{other}'. Valid values: oldest, newest, none"
            )),
        }
    }
}

/// What the producer side does with a message larger than the destination accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OversizeAction {
    #[default]
    Truncate,
    Discard,
}

impl FromStr for OversizeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "truncate" => Ok(OversizeAction::Truncate),
            "discard" => Ok(OversizeAction::Discard),
            other => Err(format!(
                "unknown oversize action '{other}'. Valid values: truncate, discard"
            )),
        }
    }
}
