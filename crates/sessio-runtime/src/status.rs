//! Runtime session status

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// The runtime cannot provide sessions at all
    Disabled,
    /// Sessions are available but none is started
    None,
    /// A session is started
    Active,
}

impl SessionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Disabled => "disabled",
            SessionStatus::None => "none",
            SessionStatus::Active => "active",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disabled" => Ok(SessionStatus::Disabled),
            "none" => Ok(SessionStatus::None),
            "active" => Ok(SessionStatus::Active),
            _ => Err(format!("Unknown session status: {}", s)),
        }
    }
}
