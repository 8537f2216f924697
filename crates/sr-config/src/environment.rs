//! Deployment environment of the host application.

use serde::{Deserialize, Serialize};

/// Environment the host application reports from.
///
/// `Dev` shortens the flush interval and turns on payload logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Prod,
    Dev,
    Staging,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Prod => "prod",
            Environment::Dev => "dev",
            Environment::Staging => "staging",
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Environment::Dev)
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prod" | "production" => Ok(Environment::Prod),
            "dev" | "development" => Ok(Environment::Dev),
            "staging" => Ok(Environment::Staging),
            _ => Err(format!("unknown environment: {}", s)),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
