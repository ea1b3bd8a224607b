//! Session configuration: mode selection and isolation settings

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env::{self, VarError};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Environment variable consulted by [`Mode::from_env`]
pub const MODE_ENV_VAR: &str = "INTERACTION_REPLAY_MODE";

/// Isolation mode selecting which adapter gets bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Record,
    #[default]
    Replay,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Record => write!(f, "record"),
            Mode::Replay => write!(f, "replay"),
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "record" => Ok(Mode::Record),
            "replay" => Ok(Mode::Replay),
            _ => Err(ConfigError::InvalidMode {
                value: value.to_string(),
            }),
        }
    }
}

impl Mode {
    /// Mode named by `INTERACTION_REPLAY_MODE`, replay when unset
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_var(env::var(MODE_ENV_VAR))
    }

    /// Mode from the result of an environment lookup
    ///
    /// A value that is set but not valid unicode is an error rather than unset.
    pub fn from_var(var: Result<String, VarError>) -> Result<Self, ConfigError> {
        match var {
            Ok(value) => value.parse(),
            Err(VarError::NotPresent) => Ok(Mode::default()),
            Err(VarError::NotUnicode(raw)) => Err(ConfigError::InvalidMode {
                value: raw.to_string_lossy().into_owned(),
            }),
        }
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Mode::Record)
    }
}

/// Settings for one dependency isolation session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    pub mode: Mode,
    /// Path prefix shared by every artifact of the session
    pub artifact_prefix: String,
    pub pretty: bool,
    /// Type names recorded by value rather than proxied
    pub additional_concrete_types: BTreeSet<String>,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            artifact_prefix: "interactions/".to_string(),
            pretty: true,
            additional_concrete_types: BTreeSet::new(),
        }
    }
}

impl IsolationConfig {
    pub fn new(artifact_prefix: impl Into<String>) -> Self {
        Self {
            artifact_prefix: artifact_prefix.into(),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_concrete_type(mut self, type_name: impl Into<String>) -> Self {
        self.additional_concrete_types.insert(type_name.into());
        self
    }
}
