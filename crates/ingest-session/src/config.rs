use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Default name of the progress cursor reported to the ledger backend.
pub const DEFAULT_CURSOR_NAME: &str = "INGESTLIVESESSION";

/// Tunables of a [`crate::LiveSession`].
///
/// Every field has a default, so a TOML file only needs the keys it
/// overrides:
///
/// ```toml
/// cursor_name = "HORIZON"
/// idle_retry_interval_ms = 500
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cursor name passed to the [`crate::CursorClient`].
    pub cursor_name: String,
    /// How long to wait before asking the backend again for a ledger it
    /// has not closed yet.
    #[serde(rename = "idle_retry_interval_ms", with = "duration_ms")]
    pub idle_retry_interval: Duration,
    /// How often `shutdown` checks whether the pipelines have drained.
    #[serde(rename = "shutdown_poll_interval_ms", with = "duration_ms")]
    pub shutdown_poll_interval: Duration,
    /// Retries the archive may spend on a failed state download.
    pub max_state_stream_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cursor_name: DEFAULT_CURSOR_NAME.into(),
            idle_retry_interval: Duration::from_secs(1),
            shutdown_poll_interval: Duration::from_secs(1),
            max_state_stream_retries: 0,
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(input: &str) -> SessionResult<Self> {
        let config: Self =
            toml::from_str(input).map_err(|e| SessionError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.cursor_name.trim().is_empty() {
            return Err(SessionError::Config("cursor name must not be empty".into()));
        }
        if self.idle_retry_interval.is_zero() {
            return Err(SessionError::Config("idle retry interval must be positive".into()));
        }
        if self.shutdown_poll_interval.is_zero() {
            return Err(SessionError::Config("shutdown poll interval must be positive".into()));
        }
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
