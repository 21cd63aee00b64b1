use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SupervisorError, SupervisorResult};

/// Opaque solver configuration, passed through to the child process
/// untouched. The supervisor never interprets its keys — the concrete
/// schema belongs to whichever poker-domain config type the caller uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SolverConfig(Value);

impl SolverConfig {
    /// Parse a config that will be used to compute a content fingerprint
    /// (e.g. for solution-tree store keys): the JSON must be an object, with
    /// no other shape accepted, so two configs that fingerprint equal really
    /// did carry the same fields.
    pub fn from_strict_json(value: Value) -> SupervisorResult<Self> {
        if !value.is_object() {
            return Err(SupervisorError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "solver config must be a JSON object",
            )));
        }
        Ok(SolverConfig(value))
    }

    /// Parse a config coming from a human-edited file or CLI flag, where
    /// being permissive matters more than round-trip fidelity.
    pub fn from_relaxed_json(value: Value) -> Self {
        SolverConfig(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    pub solver_binary: PathBuf,
    #[serde(default)]
    pub solver_args: Vec<String>,
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub default_timeout: Duration,
    #[serde(default = "default_notification_timeout", with = "duration_secs")]
    pub default_notification_timeout: Duration,
    #[serde(default)]
    pub log_directory_root: Option<PathBuf>,
    #[serde(default)]
    pub force_file_backed_frames: bool,
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_notification_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            solver_binary: PathBuf::from("solver"),
            solver_args: Vec::new(),
            default_timeout: default_timeout(),
            default_notification_timeout: default_notification_timeout(),
            log_directory_root: None,
            force_file_backed_frames: false,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
