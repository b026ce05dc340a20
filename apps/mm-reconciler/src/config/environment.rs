//! Environment configuration for execution mode.

use serde::{Deserialize, Serialize};

/// Environment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// `DRY_RUN` or `LIVE`.
    #[serde(default = "default_environment_mode")]
    pub mode: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            mode: default_environment_mode(),
        }
    }
}

impl EnvironmentConfig {
    /// Returns true when orders are simulated.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.mode.eq_ignore_ascii_case("DRY_RUN")
    }
}

fn default_environment_mode() -> String {
    "DRY_RUN".to_string()
}
