//! Logging initialization module

use serde::{Deserialize, Serialize};
use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Logging profile configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Human-readable output, debug level for graft crates
    #[default]
    Development,
    /// JSON structured output, info level
    Production,
    /// Events go to the test capture layer only
    Test,
}

impl Profile {
    /// Filter used when `RUST_LOG` is not set
    fn default_directive(&self) -> &'static str {
        match self {
            Profile::Development => "graft=debug,graft_core=debug,graft_store=debug,graft_engine=debug",
            Profile::Production => "graft=info,graft_core=info,graft_store=info,graft_engine=info",
            Profile::Test => "off",
        }
    }
}

static INIT_ONCE: Once = Once::new();

/// Initialize the logging facility
///
/// Only the first call installs a subscriber; later calls are no-ops, so
/// both the CLI and the session factory may call it.
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(profile.default_directive()));
        match profile {
            Profile::Development => {
                // try_init: a test harness may already own the global subscriber
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .finish()
                    .try_init();
            }
            Profile::Production => {
                let _ = tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter)
                    .finish()
                    .try_init();
            }
            Profile::Test => {
                // Test capture is initialized separately via init_test_capture()
            }
        }
    });
}
