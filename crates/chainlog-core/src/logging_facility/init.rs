//! Process-wide subscriber setup

use std::sync::Once;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the default filter directive
pub const LOG_FILTER_ENV: &str = "CHAINLOG_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable lines, `chainlog*=debug`
    Development,
    /// One JSON object per event, `chainlog*=info`
    Production,
    /// Bare registry; tests install `init_test_capture()` instead
    Test,
}

impl Profile {
    /// Directive used when `CHAINLOG_LOG` is unset
    pub fn default_directive(self) -> &'static str {
        match self {
            Profile::Development => {
                "chainlog_core=debug,chainlog_store=debug,chainlog_asic=debug,chainlog_cli=debug"
            }
            Profile::Production | Profile::Test => {
                "chainlog_core=info,chainlog_store=info,chainlog_asic=info,chainlog_cli=info"
            }
        }
    }

    fn filter(self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_FILTER_ENV)
            .unwrap_or_else(|_| EnvFilter::new(self.default_directive()))
    }
}

static INIT: Once = Once::new();

/// Install the global subscriber for `profile`
///
/// Only the first call in a process has an effect. Setup failures (a
/// subscriber already installed by the host) are ignored.
pub fn init(profile: Profile) {
    INIT.call_once(|| match profile {
        Profile::Development => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(profile.filter())
                .with_target(false)
                .try_init();
        }
        Profile::Production => {
            let _ = tracing_subscriber::fmt()
                .json()
                .with_env_filter(profile.filter())
                .try_init();
        }
        Profile::Test => {
            let _ = tracing_subscriber::registry().try_init();
        }
    });
}
