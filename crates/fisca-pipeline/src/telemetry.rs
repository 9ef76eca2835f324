// SPDX-License-Identifier: Apache-2.0

use fisca_core::env::{env_bool, env_string};
use fisca_core::{ENV_FISCA_LOG_JSON, ENV_FISCA_LOG_LEVEL};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the process-wide subscriber: `RUST_LOG` wins, then
/// `FISCA_LOG_LEVEL`, then `info`. JSON output unless `FISCA_LOG_JSON` is off.
///
/// Returns `false` when a subscriber was already installed.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(env_string(ENV_FISCA_LOG_LEVEL, "info")));
    if env_bool(ENV_FISCA_LOG_JSON, true) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .is_ok()
    }
}
