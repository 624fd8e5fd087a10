//! Logging setup
//!
//! The engine logs through the `log` facade; binaries call [`init`] once.

pub use log::{debug, error, info, trace, warn};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Initialize `env_logger`, honouring `RUST_LOG` and defaulting to [`DEFAULT_FILTER`]
pub fn init() {
    let env = env_logger::Env::default().default_filter_or(DEFAULT_FILTER);
    if env_logger::Builder::from_env(env).format_timestamp_millis().try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}
