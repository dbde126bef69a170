//! Shared logging setup for warden binaries.

/// Initialize process-wide logging using the format named by
/// `WARDEN_LOG_FORMAT` (JSON unless set to `pretty`).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    logging::init(logging::LogFormat::from_env());
}

pub mod logging;
