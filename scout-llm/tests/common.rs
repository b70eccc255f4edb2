use std::path::PathBuf;
use std::sync::OnceLock;

use scout_common::observability::{init_logging, LogConfig};

static LOG_FILE: OnceLock<PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    LOG_FILE.get_or_init(|| init_logging(LogConfig::for_tests()).unwrap_or_default());
}
