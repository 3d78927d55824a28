//! Per-module logger
//!
//! Gives module authors a logger whose lines carry the host and module names,
//! both as a `[host] [module]` prefix and as structured fields.

use tracing::{error, info, warn};

/// Logger bound to one host/module pair.
#[derive(Debug, Clone)]
pub struct ModuleLogger {
    host: String,
    module: String,
}

impl ModuleLogger {
    pub fn new(host: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            module: module.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn info(&self, msg: &str) {
        info!(host = %self.host, module = %self.module, "{}", self.format(msg));
    }

    pub fn warn(&self, msg: &str) {
        warn!(host = %self.host, module = %self.module, "{}", self.format(msg));
    }

    pub fn error(&self, msg: &str) {
        error!(host = %self.host, module = %self.module, "{}", self.format(msg));
    }

    fn format(&self, msg: &str) -> String {
        format!("[{}] [{}] {}", self.host, self.module, msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_format() {
        let logger = ModuleLogger::new("arena", "rewards");
        assert_eq!(logger.format("ready"), "[arena] [rewards] ready");
        assert_eq!(logger.host(), "arena");
        assert_eq!(logger.module(), "rewards");
    }
}
