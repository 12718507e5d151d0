// src/config.rs
//
// Explicit configuration passed into `Engine::start`, replacing the
// source's process-wide configuration singleton per the redesign note in
// §9: the singleton is at most a convenience façade in the outer CLI
// (see main.rs's `clap`-derived `Cli`), never visible to the core.

use crate::error::EngineError;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub machine_id: String,
    pub parallelism: usize,
    pub polling_frequency: Duration,
    pub heartbeat_frequency: Duration,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.parallelism < 1 {
            return Err(EngineError::Configuration(
                "parallelism must be >= 1".into(),
            ));
        }
        if self.polling_frequency.is_zero() {
            return Err(EngineError::Configuration(
                "polling_frequency must be > 0".into(),
            ));
        }
        if self.heartbeat_frequency.is_zero() {
            return Err(EngineError::Configuration(
                "heartbeat_frequency must be > 0".into(),
            ));
        }
        Ok(())
    }
}
