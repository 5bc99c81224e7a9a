use std::path::PathBuf;

use engine_core::EngineConfig;
use serde::{Deserialize, Serialize};

/// Server-level configuration layered on top of `EngineConfig`: the bits
/// that are about *this process* (listen address, optional API key) rather
/// than the engine's own tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// When set, `X-API-Key` is required on every request. Unset means auth
    /// is disabled, a development-mode default.
    pub api_key: Option<String>,
    pub engine: EngineConfig,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let listen_addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let api_key = std::env::var("API_KEY").ok().filter(|t| !t.is_empty());

        let mut engine = EngineConfig::from_env();
        if let Ok(v) = std::env::var("ENGINE_CONFIG_FILE") {
            if let Ok(loaded) = EngineConfig::from_file(&PathBuf::from(v)) {
                engine = loaded;
            }
        }

        Self { listen_addr, api_key, engine }
    }
}
