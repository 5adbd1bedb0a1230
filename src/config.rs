//! Server configuration from environment variables.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port to listen on. Binds on all interfaces so phones on the
    /// same network can connect.
    pub port: u16,
    /// Directory for stored clips.
    pub storage_dir: PathBuf,
}

impl Config {
    /// Load config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let port = std::env::var("WHOCLIPPED_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5000);
        let storage_dir = std::env::var("WHOCLIPPED_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("clip-storage"));
        Self { port, storage_dir }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            storage_dir: PathBuf::from("clip-storage"),
        }
    }
}
