//! Service configuration.
//!
//! ## Environment
//!
//! - `HOST`: bind host (default: 0.0.0.0)
//! - `PORT`: bind port (default: 8001)
//! - `MAPKEEPER_DATA_FILE`: JSON snapshot path; unset keeps the catalog in memory
//! - `MAPKEEPER_CLIENT_DIR`: built client with `index.html` and `static/`
//! - `MAPKEEPER_USER_NAME`: the pre-provisioned user served by `/api/user` (default: Jessica)
//! - `MAPKEEPER_SEED_DEMO`: seed the sample map into an empty catalog (default: true)

use std::path::PathBuf;

/// Configuration for the map service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Snapshot file for persistence. `None` keeps everything in memory.
    pub data_file: Option<PathBuf>,
    /// Directory holding the built client application.
    pub client_dir: Option<PathBuf>,
    /// Name of the user provisioned at startup.
    pub user_name: String,
    /// Seed the sample map when the catalog starts empty.
    pub seed_demo: bool,
}

impl ServiceConfig {
    /// Load configuration from environment variables, falling back to
    /// [`ServiceConfig::default`] for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            data_file: non_empty_var("MAPKEEPER_DATA_FILE").map(PathBuf::from),
            client_dir: non_empty_var("MAPKEEPER_CLIENT_DIR").map(PathBuf::from),
            user_name: non_empty_var("MAPKEEPER_USER_NAME").unwrap_or(defaults.user_name),
            seed_demo: std::env::var("MAPKEEPER_SEED_DEMO")
                .ok()
                .and_then(|s| parse_flag(&s))
                .unwrap_or(defaults.seed_demo),
        }
    }

    /// `host:port` for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            data_file: None,
            client_dir: None,
            user_name: "Jessica".to_string(),
            seed_demo: true,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:8001");
        assert!(config.seed_demo);
        assert!(config.data_file.is_none());
    }
}
