//! Server configuration.
//!
//! Values resolve in the same order as the daemon flags: an explicit flag wins,
//! then the `PCBOOK_*` environment variable, then the default.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::image_store::DEFAULT_MAX_IMAGE_BYTES;
use crate::{Error, Result};

pub const ENV_ENDPOINT: &str = "PCBOOK_ENDPOINT";
pub const ENV_IMAGE_DIR: &str = "PCBOOK_IMAGE_DIR";
pub const ENV_MAX_IMAGE_BYTES: &str = "PCBOOK_MAX_IMAGE_BYTES";
pub const ENV_SEARCH_DELAY_MS: &str = "PCBOOK_SEARCH_DELAY_MS";

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address the gRPC server binds to. Port 0 picks a free port.
    pub endpoint: String,
    /// Directory uploaded images are written to.
    pub image_dir: PathBuf,
    /// Largest accepted image, in bytes.
    pub max_image_bytes: usize,
    /// Simulated work per laptop examined by a search.
    pub search_per_entry_delay: Duration,
    /// Maximum concurrent requests per connection.
    pub concurrency_limit: usize,
    /// How long `stop` waits for in-flight calls before aborting them.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint: "0.0.0.0:8080".to_string(),
            image_dir: PathBuf::from("img"),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            search_per_entry_delay: Duration::ZERO,
            concurrency_limit: 100,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Defaults overlaid with whatever `PCBOOK_*` variables are set.
    pub fn from_env() -> Result<Self> {
        Self::default().with_lookup(|key| env::var(key).ok())
    }

    fn with_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|s| !s.is_empty()) {
            self.endpoint = endpoint;
        }
        if let Some(dir) = lookup(ENV_IMAGE_DIR).filter(|s| !s.is_empty()) {
            self.image_dir = PathBuf::from(dir);
        }
        if let Some(max) = lookup(ENV_MAX_IMAGE_BYTES) {
            self.max_image_bytes = parse_var(ENV_MAX_IMAGE_BYTES, &max)?;
        }
        if let Some(ms) = lookup(ENV_SEARCH_DELAY_MS) {
            self.search_per_entry_delay = Duration::from_millis(parse_var(ENV_SEARCH_DELAY_MS, &ms)?);
        }
        Ok(self)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("{} must be a non-negative integer, got {:?}", key, value)))
}
