//! Configuration types for the gateway.

mod endpoint;
mod http;
mod listen;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use endpoint::{
    parse_method, AuthConfig, BasicAuthConfig, Endpoint, EndpointError, OAuthConfig,
    ResolvedEndpoint,
};
pub use http::{ConnectionPoolConfig, HttpConfig};
pub use listen::ListenConfig;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub listen: ListenConfig,
    /// Default outbound transport, used by endpoints without their own `http` section
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub connection_pool: ConnectionPoolConfig,
    /// Endpoints keyed by a free-form name
    #[serde(default)]
    pub endpoints: BTreeMap<String, Endpoint>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {e}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every endpoint and reject duplicate local routes.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let mut seen: HashMap<(&str, hyper::Method), &str> = HashMap::new();

        for (name, endpoint) in &self.endpoints {
            let resolved = endpoint
                .resolve()
                .map_err(|e| anyhow::anyhow!("Invalid endpoint '{name}': {e}"))?;

            let key = (resolved.local_path, resolved.local_method.clone());
            if let Some(previous) = seen.insert(key, name) {
                anyhow::bail!(
                    "Endpoints '{previous}' and '{name}' both map {} {}",
                    resolved.local_method,
                    resolved.local_path
                );
            }
        }

        Ok(())
    }

    /// Endpoints ordered longest local path first, then by name.
    pub fn endpoints_by_specificity(&self) -> Vec<(&str, &Endpoint)> {
        let mut endpoints: Vec<(&str, &Endpoint)> = self
            .endpoints
            .iter()
            .map(|(name, e)| (name.as_str(), e))
            .collect();
        endpoints.sort_by(|(a_name, a), (b_name, b)| {
            b.local_path
                .len()
                .cmp(&a.local_path.len())
                .then_with(|| a_name.cmp(b_name))
        });
        endpoints
    }
}
