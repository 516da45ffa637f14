use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "/etc/fabric/registry.toml";
const ENV_CONFIG_PATH: &str = "REGISTRY_CONFIG";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Reserved for a future external KV backend; the in-memory store
    /// does not dial out to this address (see DESIGN.md).
    #[serde(default)]
    pub kv_backend_addr: Option<String>,
    #[serde(default = "default_ttl_sec")]
    pub ttl_sec: u64,
    #[serde(default = "default_topology_url")]
    pub topology_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            kv_backend_addr: None,
            ttl_sec: default_ttl_sec(),
            topology_url: default_topology_url(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:4200".to_string()
}

fn default_ttl_sec() -> u64 {
    120
}

fn default_topology_url() -> String {
    "http://127.0.0.1:4100".to_string()
}

impl Config {
    pub fn load() -> Self {
        fabric_common::config::load(ENV_CONFIG_PATH, DEFAULT_CONFIG_PATH)
    }
}
