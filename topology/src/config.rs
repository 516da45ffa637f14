use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "/etc/fabric/topology.toml";
const ENV_CONFIG_PATH: &str = "TOPOLOGY_CONFIG";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:4100".to_string()
}

impl Config {
    pub fn load() -> Self {
        fabric_common::config::load(ENV_CONFIG_PATH, DEFAULT_CONFIG_PATH)
    }
}
