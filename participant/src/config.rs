use fabric_common::edge::EdgeEndpoint;
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "/etc/fabric/participant.toml";
const ENV_CONFIG_PATH: &str = "PARTICIPANT_CONFIG";

/// One configured edge cache: its base URL plus the id it is known by
/// in the topology graph (`spec.md` §9's explicit URL→node-id mapping).
#[derive(Debug, Deserialize, Clone)]
pub struct EdgeConfig {
    pub url: String,
    pub node_id: String,
}

impl From<&EdgeConfig> for EdgeEndpoint {
    fn from(e: &EdgeConfig) -> Self {
        EdgeEndpoint {
            url: e.url.clone(),
            node_id: e.node_id.clone(),
        }
    }
}

/// `spec.md` §6 participant configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Neighbor ids. A neighbor id doubles as its own HTTP authority
    /// (see `fabric_common::peer_base_url`), so no separate address
    /// list is needed.
    #[serde(default)]
    pub neighbors: Vec<String>,
    #[serde(default = "default_tracker_url")]
    pub tracker_url: String,
    #[serde(default = "default_topology_url")]
    pub topology_url: String,
    /// Reserved for the optional WebSocket signalling path (`spec.md`
    /// §1 scopes it out); kept so the config shape matches the source.
    #[serde(default)]
    pub signal_url: Option<String>,
    #[serde(default)]
    pub edge_urls: Vec<EdgeConfig>,
    #[serde(default)]
    pub room: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_rtt_hint_ms")]
    pub rtt_hint_ms: u32,
    #[serde(default = "default_heartbeat_interval_sec")]
    pub heartbeat_interval_sec: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            port: default_port(),
            neighbors: Vec::new(),
            tracker_url: default_tracker_url(),
            topology_url: default_topology_url(),
            signal_url: None,
            edge_urls: Vec::new(),
            room: String::new(),
            region: default_region(),
            rtt_hint_ms: default_rtt_hint_ms(),
            heartbeat_interval_sec: default_heartbeat_interval_sec(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

fn default_name() -> String {
    "participant".to_string()
}

fn default_port() -> u16 {
    4300
}

fn default_tracker_url() -> String {
    "http://127.0.0.1:4200".to_string()
}

fn default_topology_url() -> String {
    "http://127.0.0.1:4100".to_string()
}

fn default_region() -> String {
    "default".to_string()
}

fn default_rtt_hint_ms() -> u32 {
    50
}

fn default_heartbeat_interval_sec() -> u64 {
    30
}

fn default_cache_capacity() -> i64 {
    fabric_common::cache::DEFAULT_CAPACITY as i64
}

impl Config {
    pub fn load() -> Self {
        fabric_common::config::load(ENV_CONFIG_PATH, DEFAULT_CONFIG_PATH)
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
