pub mod cache;
pub mod config;
pub mod edge;
pub mod error;
pub mod estimate;
pub mod http;
pub mod payload;
pub mod rtt;

pub use cache::Cache;
pub use error::{FabricError, Result};
pub use rtt::RttTracker;

/// Participant ids double as their HTTP authority — `"host:port"` ids
/// are addressed directly, ids already spelled as a URL pass through
/// unchanged. This is the same explicit-mapping approach `spec.md` §9
/// recommends for edge URL/node-id pairs, applied to participants too.
pub fn peer_base_url(id: &str) -> String {
    if id.starts_with("http://") || id.starts_with("https://") {
        id.to_string()
    } else {
        format!("http://{id}")
    }
}
