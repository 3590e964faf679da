use std::net::SocketAddr;

use serde::Deserialize;

/// HTTP server configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address; defaults to 0.0.0.0:5000 when absent
    pub listen_address: Option<SocketAddr>,
    /// Include quota/usage debug payloads in chat responses
    #[serde(default)]
    pub expose_debug: bool,
}
