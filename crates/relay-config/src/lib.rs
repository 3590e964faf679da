#![allow(clippy::must_use_candidate)]

//! Configuration for the relay chat backend
//!
//! Loaded from TOML with `{{ env.VAR }}` placeholder expansion. The
//! `[providers]` table is ordered: declaration order defines the failover
//! rotation order.

pub mod chat;
mod env;
mod loader;
pub mod providers;
pub mod server;

use serde::Deserialize;

pub use chat::ChatConfig;
pub use providers::{ProviderConfig, ProviderKind, QuotaPolicyConfig};
pub use server::ServerConfig;

use indexmap::IndexMap;

/// Top-level relay configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Turn handling and failover knobs
    #[serde(default)]
    pub chat: ChatConfig,
    /// Provider configurations keyed by name; order is rotation order
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
}
