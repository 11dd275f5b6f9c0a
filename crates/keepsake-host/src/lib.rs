//! Keepsake Host -- the save operations exposed to the game's UI/IPC layer.
//!
//! This crate wires [`keepsake_store`] to configuration from the environment
//! and exposes the four consumer operations on [`SaveService`]:
//! `save_game_data`, `read_game_data`, `list_game_data`, and
//! `delete_game_data`. Transport is the caller's concern.
//!
//! # Quick Start
//!
//! ```
//! use keepsake_host::prelude::*;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut config = HostConfig::from_env().unwrap();
//! config.store.storage_dir = std::env::temp_dir().join("keepsake-host-doc");
//!
//! let service = SaveService::open(config).await.unwrap();
//! service
//!     .save_game_data(serde_json::json!({ "level": 3 }), SaveType::Manual, "slot-1", None)
//!     .await
//!     .unwrap();
//!
//! let data = service.read_game_data("slot-1").await.unwrap().unwrap();
//! assert_eq!(data.payload, Some(serde_json::json!({ "level": 3 })));
//! # });
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod service;

/// Re-export the container crate for convenience.
pub use keepsake_container;

/// Re-export the store crate for convenience.
pub use keepsake_store;

/// Install a `fmt` subscriber filtered by `RUST_LOG` (default `warn`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let result = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common host usage.
pub mod prelude {
    pub use keepsake_store::prelude::*;

    pub use crate::config::{ConfigError, HostConfig};
    pub use crate::init_tracing;
    pub use crate::service::{system_clock_ms, Clock, GameData, SaveService};
}
