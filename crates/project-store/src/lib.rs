//! Runtime-agnostic project store
//!
//! This crate provides the key-value cache that holds projects, their files
//! and the status of their dev-mode containers. It is the read path of record
//! for the orchestrator: every component reads and writes project state
//! through a [`ProjectStore`] instead of keeping it in memory.
//!
//! # Architecture
//!
//! The store delegates persistence to a pluggable [`StoreBackend`]:
//!
//! - [`MemoryBackend`] keeps everything in process memory
//! - [`SledBackend`] persists records in a `sled` database
//!
//! # Example
//!
//! ```no_run
//! use project_store::{Project, ProjectStore};
//!
//! # async fn example() -> project_store::Result<()> {
//! let store = ProjectStore::open("/var/lib/projects/store.db").await?;
//!
//! let project = Project::new("orders", "Orders", "Order routing", "camel-main");
//! store.save_project(&project).await?;
//!
//! assert!(store.get_project("orders").await?.is_some());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod store;

pub use backend::{memory::MemoryBackend, sled::SledBackend, StoreBackend};
pub use config::StoreConfig;
pub use error::{Error, Result};
pub use models::*;
pub use store::ProjectStore;

/// Re-export key types for convenience
pub mod prelude {
    pub use crate::{
        ContainerState, ContainerStatus, Error, Project, ProjectFile, ProjectStore, ProjectType,
        Result,
    };
}
