//! Node lifecycle glue as a library: identity, configuration, the outbound
//! event bus, and the main cooperative loop, all exposed so integration
//! tests and the `srishti-node` binary share one implementation.

pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod node;

pub use config::{GenesisFileParams, SrishtiConfig};
pub use error::NodeError;
pub use events::NodeEvent;
pub use identity::NodeIdentity;
pub use node::{is_bootstrap_only, GenesisToken, Node};
