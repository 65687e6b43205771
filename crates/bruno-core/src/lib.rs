//! Bruno Core - Shared functionality for the Bruno MCP server
//!
//! Holds everything the protocol engine's tool handlers reach for: the
//! workspace registry, the collection inspector and server configuration.

pub mod collection;
pub mod config;
pub mod paths;
pub mod workspace;

pub use collection::{CollectionInspector, CreateCollectionOptions, FsInspector, InspectError};
pub use config::Config;
pub use paths::Paths;
pub use workspace::{Workspace, WorkspaceError, WorkspaceRegistry};
