//! The mapping node and its HTTP surface.

pub mod api_response;
pub mod config;
pub mod http_server;
pub mod node;
pub mod routes;

pub use config::{load_node_config, EngineConfig, ImportConfig, NodeConfig};
pub use http_server::{configure_api, AppState, BankMapHttpServer};
pub use node::{BankMapNode, ConfigListing, ConfigSaveRequest, ScopeSelector};
