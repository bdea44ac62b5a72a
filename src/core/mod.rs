pub mod config;
pub mod error;
pub mod state;
pub mod types;

pub use config::*;
pub use error::*;
pub use state::{DiskUsageGauge, EngineState, SchemaChangeCounter, SchemaChangeGuard, TabletClaim, TabletClaims};
pub use types::*;
