//! Plaudit node: the endorsement service and everything that runs it.
//!
//! - [`EndorsementService`]: validated, time-bounded operations
//! - [`NodeConfig`]: TOML-backed configuration
//! - [`PlauditNode`]: storage wiring and housekeeping tasks
//! - logging, metrics and graceful shutdown

pub mod config;
pub mod error;
pub mod housekeeping;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod service;
pub mod shutdown;

pub use config::NodeConfig;
pub use error::{NodeError, ServiceError};
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::PlauditNode;
pub use service::{
    AuthRedirect, AuthSession, EndorseReceipt, EndorseRequest, EndorsementService, ServiceOptions,
};
pub use shutdown::ShutdownController;
