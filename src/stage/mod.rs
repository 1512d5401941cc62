//! The discovery pipeline stages.
//!
//! Each stage is a struct built from the run's [`DepthProfile`] that applies
//! one delta to the report data and returns a fully populated statistics
//! struct, even when it did no work. Failure handling follows one rule: an
//! adapter invocation that cannot run at all is a stage failure and bubbles
//! up as [`crate::errors::ToolFailure`]; a failure on one item inside a
//! stage is logged and absorbed.
//!
//! [`DepthProfile`]: crate::profile::DepthProfile

pub mod active;
pub mod authenticated;
pub mod deep;
pub mod enrichment;
pub mod passive;
pub mod port_discovery;

pub use active::ActiveStage;
pub use authenticated::AuthenticatedStage;
pub use deep::DeepStage;
pub use enrichment::EnrichmentStage;
pub use passive::PassiveStage;
pub use port_discovery::PortDiscoveryStage;
