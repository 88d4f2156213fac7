//! Task orchestration: model routing and the agent execution core.
//!
//! The router scores a model catalog against extracted task features and
//! learns from execution feedback; the agent core runs one task end to end
//! with plan-time model fallback, delegating multi-agent plans to the
//! workflow engine in `taskforge-core`.

pub mod agent;
pub mod backend;
pub mod routing;

pub use agent::{AgentCore, AgentError, TaskPhase};
pub use backend::{MockBackend, MockBackendProvider};
pub use routing::{
    Catalog, CatalogEntry, CatalogError, Complexity, FileMetricsStore, FixedLoad, LoadProbe,
    MemoryMetricsStore, MetricsObservation, MetricsStore, ModelMetrics, ModelRouter,
    ReasoningType, ResponseLength, RoutingError, TaskFeatures, TaskType, TaskTypeStats,
};
