//! Model routing: feature extraction, scoring, catalog, and metrics.

mod catalog;
mod features;
mod metrics;
mod router;
mod scoring;

pub use catalog::{Catalog, CatalogEntry, CatalogError};
pub use features::{
    classify_task, detect_reasoning_types, Complexity, ReasoningType, ResponseLength,
    TaskFeatures, TaskType,
};
pub use metrics::{
    FileMetricsStore, MemoryMetricsStore, MetricsObservation, MetricsStore, ModelMetrics,
    TaskTypeStats, EMA_NEW_WEIGHT, EMA_OLD_WEIGHT,
};
pub use router::{FixedLoad, LoadProbe, ModelRouter, RoutingError};
