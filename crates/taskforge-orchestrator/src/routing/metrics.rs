//! Model performance metrics and their stores.

use super::features::TaskType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// EMA weight on the previous value.
pub const EMA_OLD_WEIGHT: f64 = 0.9;
/// EMA weight on the new observation.
pub const EMA_NEW_WEIGHT: f64 = 0.1;

fn ema(old: f64, new: f64) -> f64 {
    old * EMA_OLD_WEIGHT + new * EMA_NEW_WEIGHT
}

/// Rolling performance numbers for one model path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelMetrics {
    /// EMA of per-task success (0 or 1 per observation).
    pub success_rate: f64,
    /// EMA of task latency in milliseconds.
    pub avg_latency: f64,
    /// EMA of reported accuracy.
    pub accuracy: f64,
    /// EMA of reported token efficiency.
    pub token_efficiency: f64,
    /// Outcome observations blended so far. Zero means the rolling fields
    /// still hold their neutral priors.
    pub observations: u64,
    pub usage_count: u64,
    pub last_used: Option<DateTime<Utc>>,
    /// Non-EMA extras, stored as-is.
    pub extra: HashMap<String, Value>,
}

impl Default for ModelMetrics {
    /// Neutral priors used for models with no history.
    fn default() -> Self {
        Self {
            success_rate: 0.5,
            avg_latency: 1000.0,
            accuracy: 0.5,
            token_efficiency: 0.5,
            observations: 0,
            usage_count: 0,
            last_used: None,
            extra: HashMap::new(),
        }
    }
}

/// One task's observed outcome, fed back into the store.
#[derive(Debug, Clone, Default)]
pub struct MetricsObservation {
    pub success_rate: Option<f64>,
    pub avg_latency: Option<f64>,
    pub accuracy: Option<f64>,
    pub token_efficiency: Option<f64>,
    /// With `success`, increments the per-task-type counters.
    pub task_type: Option<TaskType>,
    pub success: Option<bool>,
    pub extra: HashMap<String, Value>,
}

/// Per-task-type selection counters for one model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTypeStats {
    pub total: u64,
    pub successes: u64,
}

impl TaskTypeStats {
    /// Success fraction, when at least one outcome was recorded.
    pub fn success_rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.successes as f64 / self.total as f64)
    }
}

/// Durable home for model metrics and task-type history.
///
/// Implementations apply every mutation atomically under their own lock so
/// concurrent task completions cannot lose EMA updates.
pub trait MetricsStore: Send + Sync {
    /// Metrics for one model, if any observation has been recorded.
    fn model_metrics(&self, model: &str) -> Option<ModelMetrics>;

    /// Every model's metrics.
    fn all_metrics(&self) -> HashMap<String, ModelMetrics>;

    /// Applies one observation: EMA-blends the rolling fields and, when
    /// `task_type` and `success` are both present, bumps the task-type
    /// counters. A model's first observation initializes the rolling
    /// fields directly instead of blending with the neutral prior.
    fn apply_observation(&self, model: &str, observation: &MetricsObservation);

    /// Records that `model` was selected for a `task_type` (counts toward
    /// `total`, not `successes`).
    fn record_selection(&self, task_type: TaskType, model: &str);

    /// Bumps usage count and last-used timestamp for `model`.
    fn record_usage(&self, model: &str);

    /// Per-model counters for one task type.
    fn task_history(&self, task_type: TaskType) -> HashMap<String, TaskTypeStats>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    models: HashMap<String, ModelMetrics>,
    history: HashMap<TaskType, HashMap<String, TaskTypeStats>>,
}

impl StoreState {
    /// Usage bookkeeping creates entries too; a model only has scoring
    /// history once an outcome observation has been applied, so entries
    /// that are pure usage records stay invisible here.
    fn metrics_for(&self, model: &str) -> Option<ModelMetrics> {
        self.models.get(model).filter(|metrics| metrics.observations > 0).cloned()
    }

    fn apply_observation(&mut self, model: &str, observation: &MetricsObservation) {
        // Usage bookkeeping may have created the entry already, so the
        // warm-start is keyed on the observation count, not entry presence.
        let metrics = self.models.entry(model.to_string()).or_default();
        if metrics.observations == 0 {
            if let Some(v) = observation.success_rate {
                metrics.success_rate = v;
            }
            if let Some(v) = observation.avg_latency {
                metrics.avg_latency = v;
            }
            if let Some(v) = observation.accuracy {
                metrics.accuracy = v;
            }
            if let Some(v) = observation.token_efficiency {
                metrics.token_efficiency = v;
            }
        } else {
            if let Some(v) = observation.success_rate {
                metrics.success_rate = ema(metrics.success_rate, v);
            }
            if let Some(v) = observation.avg_latency {
                metrics.avg_latency = ema(metrics.avg_latency, v);
            }
            if let Some(v) = observation.accuracy {
                metrics.accuracy = ema(metrics.accuracy, v);
            }
            if let Some(v) = observation.token_efficiency {
                metrics.token_efficiency = ema(metrics.token_efficiency, v);
            }
        }
        metrics.observations += 1;
        metrics.extra.extend(observation.extra.clone());

        if let (Some(task_type), Some(success)) = (observation.task_type, observation.success) {
            let stats = self
                .history
                .entry(task_type)
                .or_default()
                .entry(model.to_string())
                .or_default();
            stats.total += 1;
            if success {
                stats.successes += 1;
            }
        }
    }

    fn record_selection(&mut self, task_type: TaskType, model: &str) {
        self.history
            .entry(task_type)
            .or_default()
            .entry(model.to_string())
            .or_default()
            .total += 1;
    }

    fn record_usage(&mut self, model: &str) {
        let metrics = self.models.entry(model.to_string()).or_default();
        metrics.usage_count += 1;
        metrics.last_used = Some(Utc::now());
    }
}

/// Process-local metrics store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryMetricsStore {
    state: Mutex<StoreState>,
}

impl MemoryMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsStore for MemoryMetricsStore {
    fn model_metrics(&self, model: &str) -> Option<ModelMetrics> {
        self.state.lock().unwrap().metrics_for(model)
    }

    fn all_metrics(&self) -> HashMap<String, ModelMetrics> {
        self.state.lock().unwrap().models.clone()
    }

    fn apply_observation(&self, model: &str, observation: &MetricsObservation) {
        self.state.lock().unwrap().apply_observation(model, observation);
    }

    fn record_selection(&self, task_type: TaskType, model: &str) {
        self.state.lock().unwrap().record_selection(task_type, model);
    }

    fn record_usage(&self, model: &str) {
        self.state.lock().unwrap().record_usage(model);
    }

    fn task_history(&self, task_type: TaskType) -> HashMap<String, TaskTypeStats> {
        self.state.lock().unwrap().history.get(&task_type).cloned().unwrap_or_default()
    }
}

/// JSON-file-backed metrics store.
///
/// Every mutation is persisted immediately; persistence failures are logged
/// and never surface to the caller.
#[derive(Debug)]
pub struct FileMetricsStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl FileMetricsStore {
    /// Opens the store, loading previous state if the file exists.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<StoreState>(&contents) {
                Ok(state) => {
                    info!(path = %path.display(), models = state.models.len(), "Loaded model metrics");
                    state
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not parse metrics file, starting fresh");
                    StoreState::default()
                }
            },
            Err(_) => StoreState::default(),
        };
        Self { path, state: Mutex::new(state) }
    }

    fn persist(&self, state: &StoreState) {
        match serde_json::to_string(state) {
            Ok(serialized) => {
                if let Err(e) = std::fs::write(&self.path, serialized) {
                    warn!(path = %self.path.display(), error = %e, "Failed to persist model metrics");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize model metrics"),
        }
    }
}

impl MetricsStore for FileMetricsStore {
    fn model_metrics(&self, model: &str) -> Option<ModelMetrics> {
        self.state.lock().unwrap().metrics_for(model)
    }

    fn all_metrics(&self) -> HashMap<String, ModelMetrics> {
        self.state.lock().unwrap().models.clone()
    }

    fn apply_observation(&self, model: &str, observation: &MetricsObservation) {
        let mut state = self.state.lock().unwrap();
        state.apply_observation(model, observation);
        self.persist(&state);
    }

    fn record_selection(&self, task_type: TaskType, model: &str) {
        let mut state = self.state.lock().unwrap();
        state.record_selection(task_type, model);
        self.persist(&state);
    }

    fn record_usage(&self, model: &str) {
        let mut state = self.state.lock().unwrap();
        state.record_usage(model);
        self.persist(&state);
    }

    fn task_history(&self, task_type: TaskType) -> HashMap<String, TaskTypeStats> {
        self.state.lock().unwrap().history.get(&task_type).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success_obs(rate: f64) -> MetricsObservation {
        MetricsObservation { success_rate: Some(rate), ..Default::default() }
    }

    #[test]
    fn test_first_observation_initializes_directly() {
        let store = MemoryMetricsStore::new();
        store.apply_observation("m1", &success_obs(1.0));
        let metrics = store.model_metrics("m1").unwrap();
        assert!((metrics.success_rate - 1.0).abs() < f64::EPSILON);
        // Unobserved fields keep their neutral priors.
        assert!((metrics.avg_latency - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_usage_before_first_observation_keeps_warm_start() {
        let store = MemoryMetricsStore::new();
        store.record_usage("m1");
        store.apply_observation("m1", &success_obs(0.0));
        let metrics = store.model_metrics("m1").unwrap();
        assert!((metrics.success_rate - 0.0).abs() < f64::EPSILON);
        assert_eq!(metrics.usage_count, 1);
    }

    #[test]
    fn test_usage_alone_is_invisible_to_scoring() {
        let store = MemoryMetricsStore::new();
        store.record_usage("m1");
        // The entry exists for bookkeeping but holds no scoring history.
        assert!(store.model_metrics("m1").is_none());
        assert_eq!(store.all_metrics()["m1"].usage_count, 1);

        store.apply_observation("m1", &success_obs(1.0));
        assert!(store.model_metrics("m1").is_some());
    }

    #[test]
    fn test_ema_blend_after_first_observation() {
        let store = MemoryMetricsStore::new();
        store.apply_observation("m1", &success_obs(0.5));
        store.apply_observation("m1", &success_obs(1.0));
        let metrics = store.model_metrics("m1").unwrap();
        assert!((metrics.success_rate - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_ten_successes_drive_ema_above_threshold() {
        let store = MemoryMetricsStore::new();
        for _ in 0..10 {
            store.apply_observation("m1", &success_obs(1.0));
        }
        assert!(store.model_metrics("m1").unwrap().success_rate > 0.85);
    }

    #[test]
    fn test_task_history_counters() {
        let store = MemoryMetricsStore::new();
        store.record_selection(TaskType::Coding, "m1");
        store.apply_observation(
            "m1",
            &MetricsObservation {
                success_rate: Some(1.0),
                task_type: Some(TaskType::Coding),
                success: Some(true),
                ..Default::default()
            },
        );
        let history = store.task_history(TaskType::Coding);
        let stats = history["m1"];
        assert_eq!(stats.total, 2);
        assert_eq!(stats.successes, 1);
        assert!(store.task_history(TaskType::Translation).is_empty());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");

        {
            let store = FileMetricsStore::open(&path);
            store.apply_observation("m1", &success_obs(1.0));
            store.record_usage("m1");
        }

        let reopened = FileMetricsStore::open(&path);
        let metrics = reopened.model_metrics("m1").unwrap();
        assert!((metrics.success_rate - 1.0).abs() < f64::EPSILON);
        assert_eq!(metrics.usage_count, 1);
        assert!(metrics.last_used.is_some());
    }

    #[test]
    fn test_unknown_model_has_no_metrics() {
        let store = MemoryMetricsStore::new();
        assert!(store.model_metrics("nope").is_none());
    }
}
