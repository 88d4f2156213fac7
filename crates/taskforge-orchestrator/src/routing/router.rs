//! Model selection and metrics feedback.

use super::catalog::{Catalog, CatalogEntry};
use super::features::{TaskFeatures, TaskType};
use super::metrics::{MetricsObservation, MetricsStore, ModelMetrics, TaskTypeStats};
use super::scoring::{adjust_temperature, score_entry, selection_reason};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use taskforge_abstraction::{LlmConfig, Task};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised during model selection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// The catalog holds no models.
    #[error("No models available for routing")]
    ModelUnavailable,
}

/// Source of the current system load in [0, 1].
///
/// Injected so scoring stays a pure function of its inputs; the default
/// probe reports a constant.
pub trait LoadProbe: Send + Sync {
    fn system_load(&self) -> f64;
}

/// Load probe reporting a fixed value.
#[derive(Debug, Clone, Copy)]
pub struct FixedLoad(pub f64);

impl LoadProbe for FixedLoad {
    fn system_load(&self) -> f64 {
        self.0
    }
}

/// Selects the best catalog model for each task and learns from outcomes.
///
/// Selection is deterministic: the highest additive score wins, and ties
/// break toward the earlier catalog entry.
pub struct ModelRouter {
    catalog: RwLock<Catalog>,
    store: Arc<dyn MetricsStore>,
    load_probe: Arc<dyn LoadProbe>,
    last_evaluation: Mutex<DateTime<Utc>>,
}

impl ModelRouter {
    pub fn new(catalog: Catalog, store: Arc<dyn MetricsStore>) -> Self {
        Self {
            catalog: RwLock::new(catalog),
            store,
            load_probe: Arc::new(FixedLoad(0.5)),
            last_evaluation: Mutex::new(Utc::now()),
        }
    }

    /// Replaces the load probe.
    #[must_use]
    pub fn with_load_probe(mut self, probe: Arc<dyn LoadProbe>) -> Self {
        self.load_probe = probe;
        self
    }

    /// Scores every catalog entry against the task and returns the winning
    /// configuration plus a human-readable reason.
    ///
    /// Side effects: bumps the winner's usage stats and its selection
    /// counter for the task's type.
    ///
    /// # Errors
    /// `RoutingError::ModelUnavailable` when the catalog is empty.
    pub fn select_model(
        &self,
        task: &Task,
        context: &HashMap<String, Value>,
    ) -> Result<(LlmConfig, String), RoutingError> {
        let features = TaskFeatures::extract(task, context);
        let catalog = self.catalog.read().unwrap();
        if catalog.is_empty() {
            return Err(RoutingError::ModelUnavailable);
        }

        let history = self.store.task_history(features.task_type);
        let system_load = self.load_probe.system_load();

        let mut best: Option<(&CatalogEntry, f64, Option<ModelMetrics>)> = None;
        for entry in &catalog.entries {
            let metrics = self.store.model_metrics(&entry.config.model_path);
            let task_bias = history
                .get(&entry.config.model_path)
                .and_then(TaskTypeStats::success_rate);
            let score =
                score_entry(entry, &features, metrics.as_ref(), task_bias, system_load);
            debug!(model = %entry.name, score, "Scored catalog entry");

            // Strict comparison keeps the earliest entry on ties.
            if best.as_ref().map_or(true, |(_, top, _)| score > *top) {
                best = Some((entry, score, metrics));
            }
        }

        // The catalog is non-empty, so a winner always exists.
        let Some((winner, score, metrics)) = best else {
            return Err(RoutingError::ModelUnavailable);
        };

        self.store.record_selection(features.task_type, &winner.config.model_path);
        self.store.record_usage(&winner.config.model_path);

        let mut config = winner.config.clone();
        config.temperature = adjust_temperature(config.temperature, &features);

        let reason = selection_reason(winner, score, &features, metrics.as_ref());
        info!(model = %winner.name, score = format!("{score:.2}"), "Model router selected");
        Ok((config, reason))
    }

    /// Feeds one task's observed outcome back into the metrics store.
    pub fn update_model_metrics(&self, model_path: &str, observation: &MetricsObservation) {
        self.store.apply_observation(model_path, observation);
        info!(model = %model_path, "Updated model metrics");
    }

    /// Metrics recorded for one model, if any.
    pub fn model_metrics(&self, model_path: &str) -> Option<ModelMetrics> {
        self.store.model_metrics(model_path)
    }

    /// Per-model counters for one task type.
    pub fn task_metrics(&self, task_type: TaskType) -> HashMap<String, TaskTypeStats> {
        self.store.task_history(task_type)
    }

    /// Fallback chain for plan-generation failures: every catalog entry
    /// with `resource_efficiency > 0.8`, forced to minimal parallelism, in
    /// catalog order.
    pub fn fallback_configs(&self) -> Vec<LlmConfig> {
        self.catalog
            .read()
            .unwrap()
            .entries
            .iter()
            .filter(|entry| entry.config.resource_efficiency > 0.8)
            .map(|entry| {
                let mut config = entry.config.clone();
                config.tensor_parallel_size = 1;
                config
            })
            .collect()
    }

    /// Periodic maintenance pass, rate-limited to once per 24 hours.
    ///
    /// Any model whose success-rate EMA has fallen below 0.3 gets its
    /// catalog temperature reset to 0.5. A heuristic nudge, not retraining.
    pub fn evaluate_models(&self) {
        {
            let mut last = self.last_evaluation.lock().unwrap();
            if Utc::now() - *last < Duration::hours(24) {
                return;
            }
            *last = Utc::now();
        }

        info!("Conducting periodic model evaluation");
        let underperforming: Vec<String> = self
            .store
            .all_metrics()
            .into_iter()
            .filter(|(_, metrics)| metrics.success_rate < 0.3)
            .map(|(model, _)| model)
            .collect();

        if underperforming.is_empty() {
            return;
        }

        let mut catalog = self.catalog.write().unwrap();
        for entry in &mut catalog.entries {
            if underperforming.contains(&entry.config.model_path) {
                entry.config.temperature = 0.5;
                info!(model = %entry.name, "Reset temperature for underperforming model");
            }
        }
    }

    #[cfg(test)]
    fn backdate_last_evaluation(&self, by: Duration) {
        *self.last_evaluation.lock().unwrap() = Utc::now() - by;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::metrics::MemoryMetricsStore;
    use taskforge_abstraction::{AgentType, LlmBackendType};

    fn entry(name: &str) -> CatalogEntry {
        CatalogEntry { name: name.to_string(), config: LlmConfig::new(LlmBackendType::Mock, name) }
    }

    fn router_with(entries: Vec<CatalogEntry>) -> (ModelRouter, Arc<MemoryMetricsStore>) {
        let store = Arc::new(MemoryMetricsStore::new());
        (ModelRouter::new(Catalog::new(entries), store.clone()), store)
    }

    fn success_obs(rate: f64) -> MetricsObservation {
        MetricsObservation { success_rate: Some(rate), ..Default::default() }
    }

    #[test]
    fn test_empty_catalog_is_unavailable() {
        let (router, _) = router_with(Vec::new());
        let err = router.select_model(&Task::new("q"), &HashMap::new()).unwrap_err();
        assert_eq!(err, RoutingError::ModelUnavailable);
    }

    #[test]
    fn test_higher_success_ema_wins() {
        let (router, store) = router_with(vec![entry("model-x"), entry("model-y")]);
        store.apply_observation("model-x", &success_obs(0.9));
        store.apply_observation("model-y", &success_obs(0.2));

        for _ in 0..5 {
            let (config, _) = router.select_model(&Task::new("q"), &HashMap::new()).unwrap();
            assert_eq!(config.model_path, "model-x");
        }
    }

    #[test]
    fn test_ties_break_toward_catalog_order() {
        let (router, _) = router_with(vec![entry("first"), entry("second")]);
        let (config, _) = router.select_model(&Task::new("q"), &HashMap::new()).unwrap();
        assert_eq!(config.model_path, "first");
    }

    #[test]
    fn test_single_weak_entry_still_selected_with_reason() {
        let mut weak = entry("tiny");
        weak.config.resource_efficiency = 0.95;
        let (router, _) = router_with(vec![weak]);

        // Query long enough to classify as high complexity.
        let task = Task::new("x".repeat(600));
        let (config, reason) = router.select_model(&task, &HashMap::new()).unwrap();
        assert_eq!(config.model_path, "tiny");
        assert!(reason.contains("overall score:"));
        assert!(reason.contains("complexity (high)"));
    }

    #[test]
    fn test_task_history_biases_selection() {
        let (router, store) = router_with(vec![entry("generalist"), entry("specialist")]);
        // Equal rolling metrics for both; only task-type history differs.
        store.apply_observation("generalist", &success_obs(0.5));
        store.apply_observation("specialist", &success_obs(0.5));
        for _ in 0..4 {
            store.apply_observation(
                "specialist",
                &MetricsObservation {
                    task_type: Some(TaskType::Coding),
                    success: Some(true),
                    ..Default::default()
                },
            );
        }

        let task = Task::new("write a function to parse dates");
        let (config, _) = router.select_model(&task, &HashMap::new()).unwrap();
        assert_eq!(config.model_path, "specialist");

        // Without matching history, catalog order wins again.
        let other = Task::new("hello");
        let (config, _) = router.select_model(&other, &HashMap::new()).unwrap();
        assert_eq!(config.model_path, "generalist");
    }

    #[test]
    fn test_selection_records_usage_and_history() {
        let (router, store) = router_with(vec![entry("m")]);
        router.select_model(&Task::new("summarize this"), &HashMap::new()).unwrap();

        assert_eq!(store.all_metrics()["m"].usage_count, 1);
        assert_eq!(store.task_history(TaskType::Summarization)["m"].total, 1);
        // Selection alone creates no scoring history.
        assert!(store.model_metrics("m").is_none());
    }

    #[test]
    fn test_prior_selection_does_not_outweigh_capabilities() {
        let mut coordinator = entry("coordinator");
        coordinator.config.capabilities.multi_agent_coordination = true;
        let (router, _) = router_with(vec![entry("plain"), coordinator]);

        // Warm up the tie-break winner's usage stats.
        let (config, _) = router.select_model(&Task::new("plain request"), &HashMap::new()).unwrap();
        assert_eq!(config.model_path, "plain");

        // Capability fit still wins: the usage entry must not feed neutral
        // priors into scoring as if they were observed history.
        let task = Task::new("coordinate the plan").with_agent_type(AgentType::MultiAgent);
        let (config, _) = router.select_model(&task, &HashMap::new()).unwrap();
        assert_eq!(config.model_path, "coordinator");
    }

    #[test]
    fn test_temperature_adjusted_for_reasoning() {
        let (router, _) = router_with(vec![entry("m")]);

        // No reasoning keywords: logical default lowers 0.7 to 0.6.
        let (config, _) =
            router.select_model(&Task::new("plain request here"), &HashMap::new()).unwrap();
        assert!((config.temperature - 0.6).abs() < 1e-9);

        // Creative raises it.
        let (config, _) = router
            .select_model(&Task::new("write a creative poem about autumn"), &HashMap::new())
            .unwrap();
        assert!((config.temperature - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_multi_agent_flag_beats_plain_entry() {
        let mut coordinator = entry("coordinator");
        coordinator.config.capabilities.multi_agent_coordination = true;
        let (router, _) = router_with(vec![entry("plain"), coordinator]);

        let task = Task::new("coordinate the plan").with_agent_type(AgentType::MultiAgent);
        let (config, _) = router.select_model(&task, &HashMap::new()).unwrap();
        assert_eq!(config.model_path, "coordinator");
    }

    #[test]
    fn test_evaluate_models_resets_underperformer_temperature() {
        let (router, store) = router_with(vec![entry("bad")]);
        store.apply_observation("bad", &success_obs(0.0));
        store.apply_observation("bad", &success_obs(0.0));

        // Inside the 24h window nothing happens.
        router.evaluate_models();
        assert!((router.catalog.read().unwrap().entries[0].config.temperature - 0.7).abs() < 1e-9);

        router.backdate_last_evaluation(Duration::days(2));
        router.evaluate_models();
        assert!((router.catalog.read().unwrap().entries[0].config.temperature - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_configs_filter_and_force_serial() {
        let mut efficient = entry("efficient");
        efficient.config.resource_efficiency = 0.9;
        efficient.config.tensor_parallel_size = 4;
        let mut heavy = entry("heavy");
        heavy.config.resource_efficiency = 0.3;
        let (router, _) = router_with(vec![heavy, efficient]);

        let fallbacks = router.fallback_configs();
        assert_eq!(fallbacks.len(), 1);
        assert_eq!(fallbacks[0].model_path, "efficient");
        assert_eq!(fallbacks[0].tensor_parallel_size, 1);
    }

    #[test]
    fn test_update_model_metrics_feeds_store() {
        let (router, store) = router_with(vec![entry("m")]);
        router.update_model_metrics("m", &success_obs(1.0));
        assert!((store.model_metrics("m").unwrap().success_rate - 1.0).abs() < f64::EPSILON);
    }
}
