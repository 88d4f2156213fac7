//! Additive scoring over catalog entries.
//!
//! Scoring is a pure function of (features, entry, stored metrics, load);
//! there is no randomness anywhere in selection, so the same inputs always
//! produce the same ranking.

use super::catalog::CatalogEntry;
use super::features::{Complexity, ReasoningType, ResponseLength, TaskFeatures};
use super::metrics::ModelMetrics;
use taskforge_abstraction::{AgentType, LlmBackendType, ModelCapabilities};

fn reasoning_capability(capabilities: &ModelCapabilities, reasoning: ReasoningType) -> bool {
    match reasoning {
        ReasoningType::Causal => capabilities.causal_reasoning,
        ReasoningType::Comparative => capabilities.comparative_reasoning,
        ReasoningType::Procedural => capabilities.procedural_reasoning,
        ReasoningType::Predictive => capabilities.predictive_reasoning,
        ReasoningType::Ethical => capabilities.ethical_reasoning,
        ReasoningType::Creative => capabilities.creative_reasoning,
        ReasoningType::Logical => capabilities.logical_reasoning,
    }
}

fn is_parallel_heavy(entry: &CatalogEntry) -> bool {
    entry.config.backend == LlmBackendType::Vllm && entry.config.tensor_parallel_size > 1
}

/// Scores one catalog entry against the task features.
///
/// `metrics` is `None` for models with no recorded history; they simply
/// receive no historical contribution rather than an error. `task_bias` is
/// this model's success fraction on the task's type, when history exists.
pub(crate) fn score_entry(
    entry: &CatalogEntry,
    features: &TaskFeatures,
    metrics: Option<&ModelMetrics>,
    task_bias: Option<f64>,
    system_load: f64,
) -> f64 {
    let mut score = 0.0;
    let capabilities = &entry.config.capabilities;

    match features.complexity {
        Complexity::High if capabilities.handles_complex_tasks => score += 30.0,
        Complexity::Medium if capabilities.handles_medium_tasks => score += 20.0,
        Complexity::Low => score += 10.0,
        _ => {}
    }

    if features.agent_type == AgentType::MultiAgent && capabilities.multi_agent_coordination {
        score += 15.0;
    }
    if features.agent_type == AgentType::HumanInLoop && capabilities.human_interaction {
        score += 15.0;
    }

    for reasoning in &features.reasoning_types {
        if reasoning_capability(capabilities, *reasoning) {
            score += 10.0;
        }
    }

    match features.expected_response_length {
        ResponseLength::Long if capabilities.handles_long_generation => score += 15.0,
        ResponseLength::Short if capabilities.efficient_short_responses => score += 10.0,
        _ => {}
    }

    if let Some(metrics) = metrics {
        score += metrics.success_rate * 20.0;
        score += (1.0 - metrics.avg_latency / 5000.0).max(0.0) * 15.0;
        score += metrics.accuracy * 25.0;
        score += metrics.token_efficiency * 10.0;

        if features.has_real_time_constraint && metrics.avg_latency > 3000.0 {
            score -= 30.0;
        }
    }

    score += entry.config.resource_efficiency * 10.0;

    if entry.config.quantization.is_some() && features.complexity != Complexity::High {
        score += 5.0;
    }
    if is_parallel_heavy(entry) {
        score += 5.0;
    }

    if let Some(bias) = task_bias {
        score += bias * 25.0;
    }

    // Resource pressure: under heavy load favor efficient models and
    // penalize parallel-heavy ones.
    if system_load > 0.8 {
        score += entry.config.resource_efficiency * 20.0;
        if is_parallel_heavy(entry) {
            score -= 15.0;
        }
    }

    if features.has_real_time_constraint {
        if let Some(metrics) = metrics {
            if metrics.avg_latency < 500.0 {
                score += 25.0;
            } else if metrics.avg_latency < 1000.0 {
                score += 15.0;
            }
        }
    }

    score
}

/// Adjusts the sampling temperature for the selected model.
pub(crate) fn adjust_temperature(base: f64, features: &TaskFeatures) -> f64 {
    let mut temperature = base;
    if features.reasoning_types.contains(&ReasoningType::Logical) {
        temperature -= 0.1;
    }
    if features.reasoning_types.contains(&ReasoningType::Creative) {
        temperature += 0.2;
    }
    if features.complexity == Complexity::High {
        temperature -= 0.1;
    }
    temperature.clamp(0.1, 1.0)
}

/// Human-readable explanation of a selection.
pub(crate) fn selection_reason(
    entry: &CatalogEntry,
    score: f64,
    features: &TaskFeatures,
    metrics: Option<&ModelMetrics>,
) -> String {
    let mut parts = vec![
        format!("Selected {} based on task complexity ({})", entry.name, features.complexity),
        format!("task type ({})", features.task_type),
    ];

    if !features.reasoning_types.is_empty() {
        let reasoning: Vec<String> =
            features.reasoning_types.iter().map(ToString::to_string).collect();
        parts.push(format!("required reasoning ({})", reasoning.join(", ")));
    }

    if let Some(metrics) = metrics {
        parts.push(format!(
            "historical performance (success rate: {:.2})",
            metrics.success_rate
        ));
    }

    parts.push(format!("overall score: {score:.2}"));
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::features::TaskType;
    use taskforge_abstraction::LlmConfig;

    fn entry(name: &str) -> CatalogEntry {
        CatalogEntry { name: name.to_string(), config: LlmConfig::new(LlmBackendType::Mock, name) }
    }

    fn low_features() -> TaskFeatures {
        TaskFeatures {
            task_type: TaskType::General,
            complexity: Complexity::Low,
            query_length: 10,
            tools_count: 0,
            context_size: 0,
            agent_type: AgentType::React,
            reasoning_types: vec![ReasoningType::Logical],
            expected_response_length: ResponseLength::Medium,
            has_real_time_constraint: false,
        }
    }

    #[test]
    fn test_low_complexity_base_score() {
        // +10 complexity, +0.5*10 resource efficiency.
        let score = score_entry(&entry("m"), &low_features(), None, None, 0.5);
        assert!((score - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_capability_flags_add_up() {
        let mut e = entry("m");
        e.config.capabilities.logical_reasoning = true;
        e.config.capabilities.multi_agent_coordination = true;
        let mut features = low_features();
        features.agent_type = AgentType::MultiAgent;

        let score = score_entry(&e, &features, None, None, 0.5);
        // +10 complexity, +15 multi-agent, +10 reasoning, +5 resource.
        assert!((score - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_historical_metrics_contribution() {
        let metrics = ModelMetrics {
            success_rate: 1.0,
            avg_latency: 0.0,
            accuracy: 1.0,
            token_efficiency: 1.0,
            ..Default::default()
        };
        let base = score_entry(&entry("m"), &low_features(), None, None, 0.5);
        let with_history = score_entry(&entry("m"), &low_features(), Some(&metrics), None, 0.5);
        // 20 + 15 + 25 + 10 on top of the base.
        assert!((with_history - base - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_real_time_latency_penalty_and_boost() {
        let mut features = low_features();
        features.has_real_time_constraint = true;

        let slow = ModelMetrics { avg_latency: 4000.0, ..Default::default() };
        let fast = ModelMetrics { avg_latency: 300.0, ..Default::default() };

        let slow_score = score_entry(&entry("m"), &features, Some(&slow), None, 0.5);
        let fast_score = score_entry(&entry("m"), &features, Some(&fast), None, 0.5);
        assert!(fast_score > slow_score);
    }

    #[test]
    fn test_load_pressure_penalizes_parallel_models() {
        let mut heavy = entry("heavy");
        heavy.config.backend = LlmBackendType::Vllm;
        heavy.config.tensor_parallel_size = 4;
        heavy.config.resource_efficiency = 0.2;

        let mut light = entry("light");
        light.config.resource_efficiency = 0.9;

        let features = low_features();
        let heavy_low = score_entry(&heavy, &features, None, None, 0.5);
        let heavy_high = score_entry(&heavy, &features, None, None, 0.9);
        // Under load the parallel model loses its edge.
        assert!(heavy_high - heavy_low < light_load_delta(&light, &features));
    }

    fn light_load_delta(entry: &CatalogEntry, features: &TaskFeatures) -> f64 {
        score_entry(entry, features, None, None, 0.9)
            - score_entry(entry, features, None, None, 0.5)
    }

    #[test]
    fn test_temperature_adjustment_clamped() {
        let mut features = low_features();
        assert!((adjust_temperature(0.7, &features) - 0.6).abs() < 1e-9);

        features.reasoning_types = vec![ReasoningType::Creative];
        assert!((adjust_temperature(0.9, &features) - 1.0).abs() < 1e-9);

        features.reasoning_types = vec![ReasoningType::Logical];
        features.complexity = Complexity::High;
        assert!((adjust_temperature(0.15, &features) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_reason_mentions_score() {
        let reason = selection_reason(&entry("m"), 42.5, &low_features(), None);
        assert!(reason.contains("Selected m"));
        assert!(reason.contains("overall score: 42.50"));
        assert!(reason.contains("task type (general)"));
    }
}
