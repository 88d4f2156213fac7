//! Pure task-feature extraction for model selection.
//!
//! Everything here is a function of the task and context only. The same
//! classification is used by the router's scoring pass and by the agent
//! core's metrics bucketing, so the two can never drift apart.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use taskforge_abstraction::{AgentType, Task};

/// Coarse task category derived from the query and allowed tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Summarization,
    Translation,
    Coding,
    InformationRetrieval,
    CreativeWriting,
    DataAnalysis,
    Calculation,
    DatabaseQuery,
    General,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Summarization => "summarization",
            Self::Translation => "translation",
            Self::Coding => "coding",
            Self::InformationRetrieval => "information_retrieval",
            Self::CreativeWriting => "creative_writing",
            Self::DataAnalysis => "data_analysis",
            Self::Calculation => "calculation",
            Self::DatabaseQuery => "database_query",
            Self::General => "general",
        };
        f.write_str(s)
    }
}

/// Estimated task complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

/// Expected response length bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseLength {
    Short,
    Medium,
    Long,
}

/// Reasoning style the query calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningType {
    Causal,
    Comparative,
    Procedural,
    Predictive,
    Ethical,
    Creative,
    Logical,
}

impl fmt::Display for ReasoningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Causal => "causal",
            Self::Comparative => "comparative",
            Self::Procedural => "procedural",
            Self::Predictive => "predictive",
            Self::Ethical => "ethical",
            Self::Creative => "creative",
            Self::Logical => "logical",
        };
        f.write_str(s)
    }
}

/// Features the scoring pass consumes.
#[derive(Debug, Clone)]
pub struct TaskFeatures {
    pub task_type: TaskType,
    pub complexity: Complexity,
    pub query_length: usize,
    pub tools_count: usize,
    pub context_size: usize,
    pub agent_type: AgentType,
    pub reasoning_types: Vec<ReasoningType>,
    pub expected_response_length: ResponseLength,
    pub has_real_time_constraint: bool,
}

impl TaskFeatures {
    /// Extracts features from a task and its context. Pure.
    pub fn extract(task: &Task, context: &HashMap<String, Value>) -> Self {
        let query_length = task.query.len();
        let tools_count = task.tools_allowed.len();
        let context_size = if context.is_empty() {
            0
        } else {
            serde_json::to_string(context).map(|s| s.len()).unwrap_or(0)
        };

        let complexity = if query_length > 500 || tools_count > 5 || context_size > 10_000 {
            Complexity::High
        } else if query_length > 200 || tools_count > 2 || context_size > 3_000 {
            Complexity::Medium
        } else {
            Complexity::Low
        };

        let query_lower = task.query.to_lowercase();
        let has_real_time_constraint =
            query_lower.contains("urgent") || query_lower.contains("immediate");

        Self {
            task_type: classify_task(&task.query, &task.tools_allowed),
            complexity,
            query_length,
            tools_count,
            context_size,
            agent_type: task.agent_type,
            reasoning_types: detect_reasoning_types(&task.query),
            expected_response_length: estimate_response_length(&task.query),
            has_real_time_constraint,
        }
    }
}

/// Classifies a task by keyword heuristics over the query, falling back to
/// the allowed tool names as a secondary signal.
pub fn classify_task(query: &str, tools_allowed: &[String]) -> TaskType {
    let query_lower = query.to_lowercase();

    if query_lower.contains("summarize") || query_lower.contains("summary") {
        return TaskType::Summarization;
    }
    if query_lower.contains("translate") {
        return TaskType::Translation;
    }
    if query_lower.contains("code")
        || query_lower.contains("function")
        || query_lower.contains("programming")
    {
        return TaskType::Coding;
    }
    if query_lower.contains("search") || query_lower.contains("find information") {
        return TaskType::InformationRetrieval;
    }
    if query_lower.contains("creative")
        || query_lower.contains("write a story")
        || query_lower.contains("poem")
    {
        return TaskType::CreativeWriting;
    }
    if query_lower.contains("analyze") || query_lower.contains("data") {
        return TaskType::DataAnalysis;
    }

    if tools_allowed.iter().any(|t| t == "search") {
        return TaskType::InformationRetrieval;
    }
    if tools_allowed.iter().any(|t| t == "calculator") {
        return TaskType::Calculation;
    }
    if tools_allowed.iter().any(|t| t == "sql") {
        return TaskType::DatabaseQuery;
    }

    TaskType::General
}

/// Detects the reasoning styles a query calls for, defaulting to logical
/// when no trigger matches.
pub fn detect_reasoning_types(query: &str) -> Vec<ReasoningType> {
    let query_lower = query.to_lowercase();
    let mut types = Vec::new();

    if query_lower.contains("why")
        || query_lower.contains("explain")
        || query_lower.contains("reason")
    {
        types.push(ReasoningType::Causal);
    }
    if query_lower.contains("compare") || query_lower.contains("difference between") {
        types.push(ReasoningType::Comparative);
    }
    if query_lower.contains("step by step") || query_lower.contains("how to") {
        types.push(ReasoningType::Procedural);
    }
    if query_lower.contains("predict")
        || query_lower.contains("forecast")
        || query_lower.contains("future")
    {
        types.push(ReasoningType::Predictive);
    }
    if query_lower.contains("ethics")
        || query_lower.contains("moral")
        || query_lower.contains("should")
    {
        types.push(ReasoningType::Ethical);
    }
    if query_lower.contains("creative")
        || query_lower.contains("imagine")
        || query_lower.contains("generate")
    {
        types.push(ReasoningType::Creative);
    }

    if types.is_empty() {
        types.push(ReasoningType::Logical);
    }
    types
}

fn estimate_response_length(query: &str) -> ResponseLength {
    let query_lower = query.to_lowercase();
    let word_count = query.split_whitespace().count();

    if query_lower.contains("brief") || query_lower.contains("short") || word_count < 10 {
        ResponseLength::Short
    } else if query_lower.contains("detailed")
        || query_lower.contains("comprehensive")
        || word_count > 30
    {
        ResponseLength::Long
    } else {
        ResponseLength::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_query_keywords() {
        assert_eq!(classify_task("Summarize this article", &[]), TaskType::Summarization);
        assert_eq!(classify_task("translate to French", &[]), TaskType::Translation);
        assert_eq!(classify_task("write a function that sorts", &[]), TaskType::Coding);
        assert_eq!(classify_task("search for papers", &[]), TaskType::InformationRetrieval);
        assert_eq!(classify_task("write a story about rust", &[]), TaskType::CreativeWriting);
        assert_eq!(classify_task("analyze the results", &[]), TaskType::DataAnalysis);
        assert_eq!(classify_task("hello there", &[]), TaskType::General);
    }

    #[test]
    fn test_classify_by_tools_fallback() {
        let calc = vec!["calculator".to_string()];
        assert_eq!(classify_task("what is 2+2", &calc), TaskType::Calculation);
        let sql = vec!["sql".to_string()];
        assert_eq!(classify_task("how many rows", &sql), TaskType::DatabaseQuery);
        // Query keywords win over tools.
        assert_eq!(classify_task("summarize the table", &sql), TaskType::Summarization);
    }

    #[test]
    fn test_reasoning_detection_defaults_to_logical() {
        assert_eq!(detect_reasoning_types("do the thing"), vec![ReasoningType::Logical]);
        let types = detect_reasoning_types("explain step by step why this happens");
        assert!(types.contains(&ReasoningType::Causal));
        assert!(types.contains(&ReasoningType::Procedural));
        assert!(!types.contains(&ReasoningType::Logical));
    }

    #[test]
    fn test_complexity_thresholds() {
        let task = Task::new("short");
        let features = TaskFeatures::extract(&task, &HashMap::new());
        assert_eq!(features.complexity, Complexity::Low);

        let task = Task::new("x".repeat(250));
        let features = TaskFeatures::extract(&task, &HashMap::new());
        assert_eq!(features.complexity, Complexity::Medium);

        let task = Task::new("x".repeat(600));
        let features = TaskFeatures::extract(&task, &HashMap::new());
        assert_eq!(features.complexity, Complexity::High);

        let task = Task::new("short").with_tools(
            (0..6).map(|i| format!("tool{i}")).collect(),
        );
        let features = TaskFeatures::extract(&task, &HashMap::new());
        assert_eq!(features.complexity, Complexity::High);
    }

    #[test]
    fn test_response_length_and_urgency() {
        let task = Task::new("brief answer please");
        let features = TaskFeatures::extract(&task, &HashMap::new());
        assert_eq!(features.expected_response_length, ResponseLength::Short);
        assert!(!features.has_real_time_constraint);

        let task = Task::new(
            "I need an urgent and detailed report on the incident covering every \
             affected subsystem and the remediation steps taken so far today",
        );
        let features = TaskFeatures::extract(&task, &HashMap::new());
        assert_eq!(features.expected_response_length, ResponseLength::Long);
        assert!(features.has_real_time_constraint);
    }
}
