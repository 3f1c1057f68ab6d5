//! Recommendation rule table
//!
//! Rules are evaluated in order against the metric name; the first match
//! builds the recommendation body.

use crate::models::Impact;

/// Recommendation content produced by a rule, before identity is assigned
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationTemplate {
    pub title: String,
    pub description: String,
    pub details: String,
    pub impact: Impact,
    pub category: String,
    pub confidence: f64,
    pub estimated_improvement: String,
    pub current_config: String,
    pub suggested_config: String,
}

/// A `(predicate, builder)` pair keyed by a stable rule name
#[derive(Clone, Copy)]
pub struct RecommendationRule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub build: fn(f64) -> RecommendationTemplate,
}

impl std::fmt::Debug for RecommendationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationRule")
            .field("name", &self.name)
            .finish()
    }
}

/// Built-in rules, in evaluation order
pub fn default_rules() -> Vec<RecommendationRule> {
    vec![
        RecommendationRule {
            name: "micro_caching",
            matches: is_latency_metric,
            build: micro_caching,
        },
        RecommendationRule {
            name: "worker_connections",
            matches: is_cpu_metric,
            build: worker_connections,
        },
    ]
}

fn is_latency_metric(metric_name: &str) -> bool {
    metric_name.contains("request_time") || metric_name.contains("latency")
}

fn is_cpu_metric(metric_name: &str) -> bool {
    metric_name.contains("cpu")
}

fn micro_caching(value: f64) -> RecommendationTemplate {
    RecommendationTemplate {
        title: "Enable Micro-Caching".to_string(),
        description: format!(
            "High latency detected ({}ms). Enable micro-caching to reduce upstream load.",
            value
        ),
        details: format!(
            "Latency spike of {}ms observed. Micro-caching for 1s can significantly reduce backend pressure without affecting freshness.",
            value
        ),
        impact: Impact::High,
        category: "Performance".to_string(),
        confidence: 0.89,
        estimated_improvement: "-40% latency".to_string(),
        current_config: "proxy_cache off;".to_string(),
        suggested_config: "proxy_cache_valid 200 1s;".to_string(),
    }
}

fn worker_connections(value: f64) -> RecommendationTemplate {
    RecommendationTemplate {
        title: "Optimize Worker Connections".to_string(),
        description: format!(
            "High CPU usage detected ({}). Tune worker_connections to handle concurrency better.",
            value
        ),
        details: format!(
            "CPU saturation at {} indicates thread contention. Increase worker_connections provided enough file descriptors are available.",
            value
        ),
        impact: Impact::Medium,
        category: "Performance".to_string(),
        confidence: 0.75,
        estimated_improvement: "+20% throughput".to_string(),
        current_config: "worker_connections 1024;".to_string(),
        suggested_config: "worker_connections 4096;".to_string(),
    }
}
