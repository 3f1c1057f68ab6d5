//! Rule-based optimization recommendations
//!
//! Maps an alerting metric to a recommendation through an ordered rule
//! table. Metrics without a matching rule produce no recommendation.

mod rules;

pub use rules::{default_rules, RecommendationRule, RecommendationTemplate};

use crate::models::Recommendation;
use std::sync::atomic::{AtomicI64, Ordering};

/// Default value for the `server` field of generated recommendations
pub const DEFAULT_SERVER_NAME: &str = "nginx-prod-01";

/// Millisecond id source that never goes backwards within a process
#[derive(Debug, Default)]
pub struct IdClock {
    last: AtomicI64,
}

impl IdClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id given the current wall-clock milliseconds
    pub fn next_id(&self, now_millis: i64) -> i64 {
        let previous = self.last.fetch_max(now_millis, Ordering::SeqCst);
        previous.max(now_millis)
    }
}

/// Generates recommendations for alerting metrics
#[derive(Debug)]
pub struct RecommendationGenerator {
    rules: Vec<RecommendationRule>,
    server: String,
    ids: IdClock,
}

impl RecommendationGenerator {
    /// Create a generator with the built-in rule table
    pub fn new(server: impl Into<String>) -> Self {
        Self::with_rules(server, default_rules())
    }

    /// Create a generator with a custom rule table
    pub fn with_rules(server: impl Into<String>, rules: Vec<RecommendationRule>) -> Self {
        Self {
            rules,
            server: server.into(),
            ids: IdClock::new(),
        }
    }

    /// Build a recommendation from the first rule matching `metric_name`
    pub fn generate(&self, metric_name: &str, value: f64) -> Option<Recommendation> {
        let rule = self.rules.iter().find(|rule| (rule.matches)(metric_name))?;
        let template = (rule.build)(value);

        let now = chrono::Utc::now();
        Some(Recommendation {
            id: self.ids.next_id(now.timestamp_millis()),
            title: template.title,
            description: template.description,
            details: template.details,
            impact: template.impact,
            category: template.category,
            confidence: template.confidence,
            estimated_improvement: template.estimated_improvement,
            current_config: template.current_config,
            suggested_config: template.suggested_config,
            server: self.server.clone(),
            timestamp: now.timestamp(),
        })
    }

    /// Name of the rule that would handle `metric_name`, if any
    pub fn matching_rule(&self, metric_name: &str) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|rule| (rule.matches)(metric_name))
            .map(|rule| rule.name)
    }
}

impl Default for RecommendationGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Impact;

    #[test]
    fn test_latency_metric_gets_caching_recommendation() {
        let generator = RecommendationGenerator::default();

        let rec = generator.generate("nginx_request_time_ms", 450.0).unwrap();

        assert_eq!(rec.title, "Enable Micro-Caching");
        assert_eq!(rec.category, "Performance");
        assert_eq!(rec.impact, Impact::High);
        assert_eq!(rec.confidence, 0.89);
        assert_eq!(rec.server, DEFAULT_SERVER_NAME);
        assert!(rec.description.contains("450"));
    }

    #[test]
    fn test_cpu_metric_gets_concurrency_recommendation() {
        let generator = RecommendationGenerator::default();

        let rec = generator.generate("node_cpu_usage", 95.0).unwrap();

        assert_eq!(rec.title, "Optimize Worker Connections");
        assert_eq!(rec.impact, Impact::Medium);
        assert_eq!(rec.confidence, 0.75);
    }

    #[test]
    fn test_unknown_metric_has_no_recommendation() {
        let generator = RecommendationGenerator::default();

        assert!(generator.generate("disk_free_bytes", 10.0).is_none());
        assert!(generator.matching_rule("disk_free_bytes").is_none());
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let generator = RecommendationGenerator::default();

        // Matches both the latency and the cpu predicates
        let rec = generator.generate("cpu_scheduler_latency", 12.0).unwrap();
        assert_eq!(rec.impact, Impact::High);
        assert_eq!(
            generator.matching_rule("cpu_scheduler_latency"),
            Some("micro_caching")
        );
    }

    #[test]
    fn test_custom_rule_table() {
        fn always(_: &str) -> bool {
            true
        }
        fn build(value: f64) -> RecommendationTemplate {
            RecommendationTemplate {
                title: "Custom".to_string(),
                description: format!("value {}", value),
                details: String::new(),
                impact: Impact::Low,
                category: "Reliability".to_string(),
                confidence: 0.5,
                estimated_improvement: String::new(),
                current_config: String::new(),
                suggested_config: String::new(),
            }
        }

        let generator = RecommendationGenerator::with_rules(
            "edge-02",
            vec![RecommendationRule {
                name: "custom",
                matches: always,
                build,
            }],
        );

        let rec = generator.generate("disk_free_bytes", 3.0).unwrap();
        assert_eq!(rec.impact, Impact::Low);
        assert_eq!(rec.server, "edge-02");
    }

    #[test]
    fn test_ids_are_monotonic() {
        let clock = IdClock::new();

        assert_eq!(clock.next_id(1_000), 1_000);
        assert_eq!(clock.next_id(900), 1_000);
        assert_eq!(clock.next_id(1_500), 1_500);

        let generator = RecommendationGenerator::default();
        let mut last = 0;
        for _ in 0..100 {
            let rec = generator.generate("node_cpu_usage", 90.0).unwrap();
            assert!(rec.id >= last);
            last = rec.id;
        }
    }
}
