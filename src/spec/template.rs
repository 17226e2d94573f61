//! Built-in starting points.
//!
//! A template is a partial configuration document. Instantiating one merges it
//! over the defaults and clears the identifier, so saving the result creates a
//! new item instead of overwriting another.

use crate::Result;
use crate::spec::config::Configuration;

use anyhow::{Context, anyhow};
use serde_json::{Value, json};

pub struct Template {
    pub id: &'static str,
    pub title: &'static str,
    partial: fn() -> Value,
}

impl Template {
    pub fn instantiate(&self) -> Result<Configuration> {
        let mut config = Configuration::from_json_value((self.partial)())
            .with_context(|| format!("template {} is malformed", self.id))?;
        config.id.clear();
        Ok(config)
    }
}

const TEMPLATES: &[Template] = &[
    Template {
        id: "http-availability",
        title: "SLO: HTTP availability (ratio of non-5xx requests)",
        partial: http_availability,
    },
    Template {
        id: "latency-threshold",
        title: "SLO: p99 latency below a threshold",
        partial: latency_threshold,
    },
    Template {
        id: "error-rate-sli",
        title: "SLI: error rate (bad over total requests)",
        partial: error_rate_sli,
    },
    Template {
        id: "slo-by-reference",
        title: "SLO: objective over a shared SLI",
        partial: slo_by_reference,
    },
];

pub fn catalogue() -> &'static [Template] {
    TEMPLATES
}

pub fn find(id: &str) -> Result<&'static Template> {
    TEMPLATES.iter().find(|t| t.id == id).ok_or_else(|| {
        let known: Vec<&str> = TEMPLATES.iter().map(|t| t.id).collect();
        anyhow!("unknown template {:?} (known: {})", id, known.join(", "))
    })
}

fn http_availability() -> Value {
    json!({
        "kind": "SLO",
        "name": "web-availability",
        "displayName": "Web Availability",
        "description": "Share of HTTP requests answered without a server error",
        "app": "web",
        "service": "web",
        "objective": { "target": 0.995, "timeWindowCount": 28, "timeWindowUnit": "d", "rolling": true },
        "budgetingMethod": "Occurrences",
        "indicatorMode": "inline",
        "indicator": {
            "type": "ratio",
            "good": {
                "type": "prometheus",
                "query": "sum(rate(http_requests_total{job=\"web\",code!~\"5..\"}[5m]))"
            },
            "total": {
                "type": "prometheus",
                "query": "sum(rate(http_requests_total{job=\"web\"}[5m]))"
            }
        }
    })
}

fn latency_threshold() -> Value {
    json!({
        "kind": "SLO",
        "name": "api-latency",
        "displayName": "API Latency",
        "description": "p99 request latency stays under 300ms",
        "service": "api",
        "objective": { "target": 0.99, "timeWindowCount": 7, "timeWindowUnit": "d", "rolling": true },
        "budgetingMethod": "Timeslices",
        "indicator": {
            "type": "threshold",
            "source": {
                "type": "prometheus",
                "query": "histogram_quantile(0.99, sum(rate(http_request_duration_seconds_bucket{job=\"api\"}[5m])) by (le))"
            },
            "operator": "lt",
            "value": 0.3
        }
    })
}

fn error_rate_sli() -> Value {
    json!({
        "kind": "SLI",
        "name": "worker-error-rate",
        "displayName": "Worker Error Rate",
        "description": "Failed jobs over all processed jobs",
        "app": "worker",
        "indicator": {
            "type": "ratio",
            "bad": { "type": "prometheus", "query": "sum(rate(jobs_failed_total[5m]))" },
            "total": { "type": "prometheus", "query": "sum(rate(jobs_processed_total[5m]))" }
        }
    })
}

fn slo_by_reference() -> Value {
    json!({
        "kind": "SLO",
        "name": "worker-reliability",
        "displayName": "Worker Reliability",
        "description": "Objective over the shared worker error-rate SLI",
        "service": "worker",
        "objective": { "target": 0.99, "timeWindowCount": 1, "timeWindowUnit": "w", "rolling": false },
        "indicatorMode": "reference",
        "indicatorRef": "worker-error-rate"
    })
}
