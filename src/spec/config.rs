//! Configuration value edited by the presentation layer.
//!
//! JSON shape (camelCase; every field is optional and merged over the defaults):
//! {
//!   "id": "",                          // assigned by the store on first save
//!   "kind": "SLO",                     // or "SLI"
//!   "apiVersion": "openslo/v1",
//!   "name": "my-service-availability",
//!   "displayName": "My Service Availability",
//!   "description": "...",
//!   "app": "",                         // optional metadata label
//!   "service": "my-service",           // SLO only
//!   "objective": {
//!     "target": 0.999,
//!     "timeWindowCount": 28,
//!     "timeWindowUnit": "d",
//!     "rolling": true
//!   },
//!   "budgetingMethod": "Occurrences",
//!   "indicatorMode": "inline",         // or "reference" (SLO only)
//!   "indicatorRef": "",
//!   "indicator": {
//!     "type": "threshold",
//!     "source": { "type": "prometheus", "query": "..." },
//!     "operator": ">=",
//!     "value": 0.99
//!   }
//! }
//!
//! Numeric fields are read leniently: anything that is not a finite number
//! (or a string holding one) is kept as "missing" and left for the validator.

use crate::Result;

use anyhow::Context;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_VERSION: &str = "openslo/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Kind {
    #[default]
    #[serde(rename = "SLO", alias = "slo")]
    Slo,
    #[serde(rename = "SLI", alias = "sli")]
    Sli,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Slo => "SLO",
            Kind::Sli => "SLI",
        }
    }
}

/// Window unit. Values outside the known set are carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeWindowUnit {
    #[default]
    #[serde(rename = "d", alias = "day")]
    Day,
    #[serde(rename = "h", alias = "hour")]
    Hour,
    #[serde(rename = "m", alias = "minute")]
    Minute,
    #[serde(rename = "w", alias = "week")]
    Week,
    #[serde(untagged)]
    Other(String),
}

impl TimeWindowUnit {
    pub fn as_str(&self) -> &str {
        match self {
            TimeWindowUnit::Day => "d",
            TimeWindowUnit::Hour => "h",
            TimeWindowUnit::Minute => "m",
            TimeWindowUnit::Week => "w",
            TimeWindowUnit::Other(unit) => unit,
        }
    }
}

/// Error budget accounting. Values outside the known set are carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BudgetingMethod {
    #[default]
    #[serde(alias = "occurrences")]
    Occurrences,
    #[serde(alias = "timeslices")]
    Timeslices,
    #[serde(untagged)]
    Other(String),
}

impl BudgetingMethod {
    pub fn as_str(&self) -> &str {
        match self {
            BudgetingMethod::Occurrences => "Occurrences",
            BudgetingMethod::Timeslices => "Timeslices",
            BudgetingMethod::Other(method) => method,
        }
    }
}

/// Whether an SLO embeds its indicator or points at a separately defined SLI.
/// Ignored for `kind = SLI`, which always defines its indicator in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorMode {
    #[default]
    Inline,
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorType {
    Threshold,
    Ratio,
}

/// Threshold comparison. Rendered as the OpenSLO token (`lt`, `lte`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "lt", alias = "<")]
    Lt,
    #[serde(rename = "lte", alias = "<=")]
    Lte,
    #[serde(rename = "gt", alias = ">")]
    Gt,
    #[default]
    #[serde(rename = "gte", alias = ">=")]
    Gte,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
        }
    }
}

/// A metrics backend (`prometheus`, `datadog`, ...) plus the query run against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub query: String,
}

impl Default for MetricSource {
    fn default() -> Self {
        Self {
            source_type: "prometheus".to_string(),
            query: String::new(),
        }
    }
}

impl MetricSource {
    pub fn new(source_type: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            query: query.into(),
        }
    }

    /// A source counts as present once it carries a non-blank query.
    pub fn is_present(&self) -> bool {
        !self.query.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdMetric {
    pub source: MetricSource,
    pub operator: Operator,
    #[serde(deserialize_with = "lenient_number")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RatioMetric {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub good: Option<MetricSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bad: Option<MetricSource>,
    pub total: MetricSource,
}

impl RatioMetric {
    /// The good source, if it carries a query.
    pub fn good(&self) -> Option<&MetricSource> {
        self.good.as_ref().filter(|s| s.is_present())
    }

    /// The bad source, if it carries a query.
    pub fn bad(&self) -> Option<&MetricSource> {
        self.bad.as_ref().filter(|s| s.is_present())
    }
}

/// How the indicator is computed. Exactly one branch exists at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IndicatorBody {
    Threshold(ThresholdMetric),
    Ratio(RatioMetric),
}

impl Default for IndicatorBody {
    fn default() -> Self {
        IndicatorBody::Threshold(ThresholdMetric::default())
    }
}

impl IndicatorBody {
    /// Empty body of the given type whose sources use `source_type`.
    pub fn empty(indicator_type: IndicatorType, source_type: &str) -> Self {
        let source = MetricSource::new(source_type, "");
        match indicator_type {
            IndicatorType::Threshold => IndicatorBody::Threshold(ThresholdMetric {
                source,
                ..ThresholdMetric::default()
            }),
            IndicatorType::Ratio => IndicatorBody::Ratio(RatioMetric {
                good: None,
                bad: None,
                total: source,
            }),
        }
    }

    pub fn indicator_type(&self) -> IndicatorType {
        match self {
            IndicatorBody::Threshold(_) => IndicatorType::Threshold,
            IndicatorBody::Ratio(_) => IndicatorType::Ratio,
        }
    }

    /// Backend of the primary source (threshold source, or ratio total).
    pub fn source_type(&self) -> &str {
        match self {
            IndicatorBody::Threshold(t) => &t.source.source_type,
            IndicatorBody::Ratio(r) => &r.total.source_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Objective {
    #[serde(deserialize_with = "lenient_number")]
    pub target: Option<f64>,
    /// Kept as a raw number so fractional input reaches the validator.
    #[serde(deserialize_with = "lenient_number")]
    pub time_window_count: Option<f64>,
    pub time_window_unit: TimeWindowUnit,
    pub rolling: bool,
}

impl Default for Objective {
    fn default() -> Self {
        Self {
            target: Some(0.999),
            time_window_count: Some(28.0),
            time_window_unit: TimeWindowUnit::Day,
            rolling: true,
        }
    }
}

/// The single value threaded through validation and rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Configuration {
    /// Empty until the first successful save; never regenerated afterwards.
    pub id: String,
    pub kind: Kind,
    pub api_version: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub app: String,
    pub service: String,
    pub objective: Objective,
    pub budgeting_method: BudgetingMethod,
    pub indicator_mode: IndicatorMode,
    pub indicator_ref: String,
    pub indicator: IndicatorBody,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            id: String::new(),
            kind: Kind::Slo,
            api_version: DEFAULT_API_VERSION.to_string(),
            name: "my-service-availability".to_string(),
            display_name: "My Service Availability".to_string(),
            description: "Availability of my-service measured from successful HTTP requests"
                .to_string(),
            app: String::new(),
            service: "my-service".to_string(),
            objective: Objective::default(),
            budgeting_method: BudgetingMethod::Occurrences,
            indicator_mode: IndicatorMode::Inline,
            indicator_ref: String::new(),
            indicator: IndicatorBody::Threshold(ThresholdMetric {
                source: MetricSource::new(
                    "prometheus",
                    r#"sum(rate(http_requests_total{service="my-service",code!~"5.."}[5m])) / sum(rate(http_requests_total{service="my-service"}[5m]))"#,
                ),
                operator: Operator::Gte,
                value: Some(0.99),
            }),
        }
    }
}

impl Configuration {
    /// Merge a (possibly partial) JSON document over the default configuration.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).context("configuration does not match the expected shape")
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("configuration does not match the expected shape")
    }

    /// True when the indicator body is part of this document rather than a reference.
    pub fn defines_indicator_inline(&self) -> bool {
        self.kind == Kind::Sli || self.indicator_mode == IndicatorMode::Inline
    }

    /// The application label, if one was given.
    pub fn app_label(&self) -> Option<&str> {
        let app = self.app.trim();
        (!app.is_empty()).then_some(app)
    }
}

/// Accept numbers and numeric strings; everything else becomes `None`.
fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(number_from_json(&raw))
}

pub(crate) fn number_from_json(raw: &serde_json::Value) -> Option<f64> {
    let v = match raw {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => parse_number(s),
        _ => None,
    };
    v.filter(|v| v.is_finite())
}

/// Parse user-typed numeric text; blank or malformed input is `None`.
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
