//! Field edits as explicit intents.
//!
//! The presentation layer never mutates a configuration in place: each user
//! edit becomes one `Edit`, and `Configuration::apply` turns the current
//! snapshot into the next one. Applying an edit never validates; the
//! validator runs on whatever snapshot comes out.

use crate::Result;
use crate::spec::config::{
    BudgetingMethod, Configuration, IndicatorBody, IndicatorMode, IndicatorType, Kind,
    MetricSource, Operator, TimeWindowUnit, parse_number,
};

use anyhow::{Context, bail};
use serde::de::DeserializeOwned;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    Kind(Kind),
    ApiVersion(String),
    Name(String),
    DisplayName(String),
    Description(String),
    App(String),
    Service(String),
    Target(Option<f64>),
    TimeWindowCount(Option<f64>),
    TimeWindowUnit(TimeWindowUnit),
    Rolling(bool),
    BudgetingMethod(BudgetingMethod),
    IndicatorMode(IndicatorMode),
    IndicatorRef(String),
    IndicatorType(IndicatorType),
    /// Backend for every metric source of the indicator.
    SourceType(String),
    ThresholdQuery(String),
    ThresholdOperator(Operator),
    ThresholdValue(Option<f64>),
    RatioTotalQuery(String),
    /// A blank query removes the good source.
    RatioGoodQuery(String),
    /// A blank query removes the bad source.
    RatioBadQuery(String),
}

impl Configuration {
    /// Produce the snapshot that follows `edit`.
    pub fn apply(mut self, edit: Edit) -> Self {
        match edit {
            Edit::Kind(kind) => self.kind = kind,
            Edit::ApiVersion(v) => self.api_version = v,
            Edit::Name(v) => self.name = v,
            Edit::DisplayName(v) => self.display_name = v,
            Edit::Description(v) => self.description = v,
            Edit::App(v) => self.app = v,
            Edit::Service(v) => self.service = v,
            Edit::Target(v) => self.objective.target = v,
            Edit::TimeWindowCount(v) => self.objective.time_window_count = v,
            Edit::TimeWindowUnit(v) => self.objective.time_window_unit = v,
            Edit::Rolling(v) => self.objective.rolling = v,
            Edit::BudgetingMethod(v) => self.budgeting_method = v,
            Edit::IndicatorMode(v) => self.indicator_mode = v,
            Edit::IndicatorRef(v) => self.indicator_ref = v,
            Edit::IndicatorType(t) => {
                if self.indicator.indicator_type() != t {
                    let source_type = self.indicator.source_type().to_string();
                    self.indicator = IndicatorBody::empty(t, &source_type);
                }
            }
            Edit::SourceType(source_type) => match &mut self.indicator {
                IndicatorBody::Threshold(t) => t.source.source_type = source_type,
                IndicatorBody::Ratio(r) => {
                    for s in [r.good.as_mut(), r.bad.as_mut()].into_iter().flatten() {
                        s.source_type = source_type.clone();
                    }
                    r.total.source_type = source_type;
                }
            },
            Edit::ThresholdQuery(q) => match &mut self.indicator {
                IndicatorBody::Threshold(t) => t.source.query = q,
                IndicatorBody::Ratio(_) => ignored("thresholdQuery"),
            },
            Edit::ThresholdOperator(op) => match &mut self.indicator {
                IndicatorBody::Threshold(t) => t.operator = op,
                IndicatorBody::Ratio(_) => ignored("thresholdOperator"),
            },
            Edit::ThresholdValue(v) => match &mut self.indicator {
                IndicatorBody::Threshold(t) => t.value = v,
                IndicatorBody::Ratio(_) => ignored("thresholdValue"),
            },
            Edit::RatioTotalQuery(q) => match &mut self.indicator {
                IndicatorBody::Ratio(r) => r.total.query = q,
                IndicatorBody::Threshold(_) => ignored("ratioTotal"),
            },
            Edit::RatioGoodQuery(q) => match &mut self.indicator {
                IndicatorBody::Ratio(r) => {
                    let source_type = r.total.source_type.clone();
                    set_optional_source(&mut r.good, &source_type, q);
                }
                IndicatorBody::Threshold(_) => ignored("ratioGood"),
            },
            Edit::RatioBadQuery(q) => match &mut self.indicator {
                IndicatorBody::Ratio(r) => {
                    let source_type = r.total.source_type.clone();
                    set_optional_source(&mut r.bad, &source_type, q);
                }
                IndicatorBody::Threshold(_) => ignored("ratioBad"),
            },
        }
        self
    }

    /// Apply edits left to right.
    pub fn apply_all(self, edits: impl IntoIterator<Item = Edit>) -> Self {
        edits.into_iter().fold(self, Configuration::apply)
    }
}

fn set_optional_source(slot: &mut Option<MetricSource>, source_type: &str, query: String) {
    if query.trim().is_empty() {
        *slot = None;
        return;
    }
    match slot {
        Some(s) => s.query = query,
        None => *slot = Some(MetricSource::new(source_type, query)),
    }
}

fn ignored(field: &str) {
    debug!(field, "edit targets the inactive indicator type; ignored");
}

impl Edit {
    /// Build an edit from a field key and the text the user typed.
    ///
    /// Numeric fields follow form semantics: malformed text becomes "missing"
    /// instead of an error, so the validator reports it.
    pub fn parse(field: &str, value: &str) -> Result<Self> {
        let edit = match field {
            "kind" => Edit::Kind(parse_enum(field, value)?),
            "apiVersion" => Edit::ApiVersion(value.to_string()),
            "name" => Edit::Name(value.to_string()),
            "displayName" => Edit::DisplayName(value.to_string()),
            "description" => Edit::Description(value.to_string()),
            "app" => Edit::App(value.to_string()),
            "service" => Edit::Service(value.to_string()),
            "target" => Edit::Target(parse_number(value)),
            "timeWindowCount" => Edit::TimeWindowCount(parse_number(value)),
            "timeWindowUnit" => Edit::TimeWindowUnit(parse_enum(field, value)?),
            "rolling" => Edit::Rolling(
                value
                    .trim()
                    .parse()
                    .with_context(|| format!("rolling must be true or false, got {:?}", value))?,
            ),
            "budgetingMethod" => Edit::BudgetingMethod(parse_enum(field, value)?),
            "indicatorMode" => Edit::IndicatorMode(parse_enum(field, value)?),
            "indicatorRef" => Edit::IndicatorRef(value.to_string()),
            "indicatorType" => Edit::IndicatorType(parse_enum(field, value)?),
            "sourceType" => Edit::SourceType(value.to_string()),
            "thresholdQuery" => Edit::ThresholdQuery(value.to_string()),
            "thresholdOperator" => Edit::ThresholdOperator(parse_enum(field, value)?),
            "thresholdValue" => Edit::ThresholdValue(parse_number(value)),
            "ratioTotal" => Edit::RatioTotalQuery(value.to_string()),
            "ratioGood" => Edit::RatioGoodQuery(value.to_string()),
            "ratioBad" => Edit::RatioBadQuery(value.to_string()),
            other => bail!("unknown field {:?}", other),
        };
        Ok(edit)
    }
}

impl FromStr for Edit {
    type Err = anyhow::Error;

    /// Parse `field=value`; everything after the first `=` is the value.
    fn from_str(s: &str) -> Result<Self> {
        let Some((field, value)) = s.split_once('=') else {
            bail!("edit must look like field=value, got {:?}", s);
        };
        Edit::parse(field.trim(), value)
    }
}

/// Enum fields accept exactly what the JSON intake accepts.
fn parse_enum<T: DeserializeOwned>(field: &str, value: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(value.trim().to_string()))
        .with_context(|| format!("invalid value {:?} for {}", value, field))
}
