//! Validation rules for a configuration snapshot.
//!
//! Every rule runs on every call; a failure never stops the remaining rules.
//! The result maps a fixed field key to a human-readable message, and an
//! empty report is the only thing that makes a configuration exportable.

use crate::spec::{Configuration, IndicatorBody, IndicatorMode, Kind};

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// DNS-label style: lowercase alphanumerics, inner hyphens only.
const NAME_PATTERN: &str = r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$";

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NAME_PATTERN).expect("name pattern is a valid regex"));

/// Keys the presentation layer uses to attach messages to form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKey {
    Name,
    DisplayName,
    Service,
    Target,
    TimeWindowCount,
    IndicatorRef,
    ThresholdQuery,
    ThresholdValue,
    RatioTotal,
    /// Synthetic key: neither a good nor a bad query was given.
    RatioGoodBad,
}

impl FieldKey {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKey::Name => "name",
            FieldKey::DisplayName => "displayName",
            FieldKey::Service => "service",
            FieldKey::Target => "target",
            FieldKey::TimeWindowCount => "timeWindowCount",
            FieldKey::IndicatorRef => "indicatorRef",
            FieldKey::ThresholdQuery => "thresholdQuery",
            FieldKey::ThresholdValue => "thresholdValue",
            FieldKey::RatioTotal => "ratioTotal",
            FieldKey::RatioGoodBad => "ratioGoodBad",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationReport {
    errors: BTreeMap<FieldKey, String>,
}

impl ValidationReport {
    /// Copy, download and save are allowed exactly when this holds.
    pub fn is_exportable(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = FieldKey> + '_ {
        self.errors.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldKey, &str)> + '_ {
        self.errors.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    fn fail(&mut self, key: FieldKey, message: &str) {
        self.errors.insert(key, message.to_string());
    }
}

/// Check a configuration against every rule. Never fails; problems are data.
pub fn validate(config: &Configuration) -> ValidationReport {
    let mut report = ValidationReport::default();

    if is_blank(&config.name) {
        report.fail(FieldKey::Name, "Name is required");
    } else if !NAME_RE.is_match(&config.name) {
        report.fail(
            FieldKey::Name,
            "Name must be lowercase letters, digits and hyphens, starting and ending with a letter or digit",
        );
    }

    if is_blank(&config.display_name) {
        report.fail(FieldKey::DisplayName, "Display name is required");
    }

    if config.kind == Kind::Slo {
        check_objective(config, &mut report);
    }

    if config.defines_indicator_inline() {
        check_indicator(&config.indicator, &mut report);
    }

    report
}

fn check_objective(config: &Configuration, report: &mut ValidationReport) {
    if is_blank(&config.service) {
        report.fail(FieldKey::Service, "Service is required");
    }

    match config.objective.target {
        None => report.fail(FieldKey::Target, "Target is required"),
        Some(t) if !(0.0..=1.0).contains(&t) => {
            report.fail(FieldKey::Target, "Target must be between 0 and 1")
        }
        Some(_) => {}
    }

    let count_ok = config
        .objective
        .time_window_count
        .is_some_and(|c| c > 0.0 && c.fract() == 0.0);
    if !count_ok {
        report.fail(
            FieldKey::TimeWindowCount,
            "Time window count must be a positive whole number",
        );
    }

    if config.indicator_mode == IndicatorMode::Reference && is_blank(&config.indicator_ref) {
        report.fail(FieldKey::IndicatorRef, "Indicator reference is required");
    }
}

fn check_indicator(indicator: &IndicatorBody, report: &mut ValidationReport) {
    match indicator {
        IndicatorBody::Threshold(t) => {
            if !t.source.is_present() {
                report.fail(FieldKey::ThresholdQuery, "Threshold query is required");
            }
            // Zero is a legitimate threshold.
            if t.value.is_none() {
                report.fail(FieldKey::ThresholdValue, "Threshold value is required");
            }
        }
        IndicatorBody::Ratio(r) => {
            if !r.total.is_present() {
                report.fail(FieldKey::RatioTotal, "Total query is required");
            }
            if r.good().is_none() && r.bad().is_none() {
                report.fail(
                    FieldKey::RatioGoodBad,
                    "At least one of the good or bad queries is required",
                );
            }
        }
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}
