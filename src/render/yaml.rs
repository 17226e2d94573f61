use crate::spec::{
    Configuration, IndicatorBody, IndicatorMode, Kind, MetricSource, RatioMetric, ThresholdMetric,
};

/// One nesting level.
const INDENT: &str = "  ";

/// Render the OpenSLO document for a configuration.
///
/// Rendering never looks at validity: an invalid configuration still yields a
/// structurally complete document. Missing numbers are emitted as empty values
/// so no NaN-like token can reach the output.
///
/// Blocks are built as line lists at column zero and shifted into place with
/// `indent`, so optional entries that are absent contribute no lines at all.
pub fn render_document(config: &Configuration) -> String {
    let mut out: Vec<String> = vec![
        key_value("apiVersion", &scalar(&config.api_version)),
        key_value("kind", config.kind.as_str()),
        "metadata:".to_string(),
    ];
    out.extend(indent(&metadata_lines(config), 1));

    out.push("spec:".to_string());
    out.push(format!(
        "{}{}",
        INDENT,
        key_value("description", &scalar(&config.description))
    ));

    match config.kind {
        Kind::Sli => out.extend(indent(&indicator_lines(&config.indicator), 1)),
        Kind::Slo => out.extend(indent(&slo_spec_lines(config), 1)),
    }

    let mut text = out.join("\n");
    text.push('\n');
    text
}

fn metadata_lines(config: &Configuration) -> Vec<String> {
    let mut lines = vec![
        key_value("name", &scalar(&config.name)),
        key_value("displayName", &scalar(&config.display_name)),
    ];
    if let Some(app) = config.app_label() {
        lines.push("labels:".to_string());
        lines.push(format!("{}{}", INDENT, key_value("app", &scalar(app))));
    }
    lines
}

/// Everything under `spec:` after the description, for an SLO.
fn slo_spec_lines(config: &Configuration) -> Vec<String> {
    let objective = &config.objective;
    let mut lines = vec![
        key_value("service", &scalar(&config.service)),
        key_value("budgetingMethod", &scalar(config.budgeting_method.as_str())),
        "objectives:".to_string(),
        format!(
            "{}- {}",
            INDENT,
            key_value("displayName", &scalar(&config.display_name))
        ),
        format!("{}  {}", INDENT, key_value("target", &number(objective.target))),
        format!("{}  timeWindow:", INDENT),
        format!(
            "{}  {}- {}",
            INDENT,
            INDENT,
            key_value("rolling", if objective.rolling { "true" } else { "false" })
        ),
        format!(
            "{}  {}  {}",
            INDENT,
            INDENT,
            key_value("count", &number(objective.time_window_count))
        ),
        format!(
            "{}  {}  {}",
            INDENT,
            INDENT,
            key_value("unit", &scalar(objective.time_window_unit.as_str()))
        ),
    ];

    match config.indicator_mode {
        IndicatorMode::Reference => {
            lines.push(key_value("indicatorRef", &scalar(&config.indicator_ref)));
        }
        IndicatorMode::Inline => {
            lines.push("indicator:".to_string());
            lines.extend(indent(&indicator_lines(&config.indicator), 1));
        }
    }
    lines
}

fn indicator_lines(indicator: &IndicatorBody) -> Vec<String> {
    match indicator {
        IndicatorBody::Threshold(t) => threshold_lines(t),
        IndicatorBody::Ratio(r) => ratio_lines(r),
    }
}

fn threshold_lines(t: &ThresholdMetric) -> Vec<String> {
    let mut lines = vec!["thresholdMetric:".to_string()];
    lines.extend(indent(&metric_source_lines(&t.source), 1));
    lines.push(format!("{}{}", INDENT, key_value("operator", t.operator.as_str())));
    lines.push(format!("{}{}", INDENT, key_value("value", &number(t.value))));
    lines
}

fn ratio_lines(r: &RatioMetric) -> Vec<String> {
    let mut body = Vec::new();
    for (key, source) in [("good", r.good()), ("bad", r.bad()), ("total", Some(&r.total))] {
        let Some(source) = source else {
            continue;
        };
        body.push(format!("{}:", key));
        body.extend(indent(&metric_source_lines(source), 1));
    }

    let mut lines = vec!["ratioMetric:".to_string()];
    lines.extend(indent(&body, 1));
    lines
}

fn metric_source_lines(source: &MetricSource) -> Vec<String> {
    let mut lines = vec![
        "metricSource:".to_string(),
        format!("{}{}", INDENT, key_value("type", &scalar(&source.source_type))),
        format!("{}spec:", INDENT),
    ];
    lines.extend(indent(&block_scalar("query", &source.query), 2));
    lines
}

/// `key: |-` followed by the text verbatim, one level deeper.
///
/// The header carries whatever indicators the text needs to survive a YAML
/// round trip unchanged: chomping from the trailing newline count, and an
/// explicit indentation width when the first content line starts with a space.
/// Text with carriage returns or other characters a literal block would
/// normalise falls back to a double-quoted scalar on the key line.
fn block_scalar(key: &str, text: &str) -> Vec<String> {
    if !is_printable(&text.replace(['\n', '\t'], "")) {
        return vec![key_value(key, &double_quoted(text))];
    }

    let body = text.trim_end_matches('\n');
    let trailing = text.len() - body.len();

    let chomp = match (body.is_empty(), trailing) {
        (_, 0) => "-",
        (false, 1) => "",
        _ => "+",
    };
    let width = if body.split('\n').find(|l| !l.is_empty()).is_some_and(|l| l.starts_with(' ')) {
        "2"
    } else {
        ""
    };

    let mut lines = vec![format!("{}: |{}{}", key, width, chomp)];
    if !body.is_empty() {
        lines.extend(body.split('\n').map(|l| {
            if l.is_empty() {
                String::new()
            } else {
                format!("{}{}", INDENT, l)
            }
        }));
    }
    // Kept trailing newlines become empty lines; the last content line owns one.
    let kept = if body.is_empty() { trailing } else { trailing.saturating_sub(1) };
    if chomp == "+" {
        lines.extend(std::iter::repeat_n(String::new(), kept));
    }
    lines
}

/// Shift lines right by `levels`; empty lines stay empty.
fn indent(lines: &[String], levels: usize) -> Vec<String> {
    let prefix = INDENT.repeat(levels);
    lines
        .iter()
        .map(|l| {
            if l.is_empty() {
                String::new()
            } else {
                format!("{}{}", prefix, l)
            }
        })
        .collect()
}

fn key_value(key: &str, value: &str) -> String {
    if value.is_empty() {
        format!("{}:", key)
    } else {
        format!("{}: {}", key, value)
    }
}

/// Raw decimal, or nothing for a missing value.
fn number(v: Option<f64>) -> String {
    match v {
        Some(v) if v.is_finite() => format!("{}", v),
        _ => String::new(),
    }
}

/// Plain scalar when YAML reads it back as the same string, double-quoted otherwise.
fn scalar(s: &str) -> String {
    if is_plain_safe(s) {
        s.to_string()
    } else {
        double_quoted(s)
    }
}

/// The parser has the final word; the up-front checks cover what it cannot see
/// from a lone scalar (surrounding whitespace, YAML 1.1 booleans).
fn is_plain_safe(s: &str) -> bool {
    const LEADING: &[char] = &[
        '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@',
        '`',
    ];
    const YAML11_BOOLS: &[&str] = &["yes", "no", "on", "off", "y", "n"];

    let Some(first) = s.chars().next() else {
        return false;
    };
    if LEADING.contains(&first) || s.trim() != s || !is_printable(s) {
        return false;
    }
    if YAML11_BOOLS.contains(&s.to_ascii_lowercase().as_str()) {
        return false;
    }
    matches!(
        serde_yaml::from_str::<serde_yaml::Value>(s),
        Ok(serde_yaml::Value::String(back)) if back == s
    )
}

/// No control characters and nothing a YAML parser treats as a line break.
fn is_printable(s: &str) -> bool {
    !s.chars()
        .any(|c| c.is_control() || matches!(c, '\u{2028}' | '\u{2029}' | '\u{feff}'))
}

fn double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Edit;
    use crate::spec::config::{BudgetingMethod, IndicatorType, Operator, TimeWindowUnit};
    use serde_yaml::Value;
    use pretty_assertions::assert_eq;

    fn ratio_config(good: Option<&str>, bad: Option<&str>) -> Configuration {
        Configuration::default().apply_all(
            [
                Some(Edit::IndicatorType(IndicatorType::Ratio)),
                Some(Edit::RatioTotalQuery("sum(requests)".to_string())),
                good.map(|q| Edit::RatioGoodQuery(q.to_string())),
                bad.map(|q| Edit::RatioBadQuery(q.to_string())),
            ]
            .into_iter()
            .flatten(),
        )
    }

    #[test]
    fn default_slo_document() {
        let config = Configuration::default()
            .apply(Edit::ThresholdQuery("sum(up)".to_string()))
            .apply(Edit::Description("Availability of my-service".to_string()));

        assert_eq!(
            render_document(&config),
            "\
apiVersion: openslo/v1
kind: SLO
metadata:
  name: my-service-availability
  displayName: My Service Availability
spec:
  description: Availability of my-service
  service: my-service
  budgetingMethod: Occurrences
  objectives:
    - displayName: My Service Availability
      target: 0.999
      timeWindow:
        - rolling: true
          count: 28
          unit: d
  indicator:
    thresholdMetric:
      metricSource:
        type: prometheus
        spec:
          query: |-
            sum(up)
      operator: gte
      value: 0.99
"
        );
    }

    #[test]
    fn default_configuration_has_expected_lines_in_order() {
        let text = render_document(&Configuration::default());
        let lines: Vec<&str> = text.lines().collect();

        let expected = [
            "apiVersion: openslo/v1",
            "kind: SLO",
            "metadata:",
            "  name: my-service-availability",
            "  indicator:",
            "    thresholdMetric:",
        ];
        let mut at = 0;
        for want in expected {
            let pos = lines[at..]
                .iter()
                .position(|l| *l == want)
                .unwrap_or_else(|| panic!("missing {:?} after line {}\n{}", want, at, text));
            at += pos + 1;
        }
        assert!(!text.contains("indicatorRef:"));
    }

    #[test]
    fn reference_mode_emits_indicator_ref_only() {
        let config = Configuration::default().apply_all([
            Edit::IndicatorMode(IndicatorMode::Reference),
            Edit::IndicatorRef("worker-latency-sli".to_string()),
        ]);
        let text = render_document(&config);

        assert!(text.contains("\n  indicatorRef: worker-latency-sli\n"), "{}", text);
        assert!(!text.contains("indicator:"), "{}", text);
        assert!(!text.contains("thresholdMetric"), "{}", text);
        assert!(text.ends_with("  indicatorRef: worker-latency-sli\n"));
    }

    #[test]
    fn sli_document() {
        let config = Configuration::default().apply_all([
            Edit::Kind(Kind::Sli),
            Edit::Name("worker-latency-sli".to_string()),
            Edit::DisplayName("Worker Latency".to_string()),
            Edit::Description("Job latency".to_string()),
            Edit::SourceType("datadog".to_string()),
            Edit::ThresholdQuery("avg:worker.latency{*}".to_string()),
            Edit::ThresholdOperator(Operator::Lt),
            Edit::ThresholdValue(Some(250.0)),
        ]);

        assert_eq!(
            render_document(&config),
            "\
apiVersion: openslo/v1
kind: SLI
metadata:
  name: worker-latency-sli
  displayName: Worker Latency
spec:
  description: Job latency
  thresholdMetric:
    metricSource:
      type: datadog
      spec:
        query: |-
          avg:worker.latency{*}
    operator: lt
    value: 250
"
        );
    }

    #[test]
    fn ratio_with_bad_only() {
        let text = render_document(&ratio_config(None, Some("sum(errors)")));

        assert!(
            text.contains(
                "\
  indicator:
    ratioMetric:
      bad:
        metricSource:
          type: prometheus
          spec:
            query: |-
              sum(errors)
      total:
        metricSource:
          type: prometheus
          spec:
            query: |-
              sum(requests)
"
            ),
            "{}",
            text
        );
        assert!(!text.contains("good:"));
        assert!(!text.contains("\n\n"));
    }

    #[test]
    fn ratio_orders_good_bad_total() {
        let text = render_document(&ratio_config(Some("sum(ok)"), Some("sum(errors)")));

        let good = text.find("      good:").unwrap();
        let bad = text.find("      bad:").unwrap();
        let total = text.find("      total:").unwrap();
        assert!(good < bad && bad < total, "{}", text);
    }

    #[test]
    fn blank_good_query_is_omitted() {
        let mut config = ratio_config(None, Some("sum(errors)"));
        if let IndicatorBody::Ratio(r) = &mut config.indicator {
            r.good = Some(MetricSource::new("prometheus", "  "));
        }
        let text = render_document(&config);
        assert!(!text.contains("good:"), "{}", text);
    }

    #[test]
    fn app_label_only_when_present() {
        let text = render_document(&Configuration::default());
        assert!(!text.contains("labels:"));

        let text = render_document(&Configuration::default().apply(Edit::App("  ".to_string())));
        assert!(!text.contains("labels:"));

        let text = render_document(&Configuration::default().apply(Edit::App("checkout".to_string())));
        assert!(
            text.contains("  displayName: My Service Availability\n  labels:\n    app: checkout\nspec:\n"),
            "{}",
            text
        );
        assert_eq!(text.matches("labels:").count(), 1);
    }

    #[test]
    fn rendering_is_idempotent() {
        let config = ratio_config(Some("sum(ok)"), None).apply(Edit::App("web".to_string()));
        assert_eq!(render_document(&config), render_document(&config));
    }

    #[test]
    fn numbers_are_raw_decimals_and_missing_numbers_are_empty() {
        let config = Configuration::default().apply_all([
            Edit::Target(Some(0.95)),
            Edit::TimeWindowCount(Some(7.0)),
            Edit::TimeWindowUnit(TimeWindowUnit::Week),
            Edit::Rolling(false),
        ]);
        let text = render_document(&config);
        assert!(text.contains("      target: 0.95\n"));
        assert!(text.contains("        - rolling: false\n          count: 7\n          unit: w\n"));

        let config = Configuration::default().apply_all([
            Edit::Target(None),
            Edit::TimeWindowCount(None),
            Edit::ThresholdValue(None),
        ]);
        let text = render_document(&config);
        assert!(text.contains("      target:\n"), "{}", text);
        assert!(text.contains("          count:\n"), "{}", text);
        assert!(text.contains("      value:\n"), "{}", text);
        assert!(!text.to_lowercase().contains("nan"));
    }

    #[test]
    fn multi_line_query_is_verbatim_at_fixed_indent() {
        let config = Configuration::default()
            .apply(Edit::ThresholdQuery("sum(rate(x[5m]))\n  / sum(rate(y[5m])) # ratio".to_string()));
        let text = render_document(&config);

        assert!(
            text.contains(
                "          query: |-\n            sum(rate(x[5m]))\n              / sum(rate(y[5m])) # ratio\n      operator: gte\n"
            ),
            "{}",
            text
        );
    }

    #[test]
    fn block_scalar_headers() {
        assert_eq!(block_scalar("query", "up"), vec!["query: |-", "  up"]);
        assert_eq!(block_scalar("query", "up\n"), vec!["query: |", "  up"]);
        assert_eq!(block_scalar("query", "up\n\n"), vec!["query: |+", "  up", ""]);
        assert_eq!(block_scalar("query", "  up"), vec!["query: |2-", "    up"]);
        assert_eq!(block_scalar("query", ""), vec!["query: |-"]);
        assert_eq!(block_scalar("query", "\n"), vec!["query: |+", ""]);
        assert_eq!(
            block_scalar("query", "a\n\nb"),
            vec!["query: |-", "  a", "", "  b"]
        );
    }

    #[test]
    fn scalars_are_quoted_only_when_needed() {
        assert_eq!(scalar("my-service"), "my-service");
        assert_eq!(scalar("Checkout API (EU)"), "Checkout API (EU)");
        assert_eq!(scalar(""), "\"\"");
        assert_eq!(scalar("true"), "\"true\"");
        assert_eq!(scalar("123"), "\"123\"");
        assert_eq!(scalar("a: b"), "\"a: b\"");
        assert_eq!(scalar("# note"), "\"# note\"");
        assert_eq!(scalar("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
    }

    #[test]
    fn empty_description_stays_a_string() {
        let text = render_document(&Configuration::default().apply(Edit::Description(String::new())));
        assert!(text.contains("spec:\n  description: \"\"\n"), "{}", text);
    }

    /// Walk a parsed document by mapping keys.
    fn lookup<'a>(doc: &'a Value, path: &[&str]) -> &'a Value {
        path.iter().fold(doc, |v, key| {
            v.get(*key)
                .unwrap_or_else(|| panic!("missing {:?} in {:?}", key, path))
        })
    }

    fn parse(config: &Configuration) -> Value {
        let text = render_document(config);
        serde_yaml::from_str(&text).unwrap_or_else(|e| panic!("{}\n{}", e, text))
    }

    #[test]
    fn number_like_names_stay_strings() {
        for name in ["0x1f", "0o17", "1e3", "123", "0"] {
            let config = Configuration::default().apply(Edit::Name(name.to_string()));
            assert!(crate::validate::validate(&config).is_exportable(), "{}", name);

            let doc = parse(&config);
            assert_eq!(
                lookup(&doc, &["metadata", "name"]),
                &Value::String(name.to_string()),
                "{}",
                name
            );
        }
    }

    #[test]
    fn carriage_returns_in_queries_survive() {
        let query = "sum(a)\r\n/ sum(b)";
        let config = Configuration::default().apply(Edit::ThresholdQuery(query.to_string()));

        let text = render_document(&config);
        assert!(
            text.contains("          query: \"sum(a)\\r\\n/ sum(b)\"\n"),
            "{}",
            text
        );
        let doc = parse(&config);
        assert_eq!(
            lookup(
                &doc,
                &["spec", "indicator", "thresholdMetric", "metricSource", "spec", "query"]
            ),
            &Value::String(query.to_string())
        );
    }

    #[test]
    fn awkward_text_round_trips_through_a_yaml_parser() {
        let texts = [
            "plain",
            "  leading spaces",
            "trailing newline\n",
            "two trailing\n\n",
            "\n",
            "",
            "x # not a comment",
            "key: value",
            "first\n\n  third",
            "   \nafter blank",
            "crlf\r\nline",
            "yes",
            "null",
            "- item",
            "'quoted'",
            "tab\there",
        ];

        for text in texts {
            let threshold = Configuration::default().apply_all([
                Edit::Description(text.to_string()),
                Edit::ThresholdQuery(text.to_string()),
            ]);
            let doc = parse(&threshold);
            assert_eq!(
                lookup(&doc, &["spec", "description"]),
                &Value::String(text.to_string()),
                "description {:?}",
                text
            );
            assert_eq!(
                lookup(
                    &doc,
                    &["spec", "indicator", "thresholdMetric", "metricSource", "spec", "query"]
                ),
                &Value::String(text.to_string()),
                "threshold query {:?}",
                text
            );

            // Ratio sources, with the awkward text last in the document.
            let ratio = Configuration::default().apply_all([
                Edit::Kind(Kind::Sli),
                Edit::IndicatorType(IndicatorType::Ratio),
                Edit::RatioGoodQuery(format!("good {}", text.trim())),
                Edit::RatioTotalQuery(text.to_string()),
            ]);
            let doc = parse(&ratio);
            for key in ["good", "total"] {
                let want = if key == "total" {
                    text.to_string()
                } else {
                    format!("good {}", text.trim())
                };
                assert_eq!(
                    lookup(&doc, &["spec", "ratioMetric", key, "metricSource", "spec", "query"]),
                    &Value::String(want),
                    "ratio {} query for {:?}",
                    key,
                    text
                );
            }
        }
    }

    #[test]
    fn unknown_budgeting_method_and_unit_render_verbatim() {
        let config = Configuration::from_json_str(
            r#"{ "budgetingMethod": "RatioTimeslices", "objective": { "timeWindowUnit": "mo" } }"#,
        )
        .unwrap();
        let text = render_document(&config);

        assert!(text.contains("  budgetingMethod: RatioTimeslices\n"), "{}", text);
        assert!(text.contains("          unit: mo\n"), "{}", text);

        let config = config.apply(Edit::BudgetingMethod(BudgetingMethod::Other("yes".to_string())));
        let doc = parse(&config);
        assert_eq!(
            lookup(&doc, &["spec", "budgetingMethod"]),
            &Value::String("yes".to_string())
        );
    }
}
