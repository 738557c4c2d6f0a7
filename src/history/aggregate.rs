use std::collections::BTreeMap;

use anyhow::{Result, bail};
use serde_json::Value;

use crate::model::{ComponentSample, ComponentStats, SampleSummary};

/// Turns JSON rows into samples: `category_field` is the label, other numbers are components.
pub fn parse_samples(rows: &[Value], category_field: &str) -> Result<Vec<ComponentSample>> {
    let mut samples = Vec::with_capacity(rows.len());

    for (index, row) in rows.iter().enumerate() {
        let Some(fields) = row.as_object() else {
            bail!("sample row {index} is not a JSON object");
        };

        let mut sample = ComponentSample::default();
        for (name, value) in fields {
            if name == category_field {
                sample.category = match value {
                    Value::Null => None,
                    Value::String(label) => Some(label.clone()),
                    other => Some(other.to_string()),
                };
                continue;
            }

            match value {
                Value::Number(number) => {
                    sample.components.insert(name.clone(), number.as_f64());
                }
                Value::Null => {
                    sample.components.insert(name.clone(), None);
                }
                _ => {}
            }
        }
        samples.push(sample);
    }

    Ok(samples)
}

pub fn summarize(samples: &[ComponentSample]) -> SampleSummary {
    let mut values_by_component = BTreeMap::<&str, Vec<f64>>::new();
    let mut categories = BTreeMap::<String, usize>::new();

    for sample in samples {
        if let Some(category) = &sample.category {
            *categories.entry(category.clone()).or_default() += 1;
        }
        for (name, value) in &sample.components {
            let slot = values_by_component.entry(name.as_str()).or_default();
            if let Some(value) = value.filter(|value| value.is_finite()) {
                slot.push(value);
            }
        }
    }

    let components = values_by_component
        .into_iter()
        .filter_map(|(name, values)| component_stats(&values).map(|stats| (name.to_string(), stats)))
        .collect();

    SampleSummary {
        components,
        categories,
    }
}

fn component_stats(values: &[f64]) -> Option<ComponentStats> {
    if values.is_empty() {
        return None;
    }

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / n as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(ComponentStats {
        mean,
        min,
        max,
        std: variance.sqrt(),
        n,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rows(value: Value) -> Vec<Value> {
        value.as_array().cloned().expect("array fixture")
    }

    #[test]
    fn summarize_two_samples_matches_population_stats() {
        let samples =
            parse_samples(&rows(json!([{"comp_a": 1}, {"comp_a": 3}])), "category").expect("parse");
        let summary = summarize(&samples);

        assert_eq!(
            summary.components.get("comp_a"),
            Some(&ComponentStats {
                mean: 2.0,
                min: 1.0,
                max: 3.0,
                std: 1.0,
                n: 2,
            })
        );
        assert!(summary.categories.is_empty());
    }

    #[test]
    fn all_missing_component_is_omitted() {
        let samples = parse_samples(
            &rows(json!([
                {"category": "frontal", "detect_ms": 10.0, "embed_ms": null},
                {"category": "profile", "detect_ms": 14.0, "embed_ms": null},
                {"category": "frontal", "detect_ms": null}
            ])),
            "category",
        )
        .expect("parse");
        let summary = summarize(&samples);

        assert!(!summary.components.contains_key("embed_ms"));
        let detect = summary.components.get("detect_ms").expect("detect stats");
        assert_eq!(detect.n, 2);
        assert_eq!(detect.mean, 12.0);
        assert_eq!(detect.std, 2.0);
        assert_eq!(summary.categories.get("frontal"), Some(&2));
        assert_eq!(summary.categories.get("profile"), Some(&1));
    }

    #[test]
    fn categories_tally_by_exact_match_and_ignore_text_components() {
        let samples = parse_samples(
            &rows(json!([
                {"kind": "Match", "note": "first", "score": 0.5},
                {"kind": "match", "score": 0.7},
                {"kind": "Match", "score": 0.9}
            ])),
            "kind",
        )
        .expect("parse");
        let summary = summarize(&samples);

        assert_eq!(summary.categories.get("Match"), Some(&2));
        assert_eq!(summary.categories.get("match"), Some(&1));
        assert!(!summary.components.contains_key("note"));
        assert!(!summary.components.contains_key("kind"));
        assert_eq!(summary.components["score"].n, 3);
    }

    #[test]
    fn parse_samples_rejects_non_object_rows() {
        let err = parse_samples(&rows(json!([{"a": 1}, 5])), "category").expect_err("bad row");
        assert!(err.to_string().contains("sample row 1"));
    }
}
