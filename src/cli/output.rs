//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{MailclassArgs, OutputFormat};
use crate::error::Result;
use crate::model::EpochMetrics;

/// Per-label email and word totals.
#[derive(Debug, Serialize, Deserialize)]
pub struct LabelSummary {
    pub label: String,
    pub emails: usize,
    pub words: usize,
}

/// Count attached to a sender or domain.
#[derive(Debug, Serialize, Deserialize)]
pub struct NamedCount {
    pub name: String,
    pub count: usize,
}

/// Result structure for email statistics.
#[derive(Debug, Serialize, Deserialize)]
pub struct EmailStatsReport {
    pub source: String,
    pub total_emails: usize,
    pub labels: Vec<LabelSummary>,
    pub top_senders: Vec<NamedCount>,
    pub top_domains: Vec<NamedCount>,
}

/// Result structure for dataset construction.
#[derive(Debug, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub cache_file: String,
    pub encoding: String,
    pub examples: usize,
    pub features: usize,
    pub labels: Vec<LabelSummary>,
    pub mean_sequence_length: Option<f64>,
}

/// Result structure for model evaluation.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub model: String,
    pub train_examples: usize,
    pub test_examples: usize,
    pub num_classes: usize,
    pub test_score: f64,
    pub test_accuracy: f64,
    pub epochs: Vec<EpochMetrics>,
    pub predictions: Option<Vec<String>>,
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &MailclassArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &MailclassArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    let value = serde_json::to_value(result)?;
    match std::any::type_name::<T>() {
        name if name.ends_with("EmailStatsReport") => output_stats_human(&value),
        name if name.ends_with("TrainingSummary") => output_training_human(&value),
        _ => output_generic_human(&value),
    }
    Ok(())
}

fn output_stats_human(value: &serde_json::Value) {
    for (key, val) in value.as_object().into_iter().flatten() {
        match key.as_str() {
            "labels" => {
                println!("Labels:");
                for label in val.as_array().into_iter().flatten() {
                    println!(
                        "  {:<24} {:>8} emails {:>10} words",
                        format_value(&label["label"]),
                        format_value(&label["emails"]),
                        format_value(&label["words"])
                    );
                }
            }
            "top_senders" | "top_domains" => {
                println!("{}:", if key == "top_senders" { "Top senders" } else { "Top domains" });
                for entry in val.as_array().into_iter().flatten() {
                    println!(
                        "  {:<40} {:>8}",
                        format_value(&entry["name"]),
                        format_value(&entry["count"])
                    );
                }
            }
            _ => println!("{key}: {}", format_value(val)),
        }
    }
}

fn output_training_human(value: &serde_json::Value) {
    for (key, val) in value.as_object().into_iter().flatten() {
        match key.as_str() {
            "epochs" => {
                for epoch in val.as_array().into_iter().flatten() {
                    let number = epoch["epoch"].as_u64().unwrap_or(0) + 1;
                    let mut line = format!(
                        "  epoch {number:>3}: loss {:.4} acc {:.4}",
                        epoch["loss"].as_f64().unwrap_or(f64::NAN),
                        epoch["accuracy"].as_f64().unwrap_or(f64::NAN)
                    );
                    if let (Some(loss), Some(acc)) =
                        (epoch["val_loss"].as_f64(), epoch["val_accuracy"].as_f64())
                    {
                        line.push_str(&format!(" val_loss {loss:.4} val_acc {acc:.4}"));
                    }
                    println!("{line}");
                }
            }
            "predictions" if val.is_null() => {}
            _ => println!("{key}: {}", format_value(val)),
        }
    }
}

fn output_generic_human(value: &serde_json::Value) {
    match value {
        serde_json::Value::Object(obj) => {
            for (key, val) in obj {
                println!("{key}: {}", format_value(val));
            }
        }
        _ => println!("{}", format_value(value)),
    }
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &MailclassArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

/// Format a JSON value for human output.
pub fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Array(arr) => {
            let formatted_values = arr.iter().map(format_value).collect::<Vec<_>>().join(", ");
            format!("[{formatted_values}]")
        }
        serde_json::Value::Object(obj) => {
            let fields = obj
                .iter()
                .map(|(k, v)| format!("{k}={}", format_value(v)))
                .collect::<Vec<_>>()
                .join(" ");
            format!("{{{fields}}}")
        }
        serde_json::Value::Null => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&json!("work")), "work");
        assert_eq!(format_value(&json!([1, 2])), "[1, 2]");
        assert_eq!(format_value(&json!({"label": "a", "emails": 3})), "{emails=3 label=a}");
        assert_eq!(format_value(&json!(null)), "-");
    }
}
