use std::path::Path;

use zappy_core::domain::{UploadError, UploadOutcome};
use zappy_core::ports::IUploadObserver;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Trait for formatting CLI output
pub trait OutputFormatter: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("{}", message);
    }
    fn print_json(&self, _value: &serde_json::Value) {
        // Human formatter doesn't print JSON
    }
}

/// JSON output formatter, one object per line
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"level": "info", "message": message})
        );
    }
    fn print_json(&self, value: &serde_json::Value) {
        println!("{}", value);
    }
}

pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}

/// Observer that reports upload activity through an [`OutputFormatter`]
pub struct ConsoleObserver {
    format: OutputFormat,
    formatter: Box<dyn OutputFormatter>,
}

impl ConsoleObserver {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            formatter: get_formatter(format == OutputFormat::Json),
        }
    }
}

/// JSON record for one file decision
pub fn outcome_record(path: &Path, bucket: &str, outcome: UploadOutcome) -> serde_json::Value {
    serde_json::json!({
        "event": "outcome",
        "path": path.display().to_string(),
        "bucket": bucket,
        "outcome": outcome,
    })
}

/// JSON record for one failed file
pub fn failure_record(path: &Path, bucket: &str, error: &UploadError) -> serde_json::Value {
    serde_json::json!({
        "event": "failure",
        "path": path.display().to_string(),
        "bucket": bucket,
        "error": error.to_string(),
    })
}

impl IUploadObserver for ConsoleObserver {
    fn on_outcome(&self, path: &Path, bucket: &str, outcome: UploadOutcome) {
        match self.format {
            OutputFormat::Json => self
                .formatter
                .print_json(&outcome_record(path, bucket, outcome)),
            OutputFormat::Human => self.formatter.success(&outcome.describe(path, bucket)),
        }
    }

    fn on_failure(&self, path: &Path, bucket: &str, error: &UploadError) {
        match self.format {
            OutputFormat::Json => self
                .formatter
                .print_json(&failure_record(path, bucket, error)),
            OutputFormat::Human => self.formatter.warn(&format!(
                "{} could not be processed for {}: {}",
                path.display(),
                bucket,
                error
            )),
        }
    }

    fn on_status(&self, message: &str) {
        self.formatter.info(message);
    }

    fn on_error(&self, message: &str) {
        self.formatter.error(message);
    }
}
