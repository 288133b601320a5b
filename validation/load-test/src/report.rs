//! Results reporting and formatting.

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

use crate::error::LoadTestResult;
use crate::metrics::RunResult;

/// Per-cell console output in addition to the summary line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Summary line only
    #[default]
    Line,
    /// Summary line plus a table
    Table,
    /// Summary line plus pretty JSON
    Json,
}

/// Formats run results for output.
pub struct ResultsReport;

impl ResultsReport {
    /// One-line summary printed after every cell. Undefined values print as `NaN`.
    pub fn summary_line(result: &RunResult) -> String {
        format!(
            "n={} conc={} max_tokens={} p50={:.3} p95={:.3} p99={:.3} p999={:.3} mean={:.3} \
             wall_sec={:.3} rps={:.3} tok_per_sec={:.3} errors={}",
            result.n,
            result.concurrency,
            result.max_tokens,
            result.p50,
            result.p95,
            result.p99,
            result.p999,
            result.mean,
            result.wall_secs,
            result.requests_per_second,
            result.tokens_per_second,
            result.errors
        )
    }

    /// Format a result as a console table. Latencies in milliseconds.
    pub fn format_table(result: &RunResult) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![format!(
                "Load Test Results: concurrency {} / max_tokens {}",
                result.concurrency, result.max_tokens
            )]);

        let attempts = result.attempts();
        let success_rate = if attempts > 0 {
            format!("{:.1}%", (result.n as f64 / attempts as f64) * 100.0)
        } else {
            "n/a".to_string()
        };

        table.add_row(vec!["Wall time:", &format!("{:.2}s", result.wall_secs)]);
        table.add_row(vec!["Attempts:", &format!("{}", attempts)]);
        table.add_row(vec!["Errors:", &format!("{}", result.errors)]);
        table.add_row(vec!["Success Rate:", &success_rate]);

        table.add_row(vec!["", ""]);
        table.add_row(vec!["Latency (ms)", "p50 / p95 / p99 / p99.9 / mean"]);
        table.add_row(vec![
            "",
            &format!(
                "{:.1} / {:.1} / {:.1} / {:.1} / {:.1}",
                result.p50 * 1000.0,
                result.p95 * 1000.0,
                result.p99 * 1000.0,
                result.p999 * 1000.0,
                result.mean * 1000.0
            ),
        ]);

        table.add_row(vec!["", ""]);
        table.add_row(vec![
            "Requests/sec:",
            &format!("{:.2}", result.requests_per_second),
        ]);
        table.add_row(vec![
            "Tokens/sec (approx):",
            &format!("{:.1}", result.tokens_per_second),
        ]);

        table.to_string()
    }

    /// Format a result as JSON. Undefined values become `null`.
    pub fn format_json(result: &RunResult) -> LoadTestResult<String> {
        Ok(serde_json::to_string_pretty(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::aggregate;

    #[test]
    fn test_summary_line() {
        let result = aggregate(&[0.1, 0.2, 0.3], 1, 1.5, 2, 16);
        let line = ResultsReport::summary_line(&result);
        assert!(line.starts_with("n=3 conc=2 max_tokens=16 p50=0.200"));
        assert!(line.contains("rps=2.000"));
        assert!(line.contains("tok_per_sec=32.000"));
        assert!(line.ends_with("errors=1"));
    }

    #[test]
    fn test_summary_line_with_nan() {
        let result = aggregate(&[], 5, 0.0, 4, 64);
        let line = ResultsReport::summary_line(&result);
        assert!(line.contains("p50=NaN"));
        assert!(line.contains("mean=NaN"));
        assert!(line.contains("rps=NaN"));
        assert!(line.ends_with("errors=5"));
    }

    #[test]
    fn test_format_json_uses_column_names() {
        let result = aggregate(&[], 2, 1.0, 1, 16);
        let json: serde_json::Value =
            serde_json::from_str(&ResultsReport::format_json(&result).unwrap()).unwrap();
        assert_eq!(json["n"], 0);
        assert_eq!(json["errors"], 2);
        assert!(json["p50"].is_null());
        assert_eq!(json["rps"], 0.0);
        assert!(json.get("tok_per_sec").is_some());
    }

    #[test]
    fn test_format_table() {
        let result = aggregate(&[0.1, 0.2], 0, 1.0, 8, 256);
        let table = ResultsReport::format_table(&result);
        assert!(table.contains("concurrency 8 / max_tokens 256"));
        assert!(table.contains("100.0%"));
    }
}
