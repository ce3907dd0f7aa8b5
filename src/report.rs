// Report formatting
// Plain-text and JSON renderings of digest and comparison results

use std::ops::Range;

use crate::compare::{ComparisonOutcome, ComparisonReport};
use crate::diff::DiffOffset;
use crate::hash::{DigestResult, DigestValue};

/// Collapse sorted offsets into contiguous half-open runs.
pub fn group_runs(offsets: &[DiffOffset]) -> Vec<Range<DiffOffset>> {
    let mut runs: Vec<Range<DiffOffset>> = Vec::new();
    for &offset in offsets {
        match runs.last_mut() {
            Some(run) if run.end == offset => run.end = offset + 1,
            _ => runs.push(offset..offset + 1),
        }
    }
    runs
}

/// Format a digest result as aligned `algorithm  digest` lines
pub fn digest_to_plain_text(result: &DigestResult) -> String {
    let mut output = String::new();
    output.push_str(&format!("{}\n", result.path.display()));

    if let Some(error) = result.error() {
        output.push_str(&format!("  Error: {}\n", error));
        return output;
    }

    let width = result
        .algorithms()
        .map(|alg| alg.name().len())
        .max()
        .unwrap_or(0);
    for (alg, value) in &result.digests {
        if let DigestValue::Hex(hex) = value {
            output.push_str(&format!("  {:<width$}  {}\n", alg.name(), hex, width = width));
        }
    }
    output
}

pub fn digest_to_json(result: &DigestResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(result)
}

/// Format a comparison report as plain text
pub fn comparison_to_plain_text(report: &ComparisonReport) -> String {
    let mut output = String::new();
    match &report.outcome {
        ComparisonOutcome::Compared { offsets } if offsets.is_empty() => {
            output.push_str("Files are identical\n");
        }
        ComparisonOutcome::Compared { offsets } => {
            let runs = group_runs(offsets);
            output.push_str(&format!(
                "{} differing bytes in {} regions\n",
                offsets.len(),
                runs.len()
            ));
            for run in runs {
                if run.len() == 1 {
                    output.push_str(&format!("  0x{:08x}\n", run.start));
                } else {
                    output.push_str(&format!(
                        "  0x{:08x}..0x{:08x} ({} bytes)\n",
                        run.start,
                        run.end,
                        run.len()
                    ));
                }
            }
        }
        ComparisonOutcome::ShortCircuited { algorithm } => {
            output.push_str(&format!("Files are identical ({} digests match)\n", algorithm));
        }
        ComparisonOutcome::Disallowed { reason } => {
            output.push_str(&format!("Comparison skipped: {}\n", reason));
        }
        ComparisonOutcome::Failed { error } => {
            output.push_str(&format!("Comparison failed: {}\n", error));
        }
    }
    output
}

/// Format a comparison report as JSON
pub fn comparison_to_json(report: &ComparisonReport) -> Result<String, serde_json::Error> {
    #[derive(serde::Serialize)]
    struct JsonOutput<'a> {
        generation: u64,
        status: &'static str,
        identical: Option<bool>,
        offsets: Option<&'a [DiffOffset]>,
        reason: Option<String>,
    }

    let (status, reason) = match &report.outcome {
        ComparisonOutcome::Compared { .. } => ("compared", None),
        ComparisonOutcome::ShortCircuited { algorithm } => {
            ("short_circuited", Some(format!("{} digests match", algorithm)))
        }
        ComparisonOutcome::Disallowed { reason } => ("skipped", Some(first_line(&reason.to_string()))),
        ComparisonOutcome::Failed { error } => ("failed", Some(first_line(&error.to_string()))),
    };

    let output = JsonOutput {
        generation: report.generation,
        status,
        identical: report.outcome.offsets().map(|o| o.is_empty()),
        offsets: report.outcome.offsets(),
        reason,
    };
    serde_json::to_string_pretty(&output)
}

// Error messages carry a trailing suggestion line; JSON keeps only the message
fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or_default().to_string()
}
