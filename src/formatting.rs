use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use vsme_lib::{ErrorOutput, VsmeError, VsmeOutput};

use crate::cli::OutputFormat;

/// Write output in the requested format and map it to an exit code.
pub fn finish(body: &VsmeOutput, format: OutputFormat, output: Option<PathBuf>) -> ExitCode {
    match write_output(body, format, output.clone()) {
        Ok(()) => ExitCode::from(body.exit_code()),
        Err(err) => render_error(
            VsmeError::Io(io::Error::other(format!("Failed to write output: {err}"))),
            format,
            output,
        ),
    }
}

/// Write output in the requested format.
pub fn write_output(
    body: &VsmeOutput,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => write_json_output(body, output.as_deref())?,
        OutputFormat::Pretty => write_pretty_output(body, output.as_deref())?,
    };
    Ok(())
}

/// Render an error and return the appropriate exit code.
pub fn render_error(err: VsmeError, format: OutputFormat, output: Option<PathBuf>) -> ExitCode {
    let payload = VsmeOutput::Error(ErrorOutput::new(err.to_payload()));

    match format {
        OutputFormat::Json => {
            let content =
                serde_json::to_string(&payload).unwrap_or_else(|_| "{\"mode\":\"error\"}".into());
            if let Some(path) = output {
                if let Err(write_err) = std::fs::write(&path, &content) {
                    eprintln!("Failed to write error output: {}", write_err);
                    println!("{content}");
                }
            } else {
                println!("{content}");
            }
        }
        OutputFormat::Pretty => {
            if let Err(write_err) = write_pretty_output(&payload, output.as_deref()) {
                eprintln!("Failed to write error output: {}", write_err);
            }
        }
    };

    // Reserve exit code 2 for fatal/errors; failed checks use 1.
    ExitCode::from(2)
}

/// Write JSON output to file or stdout.
fn write_json_output(
    body: &VsmeOutput,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = serde_json::to_string(body)?;
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Write pretty output to file or stdout.
fn write_pretty_output(body: &VsmeOutput, output: Option<&Path>) -> io::Result<()> {
    let use_human = output.is_none() && std::io::stdout().is_terminal();

    if use_human {
        println!("{}", format_pretty(body, true));
        return Ok(());
    }

    // Non-tty or file output: keep JSON shape for pipelines/files.
    let content =
        serde_json::to_string_pretty(body).unwrap_or_else(|_| "{\"mode\":\"error\"}".to_string());
    if let Some(path) = output {
        std::fs::write(path, &content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Format output for human consumption in a terminal.
pub fn format_pretty(body: &VsmeOutput, colorize: bool) -> String {
    let mut buf = String::new();
    match body {
        VsmeOutput::Compare(out) => {
            let r = &out.result;
            let status = if r.passed { "PASS" } else { "FAIL" };
            let status = color(status, if r.passed { "32" } else { "31" }, colorize);
            writeln!(buf, "{status} Visual check").ok();
            writeln!(
                buf,
                "Baseline: {}  Actual: {}",
                out.baseline.display(),
                out.actual.display()
            )
            .ok();
            if let Some(message) = &r.error_message {
                writeln!(buf, "Error: {message}").ok();
                return buf;
            }
            if let Some(classification) = r.classification {
                writeln!(buf, "Classification: {classification:?}").ok();
            }
            writeln!(
                buf,
                "Difference: {:.3}% ({} of {} px), SSIM {:.4}",
                r.difference_percentage, r.pixels_different, r.total_pixels, r.ssim_score
            )
            .ok();
            if !r.regions.is_empty() {
                writeln!(buf, "Regions (max 5 of {}):", r.regions.len()).ok();
                for region in r.regions.iter().take(5) {
                    writeln!(
                        buf,
                        "- {}x{} at ({}, {}), {:.1}% changed",
                        region.width,
                        region.height,
                        region.x,
                        region.y,
                        region.difference_score * 100.0
                    )
                    .ok();
                }
            }
            if let Some(path) = &out.diff_image {
                writeln!(buf, "Diff image: {}", path.display()).ok();
            }
        }
        VsmeOutput::Heal(out) => {
            let o = &out.outcome;
            let status = if o.success { "HEALED" } else { "NOT HEALED" };
            let status = color(status, confidence_color_code(o.success, o.confidence), colorize);
            writeln!(buf, "{status} {} ({})", out.original_locator, o.reason).ok();
            if let Some(locator) = &out.healed_locator {
                let via = o
                    .strategy_used
                    .map(|s| format!(" via {s}"))
                    .unwrap_or_default();
                writeln!(buf, "Locator: {locator}{via}").ok();
            }
            writeln!(
                buf,
                "Confidence: {:.3}, verified: {}, {} ms",
                o.confidence, o.verified, o.elapsed_ms
            )
            .ok();
            if !o.attempts.is_empty() {
                writeln!(buf, "Attempts:").ok();
                for a in &o.attempts {
                    let best = a
                        .best_confidence
                        .map(|c| format!("{c:.3}"))
                        .unwrap_or_else(|| "-".to_string());
                    writeln!(
                        buf,
                        "- {:16} {:?} (candidates {}, best {}, {} ms)",
                        a.strategy.as_str(),
                        a.status,
                        a.candidates,
                        best,
                        a.elapsed_ms
                    )
                    .ok();
                }
            }
        }
        VsmeOutput::Baseline(out) => {
            let header = color("[BASELINE]", "36", colorize);
            writeln!(buf, "{header} {} ({} versions)", out.name, out.entries.len()).ok();
            for entry in &out.entries {
                writeln!(
                    buf,
                    "- {} {} {}",
                    entry.id,
                    entry.approved_at.to_rfc3339(),
                    entry.image_path.display()
                )
                .ok();
            }
        }
        VsmeOutput::Error(out) => {
            let header = color("[ERROR]", "31", colorize);
            writeln!(buf, "{} {}", header, out.error.message).ok();
            if let Some(remediation) = &out.error.remediation {
                writeln!(buf, "Hint: {}", remediation).ok();
            }
        }
    }
    buf
}

/// Apply ANSI color codes when enabled.
fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

fn confidence_color_code(success: bool, confidence: f64) -> &'static str {
    if success {
        "32" // green
    } else if confidence >= 0.5 {
        "33" // yellow
    } else {
        "31" // red
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsme_lib::output::{CompareOutput, HealOutput, VSME_OUTPUT_VERSION};
    use vsme_lib::types::{
        AttemptStatus, ChangeClassification, ComparisonResult, DifferenceRegion, HealingOutcome,
        OutcomeReason, StrategyAttempt, StrategyKind,
    };

    #[test]
    fn render_error_always_returns_fatal_exit_code() {
        let code = render_error(
            VsmeError::Config("boom".to_string()),
            OutputFormat::Json,
            None,
        );
        assert_eq!(code, ExitCode::from(2));
    }

    #[test]
    fn format_pretty_lists_regions() {
        let output = VsmeOutput::Compare(CompareOutput {
            version: VSME_OUTPUT_VERSION.to_string(),
            baseline: "home.png".into(),
            actual: "home-new.png".into(),
            tolerance: 0.1,
            result: ComparisonResult {
                passed: false,
                difference_percentage: 12.5,
                ssim_score: 0.71,
                pixels_different: 1250,
                total_pixels: 10000,
                regions: vec![DifferenceRegion {
                    x: 10,
                    y: 20,
                    width: 50,
                    height: 25,
                    difference_score: 1.0,
                    pixel_count: 1250,
                }],
                classification: Some(ChangeClassification::ContentChange),
                error_message: None,
                diff_image: None,
            },
            diff_image: Some("diff.png".into()),
        });

        let pretty = format_pretty(&output, false);
        assert!(pretty.starts_with("FAIL Visual check"));
        assert!(pretty.contains("ContentChange"));
        assert!(pretty.contains("50x25 at (10, 20)"));
        assert!(pretty.contains("Diff image: diff.png"));
    }

    #[test]
    fn format_pretty_shows_attempt_log() {
        let output = VsmeOutput::Heal(HealOutput {
            version: VSME_OUTPUT_VERSION.to_string(),
            original_locator: "#submit-btn".into(),
            healed_locator: None,
            outcome: HealingOutcome {
                success: false,
                candidate: None,
                strategy_used: None,
                confidence: 0.42,
                verified: false,
                reason: OutcomeReason::AllStrategiesExhausted,
                attempts: vec![StrategyAttempt {
                    strategy: StrategyKind::Positional,
                    status: AttemptStatus::LowConfidence,
                    candidates: 2,
                    best_confidence: Some(0.42),
                    elapsed_ms: 3,
                }],
                elapsed_ms: 9,
            },
        });

        let pretty = format_pretty(&output, false);
        assert!(pretty.contains("NOT HEALED #submit-btn (AllStrategiesExhausted)"));
        assert!(pretty.contains("positional"));
        assert!(pretty.contains("LowConfidence"));
        assert!(pretty.contains("best 0.420"));
    }
}
