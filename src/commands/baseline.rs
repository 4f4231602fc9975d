use std::process::ExitCode;

use tracing::info;
use vsme_lib::output::VSME_OUTPUT_VERSION;
use vsme_lib::{BaselineLog, BaselineOutput, VsmeError, VsmeOutput};

use crate::cli::BaselineAction;
use crate::formatting::{finish, render_error};

/// Run a baseline subcommand.
pub fn run_baseline(action: BaselineAction) -> ExitCode {
    match action {
        BaselineAction::Approve {
            log,
            name,
            image,
            format,
        } => {
            if !image.exists() {
                return render_error(
                    VsmeError::config(format!("File not found: {}", image.display())),
                    format,
                    None,
                );
            }
            let mut entries = match BaselineLog::load(&log) {
                Ok(entries) => entries,
                Err(err) => return render_error(err, format, None),
            };
            let id = entries.append(&name, image);
            if let Err(err) = entries.save(&log) {
                return render_error(err, format, None);
            }
            info!(%id, name = %name, "baseline approved");
            respond(&entries, name, format)
        }
        BaselineAction::History { log, name, format } => {
            let entries = match BaselineLog::load(&log) {
                Ok(entries) => entries,
                Err(err) => return render_error(err, format, None),
            };
            respond(&entries, name, format)
        }
    }
}

fn respond(log: &BaselineLog, name: String, format: crate::cli::OutputFormat) -> ExitCode {
    let entries = log.history(&name).into_iter().cloned().collect();
    let body = VsmeOutput::Baseline(BaselineOutput {
        version: VSME_OUTPUT_VERSION.to_string(),
        name,
        entries,
    });
    finish(&body, format, None)
}
