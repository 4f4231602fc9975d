use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{debug, info};
use vsme_lib::output::VSME_OUTPUT_VERSION;
use vsme_lib::{load_ignore_regions, save_png, CompareOutput, ComparisonEngine, VsmeError, VsmeOutput};

use crate::cli::OutputFormat;
use crate::formatting::{finish, render_error};
use crate::settings::{
    load_config, log_effective_config, resolve_compare_settings, validate_config, FlagSources,
};

/// Run the compare command.
#[allow(clippy::too_many_arguments)]
pub fn run_compare(
    raw_args: &[String],
    config_path: Option<PathBuf>,
    baseline: PathBuf,
    actual: PathBuf,
    tolerance: f64,
    ignore_regions: Option<PathBuf>,
    diff_output: Option<PathBuf>,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let mut config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    resolve_compare_settings(tolerance, &mut config, &FlagSources::from_args(raw_args));
    if let Err(err) = validate_config(&config, config_path.as_deref()) {
        return render_error(err, format, output);
    }
    log_effective_config(config_path.as_deref(), &config);

    for path in [&baseline, &actual] {
        if !path.exists() {
            return render_error(
                VsmeError::config(format!("File not found: {}", path.display())),
                format,
                output,
            );
        }
    }

    let ignore_regions = match ignore_regions {
        Some(path) => match load_ignore_regions(&path) {
            Ok(regions) => regions,
            Err(err) => return render_error(err, format, output),
        },
        None => Vec::new(),
    };
    debug!(ignore_regions = ignore_regions.len(), "comparing images");

    let engine = ComparisonEngine::new(config.comparison.clone());
    let result = engine.compare_files(&baseline, &actual, &ignore_regions);

    let diff_image = match (&diff_output, &result.diff_image) {
        (Some(path), Some(diff)) => {
            if let Err(err) = save_png(diff, &path.to_string_lossy()) {
                return render_error(VsmeError::from(err), format, output);
            }
            info!(path = %path.display(), "diff image written");
            Some(path.clone())
        }
        _ => None,
    };

    let body = VsmeOutput::Compare(CompareOutput {
        version: VSME_OUTPUT_VERSION.to_string(),
        baseline,
        actual,
        tolerance: config.comparison.tolerance,
        result,
        diff_image,
    });
    finish(&body, format, output)
}
