use std::path::Path;

use tracing::debug;
use vsme_lib::{Config, ConfidencePreset, StrategyKind, VsmeError};

/// Tracks which CLI flags were explicitly provided vs. defaulted.
#[derive(Debug, Default)]
pub struct FlagSources {
    pub tolerance: bool,
    pub threshold: bool,
}

impl FlagSources {
    pub fn from_args(args: &[String]) -> Self {
        Self {
            tolerance: flag_present(args, "--tolerance"),
            threshold: flag_present(args, "--threshold"),
        }
    }
}

/// Checks if a flag was present in the command-line arguments.
pub fn flag_present(args: &[String], flag: &str) -> bool {
    args.iter()
        .any(|arg| arg == flag || arg.starts_with(&format!("{flag}=")))
}

/// Applies compare flags onto the config, preferring CLI when flags are present.
pub fn resolve_compare_settings(cli_tolerance: f64, config: &mut Config, flags: &FlagSources) {
    if flags.tolerance {
        config.comparison.tolerance = cli_tolerance;
    }
}

/// Applies heal flags onto the config, preferring CLI when flags are present.
///
/// Raising the acceptance threshold above the shortcut threshold also lifts
/// the shortcut so the pair stays consistent.
pub fn resolve_heal_settings(
    cli_threshold: f64,
    cli_preset: Option<ConfidencePreset>,
    cli_strategies: Option<Vec<StrategyKind>>,
    config: &mut Config,
    flags: &FlagSources,
) {
    if flags.threshold {
        config.healing.acceptance_threshold = cli_threshold;
        if config.healing.shortcut_threshold < cli_threshold {
            config.healing.shortcut_threshold = cli_threshold;
        }
    }
    if let Some(preset) = cli_preset {
        config.confidence.preset = preset;
        config.confidence.weights = None;
    }
    if let Some(strategies) = cli_strategies {
        config.healing.strategies = strategies;
    }
}

/// Load config from a file, central config, or return defaults.
/// Priority: explicit path > ~/.config/vsme/config.toml > defaults
pub fn load_config(path: Option<&Path>) -> Result<Config, VsmeError> {
    let cfg = Config::load(path).map_err(|e| {
        let loc = path
            .map(|p| p.display().to_string())
            .or_else(|| Config::central_config_path().map(|p| p.display().to_string()))
            .unwrap_or_else(|| "defaults".to_string());
        VsmeError::Config(format!("Failed to read config {}: {}", loc, e))
    })?;
    validate_config(&cfg, path)?;
    Ok(cfg)
}

/// Validates after CLI overrides were applied.
pub fn validate_config(cfg: &Config, path: Option<&Path>) -> Result<(), VsmeError> {
    cfg.validate().map_err(|e| {
        let prefix = path
            .map(|p| format!("Invalid config ({}): {}", p.display(), e))
            .unwrap_or_else(|| format!("Invalid config: {}", e));
        VsmeError::Config(prefix)
    })
}

/// Log effective settings (visible with --verbose).
pub fn log_effective_config(config_path: Option<&Path>, config: &Config) {
    let source = config_path
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "defaults/built-in".to_string());
    debug!(
        source = %source,
        tolerance = config.comparison.tolerance,
        acceptance = config.healing.acceptance_threshold,
        shortcut = config.healing.shortcut_threshold,
        preset = ?config.confidence.preset,
        strategies = ?config.healing.strategies,
        overall_budget = ?config.healing.overall_budget,
        "effective config"
    );
}
