use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vsme_lib::output::VSME_OUTPUT_VERSION;
use vsme_lib::{
    ConfidenceModel, ConfidencePreset, ElementDescription, HealOutput, HealingContext,
    HealingEvent, HealingOrchestrator, JsonlHistoryStore, OpenAiLanguageModel, ProgressCallback,
    SnapshotDriver, StrategyKind, VsmeError, VsmeOutput,
};

use crate::cli::OutputFormat;
use crate::formatting::{finish, render_error};
use crate::settings::{
    load_config, log_effective_config, resolve_heal_settings, validate_config, FlagSources,
};

/// Element description file: the recorded evidence plus, optionally, the
/// locator it belonged to.
#[derive(Debug, Deserialize)]
struct ElementFile {
    #[serde(default)]
    locator: Option<String>,
    #[serde(flatten)]
    description: ElementDescription,
}

fn load_element(path: &Path) -> Result<ElementFile, VsmeError> {
    if !path.exists() {
        return Err(VsmeError::config(format!(
            "File not found: {}",
            path.display()
        )));
    }
    let data = std::fs::read_to_string(path)?;
    let mut element: ElementFile = serde_json::from_str(&data)?;
    // Relative reference patches live next to the description file.
    if let Some(patch) = element.description.reference_patch_path.as_mut() {
        if patch.is_relative() {
            if let Some(dir) = path.parent() {
                *patch = dir.join(&*patch);
            }
        }
    }
    Ok(element)
}

/// Run the heal command.
#[allow(clippy::too_many_arguments)]
pub async fn run_heal(
    raw_args: &[String],
    config_path: Option<PathBuf>,
    verbose: bool,
    page: PathBuf,
    element: PathBuf,
    locator: Option<String>,
    history: Option<PathBuf>,
    llm: bool,
    preset: Option<ConfidencePreset>,
    threshold: f64,
    strategies: Option<Vec<StrategyKind>>,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let mut config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    resolve_heal_settings(
        threshold,
        preset,
        strategies,
        &mut config,
        &FlagSources::from_args(raw_args),
    );
    if let Err(err) = validate_config(&config, config_path.as_deref()) {
        return render_error(err, format, output);
    }
    log_effective_config(config_path.as_deref(), &config);

    let driver = match SnapshotDriver::from_file(&page) {
        Ok(driver) => driver,
        Err(err) => return render_error(err, format, output),
    };
    let element = match load_element(&element) {
        Ok(element) => element,
        Err(err) => return render_error(err, format, output),
    };
    let Some(original_locator) = locator.or(element.locator) else {
        return render_error(
            VsmeError::config("No locator given: pass --locator or add \"locator\" to the element file"),
            format,
            output,
        );
    };

    let model = match ConfidenceModel::new(config.confidence.clone()) {
        Ok(model) => model,
        Err(err) => return render_error(err, format, output),
    };
    let mut orchestrator = HealingOrchestrator::new(Arc::new(driver), model)
        .with_visual_config(config.visual)
        .with_positional_config(config.positional);

    if llm {
        match OpenAiLanguageModel::from_config(&config.llm) {
            Ok(client) => orchestrator = orchestrator.with_language_model(Arc::new(client)),
            Err(err) => return render_error(err, format, output),
        }
    } else if config.healing.strategies.contains(&StrategyKind::Generative) {
        debug!("generative strategy will be skipped; pass --llm to enable it");
    }
    if let Some(path) = history {
        orchestrator = orchestrator.with_history(Arc::new(JsonlHistoryStore::new(path)));
    }
    if verbose {
        let progress: ProgressCallback = Arc::new(|event: &HealingEvent| match event {
            HealingEvent::StrategyStarted(kind) => eprintln!("Trying {kind}\u{2026}"),
            HealingEvent::StrategyFinished(attempt) => eprintln!(
                "{} finished: {:?} ({} candidates)",
                attempt.strategy, attempt.status, attempt.candidates
            ),
            HealingEvent::Verification { locator, verified } => {
                eprintln!("Verified {locator}: {verified}")
            }
            HealingEvent::ScoringStarted { .. } => {}
        });
        orchestrator = orchestrator.with_progress(progress);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling healing");
            on_interrupt.cancel();
        }
    });

    let ctx = HealingContext::new(original_locator.clone(), element.description)
        .with_config(config.healing);
    let result = orchestrator.heal(&ctx, &cancel).await;
    interrupt.abort();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => return render_error(err, format, output),
    };
    let body = VsmeOutput::Heal(HealOutput {
        version: VSME_OUTPUT_VERSION.to_string(),
        original_locator,
        healed_locator: outcome.locator().map(str::to_string),
        outcome,
    });
    finish(&body, format, output)
}
