use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use vsme_lib::{ConfidencePreset, StrategyKind};

#[derive(Parser)]
#[command(name = "vsme")]
#[command(
    version,
    about = "Visual Similarity & Matching Engine - visual regression checks and self-healing locators",
    long_about = "Visual Similarity & Matching Engine (VSME)\n\nModes:\n- compare: diff a screenshot against its baseline, extract changed regions and classify the change.\n- heal: find the element a broken locator used to match on a captured page and propose a stable replacement.\n- baseline: approve new baseline versions and inspect their history.\n\nUse --help on any subcommand for details."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose (debug) logging on stderr")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML or YAML) with comparison/healing defaults; CLI flags override config"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare a screenshot against its baseline
    Compare {
        #[arg(long, help = "Approved baseline image")]
        baseline: PathBuf,

        #[arg(long, help = "Freshly captured image")]
        actual: PathBuf,

        #[arg(
            long,
            default_value = "0.1",
            help = "Per-pixel color distance (0-1) above which a pixel counts as different"
        )]
        tolerance: f64,

        #[arg(
            long,
            help = "Path to JSON array of {x,y,width,height} regions to ignore (values can be px or 0-1 normalized)"
        )]
        ignore_regions: Option<PathBuf>,

        #[arg(long, help = "Write the diff image (PNG) here when the images differ")]
        diff_output: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },
    /// Heal a broken element locator against a captured page
    Heal {
        #[arg(long, help = "Page snapshot JSON (elements plus optional screenshot)")]
        page: PathBuf,

        #[arg(long, help = "Element description JSON recorded for the broken locator")]
        element: PathBuf,

        #[arg(long, help = "The broken locator (defaults to the description's \"locator\" field)")]
        locator: Option<String>,

        #[arg(long, help = "JSON-lines healing history file (read for bias, appended on finish)")]
        history: Option<PathBuf>,

        #[arg(long, help = "Enable the generative strategy (needs an API key)")]
        llm: bool,

        #[arg(long, value_enum, help = "Confidence weight preset")]
        preset: Option<PresetArg>,

        #[arg(
            long,
            default_value = "0.75",
            help = "Acceptance threshold for a healed locator (0-1)"
        )]
        threshold: f64,

        #[arg(
            long,
            value_delimiter = ',',
            help = "Strategy order (exact_text,aria_role,stable_attribute,visual,positional,generative)"
        )]
        strategies: Option<Vec<StrategyKind>>,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },
    /// Manage the baseline version log
    Baseline {
        #[command(subcommand)]
        action: BaselineAction,
    },
}

#[derive(Subcommand)]
pub enum BaselineAction {
    /// Append a new approved version of a named baseline
    Approve {
        #[arg(long, help = "Baseline log file (created if missing)")]
        log: PathBuf,

        #[arg(long, help = "Baseline name, e.g. checkout-page")]
        name: String,

        #[arg(long, help = "Approved image path")]
        image: PathBuf,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,
    },
    /// List the versions of a named baseline, newest first
    History {
        #[arg(long, help = "Baseline log file")]
        log: PathBuf,

        #[arg(long, help = "Baseline name")]
        name: String,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum, Debug)]
pub enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Clone, Copy, ValueEnum, Debug, PartialEq, Eq)]
pub enum PresetArg {
    Balanced,
    Accessibility,
    #[value(alias = "visual")]
    VisualFirst,
}

impl From<PresetArg> for ConfidencePreset {
    fn from(value: PresetArg) -> Self {
        match value {
            PresetArg::Balanced => ConfidencePreset::Balanced,
            PresetArg::Accessibility => ConfidencePreset::Accessibility,
            PresetArg::VisualFirst => ConfidencePreset::VisualFirst,
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_defaults() {
        let cli = Cli::parse_from(["vsme", "compare", "--baseline", "a.png", "--actual", "b.png"]);
        assert!(!cli.verbose);
        match cli.command {
            Commands::Compare {
                tolerance,
                ignore_regions,
                diff_output,
                format,
                output,
                ..
            } => {
                assert!((tolerance - 0.1).abs() < f64::EPSILON);
                assert!(ignore_regions.is_none());
                assert!(diff_output.is_none());
                assert!(matches!(format, OutputFormat::Json));
                assert!(output.is_none());
            }
            _ => panic!("expected compare command"),
        }
    }

    #[test]
    fn heal_accepts_overrides() {
        let cli = Cli::parse_from([
            "vsme",
            "--verbose",
            "heal",
            "--page",
            "page.json",
            "--element",
            "element.json",
            "--locator",
            "#submit-btn",
            "--llm",
            "--preset",
            "visual",
            "--threshold",
            "0.8",
            "--strategies",
            "aria_role,exact_text",
            "--config",
            "vsme.toml",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("vsme.toml")));
        match cli.command {
            Commands::Heal {
                locator,
                llm,
                preset,
                threshold,
                strategies,
                history,
                ..
            } => {
                assert_eq!(locator.as_deref(), Some("#submit-btn"));
                assert!(llm);
                assert_eq!(preset, Some(PresetArg::VisualFirst));
                assert!((threshold - 0.8).abs() < f64::EPSILON);
                assert_eq!(
                    strategies,
                    Some(vec![StrategyKind::AriaRole, StrategyKind::ExactText])
                );
                assert!(history.is_none());
            }
            _ => panic!("expected heal command"),
        }
    }

    #[test]
    fn baseline_history_parses() {
        let cli = Cli::parse_from([
            "vsme", "baseline", "history", "--log", "b.json", "--name", "home",
        ]);
        match cli.command {
            Commands::Baseline {
                action: BaselineAction::History { name, .. },
            } => assert_eq!(name, "home"),
            _ => panic!("expected baseline history"),
        }
    }
}
