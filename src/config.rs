use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::comparison::ComparisonConfig;
use crate::confidence::ConfidenceConfig;
use crate::error::{Result, VsmeError};
use crate::healing::HealingConfig;
use crate::llm::LlmConfig;
use crate::similarity::{PositionalConfig, VisualConfig};

/// Engine configuration. Every section is optional in the file; missing
/// values fall back to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub comparison: ComparisonConfig,
    pub visual: VisualConfig,
    pub positional: PositionalConfig,
    pub confidence: ConfidenceConfig,
    pub healing: HealingConfig,
    pub llm: LlmConfig,
}

impl Config {
    /// `$HOME/.config/vsme/config.toml`
    pub fn central_config_path() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join(".config").join("vsme").join("config.toml"))
    }

    /// Loads `path` if given, else the central config if it exists, else
    /// defaults. `.yaml`/`.yml` files are YAML, everything else TOML.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(VsmeError::config(format!(
                        "File not found: {}",
                        p.display()
                    )));
                }
                p.to_path_buf()
            }
            None => match Self::central_config_path().filter(|p| p.exists()) {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        let text = std::fs::read_to_string(&path)?;
        Self::parse(&text, &path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self> {
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        if is_yaml {
            serde_yaml::from_str(text)
                .map_err(|e| VsmeError::config(format!("{}: {e}", path.display())))
        } else {
            toml::from_str(text).map_err(|e| VsmeError::config(format!("{}: {e}", path.display())))
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.comparison.validate()?;
        self.confidence.validate()?;
        self.healing.validate()?;

        let v = &self.visual;
        for (name, value) in [
            ("ambiguous_low", v.ambiguous_low),
            ("ambiguous_high", v.ambiguous_high),
            ("ssim_weight", v.ssim_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(VsmeError::config(format!(
                    "visual {name} must be within [0, 1], got {value}"
                )));
            }
        }
        if v.ambiguous_low > v.ambiguous_high {
            return Err(VsmeError::config(
                "visual ambiguous_low must not exceed ambiguous_high",
            ));
        }
        if !(2..=32).contains(&v.hash_size) {
            return Err(VsmeError::config(format!(
                "visual hash_size must be within 2..=32, got {}",
                v.hash_size
            )));
        }
        if v.ssim_window == 0 {
            return Err(VsmeError::config("visual ssim_window must be positive"));
        }
        if !(self.positional.tolerance_radius > 0.0 && self.positional.tolerance_radius <= 1.0) {
            return Err(VsmeError::config(format!(
                "positional tolerance_radius must be within (0, 1], got {}",
                self.positional.tolerance_radius
            )));
        }
        if self.llm.timeout.is_zero() {
            return Err(VsmeError::config("llm timeout must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::ConfidencePreset;
    use crate::types::StrategyKind;
    use std::time::Duration;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert!((cfg.healing.acceptance_threshold - 0.75).abs() < f64::EPSILON);
        assert!((cfg.comparison.minor_ssim_threshold - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_partial_toml_with_durations() {
        let text = r#"
[comparison]
tolerance = 0.2

[confidence]
preset = "accessibility"

[healing]
overall_budget = "45s"
strategy_budget = "750ms"
strategies = ["aria_role", "exact_text", "visual"]

[healing.retry]
max_attempts = 5

[llm]
model = "gpt-4o"
timeout = "10s"
"#;
        let cfg = Config::parse(text, Path::new("vsme.toml")).unwrap();
        assert!((cfg.comparison.tolerance - 0.2).abs() < f64::EPSILON);
        assert_eq!(cfg.comparison.min_region_pixels, 10);
        assert_eq!(cfg.confidence.preset, ConfidencePreset::Accessibility);
        assert_eq!(cfg.healing.overall_budget, Duration::from_secs(45));
        assert_eq!(cfg.healing.strategy_budget, Duration::from_millis(750));
        assert_eq!(cfg.healing.strategies[0], StrategyKind::AriaRole);
        assert_eq!(cfg.healing.retry.max_attempts, 5);
        assert_eq!(cfg.llm.model.as_deref(), Some("gpt-4o"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parses_yaml_by_extension() {
        let text = "healing:\n  acceptance_threshold: 0.8\n  shortcut_threshold: 0.95\n";
        let cfg = Config::parse(text, Path::new("vsme.yml")).unwrap();
        assert!((cfg.healing.acceptance_threshold - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut cfg = Config::default();
        cfg.visual.ambiguous_low = 0.95;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.positional.tolerance_radius = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.comparison.tolerance = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[positional]\ntolerance_radius = 0.4\n").unwrap();
        let cfg = Config::load(Some(&path)).unwrap();
        assert!((cfg.positional.tolerance_radius - 0.4).abs() < f64::EPSILON);
    }
}
