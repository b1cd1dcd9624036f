//! Layered configuration: built-in defaults, then `mealwallet.toml` (or the
//! file given with `--config`), then `MEALWALLET__SECTION__KEY` environment
//! variables.
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::application::ServiceOptions;
use crate::domain::PricingPolicy;

const DEFAULT_CONFIG_NAME: &str = "mealwallet";
const ENV_PREFIX: &str = "MEALWALLET";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Database {
    pub path: PathBuf,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            path: PathBuf::from("mealwallet.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Ledger {
    pub auto_confirm_recharges: bool,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            auto_confirm_recharges: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Log {
    pub level: String,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: Database,
    pub ledger: Ledger,
    pub pricing: PricingPolicy,
    pub log: Log,
}

impl Settings {
    /// Load settings. An explicit `path` must exist; the default
    /// `mealwallet.toml` in the working directory is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            pricing: self.pricing,
            auto_confirm_recharges: self.ledger.auto_confirm_recharges,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::default();
        assert_eq!(settings.database.path, PathBuf::from("mealwallet.db"));
        assert!(settings.ledger.auto_confirm_recharges);
        assert_eq!(settings.pricing, PricingPolicy::default());
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn test_file_overrides_only_given_keys() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[ledger]\nauto_confirm_recharges = false\n\n[pricing]\npremium_meal = 12400\n"
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert!(!settings.ledger.auto_confirm_recharges);
        assert_eq!(settings.pricing.premium_meal, 12400);
        assert_eq!(settings.pricing.standard_meal, 5250);
        assert_eq!(settings.database.path, PathBuf::from("mealwallet.db"));

        let options = settings.service_options();
        assert!(!options.auto_confirm_recharges);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/mealwallet.toml"))).is_err());
    }
}
