use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{EmitMode, EnrichError, RunOptions, Strategy};

pub(crate) const DEFAULT_INPUT_PATH: &str = "assets/js/archetypes-data.js";
pub(crate) const DEFAULT_BINDING: &str = "archetypes";
pub(crate) const DEFAULT_API_BASE: &str = "https://db.ygoprodeck.com/api/v7";
const DEFAULT_REQUEST_DELAY_MS: u64 = 100;
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct EnrichConfig {
    pub(crate) input_path: PathBuf,
    /// Defaults to `input_path`.
    pub(crate) output_path: Option<PathBuf>,
    pub(crate) strategy: Strategy,
    /// Defaults to the strategy's natural mode.
    pub(crate) emit: Option<EmitMode>,
    /// Defaults to on when regenerating, off when patching.
    pub(crate) refresh: Option<bool>,
    pub(crate) binding: String,
    pub(crate) api_base: String,
    pub(crate) request_delay_ms: u64,
    pub(crate) timeout_ms: u64,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            output_path: None,
            strategy: Strategy::Direct,
            emit: None,
            refresh: None,
            binding: DEFAULT_BINDING.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl EnrichConfig {
    pub(crate) fn output_path(&self) -> &Path {
        self.output_path.as_deref().unwrap_or(&self.input_path)
    }

    pub(crate) fn emit_mode(&self) -> EmitMode {
        self.emit.unwrap_or(self.strategy.default_emit())
    }

    pub(crate) fn refresh(&self) -> bool {
        self.refresh
            .unwrap_or(self.emit_mode() == EmitMode::Regenerate)
    }

    pub(crate) fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }

    fn apply_overrides(&mut self, opts: &RunOptions) {
        if let Some(input) = &opts.input {
            self.input_path = input.clone();
        }
        if let Some(output) = &opts.output {
            self.output_path = Some(output.clone());
        }
        if let Some(strategy) = opts.strategy {
            self.strategy = strategy;
        }
        if let Some(emit) = opts.emit {
            self.emit = Some(emit);
        }
        if let Some(refresh) = opts.refresh_override() {
            self.refresh = Some(refresh);
        }
        if let Some(binding) = &opts.binding {
            self.binding = binding.clone();
        }
        if let Some(api_base) = &opts.api_base {
            self.api_base = api_base.clone();
        }
        if let Some(delay) = opts.delay_ms {
            self.request_delay_ms = delay;
        }
    }

    pub(crate) fn validate(&self) -> Result<(), EnrichError> {
        let ident = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$")
            .map_err(|e| EnrichError::Config(e.to_string()))?;
        if !ident.is_match(&self.binding) {
            return Err(EnrichError::Config(format!(
                "binding {:?} is not a JavaScript identifier",
                self.binding
            )));
        }
        Url::parse(&self.api_base)
            .map_err(|e| EnrichError::Config(format!("invalid api_base {:?}: {e}", self.api_base)))?;
        Ok(())
    }
}

pub(crate) fn load_config_file(path: &Path) -> Result<EnrichConfig, EnrichError> {
    let data = std::fs::read_to_string(path).map_err(|e| EnrichError::io(path, e))?;
    serde_json::from_str(&data)
        .map_err(|e| EnrichError::Config(format!("{}: {e}", path.display())))
}

/// Defaults, then the config file if one was given, then command-line flags.
pub(crate) fn resolve_config(opts: &RunOptions) -> Result<EnrichConfig, EnrichError> {
    let mut config = match &opts.config {
        Some(path) => load_config_file(path)?,
        None => EnrichConfig::default(),
    };
    config.apply_overrides(opts);
    config.validate()?;
    Ok(config)
}
