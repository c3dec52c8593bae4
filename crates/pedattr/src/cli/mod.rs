//! Command implementations and the settings shared between them.

pub mod backbones;
pub mod config;
pub mod output;
pub mod score;
pub mod stream;

#[cfg(test)]
mod test_support;

use clap::Args;
use pedattr_core::Config;
use std::path::{Path, PathBuf};

/// Command-line overrides applied on top of the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Dataset the checkpoint was trained on (peta, rap, pa100k)
    #[arg(long, global = true)]
    pub dataset: Option<String>,

    /// Backbone name (see `pedattr backbones`)
    #[arg(long, global = true)]
    pub backbone: Option<String>,

    /// Checkpoint file (.safetensors)
    #[arg(long, global = true)]
    pub checkpoint: Option<PathBuf>,

    /// Device: auto, cpu, cuda:N or metal:N
    #[arg(long, global = true)]
    pub device: Option<String>,

    /// Never use an accelerator
    #[arg(long, global = true)]
    pub force_cpu: bool,

    /// Copy log output into a timestamped file under logging.log_dir
    #[arg(long, global = true)]
    pub redirect: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(dataset) = &self.dataset {
            config.dataset.name = dataset.clone();
        }
        if let Some(backbone) = &self.backbone {
            config.model.backbone = backbone.clone();
        }
        if let Some(checkpoint) = &self.checkpoint {
            config.model.checkpoint = checkpoint.clone();
        }
        if let Some(device) = &self.device {
            config.model.device = device.clone();
        }
        if self.force_cpu {
            config.model.force_cpu = true;
        }
        if self.redirect {
            config.logging.redirect_stdout = true;
        }
    }
}

/// The config the commands run with: file (or defaults), then command-line
/// overrides, validated as a whole.
pub fn effective_config(path: Option<&Path>, overrides: &Overrides) -> anyhow::Result<Config> {
    let mut config = load_config(path)?;
    overrides.apply(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid command-line override: {e}"))?;
    Ok(config)
}

/// Load the config file given on the command line, or the default one.
///
/// An explicit path must load; a broken default config only warns.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = path {
        return Config::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()));
    }
    Ok(match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `pedattr config path`."
            );
            Config::default()
        }
    })
}
