use std::path::Path;

use anyhow::Result;
use clap_serde_derive::ClapSerde;
use serde::Deserialize;

use crate::inference::generation_config::{GenerationConfig, StrategyKind};
use crate::inference::models::model::{ModelBase, ModelFiles};

#[derive(ClapSerde, Deserialize, Debug)]
pub struct Config {
    /// The address the listener binds to
    #[arg(short, long, env, default_value = "0.0.0.0")]
    pub(crate) address: String,

    /// The port the listener binds to
    #[arg(short, long, env, default_value = "25566")]
    pub(crate) port: u16,

    /// The model repository on the Hugging Face hub
    #[arg(long, env, default_value = "flax-community/t5-recipe-generation")]
    pub(crate) repo_id: String,

    /// The revision of the model repository
    #[arg(long, env, default_value = "main")]
    pub(crate) revision: String,

    /// The model configuration file in the repository
    #[arg(long, env, default_value = "config.json")]
    pub(crate) model_config_file: String,

    /// The tokenizer file in the repository
    #[arg(long, env, default_value = "tokenizer.json")]
    pub(crate) tokenizer_file: String,

    /// The weights file in the repository, safetensors or PyTorch
    #[arg(long, env, default_value = "pytorch_model.bin")]
    pub(crate) weights_file: String,

    /// The decoding strategy used for every generation
    #[arg(long, env, value_enum, default_value = "sampling")]
    pub(crate) strategy: StrategyKind,

    /// Seed of the sampling strategy, random when unset
    #[arg(long, env)]
    pub(crate) seed: Option<u64>,
}

pub const DEFAULT_CONFIG_FILE: &str = "RecipeGenerator.toml";

impl Config {
    /// Reads `path` and lets `opt_config` override it. Only the default file may be missing.
    pub fn load(path: &str, opt_config: <Config as ClapSerde>::Opt) -> Result<Self> {
        match Config::from_toml(path) {
            Ok(config) => Ok(config.merge(opt_config)),
            Err(_) if path == DEFAULT_CONFIG_FILE && !Path::new(path).exists() => {
                Ok(Config::default().merge(opt_config))
            }
            Err(err) => Err(err.context(format!("Failed to read configuration file {path}"))),
        }
    }

    pub fn from_toml(path: &str) -> Result<Self> {
        let str = std::fs::read_to_string(path)?;
        let config = toml::from_str(&str)?;
        Ok(config)
    }

    pub fn model_base(&self) -> ModelBase {
        ModelBase {
            name: "T5 Recipe Generation".into(),
            license: "Apache-2.0".into(),
            repo_id: self.repo_id.clone(),
            repo_revision: self.revision.clone(),
        }
    }

    pub fn model_files(&self) -> ModelFiles {
        ModelFiles {
            config: self.model_config_file.clone(),
            tokenizer: self.tokenizer_file.clone(),
            weights: self.weights_file.clone(),
        }
    }

    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig::with_kind(self.strategy, self.seed)
    }
}
