use std::time::Instant;

use anyhow::Result;
use hf_hub::api::sync::Api;
use tracing::{info, instrument};

use crate::config::Config;
use crate::inference::adapter::InferenceAdapter;
use crate::inference::generation_config::GenerationConfig;
use crate::inference::models::model::ModelBase;
use crate::inference::models::t5_recipe::T5RecipeModel;
use crate::recipe::format::{format_recipe, FormattedRecipe};
use crate::recipe::postprocess::{target_postprocessing, SpecialTokens};

#[derive(Debug)]
pub struct GeneratedRecipe {
    pub recipe: FormattedRecipe,
    /// Decoded model outputs, control tokens included
    pub raw: Vec<String>,
    pub inference_time: f64,
}

/// Handle on the loaded model. Created once at startup and only ever read afterwards.
pub struct RecipeService {
    base: ModelBase,
    adapter: InferenceAdapter,
    special_tokens: SpecialTokens,
}

impl From<T5RecipeModel> for RecipeService {
    fn from(model: T5RecipeModel) -> Self {
        RecipeService::new(model.base, model.adapter)
    }
}

impl RecipeService {
    pub fn new(base: ModelBase, adapter: InferenceAdapter) -> Self {
        let special_tokens = SpecialTokens::new(adapter.special_tokens());
        RecipeService {
            base,
            adapter,
            special_tokens,
        }
    }

    /// Fetches the model named by the configuration and loads it. Blocks until done.
    pub fn load(config: &Config) -> Result<Self> {
        let model = T5RecipeModel::new(
            Api::new()?,
            config.model_base(),
            &config.model_files(),
            config.generation_config(),
        )?;
        Ok(model.into())
    }

    pub fn model(&self) -> &ModelBase {
        &self.base
    }

    pub fn generation_config(&self) -> &GenerationConfig {
        self.adapter.config()
    }

    /// Writes a recipe for the ingredients typed by the user
    pub fn generate_recipe(&self, ingredients: &str) -> Result<GeneratedRecipe> {
        self.generate_recipes(&[ingredients.to_string()])
    }

    /// Writes one recipe per ingredient list, all formatted into a single report
    #[instrument(level = "info", skip_all, fields(inputs = ingredients.len()))]
    pub fn generate_recipes(&self, ingredients: &[String]) -> Result<GeneratedRecipe> {
        let start_gen = Instant::now();
        let raw = self.adapter.generate(ingredients)?;
        let inference_time = start_gen.elapsed().as_secs_f64();
        info!(inference_time, "Generated {} recipe(s)", raw.len());

        let texts = target_postprocessing(&raw, &self.special_tokens);
        Ok(GeneratedRecipe {
            recipe: format_recipe(&texts),
            raw,
            inference_time,
        })
    }
}
