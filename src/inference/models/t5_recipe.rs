use anyhow::{Error, Result};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use tokenizers::Tokenizer;
use tracing::info;

use crate::inference::adapter::InferenceAdapter;
use crate::inference::generation_config::GenerationConfig;
use crate::inference::models::model::{ModelBase, ModelFiles};
use crate::inference::text_pipeline::TextToTextPipeline;

/// The T5 model fine-tuned to write recipes from a list of ingredients
pub struct T5RecipeModel {
    pub base: ModelBase,
    pub adapter: InferenceAdapter,
}

impl T5RecipeModel {
    pub fn new(
        api: Api,
        base: ModelBase,
        files: &ModelFiles,
        generation_config: GenerationConfig,
    ) -> Result<Self> {
        let repo = api.repo(Repo::with_revision(
            base.repo_id.clone(),
            RepoType::Model,
            base.repo_revision.clone(),
        ));
        info!(
            "Loading {} from {}@{}",
            base.name, base.repo_id, base.repo_revision
        );

        let tokenizer_file = repo.get(&files.tokenizer)?;
        let tokenizer = Tokenizer::from_file(tokenizer_file).map_err(Error::msg)?;
        let pipeline = TextToTextPipeline::with_t5(&repo, &files.config, &files.weights)?;
        let adapter = InferenceAdapter::new(tokenizer, Box::new(pipeline), generation_config)?;

        Ok(T5RecipeModel { base, adapter })
    }
}
