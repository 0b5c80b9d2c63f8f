use anyhow::{Error, Result};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, instrument};

use crate::inference::generation_config::GenerationConfig;

/// Marker the model was trained to expect in front of the ingredient list
pub const INPUT_PREFIX: &str = "items: ";

/// Every input is padded or truncated to exactly this many tokens
pub const MAX_INPUT_LENGTH: usize = 256;

/// One input of the encoder, padded to [`MAX_INPUT_LENGTH`]
#[derive(Debug, Clone)]
pub struct EncodedInput {
    pub ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
}

impl EncodedInput {
    /// Ids of the positions the attention mask keeps
    pub fn attended_ids(&self) -> Vec<u32> {
        self.ids
            .iter()
            .zip(&self.attention_mask)
            .filter(|(_, mask)| **mask == 1)
            .map(|(id, _)| *id)
            .collect()
    }
}

/// Requests the adapter refuses before the model is involved
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum InputError {
    #[error("At least one list of ingredients is required")]
    EmptyBatch,
}

/// A pretrained sequence to sequence model
pub trait Seq2SeqModel {
    /// Generates the output token ids of a single encoded input
    fn generate(&self, input: &EncodedInput, config: &GenerationConfig) -> Result<Vec<u32>>;
}

/// Turns ingredient texts into raw model outputs, control tokens included
pub struct InferenceAdapter {
    tokenizer: Tokenizer,
    model: Box<dyn Seq2SeqModel + Send + Sync>,
    config: GenerationConfig,
}

pub fn prefix_inputs(inputs: &[String]) -> Vec<String> {
    inputs
        .iter()
        .map(|input| format!("{INPUT_PREFIX}{input}"))
        .collect()
}

impl InferenceAdapter {
    pub fn new(
        mut tokenizer: Tokenizer,
        model: Box<dyn Seq2SeqModel + Send + Sync>,
        config: GenerationConfig,
    ) -> Result<Self> {
        let pad_token = "<pad>".to_string();
        let pad_id = tokenizer.token_to_id(&pad_token).unwrap_or(0);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_INPUT_LENGTH,
                ..Default::default()
            }))
            .map_err(Error::msg)?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(MAX_INPUT_LENGTH),
            pad_id,
            pad_token,
            ..Default::default()
        }));

        Ok(Self {
            tokenizer,
            model,
            config,
        })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Tokens of the tokenizer flagged as special
    pub fn special_tokens(&self) -> Vec<String> {
        self.tokenizer
            .get_added_tokens_decoder()
            .into_values()
            .filter(|token| token.special)
            .map(|token| token.content)
            .collect()
    }

    /// Prefixes, pads and truncates the inputs. Text beyond the length limit is dropped.
    pub fn encode(&self, inputs: &[String]) -> Result<Vec<EncodedInput>> {
        let encodings = self
            .tokenizer
            .encode_batch(prefix_inputs(inputs), true)
            .map_err(Error::msg)?;

        Ok(encodings
            .into_iter()
            .map(|encoding| EncodedInput {
                ids: encoding.get_ids().to_vec(),
                attention_mask: encoding.get_attention_mask().to_vec(),
            })
            .collect())
    }

    #[instrument(level = "debug", skip_all, fields(inputs = inputs.len()))]
    pub fn generate(&self, inputs: &[String]) -> Result<Vec<String>> {
        if inputs.is_empty() {
            return Err(InputError::EmptyBatch.into());
        }

        let mut outputs = Vec::with_capacity(inputs.len());
        for input in self.encode(inputs)? {
            let output_ids = self.model.generate(&input, &self.config)?;
            debug!(
                input_tokens = input.attended_ids().len(),
                output_tokens = output_ids.len(),
                "Generated sequence"
            );
            let text = self
                .tokenizer
                .decode(&output_ids, false)
                .map_err(Error::msg)?;
            outputs.push(text);
        }
        Ok(outputs)
    }
}
