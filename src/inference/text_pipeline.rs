use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::t5::{Config as T5Config, T5ForConditionalGeneration};
use hf_hub::api::sync::ApiRepo;
use tracing::{debug, info};

use crate::inference::adapter::{EncodedInput, Seq2SeqModel};
use crate::inference::decoding::{decode_sequence, SequenceTokens};
use crate::inference::generation_config::GenerationConfig;

// Follows
// https://github.com/huggingface/candle/blob/main/candle-examples/examples/t5/main.rs
pub struct TextToTextPipeline {
    // The decoder keeps its KV cache inside the model
    model: Mutex<T5ForConditionalGeneration>,
    device: Device,
    tokens: SequenceTokens,
}

impl TextToTextPipeline {
    /// Loads a T5 model from a `config.json` and a safetensors or PyTorch checkpoint
    pub fn with_t5(repo: &ApiRepo, config_filename: &str, weights_filename: &str) -> Result<Self> {
        let config_file = repo.get(config_filename)?;
        let weights_file = repo.get(weights_filename)?;

        let mut config: T5Config = serde_json::from_str(&std::fs::read_to_string(config_file)?)?;
        config.use_cache = true;

        let device = Device::Cpu;
        let vb = var_builder(&weights_file, &device)?;
        let model = T5ForConditionalGeneration::load(vb, &config)?;
        info!(
            layers = config.num_layers,
            vocab_size = config.vocab_size,
            "Loaded T5 weights from {}",
            weights_file.display()
        );

        let decoder_start = config
            .decoder_start_token_id
            .unwrap_or(config.pad_token_id) as u32;
        Ok(TextToTextPipeline {
            model: Mutex::new(model),
            device,
            tokens: SequenceTokens {
                decoder_start,
                eos: config.eos_token_id as u32,
            },
        })
    }
}

fn var_builder(weights_file: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let is_safetensors = weights_file
        .extension()
        .map_or(false, |extension| extension == "safetensors");
    let vb = if is_safetensors {
        // Safety: the file is owned by the hub cache and not modified while mapped
        unsafe { VarBuilder::from_mmaped_safetensors(&[weights_file], DType::F32, device)? }
    } else {
        VarBuilder::from_pth(weights_file, DType::F32, device)?
    };
    Ok(vb)
}

impl Seq2SeqModel for TextToTextPipeline {
    fn generate(&self, input: &EncodedInput, config: &GenerationConfig) -> Result<Vec<u32>> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| anyhow!("Model lock poisoned"))?;
        model.clear_kv_cache();

        // Only the positions kept by the attention mask reach the encoder
        let input_ids = input.attended_ids();
        let input_ids = Tensor::new(input_ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let encoder_output = model.encode(&input_ids)?;

        let start_gen = std::time::Instant::now();
        let mut cached: Vec<u32> = Vec::new();
        let output = decode_sequence(config, self.tokens, |tokens| {
            // Feed a single token when the cache holds everything before it
            let incremental = !cached.is_empty()
                && tokens.len() == cached.len() + 1
                && tokens.starts_with(&cached);
            let decoder_ids = if incremental {
                &tokens[tokens.len() - 1..]
            } else {
                model.clear_kv_cache();
                tokens
            };
            let decoder_ids = Tensor::new(decoder_ids, &self.device)?.unsqueeze(0)?;
            let logits = model
                .decode(&decoder_ids, &encoder_output)?
                .squeeze(0)?
                .to_dtype(DType::F32)?
                .to_vec1::<f32>()?;
            cached = tokens.to_vec();
            Ok(logits)
        });
        model.clear_kv_cache();

        let output = output?;
        debug!(
            tokens = output.len(),
            seconds = start_gen.elapsed().as_secs_f64(),
            "Decoded sequence"
        );
        Ok(output)
    }
}
