use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Decoding strategy picked when the configuration is written, never per request
#[derive(ValueEnum, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Beam,
    #[default]
    Sampling,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum DecodingStrategy {
    /// Deterministic search over `num_beams` hypotheses
    BeamSearch { num_beams: usize, length_penalty: f32 },
    /// Stochastic top-k then top-p sampling
    Sampling {
        top_k: usize,
        top_p: f64,
        seed: Option<u64>,
    },
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    /// Upper bound of the decoder sequence, start token included
    pub max_length: usize,
    /// The end of sequence token is blocked until the decoder sequence is this long
    pub min_length: usize,
    /// Size of the n-grams that may only occur once, 0 disables the rule
    pub no_repeat_ngram_size: usize,
    /// Stop beam search as soon as enough hypotheses are finished
    pub early_stopping: bool,
    #[serde(flatten)]
    pub strategy: DecodingStrategy,
}

impl GenerationConfig {
    pub fn beam_search() -> Self {
        Self {
            max_length: 512,
            min_length: 64,
            no_repeat_ngram_size: 3,
            early_stopping: true,
            strategy: DecodingStrategy::BeamSearch {
                num_beams: 5,
                length_penalty: 1.5,
            },
        }
    }

    pub fn sampling(seed: Option<u64>) -> Self {
        Self {
            max_length: 512,
            min_length: 64,
            no_repeat_ngram_size: 3,
            early_stopping: false,
            strategy: DecodingStrategy::Sampling {
                top_k: 60,
                top_p: 0.95,
                seed,
            },
        }
    }

    /// Beam search is deterministic and ignores `seed`
    pub fn with_kind(kind: StrategyKind, seed: Option<u64>) -> Self {
        match kind {
            StrategyKind::Beam => Self::beam_search(),
            StrategyKind::Sampling => Self::sampling(seed),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::with_kind(StrategyKind::default(), None)
    }
}
