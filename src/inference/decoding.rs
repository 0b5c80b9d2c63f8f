use anyhow::{bail, Result};
use candle_core::{Device, Tensor, D};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use rand::random;
use tracing::debug;

use crate::inference::generation_config::{DecodingStrategy, GenerationConfig};
use crate::inference::logits::mask_logits;

/// Special token ids of the decoder side of a model
#[derive(Debug, Clone, Copy)]
pub struct SequenceTokens {
    pub decoder_start: u32,
    pub eos: u32,
}

/// Runs the decoding loop of `config` on top of `step`, which maps the decoder sequence
/// produced so far to the logits of the next token.
///
/// The returned sequence starts with the decoder start token and ends with the end of
/// sequence token unless `max_length` was reached first.
pub fn decode_sequence<F>(
    config: &GenerationConfig,
    tokens: SequenceTokens,
    step: F,
) -> Result<Vec<u32>>
where
    F: FnMut(&[u32]) -> Result<Vec<f32>>,
{
    match config.strategy {
        DecodingStrategy::Sampling { top_k, top_p, seed } => {
            let processor = LogitsProcessor::from_sampling(
                seed.unwrap_or(random()),
                Sampling::TopKThenTopP {
                    k: top_k,
                    p: top_p,
                    temperature: 1.0,
                },
            );
            sample(config, tokens, processor, step)
        }
        DecodingStrategy::BeamSearch {
            num_beams,
            length_penalty,
        } => beam_search(config, tokens, num_beams, length_penalty, step),
    }
}

fn sample<F>(
    config: &GenerationConfig,
    tokens: SequenceTokens,
    mut processor: LogitsProcessor,
    mut step: F,
) -> Result<Vec<u32>>
where
    F: FnMut(&[u32]) -> Result<Vec<f32>>,
{
    let mut sequence = vec![tokens.decoder_start];
    while sequence.len() < config.max_length {
        let mut logits = step(&sequence)?;
        mask_logits(
            &mut logits,
            &sequence,
            tokens.eos,
            config.min_length,
            config.no_repeat_ngram_size,
        );
        let logits = Tensor::new(logits.as_slice(), &Device::Cpu)?;
        let next_token = processor.sample(&logits)?;
        sequence.push(next_token);
        if next_token == tokens.eos {
            break;
        }
    }
    Ok(sequence)
}

struct Beam {
    tokens: Vec<u32>,
    score: f32,
}

/// Finished hypotheses, at most `num_beams` of them, scored by length-normalized log prob
struct BeamHypotheses {
    num_beams: usize,
    length_penalty: f32,
    hypotheses: Vec<(f32, Vec<u32>)>,
}

impl BeamHypotheses {
    fn new(num_beams: usize, length_penalty: f32) -> Self {
        Self {
            num_beams,
            length_penalty,
            hypotheses: Vec::with_capacity(num_beams + 1),
        }
    }

    fn normalize(&self, sum_logprobs: f32, length: usize) -> f32 {
        sum_logprobs / (length as f32).powf(self.length_penalty)
    }

    fn len(&self) -> usize {
        self.hypotheses.len()
    }

    fn worst_score(&self) -> f32 {
        self.hypotheses
            .iter()
            .map(|(score, _)| *score)
            .fold(f32::INFINITY, f32::min)
    }

    fn add(&mut self, tokens: Vec<u32>, length: usize, sum_logprobs: f32) {
        let score = self.normalize(sum_logprobs, length);
        if self.len() < self.num_beams || score > self.worst_score() {
            self.hypotheses.push((score, tokens));
            if self.len() > self.num_beams {
                self.hypotheses.sort_by(|a, b| b.0.total_cmp(&a.0));
                self.hypotheses.truncate(self.num_beams);
            }
        }
    }

    fn is_done(&self, best_sum_logprobs: f32, current_length: usize, early_stopping: bool) -> bool {
        if self.len() < self.num_beams {
            return false;
        }
        if early_stopping {
            return true;
        }
        self.worst_score() >= self.normalize(best_sum_logprobs, current_length)
    }

    fn best(self) -> Option<Vec<u32>> {
        self.hypotheses
            .into_iter()
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, tokens)| tokens)
    }
}

/// The `k` most likely next tokens with their log probabilities, masked tokens left out
fn top_log_probs(logits: &[f32], k: usize) -> Result<Vec<(u32, f32)>> {
    let logits = Tensor::new(logits, &Device::Cpu)?;
    let log_probs = candle_nn::ops::log_softmax(&logits, D::Minus1)?;
    let order = log_probs.arg_sort_last_dim(false)?.to_vec1::<u32>()?;
    let log_probs = log_probs.to_vec1::<f32>()?;
    Ok(order
        .into_iter()
        .map(|token| (token, log_probs[token as usize]))
        .filter(|(_, log_prob)| log_prob.is_finite())
        .take(k)
        .collect())
}

fn beam_search<F>(
    config: &GenerationConfig,
    tokens: SequenceTokens,
    num_beams: usize,
    length_penalty: f32,
    mut step: F,
) -> Result<Vec<u32>>
where
    F: FnMut(&[u32]) -> Result<Vec<f32>>,
{
    let num_beams = num_beams.max(1);
    let mut finished = BeamHypotheses::new(num_beams, length_penalty);
    let mut beams = vec![Beam {
        tokens: vec![tokens.decoder_start],
        score: 0.0,
    }];

    // All live beams share the same length
    while beams[0].tokens.len() < config.max_length {
        let mut candidates: Vec<(f32, usize, u32)> = Vec::new();
        for (index, beam) in beams.iter().enumerate() {
            let mut logits = step(&beam.tokens)?;
            mask_logits(
                &mut logits,
                &beam.tokens,
                tokens.eos,
                config.min_length,
                config.no_repeat_ngram_size,
            );
            for (token, log_prob) in top_log_probs(&logits, 2 * num_beams)? {
                candidates.push((beam.score + log_prob, index, token));
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut next_beams = Vec::with_capacity(num_beams);
        for (rank, (score, index, token)) in candidates.into_iter().enumerate() {
            let parent = &beams[index].tokens;
            if token == tokens.eos {
                if rank < num_beams {
                    let mut hypothesis = parent.clone();
                    hypothesis.push(token);
                    finished.add(hypothesis, parent.len(), score);
                }
                continue;
            }
            let mut next = parent.clone();
            next.push(token);
            next_beams.push(Beam {
                tokens: next,
                score,
            });
            if next_beams.len() == num_beams {
                break;
            }
        }

        if next_beams.is_empty() {
            beams.clear();
            break;
        }
        beams = next_beams;
        if finished.is_done(beams[0].score, beams[0].tokens.len(), config.early_stopping) {
            debug!(
                length = beams[0].tokens.len(),
                "Beam search finished early"
            );
            beams.clear();
            break;
        }
    }

    for beam in beams {
        if finished.len() >= num_beams {
            break;
        }
        let length = beam.tokens.len();
        finished.add(beam.tokens, length, beam.score);
    }
    match finished.best() {
        Some(tokens) => Ok(tokens),
        None => bail!("Beam search produced no hypothesis"),
    }
}
