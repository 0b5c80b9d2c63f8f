/// Tokens that would complete an n-gram of size `ngram_size` already present in `tokens`
pub fn banned_ngram_tokens(tokens: &[u32], ngram_size: usize) -> Vec<u32> {
    if ngram_size == 0 || tokens.len() + 1 < ngram_size {
        return Vec::new();
    }
    let prefix = &tokens[tokens.len() + 1 - ngram_size..];
    let mut banned: Vec<u32> = tokens
        .windows(ngram_size)
        .filter(|window| &window[..ngram_size - 1] == prefix)
        .map(|window| window[ngram_size - 1])
        .collect();
    banned.sort_unstable();
    banned.dedup();
    banned
}

/// Applies the length and repetition rules of a decoding step in place
pub fn mask_logits(
    logits: &mut [f32],
    tokens: &[u32],
    eos_token_id: u32,
    min_length: usize,
    no_repeat_ngram_size: usize,
) {
    if tokens.len() < min_length {
        if let Some(logit) = logits.get_mut(eos_token_id as usize) {
            *logit = f32::NEG_INFINITY;
        }
    }
    for token in banned_ngram_tokens(tokens, no_repeat_ngram_size) {
        if let Some(logit) = logits.get_mut(token as usize) {
            *logit = f32::NEG_INFINITY;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banned_ngram_tokens() {
        // "1 2 3 1 2" must not continue with 3
        assert_eq!(banned_ngram_tokens(&[1, 2, 3, 1, 2], 3), vec![3]);
        assert_eq!(banned_ngram_tokens(&[1, 2, 3, 4, 5], 3), Vec::<u32>::new());
        assert_eq!(banned_ngram_tokens(&[7, 7], 2), vec![7]);
    }

    #[test]
    fn test_banned_ngram_tokens_short_or_disabled() {
        assert!(banned_ngram_tokens(&[1], 3).is_empty());
        assert!(banned_ngram_tokens(&[1, 1, 1], 0).is_empty());
        // A unigram rule bans every token seen so far
        assert_eq!(banned_ngram_tokens(&[4, 2, 4], 1), vec![2, 4]);
    }

    #[test]
    fn test_mask_logits_blocks_eos_until_min_length() {
        let mut logits = vec![0.5, 1.0, 2.0];
        mask_logits(&mut logits, &[0, 2], 1, 3, 0);
        assert_eq!(logits[1], f32::NEG_INFINITY);

        let mut logits = vec![0.5, 1.0, 2.0];
        mask_logits(&mut logits, &[0, 2, 2], 1, 3, 0);
        assert_eq!(logits[1], 1.0);
    }
}
