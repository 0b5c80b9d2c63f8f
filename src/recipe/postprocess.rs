/// Marker the model emits between two items of the same list
pub const SOFT_SEPARATOR: &str = "<sep>";

/// Marker the model emits between two sections of a recipe
pub const SECTION_BREAK: &str = "<section>";

/// Substitutions applied after the control tokens have been removed
pub const TOKENS_MAP: [(&str, &str); 2] = [(SOFT_SEPARATOR, "--"), (SECTION_BREAK, "\n")];

/// Control vocabulary of the model that must never reach the display.
///
/// The soft separator and the section break are never part of it, even if a tokenizer
/// flags them as special, otherwise the substitution step would never see them.
#[derive(Debug, Clone)]
pub struct SpecialTokens {
    tokens: Vec<String>,
}

impl SpecialTokens {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tokens: Vec<String> = tokens
            .into_iter()
            .map(Into::into)
            .filter(|token| !token.is_empty() && !is_marker(token))
            .collect();
        tokens.sort();
        tokens.dedup();
        // Longest first so that a token containing another is removed whole
        tokens.sort_by(|a, b| b.len().cmp(&a.len()));
        Self { tokens }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tokens
    }
}

fn is_marker(token: &str) -> bool {
    TOKENS_MAP.iter().any(|(marker, _)| *marker == token)
}

/// Removes every control token and trims the result.
///
/// Runs until nothing changes, so removing a token can never leave another one behind
/// and `skip_special_tokens(skip_special_tokens(x)) == skip_special_tokens(x)`.
pub fn skip_special_tokens(text: &str, special_tokens: &SpecialTokens) -> String {
    let mut text = text.trim().to_string();
    loop {
        let mut stripped = text.clone();
        for token in special_tokens.as_slice() {
            stripped = stripped.replace(token.as_str(), "");
        }
        let stripped = stripped.trim().to_string();
        if stripped == text {
            return text;
        }
        text = stripped;
    }
}

/// Turns raw decoded model outputs into text where list items are separated by `--`
/// and sections by newlines
pub fn target_postprocessing(texts: &[String], special_tokens: &SpecialTokens) -> Vec<String> {
    texts
        .iter()
        .map(|text| {
            let mut text = skip_special_tokens(text, special_tokens);
            for (marker, replacement) in TOKENS_MAP {
                text = text.replace(marker, replacement);
            }
            text
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t5_tokens() -> SpecialTokens {
        SpecialTokens::new(["</s>", "<pad>", "<unk>", "<extra_id_0>", "<extra_id_1>"])
    }

    #[test]
    fn test_skip_special_tokens() {
        let text = "<pad> title: pancakes <section> ingredients: eggs</s><pad><pad>";
        assert_eq!(
            skip_special_tokens(text, &t5_tokens()),
            "title: pancakes <section> ingredients: eggs"
        );
    }

    #[test]
    fn test_skip_special_tokens_is_idempotent() {
        let tokens = t5_tokens();
        for text in [
            "",
            "   ",
            "<pad><pad>",
            "<pa<pad>d> title: soup </s>",
            "<</s>/s>",
            " title: plain text ",
        ] {
            let once = skip_special_tokens(text, &tokens);
            assert_eq!(skip_special_tokens(&once, &tokens), once, "input {text:?}");
        }
    }

    #[test]
    fn test_nested_token_is_removed() {
        assert_eq!(skip_special_tokens("<pa<pad>d>soup", &t5_tokens()), "soup");
    }

    #[test]
    fn test_markers_never_count_as_special() {
        let tokens = SpecialTokens::new(["<pad>", SOFT_SEPARATOR, SECTION_BREAK, "<pad>"]);
        assert_eq!(tokens.as_slice(), ["<pad>".to_string()]);
    }

    #[test]
    fn test_target_postprocessing_substitutes_markers() {
        let raw = vec![
            "<pad> title: omelette <section> ingredients: 2 eggs <sep> salt <section> directions: whisk <sep> fry</s>"
                .to_string(),
        ];
        assert_eq!(
            target_postprocessing(&raw, &t5_tokens()),
            vec!["title: omelette \n ingredients: 2 eggs -- salt \n directions: whisk -- fry"]
        );
    }

    #[test]
    fn test_target_postprocessing_keeps_length() {
        let raw = vec![String::new(), "<pad>".to_string()];
        assert_eq!(target_postprocessing(&raw, &t5_tokens()), vec!["", ""]);
    }
}
