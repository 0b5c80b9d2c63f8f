use std::fmt;

use serde::Serialize;

const TITLE_PREFIX: &str = "title:";
const INGREDIENTS_PREFIX: &str = "ingredients:";
const DIRECTIONS_PREFIX: &str = "directions:";
const ITEM_SEPARATOR: &str = "--";

/// The category the formatter is currently filling
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Header {
    #[default]
    Unset,
    Recipe,
    Ingredients,
    Directions,
}

impl Header {
    pub fn label(&self) -> &'static str {
        match self {
            Header::Unset => "",
            Header::Recipe => "RECIPE",
            Header::Ingredients => "INGREDIENTS",
            Header::Directions => "DIRECTIONS",
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlockContent {
    Title(String),
    List(Vec<String>),
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: Header,
    pub content: BlockContent,
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            BlockContent::Title(title) => writeln!(f, "[{}]: {}", self.header.label(), title),
            BlockContent::List(items) => {
                writeln!(f, "[{}]:", self.header.label())?;
                let lines: Vec<String> = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| format!("  - {}: {}", i + 1, item))
                    .collect();
                writeln!(f, "{}", lines.join("\n"))
            }
        }
    }
}

/// A recipe ready to be displayed, blocks in the order their headers appeared
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormattedRecipe {
    pub blocks: Vec<Block>,
}

impl fmt::Display for FormattedRecipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.blocks.iter().map(Block::to_string).collect();
        write!(f, "{}", rendered.join("\n"))
    }
}

/// Uppercases the first character and lowercases the rest of the string
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Builds the recipe from post-processed model outputs.
///
/// The active header carries over from one section to the next, and from one output to
/// the next, until another header prefix is found. Never fails: text without any
/// header ends up in list blocks with an empty label.
pub fn format_recipe(texts: &[String]) -> FormattedRecipe {
    let mut header = Header::Unset;
    let mut blocks = Vec::new();

    for text in texts {
        for section in text.split('\n') {
            let mut section = section.trim();
            if let Some(rest) = section.strip_prefix(TITLE_PREFIX) {
                section = rest;
                header = Header::Recipe;
            } else if let Some(rest) = section.strip_prefix(INGREDIENTS_PREFIX) {
                section = rest;
                header = Header::Ingredients;
            } else if let Some(rest) = section.strip_prefix(DIRECTIONS_PREFIX) {
                section = rest;
                header = Header::Directions;
            }

            let content = match header {
                Header::Recipe => BlockContent::Title(capitalize(section.trim())),
                _ => BlockContent::List(
                    section
                        .split(ITEM_SEPARATOR)
                        .map(|item| capitalize(item.trim()))
                        .collect(),
                ),
            };
            blocks.push(Block { header, content });
        }
    }

    FormattedRecipe { blocks }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(texts: &[&str]) -> String {
        let texts: Vec<String> = texts.iter().map(|text| text.to_string()).collect();
        format_recipe(&texts).to_string()
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("chocolate CAKE"), "Chocolate cake");
        assert_eq!(capitalize("1 cup flour"), "1 cup flour");
        assert_eq!(capitalize("éclair"), "Éclair");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_title_block() {
        assert_eq!(render(&["title: chocolate cake"]), "[RECIPE]: Chocolate cake\n");
    }

    #[test]
    fn test_list_block() {
        assert_eq!(
            render(&["ingredients: apple -- banana -- cherry"]),
            "[INGREDIENTS]:\n  - 1: Apple\n  - 2: Banana\n  - 3: Cherry\n"
        );
    }

    #[test]
    fn test_three_sections_in_order() {
        let recipe = format_recipe(&[
            "title: pancakes\ningredients: 2 eggs -- 1 cup milk\ndirections: mix all -- fry".to_string(),
        ]);
        let headers: Vec<Header> = recipe.blocks.iter().map(|block| block.header).collect();
        assert_eq!(
            headers,
            vec![Header::Recipe, Header::Ingredients, Header::Directions]
        );
        assert_eq!(
            recipe.to_string(),
            "[RECIPE]: Pancakes\n\n\
             [INGREDIENTS]:\n  - 1: 2 eggs\n  - 2: 1 cup milk\n\n\
             [DIRECTIONS]:\n  - 1: Mix all\n  - 2: Fry\n"
        );
    }

    #[test]
    fn test_header_persists_for_unprefixed_section() {
        let recipe = format_recipe(&["ingredients: salt\npepper -- oil".to_string()]);
        assert_eq!(recipe.blocks.len(), 2);
        assert_eq!(
            recipe.blocks[1],
            Block {
                header: Header::Ingredients,
                content: BlockContent::List(vec!["Pepper".into(), "Oil".into()]),
            }
        );
    }

    #[test]
    fn test_header_persists_across_outputs() {
        let recipe = format_recipe(&["directions: boil".to_string(), "stir".to_string()]);
        assert_eq!(recipe.blocks[1].header, Header::Directions);
    }

    #[test]
    fn test_unprefixed_section_after_title_is_a_title() {
        assert_eq!(
            render(&["title: soup\nwith croutons"]),
            "[RECIPE]: Soup\n\n[RECIPE]: With croutons\n"
        );
    }

    #[test]
    fn test_no_header_uses_empty_label() {
        assert_eq!(render(&["eggs -- ham"]), "[]:\n  - 1: Eggs\n  - 2: Ham\n");
    }

    #[test]
    fn test_empty_section() {
        assert_eq!(render(&[""]), "[]:\n  - 1: \n");
        assert_eq!(render(&["ingredients:"]), "[INGREDIENTS]:\n  - 1: \n");
    }

    #[test]
    fn test_prefix_only_matches_at_start() {
        let recipe = format_recipe(&["my title: not a header".to_string()]);
        assert_eq!(recipe.blocks[0].header, Header::Unset);
    }

    #[test]
    fn test_no_outputs() {
        assert_eq!(render(&[]), "");
    }
}
