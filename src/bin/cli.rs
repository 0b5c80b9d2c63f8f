use std::io::BufRead;

use anyhow::Result;
use clap::Parser;
use clap_serde_derive::ClapSerde;
use tracing::error;

use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::recipe::display::{RecipeDisplay, TextPanel};
use crate::recipe::service::RecipeService;
use crate::telemetry::init_telemetry;

#[allow(dead_code)]
#[path = "../config.rs"]
mod config;
#[allow(dead_code)]
#[path = "../inference/mod.rs"]
mod inference;
#[allow(dead_code)]
#[path = "../recipe/mod.rs"]
mod recipe;
#[allow(dead_code)]
#[path = "../telemetry.rs"]
mod telemetry;

const EXIT_COMMAND: &str = "exit";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env, default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,

    /// Generate a single recipe for these ingredients and exit
    #[arg(short, long)]
    ingredients: Option<String>,

    /// Configuration options
    #[command(flatten)]
    pub opt_config: <Config as ClapSerde>::Opt,
}

fn main() -> Result<()> {
    init_telemetry();

    let args = Args::parse();
    let config = match Config::load(&args.config_file, args.opt_config) {
        Ok(config) => config,
        Err(err) => exit_err!(1, "{:#}", err),
    };

    println!("Loading the recipe model, this may take a while...");
    let service = match RecipeService::load(&config) {
        Ok(service) => service,
        Err(err) => exit_err!(1, "Failed to load the model: {:#}", err),
    };
    let mut panel = TextPanel::new(std::io::stdout());

    if let Some(ingredients) = args.ingredients {
        return on_generate(&service, &ingredients, &mut panel);
    }

    let mut stdin = std::io::stdin().lock();
    loop {
        println!("Enter your available ingredients, one empty line to generate or `{EXIT_COMMAND}` to quit:");
        let Some(ingredients) = read_ingredients(&mut stdin)? else {
            break;
        };
        if let Err(err) = on_generate(&service, &ingredients, &mut panel) {
            error!("Failed to generate a recipe: {:#}", err);
            panel.replace(&format!("Failed to generate a recipe: {err:#}"))?;
        }
    }
    Ok(())
}

/// Reads lines up to the first empty one. An empty line on its own submits `"\n"`.
/// `None` once the user asks to exit or the input is closed.
fn read_ingredients<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut ingredients = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok((!ingredients.is_empty()).then_some(ingredients));
        }
        let trimmed = line.trim();
        if ingredients.is_empty() && trimmed == EXIT_COMMAND {
            return Ok(None);
        }
        if trimmed.is_empty() {
            // Nothing typed still generates, from an empty list
            if ingredients.is_empty() {
                ingredients.push('\n');
            }
            return Ok(Some(ingredients));
        }
        ingredients.push_str(line.trim_end_matches(['\r', '\n']));
        ingredients.push('\n');
    }
}

fn on_generate(service: &RecipeService, ingredients: &str, display: &mut impl RecipeDisplay) -> Result<()> {
    let generated = service.generate_recipe(ingredients)?;
    display.replace(&generated.recipe.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::recipe::service::tests::{test_service, PANCAKES, PANCAKES_RECIPE};

    #[test]
    fn test_read_ingredients() {
        let mut input = Cursor::new("2 eggs\nflour\r\n\nmilk\nexit\n");
        assert_eq!(
            read_ingredients(&mut input).unwrap(),
            Some("2 eggs\nflour\n".to_string())
        );
        // `exit` only counts on its own
        assert_eq!(
            read_ingredients(&mut input).unwrap(),
            Some("milk\nexit\n".to_string())
        );
        assert_eq!(read_ingredients(&mut input).unwrap(), None);
    }

    #[test]
    fn test_empty_line_submits_empty_list() {
        let mut input = Cursor::new("\n\r\neggs\n");
        assert_eq!(read_ingredients(&mut input).unwrap(), Some("\n".to_string()));
        assert_eq!(read_ingredients(&mut input).unwrap(), Some("\n".to_string()));
        assert_eq!(read_ingredients(&mut input).unwrap(), Some("eggs\n".to_string()));
        assert_eq!(read_ingredients(&mut input).unwrap(), None);
    }

    #[test]
    fn test_read_ingredients_exit() {
        let mut input = Cursor::new("exit\neggs\n");
        assert_eq!(read_ingredients(&mut input).unwrap(), None);
    }

    #[test]
    fn test_on_generate_replaces_panel() {
        let service = test_service(&PANCAKES);
        let mut panel = TextPanel::new(Vec::new());
        panel.replace("previous recipe").unwrap();
        on_generate(&service, "eggs\nflour\n", &mut panel).unwrap();
        assert_eq!(panel.contents(), PANCAKES_RECIPE);
    }
}
