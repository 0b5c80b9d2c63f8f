use std::io::Write;

use anyhow::Result;

/// Somewhere a recipe can be shown
pub trait RecipeDisplay {
    /// Replaces whatever is shown with `text`
    fn replace(&mut self, text: &str) -> Result<()>;
}

/// Read-only text panel printed to a writer, e.g. the terminal
pub struct TextPanel<W: Write> {
    writer: W,
    contents: String,
}

impl<W: Write> TextPanel<W> {
    pub fn new(writer: W) -> Self {
        TextPanel {
            writer,
            contents: String::new(),
        }
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }
}

impl<W: Write> RecipeDisplay for TextPanel<W> {
    fn replace(&mut self, text: &str) -> Result<()> {
        self.contents.clear();
        self.contents.push_str(text);
        writeln!(self.writer, "{}", "-".repeat(30))?;
        writeln!(self.writer, "{}", self.contents)?;
        self.writer.flush()?;
        Ok(())
    }
}
