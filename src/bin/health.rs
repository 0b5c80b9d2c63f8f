use anyhow::{bail, Result};
use reqwest::Url;

/// Exits with an error unless the URL given as first argument answers with a success status
fn main() -> Result<()> {
    let Some(url) = std::env::args().nth(1) else {
        bail!("Missing URL argument, e.g. http://127.0.0.1:25566/health")
    };
    let url = Url::parse(&url)?;

    let response = reqwest::blocking::get(url)?;
    if !response.status().is_success() {
        bail!("Request failed with status {}", response.status())
    }

    Ok(())
}
