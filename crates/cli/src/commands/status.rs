//! `nexus status`: show configuration and knowledge status.

use nexus_knowledge::{ContextExtractor, ContextReadError};
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_path(config_path);
    let config = super::load_config(config_path)?;

    println!("NEXUS Status");
    println!("============");
    println!("  Config file:  {}", path.display());
    println!("  Provider:     {} ({})", config.provider.name, config.provider.api_url);
    println!("  API key:      {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Model:        {}", config.default_model);
    println!("  Temperature:  {}", config.provider.temperature);
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    println!("  Workspace:    {}", config.workspace_dir.display());
    println!("  Knowledge:    {}", config.knowledge.repo_url);
    println!("  Mirror dir:   {}", config.knowledge.dir.display());

    let extractor = ContextExtractor::from_config(&config.knowledge);
    match extractor.try_extract().await {
        Ok(doc) => println!(
            "  Context:      {} ({} chars{})",
            doc.source().display(),
            doc.len_chars(),
            if doc.was_truncated() { ", truncated" } else { "" }
        ),
        Err(ContextReadError::Missing { path }) => {
            println!("  Context:      {} (missing, run `nexus sync`)", path.display())
        }
        Err(e) => println!("  Context:      {e}"),
    }

    if path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file, run `nexus init` first");
    }

    Ok(())
}
