//! `nexus serve`: start the HTTP gateway.

use std::path::Path;

pub async fn run(config_path: Option<&Path>, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("NEXUS Gateway");
    println!("   Listening:  {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:      {}", config.default_model);
    println!("   Knowledge:  {} -> {}", config.knowledge.repo_url, config.knowledge.dir.display());
    println!("   Workspace:  {}", config.workspace_dir.display());
    if !config.has_api_key() {
        println!("   ⚠️  No API key: set GLM_API_KEY to enable chat");
    }

    nexus_gateway::start(config).await?;

    Ok(())
}
