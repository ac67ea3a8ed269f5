//! `nexus sync`: one-shot knowledge mirror refresh.

use nexus_knowledge::{KnowledgeMirror, SyncAction};
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let mirror = KnowledgeMirror::from_config(&config.knowledge);

    println!("NEXUS Knowledge Sync");
    println!("   Remote: {}", mirror.remote_url());
    println!("   Mirror: {}", mirror.path().display());

    match mirror.sync().await? {
        SyncAction::Cloned => println!("\n  ✅ Cloned"),
        SyncAction::Pulled => println!("\n  ✅ Up to date"),
    }

    Ok(())
}
