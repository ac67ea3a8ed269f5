//! `nexus init`: write a default config file.

use nexus_config::AppConfig;
use std::path::Path;
use tracing::info;

/// Outcome of [`write_default_config`].
#[derive(Debug, PartialEq, Eq)]
pub enum InitOutcome {
    Created,
    Overwritten,
    KeptExisting,
}

/// Write the default TOML to `path`, creating parent directories.
pub fn write_default_config(path: &Path, force: bool) -> std::io::Result<InitOutcome> {
    let existed = path.exists();
    if existed && !force {
        return Ok(InitOutcome::KeptExisting);
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    info!(path = %path.display(), "Wrote default config");

    Ok(if existed {
        InitOutcome::Overwritten
    } else {
        InitOutcome::Created
    })
}

pub async fn run(config_path: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_path(config_path);

    println!("NEXUS Setup");
    println!("===========\n");

    match write_default_config(&path, force)? {
        InitOutcome::Created => println!("✅ Created config.toml at: {}", path.display()),
        InitOutcome::Overwritten => println!("✅ Overwrote config.toml at: {}", path.display()),
        InitOutcome::KeptExisting => {
            println!("⚠️  Config already exists at: {}", path.display());
            println!("   Edit it manually or re-run with --force.\n");
            return Ok(());
        }
    }

    println!("\n📝 Next steps:");
    println!("   1. Set GLM_API_KEY (or provider.api_key in the file)");
    println!("   2. Run `nexus sync` to fetch the knowledge base");
    println!("   3. Run `nexus serve`");

    Ok(())
}
