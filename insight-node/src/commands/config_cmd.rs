//! # Configuration Commands
//!
//! View the effective configuration and generate a template.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use insight_core::config::ConfigLoader;

use crate::load_config;

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (defaults, file and environment merged)
    Show,

    /// Print or write a configuration template
    Template {
        /// Write the template to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration
    Validate,
}

/// Handle configuration commands
pub fn handle_config(action: ConfigAction, config_path: Option<&Path>, json_output: bool) -> Result<()> {
    match action {
        ConfigAction::Show => show_config(config_path, json_output),
        ConfigAction::Template { output, force } => write_template(output.as_deref(), force),
        ConfigAction::Validate => validate_config(config_path, json_output),
    }
}

fn show_config(config_path: Option<&Path>, json_output: bool) -> Result<()> {
    let config = load_config(config_path)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        let text = toml::to_string_pretty(&config).context("Failed to render configuration")?;
        println!("{}", text);
    }
    Ok(())
}

fn write_template(output: Option<&Path>, force: bool) -> Result<()> {
    let template = ConfigLoader::new().create_template();

    let Some(path) = output else {
        print!("{}", template);
        return Ok(());
    };

    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, template).with_context(|| format!("Failed to write {}", path.display()))?;

    println!("✓ Configuration template written to {}", path.display());
    Ok(())
}

fn validate_config(config_path: Option<&Path>, json_output: bool) -> Result<()> {
    load_config(config_path)?;

    if json_output {
        println!("{}", serde_json::json!({ "valid": true }));
    } else {
        println!("✓ Configuration is valid");
    }
    Ok(())
}
