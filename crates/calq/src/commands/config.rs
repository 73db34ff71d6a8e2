//! Config command implementation.
//!
//! Shows the configuration the query engine runs with.

use caldav_query::config::DEFAULT_CONFIG;
use caldav_query::QueryConfig;

use super::{CommandContext, Result};

/// Executes the config show command.
pub fn execute_show(ctx: &CommandContext) -> Result<()> {
    let path = ctx.config_path()?;
    let config = QueryConfig::load(&path)?;

    if ctx.json_output {
        let output = serde_json::json!({
            "path": path.display().to_string(),
            "exists": path.exists(),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("File: {}", path.display());
        println!("Exists: {}\n", path.exists());
        if path.exists() {
            print!("{}", render_config(&config)?);
        } else {
            println!("(No config file exists. Defaults in effect:)\n");
            print!("{DEFAULT_CONFIG}");
        }
    }

    Ok(())
}

/// Executes the config path command.
pub fn execute_path(ctx: &CommandContext) -> Result<()> {
    let path = ctx.config_path()?;

    if ctx.json_output {
        let output = serde_json::json!({
            "path": path.display().to_string(),
            "exists": path.exists(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", path.display());
    }

    Ok(())
}

/// Renders the effective configuration as TOML.
fn render_config(config: &QueryConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}
