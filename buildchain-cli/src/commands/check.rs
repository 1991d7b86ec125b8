//! Connection test

use anyhow::{Context, Result};
use buildchain_client::JenkinsClient;
use buildchain_runner::report::{EXIT_CONFIG, EXIT_SUCCESS};
use colored::*;

use crate::config::Config;

/// Connects to the server, reports its version and checks the crumb issuer
pub async fn handle_test(config: &Config) -> Result<i32> {
    let configuration = config.load_configuration()?;
    let client = JenkinsClient::from_config(&configuration).context("Failed to create CI client")?;

    println!("Connecting to {} as {}", client.base_url().bold(), configuration.credential.username);

    match client.server_version().await {
        Ok(version) => println!(
            "  {} Connected (Jenkins {})",
            "✓".green(),
            version.as_deref().unwrap_or("version unknown")
        ),
        Err(e) => {
            println!("  {} {}", "✗".red(), e);
            return Ok(EXIT_CONFIG);
        }
    }

    match client.fetch_crumb().await {
        Ok(Some(crumb)) => println!("  {} Crumb issued ({})", "✓".green(), crumb.field),
        Ok(None) => println!("  {} No crumb issuer, CSRF protection disabled", "•".yellow()),
        Err(e) => {
            println!("  {} {}", "✗".red(), e);
            return Ok(EXIT_CONFIG);
        }
    }

    Ok(EXIT_SUCCESS)
}
