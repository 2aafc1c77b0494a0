//! Command-line interface for Brushwork.
//!
//! With no subcommand the binary starts the HTTP server. Subcommands work
//! offline against the configuration file:
//! - `config check` - Validate configuration file
//! - `quote <file>` - Price a JSON list of areas with the shop's rates

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::engine::pricing::{
    one_decimal, price_estimate, whole_units, Area, PricingSettings, Quote, SettingsInput,
};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "brushwork")]
#[command(author, version, about = "Estimating, approvals and team access for a painting business", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "BRUSHWORK_CONFIG", default_value = "brushwork.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Price areas from a JSON file
    Quote {
        /// JSON file with `areas` and optional `settings`
        file: PathBuf,
        /// Print the breakdown as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

/// Input accepted by `brushwork quote`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteFile {
    #[serde(default)]
    pub areas: Vec<Area>,
    #[serde(default)]
    pub settings: SettingsInput,
}

/// Run a CLI command
pub async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Config(ConfigCommands::Check)) => cmd_config_check(cli),
        Some(Commands::Quote { file, json }) => cmd_quote(cli, file, *json),
        None => {
            // No subcommand means start the server - this is handled in main.rs
            Ok(())
        }
    }
}

/// Validate the configuration file and print a summary
fn cmd_config_check(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("A default configuration will be used when starting the server.");
        return Ok(());
    }

    match Config::load(config_path) {
        Ok(config) => {
            println!("[OK] Configuration file is valid!");
            println!();
            println!("=== Configuration Summary ===");
            println!();
            println!("Server:");
            println!("  Host:         {}", config.server.host);
            println!("  Port:         {}", config.server.port);
            println!("  Data Dir:     {}", config.server.data_dir.display());
            println!("  Public URL:   {}", config.server.public_url);
            println!();
            println!("Pricing:");
            println!("  Hourly Rate:  {}", config.pricing.hourly_rate);
            println!("  Markup:       {}%", config.pricing.markup_pct);
            println!("  Tax:          {}%", config.pricing.tax_rate);
            println!("  Paint/Gallon: {}", config.pricing.paint_price_per_gallon);
            println!();
            println!("Security:");
            println!(
                "  Rate Limiting: {}",
                if config.rate_limit.enabled {
                    "Enabled"
                } else {
                    "Disabled"
                }
            );
            println!("  Session TTL:  {} days", config.auth.session_ttl_days);
            println!();

            let warnings = config_warnings(&config);
            if !warnings.is_empty() {
                println!("Warnings:");
                for warning in warnings {
                    println!("  [!] {}", warning);
                }
                println!();
            }

            Ok(())
        }
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            println!();
            println!("Please check the configuration file syntax and try again.");
            anyhow::bail!("Invalid configuration file");
        }
    }
}

fn config_warnings(config: &Config) -> Vec<&'static str> {
    let mut warnings = Vec::new();

    if !config.email.is_configured() {
        warnings.push("Email is not configured - reset and invite links will only be logged");
    }
    if !config.server.is_https() {
        warnings.push("Public URL is not https - session cookies will not be marked Secure");
    }
    if config.auth.owner_email.is_some() != config.auth.owner_password.is_some() {
        warnings.push("owner_email and owner_password must be set together");
    }

    warnings
}

fn cmd_quote(cli: &Cli, file: &Path, json: bool) -> Result<()> {
    let config = Config::load(&cli.config)?;
    let input = read_quote_file(file)?;

    let settings = input.settings.resolve(&PricingSettings::from(&config.pricing));
    let quote = price_estimate(&input.areas, &settings);

    if json {
        let output = serde_json::json!({
            "settings": settings,
            "totals": quote.summary(),
            "labor_hours": one_decimal(quote.labor_hours),
            "paint_gallons": one_decimal(quote.paint_gallons),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", render_quote(&input.areas, &settings, &quote));
    }
    Ok(())
}

fn read_quote_file(path: &Path) -> Result<QuoteFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read quote file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse quote file: {}", path.display()))
}

/// Plain-text breakdown in whole currency units
fn render_quote(areas: &[Area], settings: &PricingSettings, quote: &Quote) -> String {
    let mut out = String::new();
    let totals = quote.summary();

    let _ = writeln!(
        out,
        "{:<24} {:>8} {:>8} {:>10} {:>10}",
        "AREA", "HOURS", "GALLONS", "LABOR", "MATERIALS"
    );
    let _ = writeln!(out, "{}", "-".repeat(64));
    for (area, cost) in areas.iter().zip(&quote.areas) {
        let _ = writeln!(
            out,
            "{:<24} {:>8.1} {:>8.1} {:>10} {:>10}",
            truncate(&area.name, 24),
            one_decimal(cost.labor_hours),
            one_decimal(cost.paint_gallons),
            whole_units(cost.labor),
            whole_units(cost.materials)
        );
    }
    let _ = writeln!(out);

    let rows = [
        ("Labor:".to_string(), totals.labor),
        ("Materials:".to_string(), totals.materials),
        ("Subtotal:".to_string(), totals.subtotal),
        (format!("Markup ({}%):", settings.markup_pct), totals.markup),
        ("With markup:".to_string(), totals.subtotal_with_markup),
        (format!("Tax ({}%):", settings.tax_rate), totals.tax),
        ("Total:".to_string(), totals.total),
    ];
    for (label, amount) in rows {
        let _ = writeln!(out, "{:<17}{:>10}", label, amount);
    }
    out
}

/// Truncate a string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_parses_quote_subcommand() {
        let cli = Cli::try_parse_from(["brushwork", "-c", "shop.toml", "quote", "rooms.json", "--json"])
            .unwrap();
        assert_eq!(cli.config, PathBuf::from("shop.toml"));
        match cli.command {
            Some(Commands::Quote { file, json }) => {
                assert_eq!(file, PathBuf::from("rooms.json"));
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_no_subcommand_starts_server() {
        let cli = Cli::try_parse_from(["brushwork", "--log-level", "debug"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_read_quote_file_and_render() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"areas": [{{"name": "Living room", "length": "20", "width": 15, "height": 8}}]}}"#
        )
        .unwrap();

        let input = read_quote_file(file.path()).unwrap();
        assert_eq!(input.areas.len(), 1);

        let settings = input.settings.resolve(&PricingSettings::default());
        let quote = price_estimate(&input.areas, &settings);
        let rendered = render_quote(&input.areas, &settings, &quote);

        assert!(rendered.contains("Living room"));
        assert!(rendered.lines().any(|l| l.starts_with("Total:") && l.ends_with("850")));
    }

    #[test]
    fn test_read_quote_file_reports_bad_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = read_quote_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse quote file"));
    }

    #[test]
    fn test_config_warnings() {
        let mut config = Config::default();
        config.server.public_url = "https://paint.example.com".to_string();
        config.auth.owner_email = Some("owner@example.com".to_string());

        let warnings = config_warnings(&config);
        assert!(warnings.iter().any(|w| w.starts_with("Email is not configured")));
        assert!(warnings.iter().any(|w| w.contains("must be set together")));
        assert!(!warnings.iter().any(|w| w.contains("Secure")));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Hall", 24), "Hall");
        assert_eq!(truncate("Primary bedroom closet", 10), "Primary...");
    }
}
