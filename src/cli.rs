//! Command-line interface for token-gate
//!
//! Subcommands:
//! - `serve`: run the HTTP server
//! - `generate`: create a new random token and optionally save it to an env file
//! - `info`: show the effective configuration with tokens masked

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::auth::token::{generate_token, mask_token, DEFAULT_TOKEN_LENGTH};
use crate::config::{token_var_name, Config};
use crate::error::AppError;

/// token-gate - Static shared-secret token authentication for HTTP services
#[derive(Parser, Debug)]
#[command(name = "token-gate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server
    Serve(ConfigArgs),
    /// Generate a new token for a service
    Generate(GenerateArgs),
    /// Display information about the token configuration
    Info(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Path to the configuration file
    #[arg(short, long, env = "TOKEN_GATE_CONFIG")]
    pub config: Option<String>,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Service the token is for (omit for the fallback token)
    pub service: Option<String>,

    /// Token length in hex characters
    #[arg(long, default_value_t = DEFAULT_TOKEN_LENGTH)]
    pub length: usize,

    /// Print the environment variable assignment
    #[arg(long)]
    pub show_env: bool,

    /// Append the assignment to this env file (created if missing)
    #[arg(long, value_name = "PATH")]
    pub save: Option<PathBuf>,
}

/// Run the `generate` command, writing human-readable output to `out`
///
/// Returns the generated token.
pub fn run_generate(args: &GenerateArgs, out: &mut dyn Write) -> Result<String, AppError> {
    let token = generate_token(args.length)?;
    let service = args.service.as_deref();
    let env_var = token_var_name(service);

    writeln!(
        out,
        "Generated token for service [{}]:",
        service.unwrap_or("fallback")
    )?;
    writeln!(out, "{}", token)?;

    if let Some(path) = &args.save {
        save_to_env_file(path, &env_var, &token)?;
        writeln!(out)?;
        writeln!(
            out,
            "Token saved to {} as: {}",
            path.display(),
            env_var
        )?;
    }

    if args.show_env || args.save.is_some() {
        writeln!(out)?;
        writeln!(out, "Add the following to your environment:")?;
        writeln!(out, "{}={}", env_var, token)?;
    }

    if args.save.is_some() {
        writeln!(out)?;
        writeln!(out, "Next steps:")?;
        match service {
            Some(service) => writeln!(
                out,
                "1. Reference it in the config file as:  tokens: {{ {}: \"${{{}}}\" }}",
                service, env_var
            )?,
            None => writeln!(
                out,
                "1. Reference it in the config file as:  fallback_token: \"${{{}}}\"",
                env_var
            )?,
        }
        writeln!(out, "2. Verify configuration: token-gate info")?;
    }

    Ok(token)
}

/// Append `VAR=token` to an env file, creating it when missing
///
/// Existing assignments are never rewritten.
pub fn save_to_env_file(path: &Path, env_var: &str, token: &str) -> std::io::Result<()> {
    let exists = path.exists();
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if !exists {
        writeln!(file, "# token-gate environment file")?;
    }
    write!(file, "\n{}={}", env_var, token)?;
    Ok(())
}

/// Render the `info` report for a configuration
///
/// Token values are always masked.
pub fn render_info(config: &Config) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Token Gate Configuration:");

    let _ = writeln!(out);
    let _ = writeln!(out, "Tokens:");
    let fallback = config.fallback_token.as_deref().filter(|t| !t.is_empty());
    if config.tokens.is_empty() && fallback.is_none() {
        let _ = writeln!(out, "  No tokens configured.");
    } else {
        for (service, token) in &config.tokens {
            let shown = match token.as_deref().filter(|t| !t.is_empty()) {
                Some(token) => mask_token(token),
                None => "Not Set".to_string(),
            };
            let _ = writeln!(out, "  - Service: {}, Token: {}", service, shown);
        }
        if let Some(token) = fallback {
            let _ = writeln!(out, "  - Fallback Token: {}", mask_token(token));
        }
    }

    let rate = &config.rate_limiting;
    let _ = writeln!(out);
    let _ = writeln!(out, "Rate Limiting:");
    let _ = writeln!(out, "  - Enabled: {}", yes_no(rate.enabled));
    let _ = writeln!(out, "  - Max Attempts: {}", rate.max_attempts);
    let _ = writeln!(
        out,
        "  - Lockout Duration: {} seconds",
        rate.lockout_duration_secs
    );

    let _ = writeln!(out);
    let _ = writeln!(out, "Logging:");
    let _ = writeln!(
        out,
        "  - Log Failed Attempts: {}",
        yes_no(config.log_failed_attempts)
    );

    out
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}
