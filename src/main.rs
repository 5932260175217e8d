#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use mdpdf::channels;
use mdpdf::config::Config;
use mdpdf::render::create_renderer;

/// `mdpdf` - collect Markdown over Telegram, get a PDF back.
#[derive(Parser, Debug)]
#[command(name = "mdpdf")]
#[command(version)]
#[command(about = "Telegram bot that turns Markdown messages into PDF documents.", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the bot (long-polls Telegram until Ctrl-C)
    #[command(long_about = "\
Start the bot.

Connects to the Telegram Bot API with the configured token and \
long-polls for messages until interrupted. The token comes from \
telegram.bot_token in config.toml or the TELEGRAM_BOT_TOKEN \
environment variable.

Examples:
  mdpdf run
  TELEGRAM_BOT_TOKEN=123:ABC mdpdf run
  RUST_LOG=mdpdf=debug mdpdf run")]
    Run,

    /// Render a local Markdown file to PDF with the bot's pipeline
    #[command(long_about = "\
Render a local Markdown file to PDF.

Uses exactly the same Markdown conversion, stylesheet and browser \
settings as the bot. Useful for checking the Chromium setup.

Examples:
  mdpdf render notes.md                 # writes notes.pdf
  mdpdf render notes.md -o report.pdf")]
    Render {
        /// Markdown file to render
        input: PathBuf,

        /// Output path; defaults to the input path with a .pdf extension
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the effective configuration
    Status,

    /// Check that the bot token is accepted by Telegram
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
        std::env::set_var("MDPDF_CONFIG_DIR", config_dir);
    }

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config = Config::load_or_init().await?;

    match cli.command {
        Commands::Run => {
            info!("Starting mdpdf bot");
            channels::start_channels(config).await
        }

        Commands::Render { input, output } => {
            let output = output.unwrap_or_else(|| default_output_path(&input));
            render_file(&config, &input, &output).await
        }

        Commands::Status => {
            print_status(&config);
            Ok(())
        }

        Commands::Doctor => channels::doctor_channels(config).await,
    }
}

fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("pdf")
}

async fn render_file(config: &Config, input: &Path, output: &Path) -> Result<()> {
    let markdown = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let renderer = create_renderer(&config.renderer)?;
    let pdf = renderer
        .render(&markdown)
        .await
        .with_context(|| format!("Failed to render {}", input.display()))?;

    tokio::fs::write(output, &pdf)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(bytes = pdf.len(), output = %output.display(), "PDF written");
    println!("Wrote {} ({} bytes)", output.display(), pdf.len());
    Ok(())
}

fn print_status(config: &Config) {
    let token = if config.require_bot_token().is_ok() {
        "configured"
    } else {
        "missing"
    };

    println!("mdpdf Status");
    println!();
    println!("Version:     {}", env!("CARGO_PKG_VERSION"));
    println!("Config:      {}", config.config_path.display());
    println!();
    println!("Telegram:");
    println!("  Bot token:      {token}");
    println!("  API:            {}", config.telegram.api_base_url);
    println!("  Poll timeout:   {}s", config.telegram.poll_timeout_secs);
    println!();
    println!("Renderer:");
    println!(
        "  Page:           {} ({}mm margins)",
        config.renderer.page_format, config.renderer.margin_mm
    );
    println!("  Timeout:        {}s", config.renderer.timeout_secs);
    println!(
        "  Chromium:       {}",
        config
            .renderer
            .chrome_executable
            .as_deref()
            .unwrap_or("(auto-detect)")
    );
    println!(
        "  Sandbox:        {}",
        if config.renderer.chrome_no_sandbox {
            "disabled"
        } else {
            "enabled"
        }
    );
    println!("  Document name:  {}", config.renderer.document_name);
    println!();
    println!("Sessions:");
    println!("  Max fragments:  {}", config.sessions.max_fragments);
    println!("  Max characters: {}", config.sessions.max_total_chars);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_has_no_flag_conflicts() {
        Cli::command().debug_assert();
    }

    #[test]
    fn render_cli_parses_output_flag() {
        let cli = Cli::try_parse_from(["mdpdf", "render", "notes.md", "-o", "out.pdf"])
            .expect("render invocation should parse");
        match cli.command {
            Commands::Render { input, output } => {
                assert_eq!(input, PathBuf::from("notes.md"));
                assert_eq!(output, Some(PathBuf::from("out.pdf")));
            }
            other => panic!("expected render command, got {other:?}"),
        }
    }

    #[test]
    fn config_dir_is_global() {
        let cli = Cli::try_parse_from(["mdpdf", "status", "--config-dir", "/tmp/mdpdf"])
            .expect("global flag should parse after subcommand");
        assert_eq!(cli.config_dir.as_deref(), Some("/tmp/mdpdf"));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["mdpdf"]).is_err());
    }

    #[test]
    fn default_output_replaces_extension() {
        assert_eq!(
            default_output_path(Path::new("docs/notes.md")),
            PathBuf::from("docs/notes.pdf")
        );
        assert_eq!(
            default_output_path(Path::new("README")),
            PathBuf::from("README.pdf")
        );
    }
}
