use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
#[cfg(unix)]
use tokio::fs::File;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::render::PageFormat;
use crate::sessions::SessionLimits;

const CONFIG_FILE: &str = "config.toml";

/// Environment variables that may carry the bot token, in priority order.
const TOKEN_ENV_VARS: &[&str] = &["MDPDF_BOT_TOKEN", "TELEGRAM_BOT_TOKEN"];

// ── Top-level config ──────────────────────────────────────────────

/// Top-level mdpdf configuration, loaded from `config.toml`.
///
/// Resolution order: `MDPDF_CONFIG_DIR` env → `~/.mdpdf/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Path to config.toml - computed, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Telegram Bot API settings (`[telegram]`).
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Rendering pipeline settings (`[renderer]`).
    #[serde(default)]
    pub renderer: RendererConfig,

    /// Per-user buffer limits (`[sessions]`).
    #[serde(default)]
    pub sessions: SessionsConfig,
}

/// Telegram Bot API configuration (`[telegram]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather. Overridden by `MDPDF_BOT_TOKEN` or `TELEGRAM_BOT_TOKEN`.
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Bot API base URL. Default: `"https://api.telegram.org"`.
    #[serde(default = "default_telegram_api_base_url")]
    pub api_base_url: String,
    /// Long-poll timeout passed to `getUpdates`, in seconds. Default: `30`.
    #[serde(default = "default_telegram_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

fn default_telegram_api_base_url() -> String {
    "https://api.telegram.org".into()
}

fn default_telegram_poll_timeout_secs() -> u64 {
    30
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base_url: default_telegram_api_base_url(),
            poll_timeout_secs: default_telegram_poll_timeout_secs(),
        }
    }
}

/// Rendering configuration (`[renderer]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Paper size: `"A4"`, `"Letter"` or `"Legal"`. Default: `"A4"`.
    #[serde(default)]
    pub page_format: PageFormat,
    /// Page margin on every side, in millimetres. Default: `20`.
    #[serde(default = "default_renderer_margin_mm")]
    pub margin_mm: f64,
    /// Upper bound on one render, in seconds. Default: `60`.
    #[serde(default = "default_renderer_timeout_secs")]
    pub timeout_secs: u64,
    /// Chrome/Chromium binary; auto-detected when unset. `~` is expanded.
    #[serde(default)]
    pub chrome_executable: Option<String>,
    /// Launch Chromium with `--no-sandbox` (containers running as root).
    #[serde(default)]
    pub chrome_no_sandbox: bool,
    /// Treat single newlines as line breaks. Default: `true`.
    #[serde(default = "default_true")]
    pub hard_breaks: bool,
    /// File name of the delivered document. Default: `"markdown_converted.pdf"`.
    #[serde(default = "default_renderer_document_name")]
    pub document_name: String,
}

fn default_renderer_margin_mm() -> f64 {
    20.0
}

fn default_renderer_timeout_secs() -> u64 {
    60
}

fn default_renderer_document_name() -> String {
    "markdown_converted.pdf".into()
}

fn default_true() -> bool {
    true
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            page_format: PageFormat::default(),
            margin_mm: default_renderer_margin_mm(),
            timeout_secs: default_renderer_timeout_secs(),
            chrome_executable: None,
            chrome_no_sandbox: false,
            hard_breaks: true,
            document_name: default_renderer_document_name(),
        }
    }
}

/// Session buffer limits (`[sessions]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Maximum fragments held per user. Default: `200`.
    #[serde(default = "default_sessions_max_fragments")]
    pub max_fragments: usize,
    /// Maximum characters held per user across all fragments. Default: `500000`.
    #[serde(default = "default_sessions_max_total_chars")]
    pub max_total_chars: usize,
}

fn default_sessions_max_fragments() -> usize {
    SessionLimits::default().max_fragments
}

fn default_sessions_max_total_chars() -> usize {
    SessionLimits::default().max_total_chars
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_fragments: default_sessions_max_fragments(),
            max_total_chars: default_sessions_max_total_chars(),
        }
    }
}

impl SessionsConfig {
    pub fn limits(&self) -> SessionLimits {
        SessionLimits {
            max_fragments: self.max_fragments,
            max_total_chars: self.max_total_chars,
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────

fn default_config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".mdpdf"))
}

fn resolve_config_dir() -> Result<PathBuf> {
    if let Ok(custom) = std::env::var("MDPDF_CONFIG_DIR") {
        let custom = custom.trim();
        if !custom.is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(custom).into_owned()));
        }
    }
    default_config_dir()
}

impl Config {
    pub async fn load_or_init() -> Result<Self> {
        let config_dir = resolve_config_dir()?;
        Self::load_or_init_in(&config_dir).await
    }

    /// Load `config.toml` from `config_dir`, writing defaults first if absent.
    pub async fn load_or_init_in(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);

        fs::create_dir_all(config_dir).await.with_context(|| {
            format!("Failed to create config directory: {}", config_dir.display())
        })?;

        let initialized = if config_path.exists() {
            false
        } else {
            let config = Config {
                config_path: config_path.clone(),
                ..Config::default()
            };
            config.save().await?;

            // Restrict permissions on newly created config file (may hold the bot token)
            #[cfg(unix)]
            {
                use std::{fs::Permissions, os::unix::fs::PermissionsExt};
                let _ = fs::set_permissions(&config_path, Permissions::from_mode(0o600)).await;
            }
            true
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(meta) = fs::metadata(&config_path).await {
                if meta.permissions().mode() & 0o004 != 0 {
                    tracing::warn!(
                        "Config file {:?} is world-readable (mode {:o}). \
                         Consider restricting with: chmod 600 {:?}",
                        config_path,
                        meta.permissions().mode() & 0o777,
                        config_path,
                    );
                }
            }
        }

        let contents = fs::read_to_string(&config_path)
            .await
            .context("Failed to read config file")?;
        let mut config: Config =
            toml::from_str(&contents).context("Failed to parse config file")?;
        config.config_path = config_path;

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            initialized,
            "Config loaded"
        );
        Ok(config)
    }

    /// Validate configuration values that would cause runtime failures.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.api_base_url.trim().is_empty() {
            anyhow::bail!("telegram.api_base_url must not be empty");
        }
        if self.telegram.poll_timeout_secs == 0 {
            anyhow::bail!("telegram.poll_timeout_secs must be greater than 0");
        }
        if self.renderer.timeout_secs == 0 {
            anyhow::bail!("renderer.timeout_secs must be greater than 0");
        }
        if !(0.0..=100.0).contains(&self.renderer.margin_mm) {
            anyhow::bail!("renderer.margin_mm must be between 0 and 100");
        }
        let name = self.renderer.document_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            anyhow::bail!("renderer.document_name must be a plain file name");
        }
        if self.sessions.max_fragments == 0 {
            anyhow::bail!("sessions.max_fragments must be greater than 0");
        }
        if self.sessions.max_total_chars == 0 {
            anyhow::bail!("sessions.max_total_chars must be greater than 0");
        }
        Ok(())
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        // Bot token: MDPDF_BOT_TOKEN or TELEGRAM_BOT_TOKEN
        if let Some(token) = TOKEN_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
        {
            self.telegram.bot_token = Some(token);
        }

        // Render timeout: MDPDF_RENDER_TIMEOUT_SECS
        if let Ok(secs) = std::env::var("MDPDF_RENDER_TIMEOUT_SECS") {
            if let Ok(secs) = secs.trim().parse::<u64>() {
                if secs > 0 {
                    self.renderer.timeout_secs = secs;
                }
            }
        }

        // Browser binary: MDPDF_CHROME_EXECUTABLE
        if let Ok(path) = std::env::var("MDPDF_CHROME_EXECUTABLE") {
            if !path.trim().is_empty() {
                self.renderer.chrome_executable = Some(path);
            }
        }

        // Sandbox flag: MDPDF_CHROME_NO_SANDBOX
        if let Ok(val) = std::env::var("MDPDF_CHROME_NO_SANDBOX") {
            self.renderer.chrome_no_sandbox = val == "1" || val.eq_ignore_ascii_case("true");
        }
    }

    /// The bot token, or an error explaining how to provide one.
    pub fn require_bot_token(&self) -> Result<&str> {
        self.telegram
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .with_context(|| {
                format!(
                    "Telegram bot token is not configured. Set TELEGRAM_BOT_TOKEN or \
                     telegram.bot_token in {}",
                    self.config_path.display()
                )
            })
    }

    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;

        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or(CONFIG_FILE);
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        if let Err(e) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            anyhow::bail!("Failed to atomically replace config file: {e}");
        }

        sync_directory(parent_dir).await
    }
}

async fn sync_directory(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let dir = File::open(path)
            .await
            .with_context(|| format!("Failed to open directory for fsync: {}", path.display()))?;
        dir.sync_all()
            .await
            .with_context(|| format!("Failed to fsync directory metadata: {}", path.display()))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}
