//! Defines the configuration settings for the campsite-sentry application.

use crate::error::{AppError, Result};
use crate::models::{DateRange, MapArea, default_map_areas};
use clap::Parser;
use clap::builder::FalseyValueParser;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fixed window used in debug mode; a September weekend known to have a mix
/// of open and booked sites.
const DEBUG_START_DATE: &str = "2022-09-02";
const DEBUG_END_DATE: &str = "2022-09-05";

const DEFAULT_SUBJECT: &str = "GRCA Site Availability Update (!)";
const DEFAULT_DOCKER_EXECUTABLE: &str = "/usr/bin/chromium-browser";

/// Command line arguments for campsite-sentry
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Checks campground map areas for sites open all weekend", long_about = None)]
pub(crate) struct AppArgs {
    /// Path to the configuration file (JSON, or TOML with a .toml extension)
    #[arg(
        short,
        long,
        default_value = "./config/config.json",
        env = "CAMPSITE_SENTRY_CONFIG"
    )]
    pub config: String,

    /// Reservation search URL, including its existing query string
    #[arg(long, env = "GRCA_URL")]
    pub url: Option<String>,

    /// First night of the search window (YYYY-MM-DD)
    #[arg(long, env = "GRCA_START_DATE")]
    pub start_date: Option<String>,

    /// Last day of the search window (YYYY-MM-DD)
    #[arg(long, env = "GRCA_END_DATE")]
    pub end_date: Option<String>,

    /// SMTP server host
    #[arg(long, env = "SMTP_HOST")]
    pub smtp_host: Option<String>,

    /// SMTP server port
    #[arg(long, env = "SMTP_PORT")]
    pub smtp_port: Option<u16>,

    /// SMTP login user
    #[arg(long, env = "SMTP_USER")]
    pub smtp_user: Option<String>,

    /// SMTP login password
    #[arg(long, env = "SMTP_PASS", hide_env_values = true)]
    pub smtp_pass: Option<String>,

    /// Sender address for notifications
    #[arg(long, env = "SMTP_FROM")]
    pub smtp_from: Option<String>,

    /// Comma-separated list of notification recipients
    #[arg(long, env = "NOTIFY_RECIPIENTS")]
    pub recipients: Option<String>,

    /// Recipient used instead of the list in debug mode
    #[arg(long, env = "NOTIFY_DEBUG_RECIPIENT")]
    pub debug_recipient: Option<String>,

    /// Shrink the run to one map area, fixed dates and one recipient
    #[arg(long, env = "DEBUG", value_parser = FalseyValueParser::new())]
    pub debug: bool,

    /// Send a placeholder e-mail on startup and never real content
    #[arg(long, env = "DEBUG_EMAIL", value_parser = FalseyValueParser::new())]
    pub debug_email: bool,

    /// Use the container's browser executable
    #[arg(long, env = "DOCKER_ENV", value_parser = FalseyValueParser::new())]
    pub docker: bool,

    /// Deployment environment; `development` shows the browser in debug mode
    #[arg(long, env = "NODE_ENV")]
    pub node_env: Option<String>,
}

/// Process-level switches, taken from the parsed arguments once at startup.
#[derive(Debug, Clone, Default)]
pub(crate) struct RuntimeEnv {
    pub debug: bool,
    pub debug_email: bool,
    pub docker: bool,
    pub node_env: Option<String>,
}

impl From<&AppArgs> for RuntimeEnv {
    fn from(args: &AppArgs) -> Self {
        Self {
            debug: args.debug,
            debug_email: args.debug_email,
            docker: args.docker,
            node_env: args.node_env.clone(),
        }
    }
}

/// Whether this run is a real check or a scaled-down local test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunMode {
    Production,
    Debug,
}

/// Configuration file structure
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct ConfigFile {
    grca: Option<SiteSection>,
    smtp: Option<SmtpSection>,
    notification: Option<NotificationSection>,
    browser: Option<BrowserSection>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct SiteSection {
    url: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct SmtpSection {
    host: Option<String>,
    port: Option<u16>,
    auth: Option<AuthSection>,
    from: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct AuthSection {
    user: Option<String>,
    pass: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct NotificationSection {
    recipients: Option<Vec<String>>,
    debug_recipient: Option<String>,
    subject: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct BrowserSection {
    executable: Option<PathBuf>,
    docker_executable: Option<PathBuf>,
    navigation_timeout_secs: Option<u64>,
    idle_timeout_secs: Option<u64>,
    idle_window_ms: Option<u64>,
}

/// Settings gathered from defaults, the file and the command line before
/// required keys are checked.
#[derive(Debug, Clone)]
struct RawSettings {
    url: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    smtp_host: Option<String>,
    smtp_port: u16,
    smtp_user: Option<String>,
    smtp_pass: Option<String>,
    smtp_from: Option<String>,
    smtp_timeout: Duration,
    recipients: Vec<String>,
    debug_recipient: Option<String>,
    subject: String,
    browser_executable: Option<PathBuf>,
    docker_executable: PathBuf,
    navigation_timeout: Duration,
    idle_timeout: Duration,
    idle_window: Duration,
}

impl Default for RawSettings {
    fn default() -> Self {
        RawSettings {
            url: None,
            start_date: None,
            end_date: None,
            smtp_host: None,
            smtp_port: 465,
            smtp_user: None,
            smtp_pass: None,
            smtp_from: None,
            smtp_timeout: Duration::from_secs(30),
            recipients: Vec::new(),
            debug_recipient: None,
            subject: DEFAULT_SUBJECT.to_string(),
            browser_executable: None,
            docker_executable: PathBuf::from(DEFAULT_DOCKER_EXECUTABLE),
            navigation_timeout: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(30),
            idle_window: Duration::from_millis(500),
        }
    }
}

/// Where and what to search.
#[derive(Debug, Clone)]
pub(crate) struct SiteSettings {
    /// Search URL the date range and map id are appended to.
    pub base_url: String,
    /// Window passed through to the site and the notification.
    pub dates: DateRange,
    /// Map areas to check, in order.
    pub map_areas: Vec<MapArea>,
}

/// SMTP transport settings.
#[derive(Clone)]
pub(crate) struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
    pub timeout: Duration,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("pass", &"********")
            .field("from", &self.from)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Who gets told, already narrowed for the run mode.
#[derive(Debug, Clone)]
pub(crate) struct NotificationSettings {
    pub recipients: Vec<String>,
    pub subject: String,
    /// Replace every body with a placeholder.
    pub debug_email: bool,
}

/// How the browser is launched and how long it may take.
#[derive(Debug, Clone)]
pub(crate) struct BrowserSettings {
    /// Browser binary; `None` lets the automation library find one.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub navigation_timeout: Duration,
    /// Give up waiting for the network to settle after this long.
    pub idle_timeout: Duration,
    /// Quiet period that counts as "settled".
    pub idle_window: Duration,
}

/// Application configuration settings, built once at startup.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub mode: RunMode,
    pub site: SiteSettings,
    pub smtp: SmtpSettings,
    pub notification: NotificationSettings,
    pub browser: BrowserSettings,
}

/// Load configuration from a JSON or TOML file
fn load_config_file(file_path: &str) -> Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.exists() {
        tracing::warn!(target: "config_task", "Configuration file {} not found, relying on environment", file_path);
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)?;

    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let config: ConfigFile = if is_toml {
        toml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };

    tracing::info!(target: "config_task", "Loaded configuration from {}", file_path);
    Ok(config)
}

fn apply_file_config(raw: &mut RawSettings, file_config: ConfigFile) {
    if let Some(site) = file_config.grca {
        if site.url.is_some() {
            raw.url = site.url;
        }
        if site.start_date.is_some() {
            raw.start_date = site.start_date;
        }
        if site.end_date.is_some() {
            raw.end_date = site.end_date;
        }
    }

    if let Some(smtp) = file_config.smtp {
        if smtp.host.is_some() {
            raw.smtp_host = smtp.host;
        }
        if let Some(port) = smtp.port {
            raw.smtp_port = port;
        }
        if let Some(auth) = smtp.auth {
            if auth.user.is_some() {
                raw.smtp_user = auth.user;
            }
            if auth.pass.is_some() {
                raw.smtp_pass = auth.pass;
            }
        }
        if smtp.from.is_some() {
            raw.smtp_from = smtp.from;
        }
        if let Some(timeout) = smtp.timeout_secs {
            raw.smtp_timeout = Duration::from_secs(timeout);
        }
    }

    if let Some(notification) = file_config.notification {
        if let Some(recipients) = notification.recipients {
            raw.recipients = recipients;
        }
        if notification.debug_recipient.is_some() {
            raw.debug_recipient = notification.debug_recipient;
        }
        if let Some(subject) = notification.subject {
            raw.subject = subject;
        }
    }

    if let Some(browser) = file_config.browser {
        if browser.executable.is_some() {
            raw.browser_executable = browser.executable;
        }
        if let Some(path) = browser.docker_executable {
            raw.docker_executable = path;
        }
        if let Some(secs) = browser.navigation_timeout_secs {
            raw.navigation_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = browser.idle_timeout_secs {
            raw.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = browser.idle_window_ms {
            raw.idle_window = Duration::from_millis(ms);
        }
    }
}

/// Apply command line arguments and environment overrides
fn apply_cli_args(raw: &mut RawSettings, args: &AppArgs) {
    if let Some(ref url) = args.url {
        raw.url = Some(url.clone());
    }
    if let Some(ref start) = args.start_date {
        raw.start_date = Some(start.clone());
    }
    if let Some(ref end) = args.end_date {
        raw.end_date = Some(end.clone());
    }
    if let Some(ref host) = args.smtp_host {
        raw.smtp_host = Some(host.clone());
    }
    if let Some(port) = args.smtp_port {
        raw.smtp_port = port;
    }
    if let Some(ref user) = args.smtp_user {
        raw.smtp_user = Some(user.clone());
    }
    if let Some(ref pass) = args.smtp_pass {
        raw.smtp_pass = Some(pass.clone());
    }
    if let Some(ref from) = args.smtp_from {
        raw.smtp_from = Some(from.clone());
    }
    if let Some(ref recipients) = args.recipients {
        raw.recipients = recipients
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(ref debug_recipient) = args.debug_recipient {
        raw.debug_recipient = Some(debug_recipient.clone());
    }
}

fn required(value: Option<String>, key: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Config(format!("Missing required configuration key {}", key)))
}

fn finalize(raw: RawSettings, env: &RuntimeEnv) -> Result<Config> {
    let mode = if env.debug {
        RunMode::Debug
    } else {
        RunMode::Production
    };

    let base_url = required(raw.url, "GRCA:URL")?;
    url::Url::parse(&base_url)?;

    let (dates, map_areas) = match mode {
        RunMode::Production => {
            let start = required(raw.start_date, "GRCA:START_DATE")?;
            let end = required(raw.end_date, "GRCA:END_DATE")?;
            (DateRange::parse(&start, &end)?, default_map_areas())
        }
        RunMode::Debug => (
            DateRange::parse(DEBUG_START_DATE, DEBUG_END_DATE)?,
            default_map_areas().into_iter().take(1).collect(),
        ),
    };

    let host = required(raw.smtp_host, "SMTP:HOST")?;
    let user = required(raw.smtp_user, "SMTP:AUTH:USER")?;
    let pass = required(raw.smtp_pass, "SMTP:AUTH:PASS")?;
    let from = raw
        .smtp_from
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| user.clone());

    if raw.recipients.is_empty() {
        return Err(AppError::Config(
            "Missing required configuration key NOTIFICATION:RECIPIENTS".to_string(),
        ));
    }
    let recipients = match mode {
        RunMode::Production => raw.recipients,
        RunMode::Debug => {
            let target = raw
                .debug_recipient
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| raw.recipients[0].clone());
            vec![target]
        }
    };

    let headless = !(mode == RunMode::Debug && env.node_env.as_deref() == Some("development"));
    let executable = if env.docker {
        Some(raw.docker_executable)
    } else {
        raw.browser_executable
    };

    Ok(Config {
        mode,
        site: SiteSettings {
            base_url,
            dates,
            map_areas,
        },
        smtp: SmtpSettings {
            host,
            port: raw.smtp_port,
            user,
            pass,
            from,
            timeout: raw.smtp_timeout,
        },
        notification: NotificationSettings {
            recipients,
            subject: raw.subject,
            debug_email: env.debug_email,
        },
        browser: BrowserSettings {
            executable,
            headless,
            navigation_timeout: raw.navigation_timeout,
            idle_timeout: raw.idle_timeout,
            idle_window: raw.idle_window,
        },
    })
}

/// Builds the run configuration: defaults, then the file, then CLI/env.
pub(crate) fn build_config(args: &AppArgs) -> Result<Config> {
    let env = RuntimeEnv::from(args);
    let mut raw = RawSettings::default();

    let file_config = load_config_file(&args.config)?;
    apply_file_config(&mut raw, file_config);
    apply_cli_args(&mut raw, args);

    let config = finalize(raw, &env)?;

    tracing::debug!(target: "config_task", "Final configuration: {:?}", config);

    Ok(config)
}
