//! Defines the custom error types for the campsite-sentry application.

use std::io;
use thiserror::Error;
use url::ParseError as UrlParseError;

/// The primary error type for an availability check run.
#[derive(Error, Debug)]
pub(crate) enum AppError {
    /// Error occurring during configuration loading or validation.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// Error related to file input/output operations.
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// Error during JSON serialization or deserialization.
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error parsing a TOML configuration file.
    #[error("TOML Error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Error parsing a URL.
    #[error("URL Parsing Error: {0}")]
    UrlParse(#[from] UrlParseError),

    /// Error parsing an ISO date.
    #[error("Date Parsing Error: {0}")]
    DateParse(#[from] chrono::ParseError),

    /// The search window has already started; checking would be pointless.
    #[error("Search window starting {0} has passed; nothing left to check")]
    WindowExpired(chrono::NaiveDate),

    /// The browser could not be launched or stopped responding.
    #[error("Browser Error: {0}")]
    Browser(String),

    /// Navigation to a page failed or timed out.
    #[error("Navigation to {url} failed: {reason}")]
    Navigation {
        /// The page being loaded.
        url: String,
        /// What the browser reported.
        reason: String,
    },

    /// An element the page is expected to contain was not found.
    #[error("Selector not found on page: {0}")]
    SelectorNotFound(String),

    /// The availability table did not have the expected shape.
    #[error("Malformed availability table: {0}")]
    MalformedTable(String),

    /// An e-mail address could not be parsed.
    #[error("Email Address Error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The e-mail message could not be assembled.
    #[error("Email Build Error: {0}")]
    EmailBuild(#[from] lettre::error::Error),

    /// Error during SMTP communication.
    #[error("SMTP Error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Error related to blocking task execution.
    #[error("Task Execution Error: {0}")]
    Task(String),

    /// An underlying error that doesn't fit other categories, using anyhow.
    #[error("Generic Error: {0}")]
    Generic(#[from] anyhow::Error),
}

pub(crate) type Result<T> = std::result::Result<T, AppError>;
