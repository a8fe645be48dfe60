//! Error types for each pipeline stage

use std::path::PathBuf;

use thiserror::Error;

/// Problems with the env file or the values it provides.
///
/// Fatal at startup: nothing can be sent without working SMTP settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// One or more required keys are absent or empty
    #[error("Missing configuration variables: {}. Please check your .env file.", .0.join(", "))]
    Missing(Vec<String>),

    /// `SMTP_PORT` is not a usable port number
    #[error("Invalid SMTP_PORT '{0}': expected a number between 1 and 65535")]
    InvalidPort(String),

    /// An address field does not parse as an email address
    #[error("Invalid {key} '{value}': {source}")]
    InvalidAddress {
        key: &'static str,
        value: String,
        #[source]
        source: lettre::address::AddressError,
    },

    /// An explicitly requested env file does not exist
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The env file exists but cannot be read or parsed
    #[error("Failed to read {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

/// Failures while turning a URL into an [`Article`](crate::article::Article).
#[derive(Error, Debug)]
pub enum FetchError {
    /// The input is not a URL at all
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The URL does not point at a Wikipedia article
    #[error("Not a Wikipedia article URL: {0}")]
    NotWikipedia(String),

    /// No article title could be read from the URL
    #[error("Could not determine the article title from {0}")]
    MissingTitle(String),

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("Request to {url} failed with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// Wikipedia has no page with this title
    #[error("Article '{0}' does not exist")]
    NotFound(String),

    /// Wikipedia rejected the title
    #[error("Invalid article title '{title}': {reason}")]
    InvalidTitle { title: String, reason: String },

    /// The API returned an error object
    #[error("Wikipedia API error {code}: {info}")]
    Api { code: String, info: String },

    /// The API answered with something we cannot interpret
    #[error("Unexpected API response: {0}")]
    UnexpectedResponse(String),
}

/// Failures while packaging an article as an e-book.
#[derive(Error, Debug)]
pub enum BuildError {
    /// An embedded image has a type e-readers cannot display
    #[error("Unsupported media type '{media_type}' for image {source_url}")]
    UnsupportedMedia {
        media_type: String,
        source_url: String,
    },

    /// Zip container error
    #[error("EPUB container error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// IO error while writing the container
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while mailing a document.
#[derive(Error, Debug)]
pub enum SendError {
    /// The message could not be assembled
    #[error("Failed to build email: {0}")]
    Message(String),

    /// Could not reach the SMTP server or negotiate TLS
    #[error("SMTP connection failed: {0}")]
    Connection(#[source] lettre::transport::smtp::Error),

    /// The server refused our credentials
    #[error("SMTP authentication failed: {0}")]
    Auth(#[source] lettre::transport::smtp::Error),

    /// The server rejected the message
    #[error("SMTP server rejected the message: {0}")]
    Rejected(#[source] lettre::transport::smtp::Error),
}

/// Any failure inside a single article's Fetch → Build → Send run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Send(#[from] SendError),

    /// Writing the optional local copy failed
    #[error("Failed to save {}: {source}", .path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<lettre::error::Error> for SendError {
    fn from(err: lettre::error::Error) -> Self {
        SendError::Message(err.to_string())
    }
}
