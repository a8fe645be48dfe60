//! Fetch Wikipedia articles, package them as EPUB and mail them to a Kindle.
//!
//! High-level pipeline, per URL:
//!
//! URL argument (trimmed, must be an absolute Wikipedia article URL)
//! → fetcher::parse_article_url()
//! → resolve canonical title + revision (action=query)
//! → fetch rendered HTML (action=parse)
//! → extractor::extract_blocks() + image downloads
//! → epub::generate_epub()
//! → mailer::SmtpMailer::send()
//!
//! [`pipeline::Pipeline`] drives these stages for the CLI.

pub mod article;
pub mod config;
pub mod epub;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod mailer;
pub mod pipeline;
pub mod terminal;
pub mod xhtml;
pub mod xhtml_sanitize;

pub use article::{Article, Document, Image, Section};
pub use config::Config;
pub use epub::EpubBuilder;
pub use error::{BuildError, ConfigError, FetchError, PipelineError, SendError};
pub use fetcher::WikiFetcher;
pub use mailer::SmtpMailer;
pub use pipeline::{Pipeline, RunSummary};

/// Escape text for use in XHTML element content and attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
