use chrono::{DateTime, Utc};
use url::Url;

/// A fetched Wikipedia page, ready to be turned into a [`Document`].
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    /// Canonical title as reported by Wikipedia ("HAL Tejas")
    pub title: String,
    /// The URL the article was requested with
    pub url: Url,
    /// Content language code ("en")
    pub lang: String,
    /// Revision the content was taken from
    pub revision: u64,
    /// Timestamp of that revision
    pub last_modified: DateTime<Utc>,
    /// Body content in document order
    pub sections: Vec<Section>,
}

/// One block of article content.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Heading { level: u8, text: String },
    Paragraph(String),
    ListItem(String),
    Term(String),
    Definition(String),
    Quote(String),
    Image(Image),
}

/// An image downloaded from the article body.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub source: Url,
    pub media_type: String,
    pub data: Vec<u8>,
    pub caption: Option<String>,
    pub alt: Option<String>,
}

/// A finished e-book file.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    pub filename: String,
    pub content: Vec<u8>,
}

impl Article {
    pub fn images(&self) -> impl Iterator<Item = &Image> {
        self.sections.iter().filter_map(|section| match section {
            Section::Image(image) => Some(image),
            _ => None,
        })
    }
}

/// File name for a document: the title with everything but
/// alphanumerics, spaces, `-` and `_` removed.
pub fn document_filename(title: &str, extension: &str) -> String {
    let safe: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let safe = safe.trim();

    if safe.is_empty() {
        format!("article.{}", extension)
    } else {
        format!("{}.{}", safe, extension)
    }
}
