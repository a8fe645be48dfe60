use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::article::{Article, Image, Section};
use crate::error::FetchError;
use crate::extractor::{self, Block, ImageRef};

/// An article URL broken into the parts the API needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRef {
    pub url: Url,
    /// Desktop host serving the API ("en.wikipedia.org")
    pub host: String,
    /// Language subdomain ("en")
    pub lang: String,
    /// Title as written in the URL, underscores replaced by spaces
    pub title: String,
}

/// Trim surrounding whitespace and parse `input` as an absolute URL.
///
/// Characters are left as `Url::parse` normalises them; title decoding
/// happens in [`parse_article_url`].
pub fn normalize_url(input: &str) -> Result<Url, FetchError> {
    Url::parse(input.trim()).map_err(|source| FetchError::InvalidUrl {
        url: input.to_string(),
        source,
    })
}

/// Read host, language and title out of a Wikipedia article URL.
///
/// Accepts `/wiki/<Title>` and `/w/index.php?title=<Title>` forms on
/// desktop and mobile hosts.
pub fn parse_article_url(input: &str) -> Result<PageRef, FetchError> {
    let url = normalize_url(input)?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::NotWikipedia(input.to_string()));
    }
    let Some(raw_host) = url.host_str() else {
        return Err(FetchError::NotWikipedia(input.to_string()));
    };
    let raw_host = raw_host.to_ascii_lowercase();
    let Some(prefix) = raw_host.strip_suffix(".wikipedia.org") else {
        return Err(FetchError::NotWikipedia(input.to_string()));
    };
    let lang = prefix.strip_suffix(".m").unwrap_or(prefix);
    if lang.is_empty() || lang.contains('.') || lang == "www" {
        return Err(FetchError::NotWikipedia(input.to_string()));
    }
    let host = format!("{}.wikipedia.org", lang);

    let encoded = if let Some(rest) = url.path().strip_prefix("/wiki/") {
        rest.to_string()
    } else if url.path() == "/w/index.php" {
        url.query_pairs()
            .find(|(key, _)| key == "title")
            .map(|(_, value)| urlencoding::encode(&value).into_owned())
            .unwrap_or_default()
    } else {
        String::new()
    };

    let title = urlencoding::decode(&encoded)
        .map_err(|_| FetchError::MissingTitle(input.to_string()))?
        .replace('_', " ")
        .trim()
        .to_string();
    if title.is_empty() {
        return Err(FetchError::MissingTitle(input.to_string()));
    }

    Ok(PageRef {
        host,
        lang: lang.to_string(),
        title,
        url,
    })
}

/// Fetches articles through the MediaWiki action API.
pub struct WikiFetcher {
    client: Client,
    api_endpoint: Option<Url>,
    include_images: bool,
}

impl WikiFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(default_user_agent())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(WikiFetcher {
            client,
            api_endpoint: None,
            include_images: true,
        })
    }

    /// Send every API call to `endpoint` instead of `https://<host>/w/api.php`.
    pub fn with_api_endpoint(mut self, endpoint: Url) -> Self {
        self.api_endpoint = Some(endpoint);
        self
    }

    pub fn with_images(mut self, include_images: bool) -> Self {
        self.include_images = include_images;
        self
    }

    /// Resolve, download and extract one article.
    pub fn fetch(&self, url: &str) -> Result<Article, FetchError> {
        let page = parse_article_url(url)?;
        let endpoint = self.endpoint_for(&page)?;

        let resolved = self.resolve_title(&endpoint, &page)?;
        info!(title = %resolved.title, revision = resolved.revision, "resolved article");

        let html = self.fetch_html(&endpoint, resolved.revision)?;
        let blocks = extractor::extract_blocks(&html);

        let mut sections = Vec::with_capacity(blocks.len());
        for block in blocks {
            match block {
                Block::Section(section) => sections.push(section),
                Block::Image(image) if self.include_images => {
                    if let Some(image) = self.download_image(&page.url, image) {
                        sections.push(Section::Image(image));
                    }
                }
                Block::Image(_) => {}
            }
        }

        Ok(Article {
            title: resolved.title,
            url: page.url,
            lang: resolved.lang.unwrap_or(page.lang),
            revision: resolved.revision,
            last_modified: resolved.timestamp,
            sections,
        })
    }

    fn endpoint_for(&self, page: &PageRef) -> Result<Url, FetchError> {
        if let Some(endpoint) = &self.api_endpoint {
            return Ok(endpoint.clone());
        }
        let raw = format!("https://{}/w/api.php", page.host);
        Url::parse(&raw).map_err(|source| FetchError::InvalidUrl { url: raw, source })
    }

    /// Follow redirects and normalisation to the canonical title and its
    /// latest revision.
    fn resolve_title(&self, endpoint: &Url, page: &PageRef) -> Result<ResolvedPage, FetchError> {
        let response: QueryResponse = self.get_json(
            endpoint,
            &[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("redirects", "1"),
                ("prop", "info|revisions"),
                ("rvprop", "ids|timestamp"),
                ("titles", page.title.as_str()),
            ],
        )?;

        if let Some(error) = response.error {
            return Err(error.into());
        }

        let found = response
            .query
            .and_then(|q| q.pages.into_iter().next())
            .ok_or_else(|| FetchError::UnexpectedResponse("query returned no pages".into()))?;

        if found.invalid {
            return Err(FetchError::InvalidTitle {
                title: found.title,
                reason: found.invalidreason.unwrap_or_else(|| "rejected by API".into()),
            });
        }
        if found.missing {
            return Err(FetchError::NotFound(found.title));
        }

        let revision = found.revisions.into_iter().next().ok_or_else(|| {
            FetchError::UnexpectedResponse(format!("no revision for '{}'", found.title))
        })?;

        Ok(ResolvedPage {
            title: found.title,
            lang: found.pagelanguage,
            revision: revision.revid,
            timestamp: revision.timestamp,
        })
    }

    /// Rendered HTML of one revision.
    fn fetch_html(&self, endpoint: &Url, revision: u64) -> Result<String, FetchError> {
        let oldid = revision.to_string();
        let response: ParseResponse = self.get_json(
            endpoint,
            &[
                ("action", "parse"),
                ("format", "json"),
                ("formatversion", "2"),
                ("prop", "text"),
                ("disableeditsection", "1"),
                ("disabletoc", "1"),
                ("disablelimitreport", "1"),
                ("oldid", oldid.as_str()),
            ],
        )?;

        if let Some(error) = response.error {
            return Err(error.into());
        }
        let parsed = response
            .parse
            .ok_or_else(|| FetchError::UnexpectedResponse("parse returned no content".into()))?;

        debug!(title = %parsed.title, bytes = parsed.text.len(), "fetched article html");
        Ok(parsed.text)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &Url,
        params: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let resp = self.client.get(endpoint.clone()).query(params).send()?;
        let resp = check_status(resp)?;
        Ok(resp.json()?)
    }

    /// Download one image. Failures are logged and the image is left out.
    fn download_image(&self, base: &Url, image: ImageRef) -> Option<Image> {
        let source = match base.join(&image.src) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(url) => {
                warn!(src = %url, "skipping image with unsupported scheme");
                return None;
            }
            Err(e) => {
                warn!(src = %image.src, error = %e, "skipping image with bad URL");
                return None;
            }
        };

        match self.fetch_bytes(&source) {
            Ok((media_type, data)) => {
                debug!(src = %source, %media_type, bytes = data.len(), "downloaded image");
                Some(Image {
                    source,
                    media_type,
                    data,
                    caption: image.caption,
                    alt: image.alt,
                })
            }
            Err(e) => {
                warn!(src = %source, error = %e, "skipping image");
                None
            }
        }
    }

    fn fetch_bytes(&self, url: &Url) -> Result<(String, Vec<u8>), FetchError> {
        let resp = check_status(self.client.get(url.clone()).send()?)?;

        let media_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty() && v != "application/octet-stream")
            .unwrap_or_else(|| guess_media_type(url.path()).to_string());

        let data = resp.bytes()?.to_vec();
        Ok((media_type, data))
    }
}

fn check_status(resp: Response) -> Result<Response, FetchError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: resp.url().to_string(),
            status,
        });
    }
    Ok(resp)
}

/// Media type from a file extension.
pub fn guess_media_type(path: &str) -> &'static str {
    let ext = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("tif" | "tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}

fn default_user_agent() -> String {
    format!(
        "wiki2kindle/{} (https://github.com/wiki2kindle/wiki2kindle; rust; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

struct ResolvedPage {
    title: String,
    lang: Option<String>,
    revision: u64,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    info: String,
}

impl From<ApiError> for FetchError {
    fn from(err: ApiError) -> Self {
        FetchError::Api {
            code: err.code,
            info: err.info,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    query: Option<QueryBody>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: Vec<QueryPage>,
}

#[derive(Debug, Deserialize)]
struct QueryPage {
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    invalidreason: Option<String>,
    pagelanguage: Option<String>,
    #[serde(default)]
    revisions: Vec<Revision>,
}

#[derive(Debug, Deserialize)]
struct Revision {
    revid: u64,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    parse: Option<ParseBody>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ParseBody {
    title: String,
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_article_url() {
        let page = parse_article_url("https://en.wikipedia.org/wiki/HAL_Tejas").unwrap();
        assert_eq!(page.host, "en.wikipedia.org");
        assert_eq!(page.lang, "en");
        assert_eq!(page.title, "HAL Tejas");
    }

    #[test]
    fn decodes_percent_escapes_and_drops_fragment() {
        let page =
            parse_article_url("  https://de.m.wikipedia.org/wiki/Z%C3%BCrich_(Stadt)#Geschichte ")
                .unwrap();
        assert_eq!(page.host, "de.wikipedia.org");
        assert_eq!(page.lang, "de");
        assert_eq!(page.title, "Zürich (Stadt)");
    }

    #[test]
    fn accepts_index_php_form() {
        let page =
            parse_article_url("https://en.wikipedia.org/w/index.php?title=C%2B%2B&oldid=1").unwrap();
        assert_eq!(page.title, "C++");
    }

    #[test]
    fn normalize_url_only_trims_and_parses() {
        let url = normalize_url("\t https://en.wikipedia.org/wiki/Mercury_(planet) \n").unwrap();
        assert_eq!(url.as_str(), "https://en.wikipedia.org/wiki/Mercury_(planet)");
        assert!(matches!(
            normalize_url("/wiki/Mercury"),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn rejects_non_urls() {
        assert!(matches!(
            parse_article_url("not a url"),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn rejects_other_sites() {
        for url in [
            "https://example.com/wiki/HAL_Tejas",
            "https://www.wikipedia.org/wiki/HAL_Tejas",
            "ftp://en.wikipedia.org/wiki/HAL_Tejas",
            "https://en.wikipedia.org.evil.com/wiki/HAL_Tejas",
        ] {
            assert!(
                matches!(parse_article_url(url), Err(FetchError::NotWikipedia(_))),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_urls_without_title() {
        for url in [
            "https://en.wikipedia.org/",
            "https://en.wikipedia.org/wiki/",
            "https://en.wikipedia.org/w/index.php?action=history",
        ] {
            assert!(
                matches!(parse_article_url(url), Err(FetchError::MissingTitle(_))),
                "{url} should have no title"
            );
        }
    }

    #[test]
    fn media_type_from_extension() {
        assert_eq!(guess_media_type("/a/b/Photo.JPG"), "image/jpeg");
        assert_eq!(guess_media_type("/a/Map.svg.png"), "image/png");
        assert_eq!(guess_media_type("/a/noext"), "application/octet-stream");
    }

    #[test]
    fn query_response_with_missing_page() {
        let body = r#"{"batchcomplete":true,"query":{"pages":[{"ns":0,"title":"Nope","missing":true}]}}"#;
        let parsed: QueryResponse = serde_json::from_str(body).unwrap();
        let page = parsed.query.unwrap().pages.remove(0);
        assert!(page.missing);
        assert!(page.revisions.is_empty());
    }
}
