//! EPUB 3 packaging.
//!
//! The container is assembled in memory. Every entry carries the same
//! fixed timestamp and the identifier is derived from the article URL and
//! revision, so the same [`Article`] always yields the same bytes.

use std::io::{Cursor, Write};

use tracing::info;
use uuid::Uuid;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::article::{document_filename, Article, Document};
use crate::error::BuildError;
use crate::escape_html;
use crate::xhtml::{self, NavEntry};

const MIMETYPE: &str = "application/epub+zip";

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

const TITLE_PAGE: &str = "title.xhtml";
const ARTICLE_PAGE: &str = "article.xhtml";

/// Builds EPUB documents from articles.
#[derive(Debug, Default, Clone, Copy)]
pub struct EpubBuilder;

impl EpubBuilder {
    pub fn new() -> Self {
        EpubBuilder
    }

    pub fn build(&self, article: &Article) -> Result<Document, BuildError> {
        let content = generate_epub(article)?;
        let filename = document_filename(&article.title, "epub");
        info!(title = %article.title, %filename, bytes = content.len(), "built epub");

        Ok(Document {
            title: article.title.clone(),
            filename,
            content,
        })
    }
}

/// An image as stored inside the book.
struct PackagedImage<'a> {
    id: String,
    href: String,
    media_type: &'a str,
    data: &'a [u8],
}

/// File extension for the image types e-readers accept.
pub fn image_extension(media_type: &str) -> Option<&'static str> {
    match media_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/svg+xml" => Some("svg"),
        _ => None,
    }
}

/// Stable identifier for a given article revision.
pub fn book_identifier(article: &Article) -> Uuid {
    let name = format!("{}#{}", article.url, article.revision);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
}

pub fn generate_epub(article: &Article) -> Result<Vec<u8>, BuildError> {
    let mut images = Vec::new();
    for (idx, image) in article.images().enumerate() {
        let ext = image_extension(&image.media_type).ok_or_else(|| BuildError::UnsupportedMedia {
            media_type: image.media_type.clone(),
            source_url: image.source.to_string(),
        })?;
        images.push(PackagedImage {
            id: format!("image-{:03}", idx + 1),
            href: format!("images/image-{:03}.{}", idx + 1, ext),
            media_type: &image.media_type,
            data: &image.data,
        });
    }

    let image_hrefs: Vec<String> = images.iter().map(|i| i.href.clone()).collect();
    let (article_xhtml, sections) = xhtml::article_page(article, ARTICLE_PAGE, &image_hrefs);

    let mut nav = vec![
        NavEntry {
            href: TITLE_PAGE.to_string(),
            label: article.title.clone(),
        },
        NavEntry {
            href: ARTICLE_PAGE.to_string(),
            label: "Article".to_string(),
        },
    ];
    nav.extend(sections);

    let uid = format!("urn:uuid:{}", book_identifier(article));

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = FileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);
    let deflated = stored.compression_method(CompressionMethod::Deflated);

    // Readers sniff the first entry: it must be `mimetype`, uncompressed.
    zip.start_file("mimetype", stored)?;
    zip.write_all(MIMETYPE.as_bytes())?;

    zip.start_file("META-INF/container.xml", deflated)?;
    zip.write_all(CONTAINER_XML.as_bytes())?;

    zip.start_file("OEBPS/content.opf", deflated)?;
    zip.write_all(package_document(article, &uid, &images).as_bytes())?;

    zip.start_file("OEBPS/toc.ncx", deflated)?;
    zip.write_all(ncx_document(&article.title, &uid, &nav).as_bytes())?;

    zip.start_file("OEBPS/nav.xhtml", deflated)?;
    zip.write_all(xhtml::nav_page(&article.title, &article.lang, &nav).as_bytes())?;

    zip.start_file("OEBPS/style.css", deflated)?;
    zip.write_all(xhtml::BASE_CSS.as_bytes())?;

    zip.start_file(format!("OEBPS/{}", TITLE_PAGE), deflated)?;
    zip.write_all(xhtml::title_page(article).as_bytes())?;

    zip.start_file(format!("OEBPS/{}", ARTICLE_PAGE), deflated)?;
    zip.write_all(article_xhtml.as_bytes())?;

    for image in &images {
        // Already-compressed formats gain nothing from deflate.
        let options = if image.media_type == "image/svg+xml" {
            deflated
        } else {
            stored
        };
        zip.start_file(format!("OEBPS/{}", image.href), options)?;
        zip.write_all(image.data)?;
    }

    Ok(zip.finish()?.into_inner())
}

fn package_document(article: &Article, uid: &str, images: &[PackagedImage<'_>]) -> String {
    let modified = article.last_modified.format("%Y-%m-%dT%H:%M:%SZ");

    let mut manifest = String::new();
    for image in images {
        manifest.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"/>\n",
            image.id, image.href, image.media_type
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="book-id" xml:lang="{lang}">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="book-id">{uid}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:language>{lang}</dc:language>
    <dc:creator>Wikipedia</dc:creator>
    <dc:publisher>Wikipedia</dc:publisher>
    <dc:source>{source}</dc:source>
    <dc:date>{modified}</dc:date>
    <meta property="dcterms:modified">{modified}</meta>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="css" href="style.css" media-type="text/css"/>
    <item id="title-page" href="{title_page}" media-type="application/xhtml+xml"/>
    <item id="article" href="{article_page}" media-type="application/xhtml+xml"/>
{manifest}  </manifest>
  <spine toc="ncx">
    <itemref idref="title-page"/>
    <itemref idref="nav"/>
    <itemref idref="article"/>
  </spine>
</package>
"#,
        lang = escape_html(&article.lang),
        uid = uid,
        title = escape_html(&article.title),
        source = escape_html(article.url.as_str()),
        modified = modified,
        title_page = TITLE_PAGE,
        article_page = ARTICLE_PAGE,
        manifest = manifest,
    )
}

/// EPUB 2 table of contents, for readers that ignore `nav.xhtml`.
fn ncx_document(title: &str, uid: &str, nav: &[NavEntry]) -> String {
    let mut points = String::new();
    for (idx, entry) in nav.iter().enumerate() {
        points.push_str(&format!(
            r#"    <navPoint id="navpoint-{n}" playOrder="{n}">
      <navLabel><text>{label}</text></navLabel>
      <content src="{href}"/>
    </navPoint>
"#,
            n = idx + 1,
            label = escape_html(&entry.label),
            href = escape_html(&entry.href),
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{uid}"/>
    <meta name="dtb:depth" content="1"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
  <docTitle><text>{title}</text></docTitle>
  <navMap>
{points}  </navMap>
</ncx>
"#,
        uid = uid,
        title = escape_html(title),
        points = points,
    )
}
