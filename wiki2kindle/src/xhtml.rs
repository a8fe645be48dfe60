use crate::article::{Article, Section};
use crate::escape_html;

/// Stylesheet shipped inside every book.
pub const BASE_CSS: &str = include_str!("../styles.css");

/// A navigation target inside the book.
#[derive(Debug, Clone, PartialEq)]
pub struct NavEntry {
    pub href: String,
    pub label: String,
}

/// Wrap a fragment of body markup in an XHTML document that links the
/// book stylesheet.
pub fn wrap(title: &str, lang: &str, body_html: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" xml:lang="{lang}" lang="{lang}">
  <head>
    <meta charset="utf-8" />
    <title>{title}</title>
    <link rel="stylesheet" type="text/css" href="style.css" />
  </head>
  <body>
{body}
  </body>
</html>
"#,
        lang = escape_html(lang),
        title = escape_html(title),
        body = body_html
    )
}

pub fn title_page(article: &Article) -> String {
    let body = format!(
        r#"<section class="title-page" epub:type="titlepage">
  <h1>{title}</h1>
  <p class="subtitle">From Wikipedia, the free encyclopedia</p>
  <p class="source">{url}</p>
  <p class="revision">Revision {revision}, {date}</p>
</section>"#,
        title = escape_html(&article.title),
        url = escape_html(article.url.as_str()),
        revision = article.revision,
        date = article.last_modified.format("%B %-d, %Y"),
    );
    wrap(&article.title, &article.lang, &body)
}

/// Render the article body.
///
/// `image_hrefs` holds the in-book path of each image, in the order the
/// images appear in `article.sections`. Returns the XHTML page and one
/// [`NavEntry`] per top-level section.
pub fn article_page(
    article: &Article,
    page_href: &str,
    image_hrefs: &[String],
) -> (String, Vec<NavEntry>) {
    let mut body = String::new();
    let mut nav = Vec::new();
    let mut images = image_hrefs.iter();
    let mut open_list: Option<&'static str> = None;

    body.push_str(&format!("<h1>{}</h1>\n", escape_html(&article.title)));

    for section in &article.sections {
        let list = match section {
            Section::ListItem(_) => Some("ul"),
            Section::Term(_) | Section::Definition(_) => Some("dl"),
            _ => None,
        };
        if open_list != list {
            if let Some(tag) = open_list {
                body.push_str(&format!("</{}>\n", tag));
            }
            if let Some(tag) = list {
                body.push_str(&format!("<{}>\n", tag));
            }
            open_list = list;
        }

        match section {
            Section::Heading { level, text } => {
                let level = (*level).clamp(2, 6);
                if level == 2 {
                    let id = format!("section-{}", nav.len() + 1);
                    body.push_str(&format!(
                        "<h2 id=\"{}\">{}</h2>\n",
                        id,
                        escape_html(text)
                    ));
                    nav.push(NavEntry {
                        href: format!("{}#{}", page_href, id),
                        label: text.clone(),
                    });
                } else {
                    body.push_str(&format!("<h{0}>{1}</h{0}>\n", level, escape_html(text)));
                }
            }
            Section::Paragraph(text) => push_element(&mut body, "p", text),
            Section::ListItem(text) => push_element(&mut body, "li", text),
            Section::Term(text) => push_element(&mut body, "dt", text),
            Section::Definition(text) => push_element(&mut body, "dd", text),
            Section::Quote(text) => {
                body.push_str(&format!(
                    "<blockquote><p>{}</p></blockquote>\n",
                    escape_html(text)
                ));
            }
            Section::Image(image) => {
                let Some(href) = images.next() else {
                    continue;
                };
                let alt = image
                    .alt
                    .as_deref()
                    .or(image.caption.as_deref())
                    .unwrap_or("");
                body.push_str(&format!(
                    "<figure>\n<img src=\"{}\" alt=\"{}\" />\n",
                    escape_html(href),
                    escape_html(alt)
                ));
                if let Some(caption) = &image.caption {
                    body.push_str(&format!("<figcaption>{}</figcaption>\n", escape_html(caption)));
                }
                body.push_str("</figure>\n");
            }
        }
    }

    if let Some(tag) = open_list {
        body.push_str(&format!("</{}>\n", tag));
    }

    (wrap(&article.title, &article.lang, &body), nav)
}

fn push_element(body: &mut String, tag: &str, text: &str) {
    body.push_str(&format!("<{0}>{1}</{0}>\n", tag, escape_html(text)));
}

/// EPUB 3 navigation document.
pub fn nav_page(title: &str, lang: &str, entries: &[NavEntry]) -> String {
    let mut items = String::new();
    for entry in entries {
        items.push_str(&format!(
            "      <li><a href=\"{}\">{}</a></li>\n",
            escape_html(&entry.href),
            escape_html(&entry.label)
        ));
    }

    let body = format!(
        r#"<nav epub:type="toc" id="toc">
  <h1>Contents</h1>
  <ol>
{items}  </ol>
</nav>"#
    );
    wrap(title, lang, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::Image;
    use chrono::TimeZone;
    use url::Url;

    fn article(sections: Vec<Section>) -> Article {
        Article {
            title: "Fish & Chips".into(),
            url: Url::parse("https://en.wikipedia.org/wiki/Fish_and_chips").unwrap(),
            lang: "en".into(),
            revision: 42,
            last_modified: chrono::Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap(),
            sections,
        }
    }

    #[test]
    fn groups_list_items_and_escapes_text() {
        let a = article(vec![
            Section::Paragraph("Cod < haddock".into()),
            Section::ListItem("Salt".into()),
            Section::ListItem("Vinegar".into()),
            Section::Term("Chippy".into()),
            Section::Definition("A shop".into()),
            Section::Paragraph("End".into()),
        ]);
        let (page, nav) = article_page(&a, "article.xhtml", &[]);

        assert!(page.contains("<title>Fish &amp; Chips</title>"));
        assert!(page.contains("<p>Cod &lt; haddock</p>"));
        assert!(page.contains("<ul>\n<li>Salt</li>\n<li>Vinegar</li>\n</ul>\n"));
        assert!(page.contains("<dl>\n<dt>Chippy</dt>\n<dd>A shop</dd>\n</dl>\n<p>End</p>"));
        assert!(nav.is_empty());
    }

    #[test]
    fn top_level_headings_become_nav_entries() {
        let a = article(vec![
            Section::Heading { level: 2, text: "History".into() },
            Section::Heading { level: 3, text: "Origins".into() },
            Section::Heading { level: 2, text: "Variants".into() },
        ]);
        let (page, nav) = article_page(&a, "article.xhtml", &[]);

        assert!(page.contains("<h2 id=\"section-1\">History</h2>"));
        assert!(page.contains("<h3>Origins</h3>"));
        assert!(page.contains("<h2 id=\"section-2\">Variants</h2>"));
        assert_eq!(
            nav,
            vec![
                NavEntry { href: "article.xhtml#section-1".into(), label: "History".into() },
                NavEntry { href: "article.xhtml#section-2".into(), label: "Variants".into() },
            ]
        );
    }

    #[test]
    fn images_use_book_paths_in_order() {
        let image = |name: &str, caption: Option<&str>| {
            Section::Image(Image {
                source: Url::parse(&format!("https://upload.wikimedia.org/{}", name)).unwrap(),
                media_type: "image/png".into(),
                data: vec![1, 2, 3],
                caption: caption.map(String::from),
                alt: None,
            })
        };
        let a = article(vec![
            image("a.png", Some("First")),
            Section::Paragraph("Between".into()),
            image("b.png", None),
        ]);
        let hrefs = vec!["images/image-001.png".to_string(), "images/image-002.png".to_string()];
        let (page, _) = article_page(&a, "article.xhtml", &hrefs);

        let first = page.find("images/image-001.png").unwrap();
        let between = page.find("Between").unwrap();
        let second = page.find("images/image-002.png").unwrap();
        assert!(first < between && between < second);
        assert!(page.contains("<figcaption>First</figcaption>"));
    }

    #[test]
    fn title_page_names_article_and_revision() {
        let page = title_page(&article(vec![]));
        assert!(page.contains("<h1>Fish &amp; Chips</h1>"));
        assert!(page.contains("https://en.wikipedia.org/wiki/Fish_and_chips"));
        assert!(page.contains("Revision 42, March 9, 2024"));
    }
}
