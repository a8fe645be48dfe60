//! Turns the HTML rendered by the Wikipedia parser into ordered blocks.

use kuchiki::traits::*;
use kuchiki::{ElementData, NodeRef};

use crate::article::Section;
use crate::xhtml_sanitize;

/// Images narrower than this are icons, flags and the like.
pub const MIN_IMAGE_WIDTH: u32 = 50;

/// Headings that start the back matter; everything from here on is dropped.
const BACK_MATTER: &[&str] = &[
    "see also",
    "notes",
    "references",
    "citations",
    "sources",
    "bibliography",
    "further reading",
    "external links",
];

/// Placeholder paragraph for pages without usable text.
pub const NO_CONTENT: &str = "No content found.";

/// An image found in the body, before it has been downloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRef {
    /// `src` attribute as written (often protocol-relative)
    pub src: String,
    pub caption: Option<String>,
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Section(Section),
    Image(ImageRef),
}

/// Extract the article body from parser output, in document order.
///
/// Never returns an empty list: a page with no text yields a single
/// [`NO_CONTENT`] paragraph.
pub fn extract_blocks(html: &str) -> Vec<Block> {
    let document = kuchiki::parse_html().one(html);
    let removed = xhtml_sanitize::strip_chrome(&document);
    tracing::debug!(removed, "stripped page chrome");

    let root = document
        .select_first(".mw-parser-output")
        .or_else(|_| document.select_first("body"))
        .map(|found| found.as_node().clone())
        .unwrap_or(document);

    let mut walker = Walker::default();
    walker.walk(&root);

    let mut blocks = walker.blocks;
    if !blocks.iter().any(|b| matches!(b, Block::Section(_))) {
        blocks.insert(0, Block::Section(Section::Paragraph(NO_CONTENT.to_string())));
    }
    blocks
}

#[derive(Default)]
struct Walker {
    blocks: Vec<Block>,
    seen_images: Vec<String>,
    done: bool,
}

impl Walker {
    fn walk(&mut self, node: &NodeRef) {
        for child in node.children() {
            if self.done {
                return;
            }
            let Some(element) = child.as_element() else {
                continue;
            };
            let name: &str = &element.name.local;

            match name {
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => self.heading(name, &child),
                "p" => self.text(&child, Section::Paragraph),
                "li" => {
                    self.text(&child, Section::ListItem);
                    for nested in child.children() {
                        if is_element(&nested, &["ul", "ol", "dl"]) {
                            self.walk(&nested);
                        }
                    }
                }
                "dt" => self.text(&child, Section::Term),
                "dd" => self.text(&child, Section::Definition),
                "blockquote" => self.text(&child, Section::Quote),
                "figure" => self.figure(&child),
                "img" => self.image(element, None),
                "table" => {}
                _ if has_class(element, "thumb") => self.figure(&child),
                _ => self.walk(&child),
            }
        }
    }

    fn heading(&mut self, name: &str, node: &NodeRef) {
        let text = inline_text(node);
        if text.is_empty() {
            return;
        }
        let level = name[1..].parse::<u8>().unwrap_or(2);
        if level <= 2 && BACK_MATTER.contains(&text.to_lowercase().as_str()) {
            self.done = true;
            return;
        }
        self.blocks
            .push(Block::Section(Section::Heading { level, text }));
    }

    fn text(&mut self, node: &NodeRef, make: fn(String) -> Section) {
        let text = inline_text(node);
        if !text.is_empty() {
            self.blocks.push(Block::Section(make(text)));
        }
    }

    fn figure(&mut self, node: &NodeRef) {
        let Ok(img) = node.select_first("img") else {
            return;
        };
        let caption = node
            .select_first("figcaption")
            .or_else(|_| node.select_first(".thumbcaption"))
            .ok()
            .map(|c| inline_text(c.as_node()))
            .filter(|c| !c.is_empty());
        self.image(&img, caption);
    }

    fn image(&mut self, element: &ElementData, caption: Option<String>) {
        let attrs = element.attributes.borrow();
        let Some(src) = attrs.get("src").map(str::trim).filter(|s| !s.is_empty()) else {
            return;
        };
        if src.starts_with("data:") {
            return;
        }
        let width = attrs.get("width").and_then(|w| w.trim().parse::<u32>().ok());
        if width.is_some_and(|w| w < MIN_IMAGE_WIDTH) {
            return;
        }
        if self.seen_images.iter().any(|seen| seen == src) {
            return;
        }

        self.seen_images.push(src.to_string());
        self.blocks.push(Block::Image(ImageRef {
            src: src.to_string(),
            caption,
            alt: attrs
                .get("alt")
                .map(collapse_whitespace)
                .filter(|a| !a.is_empty()),
        }));
    }
}

fn is_element(node: &NodeRef, names: &[&str]) -> bool {
    node.as_element()
        .is_some_and(|e| names.contains(&&*e.name.local))
}

fn has_class(element: &ElementData, class: &str) -> bool {
    element
        .attributes
        .borrow()
        .get("class")
        .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
}

/// Text of `node` without nested lists, figures or tables, whitespace collapsed.
fn inline_text(node: &NodeRef) -> String {
    let mut raw = String::new();
    collect_text(node, &mut raw);
    collapse_whitespace(&raw)
}

fn collect_text(node: &NodeRef, out: &mut String) {
    for child in node.children() {
        if let Some(text) = child.as_text() {
            out.push_str(&text.borrow());
        } else if is_element(&child, &["ul", "ol", "dl", "figure", "table"]) {
            out.push(' ');
        } else if is_element(&child, &["br"]) {
            out.push(' ');
        } else {
            collect_text(&child, out);
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
