use kuchiki::NodeRef;

/// Wikipedia page furniture that never belongs in the e-book body.
const CHROME_SELECTORS: &[&str] = &[
    // Editing and navigation UI
    ".mw-editsection",
    ".mw-jump-link",
    "#mw-navigation",
    "#footer",
    ".toc",
    "#toc",
    ".catlinks",
    ".printfooter",
    ".noprint",
    // References and citations
    "sup.reference",
    ".reference",
    ".reflist",
    ".mw-references-wrap",
    "ol.references",
    // Boxes and panels
    ".infobox",
    ".navbox",
    ".navbox-styles",
    ".vertical-navbox",
    ".sidebar",
    ".sistersitebox",
    ".side-box",
    ".portalbox",
    ".metadata",
    ".hatnote",
    ".shortdescription",
    ".mw-authority-control",
    ".ambox",
    ".mbox",
    ".mbox-small",
    ".mw-empty-elt",
    ".gallery",
    ".wikitable",
    // Non-content markup
    "script",
    "style",
    "link",
    "meta",
    "noscript",
    // Media we cannot carry
    "video",
    "audio",
    "iframe",
    "object",
    "embed",
    "canvas",
    "map",
    "source",
    // Forms
    "input",
    "button",
    "select",
    "textarea",
    "form",
];

/// Remove nodes entirely
pub fn remove_by_selector(document: &NodeRef, selector: &str) -> usize {
    let Ok(nodes) = document.select(selector) else {
        return 0;
    };
    // Detaching while the selector walks the tree skips siblings.
    let matched: Vec<_> = nodes.collect();
    for node in &matched {
        node.as_node().detach();
    }
    matched.len()
}

/// Strip everything listed in [`CHROME_SELECTORS`] from `document`.
pub fn strip_chrome(document: &NodeRef) -> usize {
    CHROME_SELECTORS
        .iter()
        .map(|selector| remove_by_selector(document, selector))
        .sum()
}
