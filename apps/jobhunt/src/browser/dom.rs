//! Read-only DOM helpers over page snapshots.
//!
//! The browser hands back serialised HTML; everything that only needs to read
//! the page (card parsing, form discovery, confirmation checks) works on a
//! parsed `scraper::Html` so it can be tested without a browser.

use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Elements whose text never belongs to a job description.
const BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "noscript", "iframe", "button", "form",
    "svg", "template",
];

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6",
    "tr", "table", "main", "aside", "blockquote", "pre", "dd", "dt", "dl",
];

/// Parses `css`, logging and returning `None` for selectors the engine rejects.
pub fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(e) => {
            debug!("Invalid selector {css:?}: {e:?}");
            None
        }
    }
}

pub fn select_all<'a>(doc: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    selector(css)
        .map(|sel| doc.select(&sel).collect())
        .unwrap_or_default()
}

pub fn select_first<'a>(doc: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let sel = selector(css)?;
    doc.select(&sel).next()
}

pub fn select_within<'a>(el: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = selector(css)?;
    el.select(&sel).next()
}

pub fn exists(doc: &Html, css: &str) -> bool {
    select_first(doc, css).is_some()
}

/// Whitespace-collapsed text content.
pub fn text_of(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of the whole document, lowercased. Used for phrase matching.
pub fn page_text_lower(doc: &Html) -> String {
    let mut out = String::new();
    collect_text(doc.root_element(), &mut out);
    collapse_whitespace(&out).to_lowercase()
}

/// Element to plain text: boilerplate elements dropped, one line per block,
/// no blank lines.
pub fn element_to_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(el, &mut out);
    out.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }
        let Some(child_el) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child_el.value().name();
        if BOILERPLATE_TAGS.contains(&name) {
            continue;
        }
        if name == "br" {
            out.push('\n');
            continue;
        }
        let block = BLOCK_TAGS.contains(&name);
        if block {
            out.push('\n');
        }
        collect_text(child_el, out);
        if block {
            out.push('\n');
        }
    }
}

/// Hex SHA-256 of the document's visible text. Two snapshots with the same
/// hash show the same listing page.
pub fn content_hash(doc: &Html) -> String {
    let mut hasher = Sha256::new();
    hasher.update(page_text_lower(doc).as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// True when the element or one of its ancestors is hidden from the user.
pub fn is_hidden(el: ElementRef<'_>) -> bool {
    let hidden_input = el.value().name() == "input"
        && el
            .value()
            .attr("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("hidden"));
    if hidden_input {
        return true;
    }
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .any(|node| {
            let v = node.value();
            if v.attr("hidden").is_some() || v.attr("aria-hidden") == Some("true") {
                return true;
            }
            v.attr("style").is_some_and(|style| {
                let style: String = style
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .to_lowercase();
                style.contains("display:none") || style.contains("visibility:hidden")
            })
        })
}

/// Selector for the first visible element matching `css` whose text contains
/// one of `needles`. Needles are tried in order, so earlier ones win.
pub fn find_by_text(doc: &Html, css: &str, needles: &[&str]) -> Option<String> {
    let candidates: Vec<(ElementRef<'_>, String)> = select_all(doc, css)
        .into_iter()
        .filter(|el| !is_hidden(*el))
        .map(|el| (el, text_of(el).to_lowercase()))
        .collect();
    needles.iter().find_map(|needle| {
        let needle = needle.to_lowercase();
        candidates
            .iter()
            .find(|(_, text)| text.contains(&needle))
            .map(|(el, _)| element_selector(doc, *el))
    })
}

/// Stable CSS selector that addresses `el` inside `doc`.
///
/// Prefers `#id` when the id is unique and safe to embed; otherwise an
/// absolute `tag:nth-of-type(n)` path from `html`.
pub fn element_selector(doc: &Html, el: ElementRef<'_>) -> String {
    if let Some(id) = el.value().id() {
        if is_css_identifier(id) && select_all(doc, &format!("#{id}")).len() == 1 {
            return format!("#{id}");
        }
    }
    css_path(el)
}

pub fn css_path(el: ElementRef<'_>) -> String {
    let mut segments = Vec::new();
    let mut current = Some(el);
    while let Some(node) = current {
        let name = node.value().name();
        let parent = node.parent().and_then(ElementRef::wrap);
        match parent {
            Some(parent) => {
                let position = parent
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|sibling| sibling.value().name() == name)
                    .position(|sibling| sibling.id() == node.id())
                    .unwrap_or(0);
                segments.push(format!("{name}:nth-of-type({})", position + 1));
            }
            None => segments.push(name.to_string()),
        }
        current = parent;
    }
    segments.reverse();
    segments.join(" > ")
}

fn is_css_identifier(id: &str) -> bool {
    let mut chars = id.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_to_text_drops_boilerplate() {
        let html = r#"
            <div>
                <script>var x = 1;</script>
                <nav>Home | Jobs</nav>
                <h2>Deine Aufgaben</h2>
                <ul><li>Python   entwickeln</li><li>Daten analysieren</li></ul>
                <button>Jetzt bewerben</button>
                <footer>Impressum</footer>
            </div>"#;
        let fragment = Html::parse_fragment(html);
        let text = element_to_text(fragment.root_element());
        assert_eq!(text, "Deine Aufgaben\nPython entwickeln\nDaten analysieren");
    }

    #[test]
    fn test_content_hash_ignores_markup_differences() {
        let a = Html::parse_document("<p>Job  A</p>");
        let b = Html::parse_document("<div><span>Job A</span></div>");
        let c = Html::parse_document("<p>Job B</p>");
        assert_eq!(content_hash(&a), content_hash(&b));
        assert_ne!(content_hash(&a), content_hash(&c));
    }

    #[test]
    fn test_element_selector_prefers_unique_id() {
        let doc = Html::parse_document(r#"<form><input id="email" name="e"></form>"#);
        let el = select_first(&doc, "input").unwrap();
        assert_eq!(element_selector(&doc, el), "#email");
    }

    #[test]
    fn test_element_selector_falls_back_to_path() {
        let doc = Html::parse_document(
            r#"<form><input id="1bad"><input id="dup"><input id="dup"></form>"#,
        );
        let inputs = select_all(&doc, "input");
        let first = element_selector(&doc, inputs[0]);
        let third = element_selector(&doc, inputs[2]);
        assert_eq!(first, "html > body:nth-of-type(1) > form:nth-of-type(1) > input:nth-of-type(1)");
        assert!(third.ends_with("input:nth-of-type(3)"));
        // The path must resolve back to the same element.
        let resolved = select_first(&doc, &third).unwrap();
        assert_eq!(resolved.id(), inputs[2].id());
    }

    #[test]
    fn test_find_by_text_respects_needle_priority() {
        let doc = Html::parse_document(
            r#"<button id="later">Accept</button>
               <button id="first">Alle akzeptieren</button>
               <button hidden>Akzeptieren</button>"#,
        );
        let found = find_by_text(&doc, "button", &["akzeptieren", "accept"]);
        assert_eq!(found.as_deref(), Some("#first"));
        assert_eq!(find_by_text(&doc, "button", &["ablehnen"]), None);
    }

    #[test]
    fn test_hidden_detection() {
        let doc = Html::parse_document(
            r#"<input type="hidden" name="csrf">
               <div style="display: none"><input name="trap"></div>
               <input name="visible">"#,
        );
        let hidden: Vec<bool> = select_all(&doc, "input").into_iter().map(is_hidden).collect();
        assert_eq!(hidden, vec![true, true, false]);
    }
}
