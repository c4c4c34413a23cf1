//! Visible-text extraction from homepage HTML.
//!
//! Two passes: [`extract_visible_text`] drops page chrome (navigation,
//! header/footer, sidebars, scripts, styling) and joins the remaining text
//! nodes of `<body>`; [`clean_text`] normalizes the whitespace left behind.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

/// Elements whose entire subtree is treated as noise.
const CHROME_TAGS: &[&str] = &[
    "header", "footer", "nav", "aside", "script", "style", "noscript",
];

/// Extract the visible text of the document body, chrome excluded.
///
/// Text nodes are joined with a single space; the result is not yet cleaned.
/// Returns an empty string when the document has no body text.
pub fn extract_visible_text(html: &str) -> String {
    static BODY_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("body").expect("valid selector"));

    let doc = Html::parse_document(html);
    let Some(body) = doc.select(&BODY_SEL).next() else {
        return String::new();
    };

    let mut parts: Vec<&str> = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let in_chrome = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| CHROME_TAGS.contains(&el.name()))
        });
        if !in_chrome {
            parts.push(&**text);
        }
    }

    parts.join(" ")
}

/// Collapse whitespace runs, drop newlines and non-breaking spaces, trim.
pub fn clean_text(text: &str) -> String {
    static WS_RUN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\s\s+").expect("valid regex"));

    WS_RUN_RE
        .replace_all(text, " ")
        .replace('\n', " ")
        .replace('\u{a0}', "")
        .trim()
        .to_string()
}

/// Full extraction: visible body text, cleaned.
pub fn page_text(html: &str) -> String {
    clean_text(&extract_visible_text(html))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    #[test]
    fn homepage_keeps_main_content() {
        let text = page_text(&load_fixture("homepage.html"));
        assert!(text.starts_with("Acme Widgets"));
        assert!(text.contains("We build AI-ready industrial widgets for modern factories."));
        assert!(text.contains("What we offer Precision widgets AI predictive maintenance"));
    }

    #[test]
    fn homepage_strips_chrome() {
        let text = page_text(&load_fixture("homepage.html"));
        for noise in [
            "Acme logo",
            "Products menu",
            "newsletter sidebar",
            "JavaScript banner",
            "footer",
            "trackPageView",
            "font-family",
            "dataLayer",
        ] {
            assert!(!text.contains(noise), "leaked {noise:?} into {text:?}");
        }
    }

    #[test]
    fn homepage_whitespace_is_normalized() {
        let text = page_text(&load_fixture("homepage.html"));
        assert!(!text.contains('\n'));
        assert!(!text.contains("  "));
        assert!(!text.contains('\u{a0}'));
        assert_eq!(text, text.trim());
    }

    #[test]
    fn clean_text_rules() {
        assert_eq!(clean_text("  a \n\n  b  "), "a b");
        assert_eq!(clean_text("a\nb"), "a b");
        assert_eq!(clean_text("a\u{a0}b"), "ab");
        assert_eq!(clean_text("a \u{a0} b"), "a b");
        assert_eq!(clean_text("\t\n "), "");
    }

    #[test]
    fn empty_body_yields_empty_text() {
        assert_eq!(page_text("<html><head><title>t</title></head><body></body></html>"), "");
        assert_eq!(
            page_text("<html><body><nav>only nav</nav><script>x()</script></body></html>"),
            ""
        );
    }
}
