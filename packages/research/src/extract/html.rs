//! HTML to text lines.
//!
//! Picks the main content area when the page has one, drops navigation and
//! other boilerplate, and breaks text at block-level elements.

use scraper::{ElementRef, Html, Node, Selector};

/// Candidate main-content containers, most specific first.
const MAIN_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role='main']",
    "#content",
    "#main",
    ".post-content",
    ".entry-content",
    ".article-body",
    ".content",
];

/// A main-content candidate must carry at least this much text, otherwise
/// the whole body is used.
const MIN_MAIN_CHARS: usize = 200;

/// Elements whose subtree never contains readable content.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "svg", "canvas", "template", "nav", "header",
    "footer", "aside", "form", "button", "select", "option", "head", "title", "meta", "link",
];

/// Class or id tokens that mark boilerplate containers.
const BOILERPLATE_MARKERS: &[&str] = &[
    "nav",
    "navbar",
    "navigation",
    "menu",
    "sidebar",
    "footer",
    "site-header",
    "cookie",
    "cookie-banner",
    "consent",
    "advertisement",
    "ads",
    "ad",
    "share",
    "social",
    "breadcrumb",
    "breadcrumbs",
    "newsletter",
    "related",
    "comments",
    "skip-link",
];

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "li", "ul", "ol", "dl", "dt", "dd", "h1", "h2",
    "h3", "h4", "h5", "h6", "blockquote", "pre", "table", "tr", "td", "th", "figcaption",
    "summary", "details", "hr",
];

/// Accumulates text into whitespace-normalized lines.
#[derive(Default)]
struct Lines {
    current: String,
    done: Vec<String>,
}

impl Lines {
    fn push_text(&mut self, text: &str) {
        for word in text.split_whitespace() {
            if !self.current.is_empty() {
                self.current.push(' ');
            }
            self.current.push_str(word);
        }
    }

    fn break_line(&mut self) {
        if !self.current.is_empty() {
            self.done.push(std::mem::take(&mut self.current));
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.break_line();
        self.done
    }
}

fn is_boilerplate(element: &ElementRef<'_>) -> bool {
    let el = element.value();
    if SKIP_TAGS.contains(&el.name()) {
        return true;
    }
    if el.attr("hidden").is_some() || el.attr("aria-hidden") == Some("true") {
        return true;
    }
    if matches!(el.attr("role"), Some("navigation" | "banner" | "contentinfo")) {
        return true;
    }
    let marked = |token: &str| BOILERPLATE_MARKERS.contains(&token.to_ascii_lowercase().as_str());
    el.classes().any(marked) || el.id().is_some_and(marked)
}

fn collect(element: ElementRef<'_>, lines: &mut Lines) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => lines.push_text(text),
            Node::Element(_) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                if is_boilerplate(&child_el) {
                    continue;
                }
                let name = child_el.value().name();
                if name == "br" {
                    lines.break_line();
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    lines.break_line();
                }
                collect(child_el, lines);
                if block {
                    lines.break_line();
                }
            }
            _ => {}
        }
    }
}

fn text_len(element: ElementRef<'_>) -> usize {
    let mut lines = Lines::default();
    collect(element, &mut lines);
    lines.finish().iter().map(|l| l.chars().count()).sum()
}

/// Choose the element to read text from.
fn content_root(document: &Html) -> ElementRef<'_> {
    for selector_str in MAIN_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(main) = document.select(&selector).next() {
                if text_len(main) >= MIN_MAIN_CHARS {
                    return main;
                }
            }
        }
    }

    if let Ok(body_selector) = Selector::parse("body") {
        if let Some(body) = document.select(&body_selector).next() {
            return body;
        }
    }

    document.root_element()
}

/// Visible text of an HTML document as normalized, non-empty lines.
pub fn text_lines(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut lines = Lines::default();
    collect(content_root(&document), &mut lines);
    lines.finish()
}

/// Contents of the `<title>` element, if present and non-blank.
pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let title_selector = Selector::parse("title").ok()?;
    document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boilerplate_removed() {
        let html = r#"
            <html><head><title>T</title><style>.x{}</style></head><body>
              <nav><a href="/">Home</a> <a href="/about">About</a></nav>
              <div class="cookie-banner">We use cookies to improve things</div>
              <p>First paragraph of real text.</p>
              <script>var tracking = true;</script>
              <p>Second <b>bold</b> paragraph.</p>
              <footer>Copyright 2024</footer>
            </body></html>
        "#;

        let lines = text_lines(html);
        assert_eq!(
            lines,
            vec![
                "First paragraph of real text.".to_string(),
                "Second bold paragraph.".to_string()
            ]
        );
    }

    #[test]
    fn test_prefers_main_when_substantial() {
        let body = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(5);
        let html = format!(
            "<body><div>Outside text that is not main content.</div><main><p>{body}</p></main></body>"
        );
        let lines = text_lines(&html);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Lorem ipsum"));
    }

    #[test]
    fn test_tiny_main_falls_back_to_body() {
        let html = "<body><main>Short.</main><p>Body paragraph with several words.</p></body>";
        let lines = text_lines(html);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_br_breaks_lines() {
        let lines = text_lines("<body><p>one<br>two</p></body>");
        assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_page_title() {
        assert_eq!(
            page_title("<html><head><title>  Hello\n  World </title></head></html>"),
            Some("Hello World".to_string())
        );
        assert_eq!(page_title("<html><head><title> </title></head></html>"), None);
        assert_eq!(page_title("<p>no title</p>"), None);
    }
}
