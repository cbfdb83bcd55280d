//! Text and link extraction from a parsed page.

use lazy_static::lazy_static;
use scraper::{Html, Node, Selector};
use url::Url;

lazy_static! {
    static ref ANCHOR: Selector = Selector::parse("a[href]").expect("valid selector");
}

/// Elements whose content is never indexed or followed.
const SKIPPED: [&str; 5] = ["head", "style", "script", "noscript", "svg"];

fn is_skipped(node: &Node) -> bool {
    node.as_element().map_or(false, |el| SKIPPED.iter().any(|name| el.name().eq_ignore_ascii_case(name)))
}

/// Visible text of the page, one space between text nodes.
pub fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else { continue };
        if node.ancestors().any(|parent| is_skipped(parent.value())) {
            continue;
        }
        out.push_str(text);
        out.push(' ');
    }
    out
}

/// Absolute http(s) links of the page in document order, without fragments.
pub fn extract_links(base: &Url, document: &Html) -> Vec<Url> {
    let mut links = Vec::new();
    for anchor in document.select(&ANCHOR) {
        if anchor.ancestors().any(|parent| is_skipped(parent.value())) {
            continue;
        }
        let Some(href) = anchor.value().attr("href") else { continue };
        let Ok(mut link) = base.join(href.trim()) else { continue };
        if !matches!(link.scheme(), "http" | "https") {
            continue;
        }
        link.set_fragment(None);
        links.push(link);
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<!doctype html>
<html>
  <head><title>Ignored title</title><style>body { color: red }</style></head>
  <body>
    <h1>Hello crawler</h1>
    <script>var hidden = "secret";</script>
    <p>Visible <b>words</b></p>
    <noscript><a href="/noscript">nope</a></noscript>
    <a href="/about#team">About</a>
    <a href="https://other.example/x">Other</a>
    <a href="mailto:me@example.com">Mail</a>
    <a href="#top">Top</a>
    <a href="  sub/page.html ">Sub</a>
  </body>
</html>"##;

    #[test]
    fn visible_text_skips_head_and_scripts() {
        let doc = Html::parse_document(PAGE);
        let text = visible_text(&doc);
        assert!(text.contains("Hello crawler"));
        assert!(text.contains("words"));
        assert!(!text.contains("Ignored"));
        assert!(!text.contains("secret"));
        assert!(!text.contains("color"));
        assert!(!text.contains("nope"));
    }

    #[test]
    fn links_are_absolute_http_without_fragments() {
        let base = Url::parse("http://site.example/dir/index.html").unwrap();
        let doc = Html::parse_document(PAGE);
        let links: Vec<String> = extract_links(&base, &doc).into_iter().map(String::from).collect();
        assert_eq!(
            links,
            vec![
                "http://site.example/about",
                "https://other.example/x",
                "http://site.example/dir/index.html",
                "http://site.example/dir/sub/page.html",
            ]
        );
    }
}
