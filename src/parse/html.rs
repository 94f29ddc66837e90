//! HTML parsing and text extraction

use super::{
    collapse_whitespace, count_words, truncate_chars, ExtractedLink, ExtractedPage,
    MAX_ANCHOR_CHARS,
};
use crate::crawl::normalize_crawl_url;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// Elements whose text never renders
const INVISIBLE_ELEMENTS: [&str; 6] = ["script", "style", "noscript", "template", "svg", "head"];

/// Extract title, visible text and links from an HTML document.
///
/// `base_url` is the crawl's base URL. `/`-relative hrefs are resolved
/// against it, and absolute hrefs are internal when they share its origin
/// (scheme, host and port). Malformed markup degrades to whatever the HTML5
/// parser recovers; this never fails.
pub fn extract(html: &str, base_url: &str) -> ExtractedPage {
    let document = Html::parse_document(html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|s| document.select(&s).next())
        .map(|e| collapse_whitespace(&e.text().collect::<String>()))
        .unwrap_or_default();

    let body = Selector::parse("body")
        .ok()
        .and_then(|s| document.select(&s).next())
        .unwrap_or_else(|| document.root_element());
    let text = collapse_whitespace(&visible_text(body));
    let word_count = count_words(&text);

    let (links, external_links) = match Url::parse(base_url) {
        Ok(base) => extract_links(&document, &base),
        Err(_) => (Vec::new(), Vec::new()),
    };

    ExtractedPage {
        title,
        text,
        word_count,
        links,
        external_links,
    }
}

/// Concatenate the text nodes under `root` that a browser would render
fn visible_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();

    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|e| INVISIBLE_ELEMENTS.contains(&e.name()))
                .unwrap_or(false)
        });
        if !hidden {
            out.push_str(text);
        }
    }

    out
}

fn extract_links(document: &Html, base: &Url) -> (Vec<ExtractedLink>, Vec<ExtractedLink>) {
    let mut links = Vec::new();
    let mut external = Vec::new();

    let Ok(selector) = Selector::parse("a[href]") else {
        return (links, external);
    };

    for elem in document.select(&selector) {
        let Some(href) = elem.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty() {
            continue;
        }

        let anchor = collapse_whitespace(&elem.text().collect::<String>());
        let anchor_text = truncate_chars(&anchor, MAX_ANCHOR_CHARS).to_string();

        let Ok(resolved) = base.join(href) else {
            continue;
        };
        let Some(url) = normalize_crawl_url(resolved.as_str()) else {
            continue;
        };

        let site_relative = href.starts_with('/') && !href.starts_with("//");
        let absolute = href.starts_with("//") || Url::parse(href).is_ok();
        if !site_relative && !absolute {
            continue;
        }

        if resolved.origin() == base.origin() {
            links.push(ExtractedLink { url, anchor_text });
        } else {
            external.push(ExtractedLink { url, anchor_text });
        }
    }

    (links, external)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_minimal_document() {
        let page = extract(
            "<html><head><title>T</title></head><body>  Hello   World  </body></html>",
            "https://x.test/",
        );

        assert_eq!(page.title, "T");
        assert_eq!(page.text, "Hello World");
        assert_eq!(page.word_count, 2);
        assert!(page.links.is_empty());
        assert!(page.external_links.is_empty());
    }

    #[test]
    fn test_missing_title_is_empty() {
        let page = extract("<p>no head here</p>", "https://x.test/");
        assert_eq!(page.title, "");
        assert_eq!(page.text, "no head here");
        assert_eq!(page.word_count, 3);
    }

    #[test]
    fn test_scripts_and_styles_are_invisible() {
        let html = r#"
        <html><body>
            <script>var hidden = 1;</script>
            <style>.x { color: red }</style>
            <p>Shown   text</p>
            <noscript>enable js</noscript>
        </body></html>
        "#;
        let page = extract(html, "https://x.test/");
        assert_eq!(page.text, "Shown text");
    }

    #[test]
    fn test_link_scope_rules() {
        let html = r#"
        <html><body>
            <a href="/about">About us</a>
            <a href="https://x.test/docs/intro#top">Intro</a>
            <a href="relative/path">Relative</a>
            <a href="https://other.test/page">Elsewhere</a>
            <a href="//cdn.other.test/lib.js">CDN</a>
            <a href="mailto:hi@x.test">Mail</a>
            <a href="http://[::1">Broken</a>
        </body></html>
        "#;
        let page = extract(html, "https://x.test/");

        let internal: Vec<&str> = page.links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            internal,
            vec!["https://x.test/about", "https://x.test/docs/intro"]
        );

        let external: Vec<&str> = page.external_links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            external,
            vec!["https://other.test/page", "https://cdn.other.test/lib.js"]
        );
        assert_eq!(page.links[0].anchor_text, "About us");
    }

    #[test]
    fn test_absolute_links_scoped_by_origin() {
        let html = r#"<a href="http://x.test/a">A</a><a href="https://x.test">Root</a>"#;
        let page = extract(html, "https://x.test/");

        let internal: Vec<&str> = page.links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(internal, vec!["https://x.test/"]);

        let external: Vec<&str> = page.external_links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(external, vec!["http://x.test/a"]);
    }

    #[test]
    fn test_anchor_text_truncated_to_fifty_chars() {
        let long = "a".repeat(80);
        let html = format!(r#"<body><a href="/p">  {long}  </a></body>"#);
        let page = extract(&html, "https://x.test/");
        assert_eq!(page.links[0].anchor_text.chars().count(), 50);
    }

    #[test]
    fn test_extract_is_deterministic() {
        let html = r#"<title>Home</title><body><a href="/a">A</a> text <a href="/b">B</a></body>"#;
        let first = extract(html, "https://x.test/");
        let second = extract(html, "https://x.test/");
        assert_eq!(first, second);
    }

    #[test]
    fn test_unparseable_base_keeps_text() {
        let page = extract("<title>T</title><body><a href='/a'>A</a> body</body>", "not a url");
        assert_eq!(page.title, "T");
        assert_eq!(page.text, "A body");
        assert!(page.links.is_empty());
    }
}
