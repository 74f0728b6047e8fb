//! Pure tree walk over a parsed document: no network and no file I/O here.
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

static BASE: Lazy<Selector> = Lazy::new(|| Selector::parse("head base").unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

/// Raw link material collected from one document.
#[derive(Debug, Default, PartialEq)]
pub struct PageLinks {
    /// `href` of the first `<base>` element inside the first `<head>`,
    /// the optional site base override for resolving relative links.
    pub base: Option<String>,
    /// Every `href` of every `<a>` beneath the first `<body>`, in document
    /// order, duplicates kept.
    pub hrefs: Vec<String>,
}

/// Collects the base override and all anchor targets of `doc`.
///
/// A document without a `<body>` yields an empty list, not an error.
pub fn extract_links(doc: &Html) -> PageLinks {
    let base = doc
        .select(&BASE)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(str::to_string);
    let hrefs = match doc.select(&BODY).next() {
        Some(body) => body
            .select(&ANCHOR)
            .filter_map(|a| a.value().attr("href"))
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    };
    PageLinks { base, hrefs }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_anchors_in_document_order_with_duplicates() {
        let doc = Html::parse_document(
            r##"<!doctype html>
            <html>
            <head><title>t</title></head>
            <body>
                <a href="faq.html">faq</a>
                <p><a href="protocol.html">protocol</a></p>
                <a href="terms.html">terms</a>
                <a href="terms.html">terms again</a>
                <a name="no-href">skip</a>
                <a href="#top">top</a>
            </body>
            </html>"##,
        );
        let links = extract_links(&doc);
        assert_eq!(links.base, None);
        assert_eq!(
            links.hrefs,
            vec!["faq.html", "protocol.html", "terms.html", "terms.html", "#top"]
        );
    }

    #[test]
    fn finds_base_override_in_head() {
        let doc = Html::parse_document(
            r#"<html>
            <head><base href="http://host/path/"><title>t</title></head>
            <body><a href="page.html">p</a></body>
            </html>"#,
        );
        let links = extract_links(&doc);
        assert_eq!(links.base.as_deref(), Some("http://host/path/"));
        assert_eq!(links.hrefs, vec!["page.html"]);
    }

    #[test]
    fn fragment_without_body_yields_empty_result() {
        // html5ever synthesizes an empty body for most fragments, and either
        // way there is nothing to collect
        let doc = Html::parse_document("<head><title>only a head</title></head>");
        let links = extract_links(&doc);
        assert!(links.hrefs.is_empty());
    }

    #[test]
    fn anchors_outside_body_are_ignored() {
        let doc = Html::parse_document(
            r#"<html><head><title>t</title></head><body></body></html>"#,
        );
        assert!(extract_links(&doc).hrefs.is_empty());
    }
}
