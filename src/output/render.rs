//! XML rendering of site map and map index documents, following
//! <https://www.sitemaps.org/protocol.html>.
use crate::spider::MapItem;
use chrono::{DateTime, SecondsFormat, Utc};
use std::borrow::Cow;
use std::fmt::Write;

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Renders the `urlset` document for one map shard.
///
/// `lastmod` is emitted only for entries with a known modification time.
pub fn xml_map(items: &[MapItem]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{XML_HEADER}");
    let _ = writeln!(out, r#"<urlset xmlns="{NAMESPACE}">"#);
    for item in items {
        let _ = writeln!(out, "\t<url>");
        let _ = writeln!(out, "\t\t<loc>{}</loc>", escape(item.uri.as_str()));
        if let Some(modified) = item.meta.modified {
            let _ = writeln!(out, "\t\t<lastmod>{}</lastmod>", lastmod(modified));
        }
        let _ = writeln!(out, "\t</url>");
    }
    out.push_str("</urlset>\n");
    out
}

/// Renders the `sitemapindex` document for one index shard.
///
/// All records share the single `generated` timestamp; empty addresses are
/// omitted entirely.
pub fn xml_index(generated: Option<DateTime<Utc>>, files: &[String]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{XML_HEADER}");
    let _ = writeln!(out, r#"<sitemapindex xmlns="{NAMESPACE}">"#);
    for file in files.iter().filter(|f| !f.is_empty()) {
        let _ = writeln!(out, "\t<sitemap>");
        let _ = writeln!(out, "\t\t<loc>{}</loc>", escape(file));
        if let Some(generated) = generated {
            let _ = writeln!(out, "\t\t<lastmod>{}</lastmod>", lastmod(generated));
        }
        let _ = writeln!(out, "\t</sitemap>");
    }
    out.push_str("</sitemapindex>\n");
    out
}

fn lastmod(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Entity-escapes the characters the protocol requires inside element text.
fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>']) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}
