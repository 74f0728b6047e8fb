//! Document fetching: HTTP GET, content-type gate, charset-aware decode and
//! modification-time extraction from response headers.
use crate::address::SiteUri;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, CONTENT_TYPE, DATE, LAST_MODIFIED};
use reqwest::Client;
use scraper::Html;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {uri} failed: {source}")]
    Request {
        uri: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("cannot fetch {uri}, status code: {status}")]
    Status { uri: String, status: u16 },
    #[error("{uri}, invalid content type: {ctype:?}")]
    ContentType { uri: String, ctype: String },
    #[error("unable to decode {uri}: {source}")]
    Decode {
        uri: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Metadata of a fetched document.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DocumentMeta {
    /// Document modification time; `None` means unknown and is never rendered.
    pub modified: Option<DateTime<Utc>>,
}

/// Fetches `uri` and parses the response body into a document tree.
///
/// Rejects non-2xx responses and any content type other than `text/html`.
/// The body is decoded using the charset declared in the response. The
/// modification time is taken from `Last-Modified`, falling back to the
/// `Date` header; when both are absent or unparsable it stays unknown.
/// A zero `timeout` disables the request deadline.
pub async fn fetch_document(
    client: &Client,
    uri: &SiteUri,
    timeout: Duration,
) -> Result<(Html, DocumentMeta), FetchError> {
    let mut request = client.get(uri.as_str());
    if !timeout.is_zero() {
        request = request.timeout(timeout);
    }
    let response = request.send().await.map_err(|source| FetchError::Request {
        uri: uri.to_string(),
        source,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            uri: uri.to_string(),
            status: status.as_u16(),
        });
    }

    let ctype = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !ctype.contains("text/html") {
        return Err(FetchError::ContentType {
            uri: uri.to_string(),
            ctype,
        });
    }

    let meta = DocumentMeta {
        modified: modified_from_headers(response.headers()),
    };

    let body = response.text().await.map_err(|source| FetchError::Decode {
        uri: uri.to_string(),
        source,
    })?;

    Ok((Html::parse_document(&body), meta))
}

fn modified_from_headers(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    [LAST_MODIFIED, DATE].iter().find_map(|name| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date)
    })
}

/// HTTP dates are RFC 1123, which chrono's RFC 2822 parser accepts,
/// including the obsolete `GMT` zone name.
fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_http_dates() {
        let expected = Utc.with_ymd_and_hms(2019, 5, 21, 23, 26, 0).unwrap();
        assert_eq!(
            parse_http_date("Tue, 21 May 2019 23:26:00 GMT"),
            Some(expected)
        );
        assert_eq!(parse_http_date("not a date"), None);
        assert_eq!(parse_http_date(""), None);
    }

    #[tokio::test]
    async fn rejects_wrong_content_type() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/data.json")
            .with_header("content-type", "application/json")
            .with_body("{}")
            .create_async()
            .await;

        let uri = SiteUri::parse(&format!("{}/data.json", server.url())).unwrap();
        let err = fetch_document(&Client::new(), &uri, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ContentType { .. }), "{err}");
    }

    #[tokio::test]
    async fn rejects_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/gone.html")
            .with_status(404)
            .create_async()
            .await;

        let uri = SiteUri::parse(&format!("{}/gone.html", server.url())).unwrap();
        let err = fetch_document(&Client::new(), &uri, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(
            matches!(err, FetchError::Status { status: 404, .. }),
            "{err}"
        );
    }

    #[tokio::test]
    async fn reads_last_modified_header() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/page.html")
            .with_header("content-type", "text/html; charset=utf-8")
            .with_header("last-modified", "Tue, 21 May 2019 23:26:00 GMT")
            .with_body("<html><body></body></html>")
            .create_async()
            .await;

        let uri = SiteUri::parse(&format!("{}/page.html", server.url())).unwrap();
        let (_, meta) = fetch_document(&Client::new(), &uri, Duration::ZERO)
            .await
            .unwrap();
        let expected = Utc.with_ymd_and_hms(2019, 5, 21, 23, 26, 0).unwrap();
        assert_eq!(meta.modified, Some(expected));
    }
}
