use std::time::Duration;

use futures::future::BoxFuture;
use regex::Regex;
use tracing::debug;

use delver_core::config::FetchConfig;
use delver_core::error::{DelverError, Result};
use delver_core::traits::DocumentFetcher;
use delver_core::types::FetchOutcome;

/// Fetches a URL and reduces it to plain text.
///
/// PDFs go through `pdf-extract`; everything else is treated as HTML.
/// Failures never escape: they come back as [`FetchOutcome::Error`] so the
/// caller can skip them.
pub struct HttpFetcher {
    http: reqwest::Client,
    html: HtmlStripper,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| DelverError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            html: HtmlStripper::new()?,
        })
    }

    async fn load(&self, url: &str) -> FetchOutcome {
        let resp = match self.http.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => return FetchOutcome::Error(format!("Request Error: {}", e)),
        };

        let status = resp.status();
        if !status.is_success() {
            return FetchOutcome::Error(format!(
                "HTTP Error {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ));
        }

        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if looks_like_pdf(url, &content_type) {
            let bytes = match resp.bytes().await {
                Ok(bytes) => bytes,
                Err(e) => return FetchOutcome::Error(format!("Request Error: {}", e)),
            };
            debug!(url, bytes = bytes.len(), "Extracting PDF");
            // Extraction is CPU-bound and may panic on malformed input.
            let extracted =
                tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                    .await;
            match extracted {
                Ok(Ok(text)) => FetchOutcome::Text(text),
                Ok(Err(e)) => FetchOutcome::Error(format!("Error processing {}: {}", url, e)),
                Err(e) => FetchOutcome::Error(format!("Error processing {}: {}", url, e)),
            }
        } else {
            match resp.text().await {
                Ok(body) => FetchOutcome::Text(self.html.strip(&body)),
                Err(e) => FetchOutcome::Error(format!("Request Error: {}", e)),
            }
        }
    }
}

impl DocumentFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'_, FetchOutcome> {
        let url = url.to_string();
        Box::pin(async move {
            let outcome = self.load(&url).await;
            if let FetchOutcome::Error(e) = &outcome {
                debug!(url = %url, error = %e, "Fetch failed");
            }
            outcome
        })
    }
}

/// A URL whose path ends in `.pdf`, or a response typed as PDF.
pub fn looks_like_pdf(url: &str, content_type: &str) -> bool {
    let path_is_pdf = reqwest::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase().ends_with(".pdf"))
        .unwrap_or(false);
    path_is_pdf || url.to_ascii_lowercase().ends_with(".pdf") || content_type.contains("pdf")
}

/// Regex-based HTML to text.
struct HtmlStripper {
    script: Regex,
    style: Regex,
    tags: Regex,
    whitespace: Regex,
}

impl HtmlStripper {
    fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| DelverError::Config(format!("bad pattern: {}", e)))
        };
        Ok(Self {
            script: compile(r"(?is)<script[^>]*>.*?</script>")?,
            style: compile(r"(?is)<style[^>]*>.*?</style>")?,
            tags: compile(r"<[^>]+>")?,
            whitespace: compile(r"\s+")?,
        })
    }

    fn strip(&self, html: &str) -> String {
        let cleaned = self.script.replace_all(html, " ");
        let cleaned = self.style.replace_all(&cleaned, " ");
        // Tags become separators so adjacent blocks don't run together.
        let text = self.tags.replace_all(&cleaned, " ");

        let text = text
            .replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&#39;", "'")
            .replace("&amp;", "&");

        self.whitespace.replace_all(&text, " ").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&FetchConfig::default()).unwrap()
    }

    #[test]
    fn test_strip_html() {
        let html = "<html><head><style>p{color:red}</style><script>var x = 1;</script></head>\
                    <body><h1>Title</h1>\n\n<p>Fish &amp; chips&nbsp;&lt;3</p></body></html>";
        let text = HtmlStripper::new().unwrap().strip(html);
        assert_eq!(text, "Title Fish & chips <3");
    }

    #[test]
    fn test_looks_like_pdf() {
        assert!(looks_like_pdf("https://x.org/paper.PDF", "text/html"));
        assert!(looks_like_pdf("https://x.org/paper.pdf?dl=1", ""));
        assert!(looks_like_pdf("https://x.org/download", "application/pdf"));
        assert!(!looks_like_pdf("https://x.org/pdfs/index.html", "text/html"));
    }

    #[tokio::test]
    async fn test_html_page_is_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<p>Hello <b>world</b></p>"),
            )
            .mount(&server)
            .await;

        let outcome = fetcher().fetch(&format!("{}/page", server.uri())).await;
        assert_eq!(outcome.text(), Some("Hello world"));
    }

    #[tokio::test]
    async fn test_http_error_status_is_inert() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let outcome = fetcher().fetch(&format!("{}/missing", server.uri())).await;
        assert!(outcome.is_error());
        assert_eq!(outcome.as_str(), "HTTP Error 404: Not Found");
    }

    #[tokio::test]
    async fn test_pdf_url_takes_pdf_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/report.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<p>not really a pdf</p>"),
            )
            .mount(&server)
            .await;

        let url = format!("{}/report.pdf", server.uri());
        let outcome = fetcher().fetch(&url).await;
        // The HTML path would have produced text; the PDF path rejects it.
        assert!(outcome.is_error());
        assert!(outcome.as_str().starts_with(&format!("Error processing {}", url)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_error() {
        let outcome = fetcher().fetch("http://127.0.0.1:1/nothing").await;
        assert!(outcome.as_str().starts_with("Request Error"));
    }
}
