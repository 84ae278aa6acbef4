//! Content extraction: HTML readability, PDF text, normalization

use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};
use unicode_normalization::UnicodeNormalization;

use crate::error::WebError;

/// Upper bound on extracted text regardless of caller limits
pub const HARD_MAX_CHARS: usize = 1_000_000;

/// Page cap for the page-by-page PDF fallback
const PDF_FALLBACK_MAX_PAGES: usize = 50;

/// Containers tried first when isolating the primary article text
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    "#content",
    ".content",
    ".post-content",
    ".entry-content",
];

/// Result of extracting one response body
#[derive(Debug, Default)]
pub struct Extracted {
    pub title: String,
    pub text: String,
    pub canonical_url: Option<String>,
    pub language: Option<String>,
    pub page_count: Option<usize>,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selectors are valid")
}

/// Readability-style extraction over a parsed DOM
///
/// Falls back to stripped whole-document text when no content
/// container yields anything.
pub fn extract_html(body: &str) -> Extracted {
    let document = Html::parse_document(body);

    let title = meta_content(&document, "meta[property=\"og:title\"]")
        .or_else(|| {
            document
                .select(&selector("title"))
                .next()
                .map(|t| t.text().collect::<String>().trim().to_owned())
                .filter(|t| !t.is_empty())
        })
        .unwrap_or_else(|| "Untitled".to_owned());

    let canonical_url = meta_content(&document, "meta[property=\"og:url\"]").or_else(|| {
        document
            .select(&selector("link[rel=\"canonical\"]"))
            .next()
            .and_then(|l| l.value().attr("href"))
            .map(str::to_owned)
            .filter(|h| !h.is_empty())
    });

    let language = document
        .select(&selector("html"))
        .next()
        .and_then(|h| h.value().attr("lang"))
        .map(str::to_owned)
        .filter(|l| !l.is_empty());

    let mut text = String::new();
    for css in CONTENT_SELECTORS {
        if let Some(container) = document.select(&selector(css)).next() {
            text = paragraph_text(container);
            if !text.is_empty() {
                break;
            }
        }
    }
    if text.is_empty()
        && let Some(body_el) = document.select(&selector("body")).next()
    {
        text = paragraph_text(body_el);
    }
    if text.is_empty()
        && let Some(body_el) = document.select(&selector("body")).next()
    {
        // Last resort: everything, scripts and styles excluded by the DOM
        text = body_el.text().collect::<Vec<_>>().join(" ");
    }

    Extracted {
        title,
        text,
        canonical_url,
        language,
        page_count: None,
    }
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    document
        .select(&selector(css))
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(str::to_owned)
        .filter(|c| !c.is_empty())
}

/// Block-level text inside a container, one paragraph per line
fn paragraph_text(container: scraper::ElementRef<'_>) -> String {
    static BLOCKS: OnceLock<Selector> = OnceLock::new();
    let blocks = BLOCKS.get_or_init(|| selector("p, h1, h2, h3, h4, h5, h6, li, blockquote, pre"));

    let mut paragraphs = Vec::new();
    for element in container.select(blocks) {
        let text = element.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !text.is_empty() {
            paragraphs.push(text);
        }
    }
    paragraphs.join("\n\n")
}

/// PDF text via the primary parser, page-by-page on empty output
pub fn extract_pdf(bytes: &[u8]) -> Result<Extracted, WebError> {
    let page_count = lopdf::Document::load_mem(bytes).ok().map(|doc| doc.get_pages().len());

    let text = match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) if !text.trim().is_empty() => text,
        primary => {
            if let Err(ref e) = primary {
                tracing::debug!(error = %e, "primary pdf extraction failed, trying page-by-page");
            }
            extract_pdf_pages(bytes)?
        }
    };

    Ok(Extracted {
        title: "Untitled".to_owned(),
        text,
        page_count,
        ..Extracted::default()
    })
}

fn extract_pdf_pages(bytes: &[u8]) -> Result<String, WebError> {
    let document = lopdf::Document::load_mem(bytes).map_err(|e| WebError::Extract(e.to_string()))?;
    let mut parts = Vec::new();
    for (page_number, _) in document.get_pages().into_iter().take(PDF_FALLBACK_MAX_PAGES) {
        match document.extract_text(&[page_number]) {
            Ok(page_text) if !page_text.trim().is_empty() => parts.push(page_text),
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(page = page_number, error = %e, "pdf page unreadable");
            }
        }
    }
    if parts.is_empty() {
        return Err(WebError::Extract("no extractable text in PDF".to_owned()));
    }
    Ok(parts.join("\n\n"))
}

/// NFKC, collapsed horizontal whitespace, capped blank runs, truncated
///
/// Returns the text and whether truncation occurred.
pub fn normalize(raw: &str, max_chars: usize) -> (String, bool) {
    static HSPACE: OnceLock<Regex> = OnceLock::new();
    static BLANKS: OnceLock<Regex> = OnceLock::new();
    let hspace = HSPACE.get_or_init(|| Regex::new(r"[ \t\u{A0}]+").expect("static regex"));
    let blanks = BLANKS.get_or_init(|| Regex::new(r"\n{3,}").expect("static regex"));

    let composed: String = raw.nfkc().collect();
    let collapsed = hspace.replace_all(&composed, " ");
    let bounded = blanks.replace_all(&collapsed, "\n\n");
    let trimmed = bounded.trim();

    let cap = max_chars.min(HARD_MAX_CHARS);
    if trimmed.chars().count() > cap {
        (trimmed.chars().take(cap).collect(), true)
    } else {
        (trimmed.to_owned(), false)
    }
}

/// PDFs sometimes hide behind generic content types; the path tells
pub fn path_looks_like_pdf(url: &url::Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".pdf")
}
