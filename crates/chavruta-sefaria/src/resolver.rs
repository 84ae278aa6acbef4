//! Reference resolver: free text → canonical ref
//!
//! Resolution order: exact lookup for citation-shaped queries, then a
//! fixed alias table for well-known phrases, then nothing. A separate
//! phrase-search fallback serves tools that want ranked text hits for
//! arbitrary queries.

use chavruta_core::refs;

use crate::client::SefariaClient;
use crate::error::SefariaError;

/// Well-known phrases mapped to their canonical sources
///
/// Matching is case-insensitive substring over the query.
const ALIASES: &[(&str, &str)] = &[
    ("shabbat candles", "Shulchan Arukh, Orach Chayim 263"),
    ("shabbos candles", "Shulchan Arukh, Orach Chayim 263"),
    ("chanukah lights", "Shulchan Arukh, Orach Chayim 671"),
    ("chanukah candles", "Shulchan Arukh, Orach Chayim 671"),
    ("hanukkah lights", "Shulchan Arukh, Orach Chayim 671"),
    ("hanukkah candles", "Shulchan Arukh, Orach Chayim 671"),
    ("lo bashamayim hi", "Bava Metzia 59b"),
    ("pikuach nefesh", "Yoma 85b"),
    ("פיקוח נפש", "Yoma 85b"),
];

/// Longest query we will hand to the exact-lookup endpoint
const MAX_EXACT_LOOKUP_CHARS: usize = 120;

/// Longest query text used for phrase search
const MAX_PHRASE_CHARS: usize = 200;

/// One phrase-search hit
#[derive(Debug, Clone)]
pub struct PhraseHit {
    pub reference: String,
    pub url: String,
    pub text: Option<String>,
}

/// Map a user query to a canonical ref, if one can be pinned down
///
/// Upstream failures during exact lookup degrade to the alias table.
pub async fn resolve(client: &SefariaClient, query: &str) -> Option<String> {
    let query = refs::normalize_ref(query);
    if query.is_empty() {
        return None;
    }

    if refs::looks_like_ref(&query) && query.chars().count() <= MAX_EXACT_LOOKUP_CHARS {
        match client.texts(&query, &["english"]).await {
            Ok(resp) => {
                if let Some(canonical) = resp.canonical_ref() {
                    return Some(canonical.to_owned());
                }
            }
            Err(e) => {
                tracing::debug!(query = %query, error = %e, "exact ref lookup missed");
            }
        }
    }

    alias(&query)
}

/// Scan the alias table alone (no network)
pub fn alias(query: &str) -> Option<String> {
    let folded = query.to_lowercase();
    ALIASES
        .iter()
        .find(|(pattern, _)| folded.contains(pattern))
        .map(|(_, reference)| (*reference).to_owned())
}

/// Ranked phrase-search hits for arbitrary free text
pub async fn phrase_search(
    client: &SefariaClient,
    text: &str,
    limit: usize,
) -> Result<Vec<PhraseHit>, SefariaError> {
    let trimmed: String = text.trim().chars().take(MAX_PHRASE_CHARS).collect();
    let body = serde_json::json!({
        "size": limit,
        "query": {
            "match_phrase": {
                "naive_lemmatizer": {"query": trimmed, "slop": 10}
            }
        },
        "highlight": {"fields": {"naive_lemmatizer": {}}},
    });

    let response = client.search(&body).await?;
    Ok(response
        .hits
        .hits
        .iter()
        .filter_map(|hit| {
            let reference = hit.reference()?;
            Some(PhraseHit {
                url: refs::ref_url(&reference),
                text: hit.highlight_text(),
                reference,
            })
        })
        .take(limit)
        .collect())
}
