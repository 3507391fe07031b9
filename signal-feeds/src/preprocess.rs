//! Article text cleaning before extraction

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use signal_core::Article;
use tracing::debug;

/// News APIs cut bodies short with a trailing "[+1234 chars]"
static TRUNCATION_MARKER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\s*\[\+\d+\s*chars\]\s*$").ok());

/// Strip the truncation marker, collapse whitespace runs and trim
pub fn clean_text(text: &str) -> String {
    let stripped = match TRUNCATION_MARKER.as_ref() {
        Some(marker) => marker.replace(text, ""),
        None => text.into(),
    };
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep the first article for each URL, preserving order
///
/// Articles without a URL are never treated as duplicates.
pub fn dedupe_by_url(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|a| a.url.is_empty() || seen.insert(a.url.clone()))
        .collect()
}

/// Clean, de-duplicate and id every article, dropping those left without text
pub fn preprocess(articles: Vec<Article>) -> Vec<Article> {
    let received = articles.len();
    let cleaned: Vec<Article> = dedupe_by_url(articles)
        .into_iter()
        .map(|mut article| {
            article.title = clean_text(&article.title);
            article.body = clean_text(&article.body);
            article.with_derived_id()
        })
        .filter(Article::has_text)
        .collect();

    debug!(received, kept = cleaned.len(), "Preprocessed articles");
    cleaned
}
