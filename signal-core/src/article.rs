//! News article records handed to the pipeline by the fetching collaborator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{SignalError, SignalResult};

/// A business news article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Unique identifier (hash of URL when the source does not provide one)
    #[serde(default)]
    pub id: String,
    /// Headline
    pub title: String,
    /// Body text or snippet
    #[serde(default, alias = "content", alias = "snippet")]
    pub body: String,
    /// Name of the publisher (e.g., "Reuters")
    #[serde(default, deserialize_with = "source_name")]
    pub source: String,
    /// Publication date
    #[serde(default, alias = "publishedAt", skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// Article URL
    #[serde(default)]
    pub url: String,
}

impl Article {
    /// Create an article whose id is derived from its URL
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        source: impl Into<String>,
        published_at: Option<DateTime<Utc>>,
        url: impl Into<String>,
    ) -> Self {
        let url = url.into();
        Self {
            id: id_from_url(&url),
            title: title.into(),
            body: body.into(),
            source: source.into(),
            published_at,
            url,
        }
    }

    /// Fill in a URL-derived id if the record arrived without one
    pub fn with_derived_id(mut self) -> Self {
        if self.id.trim().is_empty() {
            let key = if self.url.is_empty() {
                &self.title
            } else {
                &self.url
            };
            self.id = id_from_url(key);
        }
        self
    }

    /// Whether there is any text for the model to read
    pub fn has_text(&self) -> bool {
        !self.title.trim().is_empty() || !self.body.trim().is_empty()
    }
}

/// Accepts `"Reuters"` as well as news-API style `{"id": ..., "name": "Reuters"}`
fn source_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Source {
        Name(String),
        Object { name: Option<String> },
    }

    Ok(match Option::<Source>::deserialize(deserializer)? {
        Some(Source::Name(name)) => name,
        Some(Source::Object { name }) => name.unwrap_or_default(),
        None => String::new(),
    })
}

/// Stable 16 hex-char id from a URL
pub fn id_from_url(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

/// Prompt-ready view of one article
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    pub article_id: String,
    pub text: String,
}

impl ExtractionRequest {
    /// Build the request text from headline and body
    ///
    /// Fails with `InvalidInput` when the article carries no text at all.
    pub fn from_article(article: &Article) -> SignalResult<Self> {
        if !article.has_text() {
            return Err(SignalError::invalid_input(format!(
                "article '{}' has no title or body text",
                article.id
            )));
        }

        let title = article.title.trim();
        let body = article.body.trim();
        let text = match (title.is_empty(), body.is_empty()) {
            (false, false) => format!("{}\n\n{}", title, body),
            (false, true) => title.to_string(),
            _ => body.to_string(),
        };

        Ok(Self {
            article_id: article.id.clone(),
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_derived_from_url() {
        let a = Article::new("t", "b", "Reuters", None, "https://example.com/a");
        let b = Article::new("other", "", "AP", None, "https://example.com/a");
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 16);
    }

    #[test]
    fn test_with_derived_id_keeps_existing() {
        let json = r#"{"id": "a1", "title": "Acme Corp beats earnings", "body": "..."}"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert_eq!(article.with_derived_id().id, "a1");

        let json = r#"{"title": "Acme Corp beats earnings", "url": "https://x.test/1"}"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert_eq!(article.with_derived_id().id, id_from_url("https://x.test/1"));
    }

    #[test]
    fn test_news_api_field_aliases() {
        let json = r#"{
            "title": "Fed holds rates",
            "content": "The Federal Reserve...",
            "source": "CNBC",
            "publishedAt": "2024-05-01T12:00:00Z",
            "url": "https://cnbc.test/fed"
        }"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert_eq!(article.body, "The Federal Reserve...");
        assert!(article.published_at.is_some());
    }

    #[test]
    fn test_source_object_form() {
        let json = r#"{"title": "t", "source": {"id": null, "name": "Reuters"}}"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert_eq!(article.source, "Reuters");

        let json = r#"{"title": "t", "source": null}"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert_eq!(article.source, "");
    }

    #[test]
    fn test_request_rejects_empty_article() {
        let article = Article::new("  ", "\n", "src", None, "u");
        let err = ExtractionRequest::from_article(&article).unwrap_err();
        assert!(matches!(err, SignalError::InvalidInput(_)));
    }

    #[test]
    fn test_request_joins_title_and_body() {
        let article = Article::new("Headline", " Body text ", "src", None, "u");
        let req = ExtractionRequest::from_article(&article).unwrap();
        assert_eq!(req.text, "Headline\n\nBody text");

        let headline_only = Article::new("Headline", "", "src", None, "u");
        let req = ExtractionRequest::from_article(&headline_only).unwrap();
        assert_eq!(req.text, "Headline");
    }
}
