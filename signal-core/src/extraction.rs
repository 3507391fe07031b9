//! Structured signals extracted from one article by the language model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{SignalError, SignalResult};

/// Article sentiment towards the companies it mentions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "neutral" => Ok(Sentiment::Neutral),
            "negative" => Ok(Sentiment::Negative),
            _ => Err(format!("Unknown sentiment: {}", s)),
        }
    }
}

/// Expected market impact of the reported event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    #[default]
    Medium,
    Low,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::High => "high",
            Impact::Medium => "medium",
            Impact::Low => "low",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Impact {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Impact::High),
            "medium" => Ok(Impact::Medium),
            "low" => Ok(Impact::Low),
            _ => Err(format!("Unknown impact: {}", s)),
        }
    }
}

/// A company reference as written by the model, before validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyMention {
    /// Free text naming the company ("Apple", "AAPL", "Apple Inc.")
    pub mention_text: String,
    /// Ticker the model suggested, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker_candidate: Option<String>,
}

impl CompanyMention {
    pub fn new(mention_text: impl Into<String>) -> Self {
        Self {
            mention_text: mention_text.into(),
            ticker_candidate: None,
        }
    }

    pub fn with_ticker(mention_text: impl Into<String>, ticker: impl Into<String>) -> Self {
        Self {
            mention_text: mention_text.into(),
            ticker_candidate: Some(ticker.into()),
        }
    }
}

/// Validated extraction for one article
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionRecord {
    pub sentiment: Sentiment,
    pub companies: Vec<CompanyMention>,
    pub summary: String,
    pub impact: Impact,
    /// Always within [0, 1]
    pub confidence: f64,
}

impl ExtractionRecord {
    /// Build a record, rejecting a confidence outside [0, 1]
    pub fn try_new(
        sentiment: Sentiment,
        companies: Vec<CompanyMention>,
        summary: impl Into<String>,
        impact: Impact,
        confidence: f64,
    ) -> SignalResult<Self> {
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(SignalError::malformed(format!(
                "confidence {} outside [0, 1]",
                confidence
            )));
        }

        Ok(Self {
            sentiment,
            companies,
            summary: summary.into(),
            impact,
            confidence,
        })
    }
}

/// Unparsed model output for one article
#[derive(Debug, Clone, PartialEq)]
pub struct RawExtraction {
    pub article_id: String,
    /// Name of the backend that produced the text
    pub backend: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_parse_case_insensitive() {
        assert_eq!("Positive".parse::<Sentiment>().unwrap(), Sentiment::Positive);
        assert_eq!(" NEGATIVE ".parse::<Sentiment>().unwrap(), Sentiment::Negative);
        assert!("bullish".parse::<Sentiment>().is_err());
    }

    #[test]
    fn test_impact_parse_and_default() {
        assert_eq!("High".parse::<Impact>().unwrap(), Impact::High);
        assert!("huge".parse::<Impact>().is_err());
        assert_eq!(Impact::default(), Impact::Medium);
    }

    #[test]
    fn test_record_rejects_out_of_range_confidence() {
        let ok = ExtractionRecord::try_new(Sentiment::Neutral, vec![], "", Impact::Low, 1.0);
        assert!(ok.is_ok());

        for bad in [-0.01, 1.01, f64::NAN, 4.0] {
            let err = ExtractionRecord::try_new(Sentiment::Neutral, vec![], "", Impact::Low, bad);
            assert!(matches!(err, Err(SignalError::MalformedExtraction(_))), "{}", bad);
        }
    }

    #[test]
    fn test_sentiment_serializes_lowercase() {
        let json = serde_json::to_string(&Sentiment::Positive).unwrap();
        assert_eq!(json, "\"positive\"");
    }
}
