//! Tolerant decoding of raw model output into validated extraction records
//!
//! Recoverable defects: prose or markdown fences around the payload, missing
//! optional fields, unknown fields, case mismatches, free-text legacy
//! `potential_impact` prose. Fatal defects (`MalformedExtraction`): no JSON
//! object anywhere, missing or unknown sentiment, an `impact` outside
//! high/medium/low, a confidence that is not a number or lies outside [0, 1].

use serde_json::{Map, Value};
use signal_core::{
    CompanyMention, ExtractionRecord, Impact, RawExtraction, Sentiment, SignalError, SignalResult,
};
use tracing::debug;

const SENTIMENT_KEYS: &[&str] = &["sentiment"];
const COMPANY_KEYS: &[&str] = &["companies", "affected_entities", "entities", "tickers"];
const SUMMARY_KEYS: &[&str] = &["summary", "event_summary"];
const IMPACT_KEYS: &[&str] = &["impact"];
const LEGACY_IMPACT_KEYS: &[&str] = &["potential_impact"];
const CONFIDENCE_KEYS: &[&str] = &["confidence", "confidence_score"];

const MENTION_NAME_KEYS: &[&str] = &["name", "company", "mention", "entity"];
const MENTION_TICKER_KEYS: &[&str] = &["ticker", "symbol"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractionParser;

impl ExtractionParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, raw: &RawExtraction) -> SignalResult<ExtractionRecord> {
        self.parse_text(&raw.text).inspect_err(|e| {
            debug!(article_id = %raw.article_id, backend = %raw.backend, error = %e, "Unparseable extraction");
        })
    }

    pub fn parse_text(&self, text: &str) -> SignalResult<ExtractionRecord> {
        let object = first_json_object(text)
            .ok_or_else(|| SignalError::malformed("no JSON object in model output"))?;

        let sentiment = match lookup(&object, SENTIMENT_KEYS) {
            Some(Value::String(s)) => s
                .parse::<Sentiment>()
                .map_err(SignalError::malformed)?,
            Some(other) => {
                return Err(SignalError::malformed(format!("sentiment is not a string: {}", other)))
            }
            None => return Err(SignalError::malformed("missing sentiment")),
        };

        let impact = match lookup(&object, IMPACT_KEYS) {
            None | Some(Value::Null) => match lookup(&object, LEGACY_IMPACT_KEYS) {
                // Legacy prompts asked for a prose description here
                Some(Value::String(s)) => s.parse::<Impact>().unwrap_or_default(),
                _ => Impact::default(),
            },
            Some(Value::String(s)) => s.parse::<Impact>().map_err(SignalError::malformed)?,
            Some(other) => {
                return Err(SignalError::malformed(format!("impact is not a string: {}", other)))
            }
        };

        let confidence = match lookup(&object, CONFIDENCE_KEYS) {
            None | Some(Value::Null) => 0.0,
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| SignalError::malformed(format!("unrepresentable confidence {}", n)))?,
            Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| {
                SignalError::malformed(format!("confidence is not a number: {:?}", s))
            })?,
            Some(other) => {
                return Err(SignalError::malformed(format!("confidence is not a number: {}", other)))
            }
        };

        let summary = match lookup(&object, SUMMARY_KEYS) {
            Some(Value::String(s)) => s.trim().to_string(),
            _ => String::new(),
        };

        let companies = lookup(&object, COMPANY_KEYS)
            .map(parse_mentions)
            .unwrap_or_default();

        ExtractionRecord::try_new(sentiment, companies, summary, impact, confidence)
    }
}

/// Locate the first `{` that starts a complete JSON object
fn first_json_object(text: &str) -> Option<Map<String, Value>> {
    text.char_indices()
        .filter(|(_, c)| *c == '{')
        .find_map(|(start, _)| {
            let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
            match stream.next() {
                Some(Ok(Value::Object(map))) => Some(map),
                _ => None,
            }
        })
}

/// First present key, compared case-insensitively
fn lookup<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| {
        object.get(*key).or_else(|| {
            object
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
    })
}

fn parse_mentions(value: &Value) -> Vec<CompanyMention> {
    match value {
        Value::Array(items) => items.iter().filter_map(parse_mention).collect(),
        single => parse_mention(single).into_iter().collect(),
    }
}

fn parse_mention(value: &Value) -> Option<CompanyMention> {
    match value {
        Value::String(s) => non_empty(s).map(CompanyMention::new),
        Value::Object(map) => {
            let text_field = |keys: &[&str]| match lookup(map, keys) {
                Some(Value::String(s)) => non_empty(s),
                _ => None,
            };
            let name = text_field(MENTION_NAME_KEYS);
            let ticker = text_field(MENTION_TICKER_KEYS);
            match (name, ticker) {
                (Some(name), Some(ticker)) => Some(CompanyMention::with_ticker(name, ticker)),
                (Some(name), None) => Some(CompanyMention::new(name)),
                (None, Some(ticker)) => Some(CompanyMention::with_ticker(ticker.clone(), ticker)),
                (None, None) => None,
            }
        }
        _ => None,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
