//! Extraction prompt shared by every backend

/// Role line for providers that take a separate system message
pub const SYSTEM_PROMPT: &str =
    "You are a financial news analyst. You reply with a single JSON object and nothing else.";

/// Appended for providers that tend to wrap JSON in markdown
pub const RAW_JSON_SUFFIX: &str =
    "\nEnsure your entire response is only the raw JSON object, without any markdown formatting.";

const INSTRUCTIONS: &str = r#"Analyze the following business news article for its effect on publicly traded companies.

Respond with valid JSON in this exact format:
{
  "sentiment": "positive|negative|neutral",
  "companies": [
    {"name": "Company name as written in the article", "ticker": "Exchange ticker symbol if known, otherwise null"}
  ],
  "summary": "One sentence describing the key event",
  "impact": "high|medium|low",
  "confidence": 0.0
}

Rules:
- "sentiment" is the article's overall tone towards the companies it names.
- List only companies that are directly affected. Use an empty list if none are.
- "impact" is the expected size of the market reaction.
- "confidence" is a number between 0 and 1 describing how certain you are of this analysis."#;

/// Build the extraction prompt for one article's text
pub fn build_prompt(article_text: &str) -> String {
    format!(
        "{}\n\nArticle:\n\"\"\"\n{}\n\"\"\"\n\nJSON Output:",
        INSTRUCTIONS,
        article_text.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_article() {
        let prompt = build_prompt("  Acme Corp beats earnings  ");
        assert!(prompt.contains("\"\"\"\nAcme Corp beats earnings\n\"\"\""));
        assert!(prompt.contains("\"confidence\""));
        assert!(prompt.ends_with("JSON Output:"));
    }
}
