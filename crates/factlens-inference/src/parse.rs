//! Parsing of raw model output into an [`AnalysisResult`].

use factlens_core::{AnalysisResult, Error, Result};

/// Strip a surrounding markdown code fence, if present.
///
/// Handles both ```` ```json ```` and bare ```` ``` ```` openers; text without
/// a fence is returned trimmed.
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening line.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    let body = match body.rsplit_once("```") {
        Some((inner, _)) => inner,
        None => body,
    };
    body.trim()
}

/// Parse model output. Malformed or empty output is an analysis error.
pub fn parse_analysis(text: &str) -> Result<AnalysisResult> {
    let body = strip_fences(text);
    if body.is_empty() {
        return Err(Error::Analysis("Model returned an empty response".to_string()));
    }
    serde_json::from_str(body)
        .map_err(|e| Error::Analysis(format!("Unparseable analysis response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use factlens_core::Verdict;

    #[test]
    fn test_strip_fences_with_language_tag() {
        let text = "```json\n{\"title\": \"x\"}\n```";
        assert_eq!(strip_fences(text), "{\"title\": \"x\"}");
    }

    #[test]
    fn test_strip_fences_bare() {
        assert_eq!(strip_fences("```\n{}\n```\n"), "{}");
    }

    #[test]
    fn test_strip_fences_without_fence() {
        assert_eq!(strip_fences("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_analysis_tolerates_nulls() {
        let text = r#"{
            "title": "Clip",
            "summary": null,
            "transcript": "hello",
            "claims": [{"claim": "c", "type": "spoken", "timestamp": null,
                        "verdict": "misleading", "confidence": 0.4,
                        "explanation": null, "evidence_for": null,
                        "evidence_against": [], "sources": null}],
            "perspectives": null,
            "bias_analysis": {"overall_bias": "center"}
        }"#;
        let result = parse_analysis(text).unwrap();
        assert_eq!(result.title, "Clip");
        assert_eq!(result.summary, "");
        assert_eq!(result.claims.len(), 1);
        assert_eq!(result.claims[0].verdict, Verdict::Misleading);
        assert!(result.claims[0].evidence_for.is_empty());
    }

    #[test]
    fn test_parse_analysis_fenced() {
        let text = "```json\n{\"title\": \"Fenced\", \"claims\": []}\n```";
        assert_eq!(parse_analysis(text).unwrap().title, "Fenced");
    }

    #[test]
    fn test_parse_analysis_rejects_garbage() {
        let err = parse_analysis("I'm sorry, I can't help with that.").unwrap_err();
        assert!(matches!(err, Error::Analysis(_)));
    }

    #[test]
    fn test_parse_analysis_rejects_empty() {
        let err = parse_analysis("```json\n```").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
