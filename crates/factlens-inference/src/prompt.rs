//! Instruction text sent ahead of the media parts.

/// Prompt asking the model for the analysis document as bare JSON.
pub const ANALYSIS_PROMPT: &str = r#"You are a fact-checker and media literacy analyst. You are given the audio track and a sequence of keyframes sampled from a short social media video.

Analyze both what is said and what is shown.

1. Transcribe the audio in full.

2. Extract every verifiable claim, spoken or visual (on-screen text, charts, statistics, screenshots). For each claim give:
   - the claim as stated
   - where it appeared: "spoken", "visual" or "both"
   - an approximate timestamp (M:SS) when you can tell
   - a verdict: "true", "misleading", "false" or "unverified"
   - a confidence between 0.0 and 1.0
   - an explanation of the verdict
   - evidence for and evidence against
   - source URLs you are certain exist; never invent a URL

3. Assess bias and manipulation:
   - overall lean: "left", "lean_left", "center", "lean_right", "right" or "none"
   - tactics used, e.g. emotional_language, cherry_picked_stats, misleading_visuals, appeal_to_authority, false_equivalence, straw_man, fear_mongering, out_of_context
   - misleading visuals with a timestamp and description

4. Describe how left-leaning, centrist and right-leaning sources would frame the topic. For non-political videos use "none" as the lean and give differing viewpoints on the topic instead.

5. Summarize the video in two or three sentences.

Mark anything you cannot verify as "unverified" rather than guessing.

Respond with JSON only, no markdown fences and no preamble, in exactly this shape:
{
  "title": "descriptive title",
  "summary": "2-3 sentence summary",
  "transcript": "full transcript",
  "claims": [
    {
      "claim": "claim text",
      "type": "spoken|visual|both",
      "timestamp": "M:SS or null",
      "verdict": "true|misleading|false|unverified",
      "confidence": 0.0,
      "explanation": "reason for the verdict",
      "evidence_for": ["..."],
      "evidence_against": ["..."],
      "sources": ["https://..."]
    }
  ],
  "perspectives": {
    "left": "...",
    "center": "...",
    "right": "..."
  },
  "bias_analysis": {
    "overall_bias": "none|left|lean_left|center|lean_right|right",
    "manipulation_tactics": ["..."],
    "misleading_visuals": [
      {"timestamp": "M:SS", "description": "..."}
    ]
  }
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_every_verdict() {
        for verdict in ["true", "misleading", "false", "unverified"] {
            assert!(ANALYSIS_PROMPT.contains(verdict));
        }
    }

    #[test]
    fn test_prompt_bias_values_match_model() {
        for lean in ["lean_left", "lean_right", "center", "none"] {
            let parsed: factlens_core::BiasLean =
                serde_json::from_value(serde_json::json!(lean)).unwrap();
            assert_eq!(serde_json::to_value(parsed).unwrap(), lean);
        }
    }
}
