//! Content selection through the generative model.
//!
//! The model sees the timestamped transcript (and scene boundaries, when
//! any were found) and answers with a `HighlightSelectionResult` JSON
//! object. The answer is untrusted: it is parsed and validated here before
//! anything downstream sees it.

use std::fmt::Write as _;
use tracing::debug;

use hclip_inference::{ChatMessage, CompletionRequest, ModelHandle};
use hclip_models::{HighlightSelectionResult, SceneBoundary, TranscriptSegment};

use crate::error::{PipelineError, PipelineResult};

const SYSTEM_DIRECTIVE: &str = "You are a video editing assistant that outputs JSON.";

const DEFAULT_CRITERION: &str =
    "Identify the most interesting, funny, or important part of the conversation.";

/// Builds selection prompts and parses the model's answers.
#[derive(Debug, Clone)]
pub struct ContentSelector {
    temperature: f32,
}

impl Default for ContentSelector {
    fn default() -> Self {
        Self { temperature: 0.7 }
    }
}

impl ContentSelector {
    pub fn new(temperature: f32) -> Self {
        Self { temperature }
    }

    /// Ask the model for highlight candidates.
    pub async fn select(
        &self,
        model: &ModelHandle,
        transcript: &[TranscriptSegment],
        scenes: &[SceneBoundary],
        target_duration: f64,
        intent: Option<&str>,
    ) -> PipelineResult<HighlightSelectionResult> {
        let request = self.build_request(transcript, scenes, target_duration, intent);
        let raw = model
            .complete(&request)
            .await
            .map_err(PipelineError::from_inference_error)?;

        debug!(response_len = raw.len(), "Model answered");
        parse_selection(&raw)
    }

    /// Full completion request: system directive, prompt and schema.
    pub fn build_request(
        &self,
        transcript: &[TranscriptSegment],
        scenes: &[SceneBoundary],
        target_duration: f64,
        intent: Option<&str>,
    ) -> CompletionRequest {
        CompletionRequest::new(
            vec![
                ChatMessage::system(SYSTEM_DIRECTIVE),
                ChatMessage::user(build_prompt(transcript, scenes, target_duration, intent)),
            ],
            self.temperature,
        )
        .with_schema(HighlightSelectionResult::json_schema())
    }
}

/// Selection criterion for the optional user intent.
fn criterion(intent: Option<&str>) -> String {
    match intent.map(str::trim).filter(|i| !i.is_empty()) {
        Some(intent) => format!("Find a segment that matches this request: '{}'", intent),
        None => DEFAULT_CRITERION.to_string(),
    }
}

/// Render the user prompt.
pub fn build_prompt(
    transcript: &[TranscriptSegment],
    scenes: &[SceneBoundary],
    target_duration: f64,
    intent: Option<&str>,
) -> String {
    let transcript_text = transcript
        .iter()
        .map(TranscriptSegment::to_line)
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        "You are a professional video editor. Your task is to select the most engaging segment from the video transcript below.\n\
         The target duration for the highlight is approximately {target_duration} seconds.\n\
         \n\
         Transcript:\n\
         {transcript_text}\n"
    );

    if !scenes.is_empty() {
        prompt.push_str("\nScene boundaries:\n");
        for scene in scenes {
            let _ = writeln!(prompt, "[{:.2}-{:.2}]", scene.start, scene.end);
        }
    }

    let _ = write!(
        prompt,
        "\nInstructions:\n\
         1. {}\n\
         2. Select a contiguous time range that covers this part.\n\
         3. Ensure the duration is close to {} seconds.\n\
         4. Return the result in JSON format matching the schema.\n\
         \n\
         Response:\n",
        criterion(intent),
        target_duration
    );

    prompt
}

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening fence line
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches("json"),
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse and validate a raw model answer.
pub fn parse_selection(raw: &str) -> PipelineResult<HighlightSelectionResult> {
    let body = strip_code_fences(raw);

    let result: HighlightSelectionResult =
        serde_json::from_str(body).map_err(|e| PipelineError::SelectionParse(e.to_string()))?;

    for (index, candidate) in result.highlights.iter().enumerate() {
        candidate
            .validate()
            .map_err(|e| PipelineError::SelectionParse(format!("candidate {}: {}", index, e)))?;
    }

    if result.is_empty() {
        return Err(PipelineError::NoHighlightFound);
    }
    Ok(result)
}
