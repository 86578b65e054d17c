//! Wire types for the DashScope-style synthesis API.
//!
//! Field names on both payloads and replies are a compatibility contract
//! with the remote service and must not be renamed. Classification of
//! replies is kept in pure functions so it can be tested without a server.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::synthesis::types::{PollOutcome, SynthesisOutcome, SynthesisRequest};

/// Model used for text-to-image generation.
pub const GENERATION_MODEL: &str = "qwen-image";

/// Model used for instruction-driven image editing.
pub const EDIT_MODEL: &str = "qwen-image-edit";

/// Endpoint path for generation submissions.
pub const GENERATION_PATH: &str = "/services/aigc/text2image/image-synthesis";

/// Endpoint path for edit submissions.
pub const EDIT_PATH: &str = "/services/aigc/multimodal-generation/generation";

/// Endpoint path prefix for task status queries.
pub const TASKS_PATH: &str = "/tasks";

/// Header that opts a submission into the asynchronous job flow.
pub const ASYNC_HEADER: &str = "X-DashScope-Async";

pub const STATUS_SUCCEEDED: &str = "SUCCEEDED";
pub const STATUS_FAILED: &str = "FAILED";

// ============================================================================
// Outbound payloads
// ============================================================================

#[derive(Debug, Serialize)]
pub struct GenerationPayload<'a> {
    pub model: &'a str,
    pub input: GenerationInput<'a>,
    pub parameters: GenerationParameters<'a>,
}

#[derive(Debug, Serialize)]
pub struct GenerationInput<'a> {
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct GenerationParameters<'a> {
    pub size: &'a str,
    pub n: u32,
    pub prompt_extend: bool,
    pub watermark: bool,
}

/// Build the generation payload for a validated request.
pub fn generation_payload(request: &SynthesisRequest) -> GenerationPayload<'_> {
    GenerationPayload {
        model: GENERATION_MODEL,
        input: GenerationInput {
            prompt: &request.prompt,
            negative_prompt: request
                .negative_prompt
                .as_deref()
                .filter(|s| !s.trim().is_empty()),
        },
        parameters: GenerationParameters {
            size: &request.size,
            n: 1,
            prompt_extend: request.prompt_extend,
            watermark: request.watermark,
        },
    }
}

#[derive(Debug, Serialize)]
pub struct EditPayload<'a> {
    pub model: &'a str,
    pub input: EditInput<'a>,
    pub parameters: EditParameters<'a>,
}

#[derive(Debug, Serialize)]
pub struct EditInput<'a> {
    pub messages: Vec<EditMessage<'a>>,
}

#[derive(Debug, Serialize)]
pub struct EditMessage<'a> {
    pub role: &'a str,
    pub content: Vec<EditContent<'a>>,
}

#[derive(Debug, Serialize)]
pub struct EditContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct EditParameters<'a> {
    pub negative_prompt: &'a str,
    pub watermark: bool,
}

/// Build the edit payload: one user message carrying the image and the
/// instruction as separate content parts.
pub fn edit_payload<'a>(image_data_url: &'a str, instruction: &'a str) -> EditPayload<'a> {
    EditPayload {
        model: EDIT_MODEL,
        input: EditInput {
            messages: vec![EditMessage {
                role: "user",
                content: vec![
                    EditContent {
                        image: Some(image_data_url),
                        text: None,
                    },
                    EditContent {
                        image: None,
                        text: Some(instruction),
                    },
                ],
            }],
        },
        parameters: EditParameters {
            negative_prompt: "",
            watermark: false,
        },
    }
}

/// Encode image bytes as a `data:` URL for embedding in an edit payload.
pub fn data_url_for(bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", sniff_mime(bytes), encoded)
}

/// Guess the image MIME type from magic bytes. Unknown payloads fall back
/// to PNG, which the provider accepts for the common cases.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else if bytes.starts_with(b"BM") {
        "image/bmp"
    } else {
        "image/png"
    }
}

// ============================================================================
// Replies
// ============================================================================

/// Top-level reply shape shared by submissions and status queries.
#[derive(Debug, Deserialize)]
pub struct SynthesisReply {
    pub output: Option<ReplyOutput>,
    pub request_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReplyOutput {
    pub task_id: Option<String>,
    pub task_status: Option<String>,
    pub results: Option<Vec<ReplyResult>>,
    pub choices: Option<Vec<ReplyChoice>>,
    /// Failure text attached to FAILED tasks
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyResult {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyChoice {
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<Vec<ContentPart>>,
}

#[derive(Debug, Deserialize)]
pub struct ContentPart {
    pub image: Option<String>,
    pub text: Option<String>,
}

fn first_result_url(output: &ReplyOutput) -> Option<String> {
    output.results.as_ref()?.iter().find_map(|r| r.url.clone())
}

fn first_choice_image(output: &ReplyOutput) -> Option<String> {
    output
        .choices
        .as_ref()?
        .first()?
        .message
        .as_ref()?
        .content
        .as_ref()?
        .iter()
        .find_map(|part| part.image.clone())
}

/// Classify a submission reply. Precedence: a finished result URL, then an
/// edited image in the choices array, then a queued task id. A reply with
/// none of those is a `NoResult` error.
pub fn classify_submission(reply: &SynthesisReply) -> Result<SynthesisOutcome, JobError> {
    let output = reply.output.as_ref().ok_or(JobError::NoResult)?;

    if output.task_status.as_deref() == Some(STATUS_SUCCEEDED) {
        if let Some(url) = first_result_url(output) {
            return Ok(SynthesisOutcome::Immediate(url));
        }
    }
    if let Some(url) = first_choice_image(output) {
        return Ok(SynthesisOutcome::Immediate(url));
    }
    if let Some(task_id) = output.task_id.as_ref().filter(|id| !id.is_empty()) {
        return Ok(SynthesisOutcome::Queued(task_id.clone()));
    }
    Err(JobError::NoResult)
}

/// Classify a status reply. Anything that is not a recognized terminal
/// state counts as still pending; unknown statuses are never an error.
pub fn classify_poll(reply: &SynthesisReply) -> PollOutcome {
    let Some(output) = reply.output.as_ref() else {
        return PollOutcome::Pending;
    };

    match output.task_status.as_deref() {
        Some(STATUS_SUCCEEDED) => match first_result_url(output) {
            Some(url) => PollOutcome::Completed(url),
            None => PollOutcome::Failed("task succeeded without a result URL".to_string()),
        },
        Some(STATUS_FAILED) => PollOutcome::Failed(
            output
                .message
                .clone()
                .unwrap_or_else(|| "task failed".to_string()),
        ),
        _ => PollOutcome::Pending,
    }
}
