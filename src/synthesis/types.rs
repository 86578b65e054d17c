//! Request shapes and classification outcomes for the synthesis provider.

use crate::error::JobError;
use crate::synthesis::scratch::StagedImage;

/// Default canvas size forwarded to the provider ("width*height").
pub const DEFAULT_SIZE: &str = "1328*1328";

/// Default aspect ratio for canvas expansion ("width:height").
pub const DEFAULT_TARGET_RATIO: &str = "1:1";

/// Default upper bound on the expanded canvas edge, in pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 1536;

/// A text-to-image generation request.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    /// Canvas size as "width*height"
    pub size: String,
    /// Let the provider rewrite the prompt for better results
    pub prompt_extend: bool,
    pub watermark: bool,
}

impl SynthesisRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: None,
            size: DEFAULT_SIZE.to_string(),
            prompt_extend: true,
            watermark: false,
        }
    }

    /// Check the request before it goes anywhere near the network.
    pub fn validate(&self) -> Result<(), JobError> {
        if self.prompt.trim().is_empty() {
            return Err(JobError::Validation(
                "prompt must not be empty".to_string(),
            ));
        }
        if parse_size(&self.size).is_none() {
            return Err(JobError::Validation(format!(
                "invalid size expression '{}'",
                self.size
            )));
        }
        Ok(())
    }
}

/// Canvas expansion intent attached to an edit request. The geometry is
/// applied by the image pipeline, not here; the gateway only validates and
/// forwards the fields.
#[derive(Debug, Clone)]
pub struct ExpansionOptions {
    pub enabled: bool,
    /// Target aspect ratio as "width:height"
    pub target_ratio: String,
    pub max_dimension: u32,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            target_ratio: DEFAULT_TARGET_RATIO.to_string(),
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl ExpansionOptions {
    pub fn validate(&self) -> Result<(), JobError> {
        if !self.enabled {
            return Ok(());
        }
        if parse_ratio(&self.target_ratio).is_none() {
            return Err(JobError::Validation(format!(
                "invalid target ratio '{}'",
                self.target_ratio
            )));
        }
        if self.max_dimension == 0 {
            return Err(JobError::Validation(
                "max dimension must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// An image edit request. The request owns the staged artifact; the backing
/// file is released when the request is dropped, on every exit path.
#[derive(Debug)]
pub struct EditRequest {
    pub image: StagedImage,
    pub instruction: String,
    pub expansion: ExpansionOptions,
}

impl EditRequest {
    pub fn validate(&self) -> Result<(), JobError> {
        if self.instruction.trim().is_empty() {
            return Err(JobError::Validation(
                "edit instruction must not be empty".to_string(),
            ));
        }
        if self.image.is_empty() {
            return Err(JobError::Validation(
                "image payload must not be empty".to_string(),
            ));
        }
        self.expansion.validate()
    }
}

/// What the provider said when a job was submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    /// The reply already carried a finished image URL
    Immediate(String),
    /// The work was queued under a task id; poll for the result
    Queued(String),
}

/// What a single status query said about a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed(String),
    Failed(String),
    Pending,
}

/// Parse a "width*height" size expression.
pub fn parse_size(size: &str) -> Option<(u32, u32)> {
    let (w, h) = size.split_once('*')?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

/// Parse a "width:height" aspect-ratio expression.
pub fn parse_ratio(ratio: &str) -> Option<(u32, u32)> {
    let (w, h) = ratio.split_once(':')?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}
