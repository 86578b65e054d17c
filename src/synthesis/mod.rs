//! Remote image-synthesis client: request shapes, provider wire types,
//! reply classification, and the edit artifact spool.

pub mod client;
pub mod dashscope;
pub mod scratch;
pub mod types;

pub use client::{PollPolicy, SynthesisClient};
pub use scratch::StagedImage;
pub use types::{
    EditRequest, ExpansionOptions, PollOutcome, SynthesisOutcome, SynthesisRequest,
    DEFAULT_MAX_DIMENSION, DEFAULT_SIZE, DEFAULT_TARGET_RATIO,
};
