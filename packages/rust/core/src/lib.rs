//! Core enrichment logic for Prospector.
//!
//! This crate ties together homepage fetching, the three-stage prompt chain,
//! and the retrying completion client into the batch [`EnrichmentPipeline`].

pub mod completion;
pub mod pipeline;
pub mod prompts;

pub use completion::{
    ChatError, ChatTransport, Completer, CompletionClient, CompletionError, OpenAiChat,
};
pub use pipeline::{EnrichmentPipeline, PipelineProgress, RunReport, SilentProgress};
pub use prompts::{render_email_prompt, render_opportunity_prompt, render_summary_prompt};
