//! Document generation - the payment-to-document pipeline core.
//!
//! - `content` - prompt construction and the text-completion client
//! - `renderer` - binary rendering (PDF via Typst, DOCX via Pandoc)
//! - `orchestrator` - the per-purchase fan-out state machine
//! - `reprocess` - the on-demand healing sweep

pub mod content;
pub mod orchestrator;
pub mod renderer;
pub mod reprocess;

pub use content::{
    CompletionClient, CompletionTrace, ContentGenerator, DocumentVariant, GenerationError,
    GenerationObserver, HttpCompletionClient, LogObserver, RetryPolicy, StubCompletionClient,
};
pub use orchestrator::{generate_for_purchase, GenerationDeps};
pub use renderer::{ArtifactFormat, CliRenderEngine, RenderError, RenderRequest, DocumentRenderer};
pub use reprocess::{reprocess_all, reprocess_purchase};
