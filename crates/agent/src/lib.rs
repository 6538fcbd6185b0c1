//! The conversational brain: per-message pipeline from raw inbound text to
//! paced outbound delivery. Provider calls, context extraction, intent
//! classification, and the capability handlers all live here; the wire
//! surfaces (HTTP in, Wassenger out) stay in their own crates.

pub mod classifier;
pub mod extractor;
pub mod handlers;
pub mod llm;
pub mod orchestrator;
pub mod profile;

pub use classifier::IntentClassifier;
pub use extractor::ContextExtractor;
pub use handlers::{AnalysisHandler, HandlerOutcome, HandoverHandler, KnowledgeHandler};
pub use llm::{AnthropicClient, CompletionClient, ProviderError};
pub use orchestrator::{OrchestrationOutcome, PipelineStage, SessionOrchestrator, TurnStatus};
pub use profile::{HttpProfileFetcher, ProfileFetcher};
