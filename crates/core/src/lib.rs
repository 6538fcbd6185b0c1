//! Coco Core - domain model and deterministic decision logic
//!
//! This crate holds everything in the pipeline that is pure: the session
//! domain types, the intent/capability routing table, language detection,
//! reply chunking, the prompt/catalog constants, configuration, and the
//! error taxonomy. Nothing in here performs I/O.
//!
//! # Key Types
//!
//! - `Turn` / `HistoryWindow` - persisted conversation slice
//! - `ConversationContext` - profile fields re-derived every message
//! - `Intent` / `Capability` / `route` - the closed routing table
//! - `PacingPolicy` / `split_into_chunks` - bounded reply chunking
//!
//! # Safety Principle
//!
//! The LLM classifies and drafts text. It never decides routing, pacing,
//! or escalation. Those are deterministic decisions made here.

pub mod config;
pub mod domain;
pub mod errors;
pub mod language;
pub mod pacing;
pub mod prompts;
pub mod routing;

pub use domain::context::{ContextField, ConversationContext, Language};
pub use errors::{check_reply_quality, QualityGuardFailure};
pub use domain::turn::{HistoryWindow, Role, Turn};
pub use pacing::{split_into_chunks, PacingPolicy};
pub use routing::{route, Capability, Intent};
