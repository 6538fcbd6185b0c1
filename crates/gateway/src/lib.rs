//! Wassenger Integration - WhatsApp webhook and send interface
//!
//! This crate binds the pipeline to the messaging channel:
//! - **Events** (`events`) - inbound webhook envelope parsing and filtering
//! - **Transport** (`transport`) - outbound send API (phone and group WIDs)
//! - **Pacer** (`pacer`) - chunked, delayed delivery of one reply
//!
//! # Architecture
//!
//! ```text
//! Webhook POST → InboundDecision → Session Orchestrator → ReplyPacer → Transport
//! ```

pub mod events;
pub mod pacer;
pub mod transport;

pub use events::{parse_inbound, InboundDecision, InboundMessage};
pub use pacer::{NoopSleeper, ReplyPacer, Sleeper, TokioSleeper};
pub use transport::{MessageTransport, RecordingTransport, TransportError, WassengerTransport};
