//! LLM-Transport: Completion and Dataset I/O for EvalAI
//!
//! This crate owns every network boundary of the evaluation harness:
//! chat completion requests against OpenAI-compatible endpoints and
//! download of benchmark datasets.
//!
//! ## Layer 0 - Transport
//!
//! Focus: Request/response plumbing. No scoring logic lives here.
//!
//! ## Key Components
//!
//! - `CompletionTransport`: the one-call completion contract
//! - `OpenAiCompatibleClient`: HTTP implementation (OpenAI, Azure, Ollama, GitHub Models)
//! - `DatasetCache`: JSONL and Parquet dataset download with an on-disk cache
//! - `fakes`: scripted transport and static datasets for tests

pub mod client;
pub mod dataset;
mod error;
pub mod fakes;
pub mod types;

pub use client::{
    AuthStyle, CompletionTransport, EndpointConfig, EndpointLayout, OpenAiCompatibleClient,
};
pub use dataset::{DatasetCache, DatasetFormat, DatasetSource};
pub use error::TransportError;
pub use types::{ChatMessage, CompletionRequest, CompletionResponse, Role};

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;
