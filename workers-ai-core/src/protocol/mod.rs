//! Protocol module for the canonical request/response structures
//!
//! This module defines the data models callers use regardless of which
//! transport reaches Workers AI:
//! - Prompts, messages and per-call options going in
//! - A single canonical result and stream part shape coming out

pub mod types;

pub use types::{
    CallOptions, FinishReason, GenerateResult, Message, MessageRole, Prompt, ResponseFormat,
    StreamPart, ToolCall, ToolDefinition, Usage,
};
