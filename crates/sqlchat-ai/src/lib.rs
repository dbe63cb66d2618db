//! sqlchat AI - LLM integration for natural language to SQL generation
//!
//! This crate provides:
//! - The static description of the queried table
//! - Prompt building for SQL generation
//! - LLM API client (OpenAI/Anthropic)

pub mod client;
pub mod error;
pub mod prompt;
pub mod schema;

pub use client::{LlmClient, LlmProvider, SqlGenerator};
pub use error::GenerationError;
pub use prompt::{build_request, build_user_prompt, ChatPrompt, ANALYSIS_SYSTEM_MESSAGE};
pub use schema::{egain_visitors, ColumnMeta, TableSchema};
