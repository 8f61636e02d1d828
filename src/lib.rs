//! CForm: conversational forms for an LLM chat agent.

pub mod agent;
pub mod channels;
pub mod config;
pub mod error;
pub mod form;
pub mod llm;
pub mod session;
