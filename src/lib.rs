//! # DocuBrain
//!
//! A document-knowledge agent that answers questions by optionally
//! invoking tools through an out-of-process tool server.
//!
//! This library provides:
//! - An HTTP API for chatting with the agent and invoking tools
//! - A bounded tool-calling conversation loop
//! - A stdio tool protocol session owning the tool server subprocess
//! - Similarity search over indexed documents for retrieval
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Receive a chat message via the API
//! 2. Send it to the completion service with the advertised tool set
//! 3. If the model requests a function call, dispatch it (tool server
//!    round trip or knowledge search) and feed the result back
//! 4. Repeat until the model answers in text or the iteration ceiling
//!    is reached
//!
//! ## Example
//!
//! ```rust,ignore
//! use docubrain::{agent::Agent, config::Config};
//!
//! let config = Config::from_env()?;
//! let reply = agent.run_chat("what is 2 + 3?").await;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod knowledge;
pub mod llm;
pub mod session;
pub mod tools;

pub use config::Config;
