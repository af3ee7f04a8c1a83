//! Agent module - the tool-calling conversation loop.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Send the user message to the completion service with the tool set
//! 2. If the model requests a function call, dispatch it
//! 3. Feed the result back and repeat, up to a fixed iteration ceiling
//! 4. A plain-text reply (or any failure) ends the loop

mod agent_loop;

pub use agent_loop::{Agent, MAX_ITERATIONS};
