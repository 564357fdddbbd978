//! Channel layer for prompt framing.
//!
//! This module handles the byte-stream side of a session: accumulating
//! output, stripping escape sequences and detecting prompts.

mod buffer;
mod patterns;
mod stream;

pub use buffer::PatternBuffer;
pub use patterns::{
    ANY_OUTPUT, DEFAULT_PROMPT, PASSWORD_PROMPT, USERNAME_PROMPT, compile_prompt_pattern,
};
pub use stream::{InboundFilter, PromptStream, Raw};
