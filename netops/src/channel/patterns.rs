//! Prompt pattern helpers shared by every transport.

use std::sync::LazyLock;

use regex::bytes::Regex;

/// Default prompt: anything ending in `#`, `>` or `]`.
pub const DEFAULT_PROMPT: &str = r".+(#|>|\])";

/// Password prompt used by login handshakes and `enable`.
pub static PASSWORD_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)password:[ \t]*$").expect("static regex"));

/// Username prompt used by Telnet and serial logins.
pub static USERNAME_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(user ?name|login):[ \t]*$").expect("static regex"));

/// Matches as soon as the device has printed anything at all.
pub static ANY_OUTPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S").expect("static regex"));

/// Compile a prompt pattern string into a regex.
///
/// Prompts are only meaningful at the end of the buffer, so the pattern is
/// anchored there unless it already is. Trailing spaces and tabs are allowed
/// but not line breaks: a line that ends in `#` and is followed by more
/// output is never a prompt.
pub fn compile_prompt_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = if pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!("{}[ \\t]*$", pattern)
    };

    Regex::new(&pattern)
}
