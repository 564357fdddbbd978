//! CLI command modes and the prompt grammar that identifies them.
//!
//! A Cisco-style prompt is a hostname, an optional parenthesised sub-mode
//! tag and a terminating `>` (user EXEC) or `#` (privileged EXEC):
//!
//! ```text
//! switch1>                 User
//! switch1#                 Privileged
//! switch1(config)#         Configuration
//! switch1(config-if)#      Named("config-if")
//! ```

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static PROMPT_GRAMMAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<hostname>[^()\s]+?)(?:\((?P<tag>[\w\-]+)\))?(?P<char>[#>])\s*$")
        .expect("static regex")
});

/// The device's current command-interpretation context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// The prompt has not been sampled, or did not match the grammar.
    #[default]
    Unknown,
    /// User EXEC (`>`).
    User,
    /// Privileged EXEC (`#`).
    Privileged,
    /// Global configuration (`(config)#`).
    Configuration,
    /// Any other sub-mode, carrying the raw tag (e.g. `config-if`).
    Named(String),
}

impl Mode {
    /// Classify a prompt.
    ///
    /// Only the last non-empty line of `text` is considered, so the output
    /// of a no-op command (echo followed by the prompt) can be passed as is.
    pub fn from_prompt(text: &str) -> Self {
        let Some(line) = text.lines().map(str::trim).rfind(|l| !l.is_empty()) else {
            return Mode::Unknown;
        };
        let Some(caps) = PROMPT_GRAMMAR.captures(line) else {
            return Mode::Unknown;
        };

        match caps.name("tag").map(|m| m.as_str()) {
            Some("config") => Mode::Configuration,
            Some(tag) => Mode::Named(tag.to_string()),
            None => match caps.name("char").map(|m| m.as_str()) {
                Some("#") => Mode::Privileged,
                Some(">") => Mode::User,
                _ => Mode::Unknown,
            },
        }
    }

    /// True for global configuration and every `config*` sub-mode.
    ///
    /// Classification is by tag prefix, so `config-if`, `config-line` and
    /// `config-router` all count while a tag like `vlan` does not.
    pub fn is_configuration_family(&self) -> bool {
        match self {
            Mode::Configuration => true,
            Mode::Named(tag) => tag.starts_with("config"),
            _ => false,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Unknown => f.write_str("unknown"),
            Mode::User => f.write_str("user"),
            Mode::Privileged => f.write_str("privileged"),
            Mode::Configuration => f.write_str("configuration"),
            Mode::Named(tag) => f.write_str(tag),
        }
    }
}
