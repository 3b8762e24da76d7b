//! Guest transport contract.
//!
//! A guest is reached through two pieces:
//!
//! - [`Transport`] moves text: write, flush, read one line, shut down. It knows
//!   nothing about the guest language.
//! - [`Dialect`] knows the guest language: how to guard a fragment, how to
//!   print a sentinel and what the printed sentinel looks like, how to declare
//!   a binding, how to ask the guest to exit.
//!
//! # Framing
//!
//! The channel is an unframed byte stream in each direction. Every submitted
//! fragment is followed by a sentinel print statement; the guest's echo of
//! that statement (the *match* text) marks the end of the fragment's output.

mod process;
mod scripted;

pub use process::{LaunchSpec, ProcessTransport};
pub use scripted::{ScriptedTransport, WrittenLog};

use crate::Result;
use std::time::Duration;

/// Line-oriented access to a guest's standard streams.
pub trait Transport: Send {
    /// Append raw text to the guest's input stream.
    fn write(&mut self, text: &str) -> Result<()>;

    /// Push buffered input through to the guest.
    ///
    /// Reads block on guest output, so callers flush after every burst of
    /// writes and before reading.
    fn flush(&mut self) -> Result<()>;

    /// Block until one line of guest output is available.
    ///
    /// The line terminator is stripped. Returns `None` once the guest has
    /// closed its output stream.
    fn read_line(&mut self, timeout: Option<Duration>) -> Result<Option<String>>;

    /// Wait up to `grace` for the guest to exit, then terminate it and
    /// release the streams. Calling it again is a no-op.
    fn shutdown(&mut self, grace: Duration) -> Result<()>;
}

/// The two flavors of one sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelPair {
    /// Text written to the guest (including its line terminator).
    pub submission: String,
    /// The exact output line the guest produces for it.
    pub matcher: String,
}

impl SentinelPair {
    pub fn new(submission: impl Into<String>, matcher: impl Into<String>) -> Self {
        Self {
            submission: submission.into(),
            matcher: matcher.into(),
        }
    }
}

/// Guest declaration form used by `set_binding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    /// Plain assignment.
    Assign,
    /// Block-scoped mutable declaration (`let`).
    Let,
    /// Immutable declaration (`const`).
    Const,
}

/// Default prompt-echo policy: a line is chrome iff it is empty or starts
/// with the prompt character.
pub fn default_prompt_filter(line: &str, prompt: char) -> bool {
    !line.is_empty() && !line.starts_with(prompt)
}

/// Guest-language syntax hooks used by the engine.
pub trait Dialect {
    /// Short name used in logs and conversion errors.
    fn label(&self) -> &'static str;

    /// Canonical prompt character of the guest REPL.
    fn prompt_char(&self) -> char {
        '>'
    }

    /// `true` for genuine output, `false` for REPL chrome to discard.
    fn is_not_prompt_echo(&self, line: &str) -> bool {
        default_prompt_filter(line, self.prompt_char())
    }

    /// Guard and terminate a fragment before it is written.
    ///
    /// Guest-side exceptions must not end the session or swallow the
    /// sentinel that follows.
    fn wrap_for_submission(&self, fragment: &str) -> String;

    /// Build the sentinel pair for a fresh uniqueness token.
    fn sentinel_pair(&self, token: &str) -> SentinelPair;

    /// Name of the temporary binding for a fresh uniqueness token.
    fn temporary_name(&self, token: &str) -> String;

    /// Render a declaration of `name` holding the guest expression `value`.
    fn declare_binding(&self, kind: DeclarationKind, name: &str, value: &str) -> String;

    /// Text that asks the guest to exit, including its terminator.
    ///
    /// `None` means the guest has no graceful shutdown and is killed.
    fn termination_fragment(&self) -> Option<String>;

    /// Text written once, ahead of the handshake sentinel.
    fn handshake_prelude(&self) -> Option<String> {
        None
    }

    /// Fragment that drops a temporary binding, if the guest supports it.
    fn release_fragment(&self, _temporary: &str) -> Option<String> {
        None
    }

    /// Whether `reply` is the normal output of a release fragment.
    fn release_acknowledged(&self, reply: &str) -> bool {
        reply.trim().is_empty()
    }
}

/// Stamp text shared by every dialect's sentinel.
pub fn sentinel_stamp(token: &str) -> String {
    format!("{}{}", crate::config::ProtocolConfig::SENTINEL_PREFIX, token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompt_filter() {
        assert!(default_prompt_filter("[1] 3", '>'));
        assert!(!default_prompt_filter("", '>'));
        assert!(!default_prompt_filter("> x <- 3", '>'));
        assert!(default_prompt_filter(" > not a prompt", '>'));
    }

    #[test]
    fn test_sentinel_stamp_prefix() {
        assert_eq!(sentinel_stamp("abc"), "replbridge-sentinel:abc");
    }
}
