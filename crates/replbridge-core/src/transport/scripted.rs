//! In-memory transport for exercising dialects without a real guest.
//!
//! Every complete line written (and flushed) is handed to a responder closure;
//! whatever lines it returns become the guest's output. The transport reports
//! end of stream once the queued output is exhausted, so a test that expects
//! more output than the responder produced fails instead of hanging.

use super::Transport;
use crate::Result;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Responder = Box<dyn FnMut(&str) -> Vec<String> + Send>;

/// Shared record of the lines a [`ScriptedTransport`] received.
#[derive(Debug, Clone, Default)]
pub struct WrittenLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl WrittenLog {
    /// All lines flushed to the transport so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Whether any flushed line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }

    fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

/// A transport whose guest is a closure.
pub struct ScriptedTransport {
    responder: Responder,
    pending_input: String,
    output: VecDeque<String>,
    log: WrittenLog,
    shut_down: bool,
}

impl ScriptedTransport {
    /// Create a transport answering each input line with `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: FnMut(&str) -> Vec<String> + Send + 'static,
    {
        Self {
            responder: Box::new(responder),
            pending_input: String::new(),
            output: VecDeque::new(),
            log: WrittenLog::default(),
            shut_down: false,
        }
    }

    /// Queue banner lines the guest prints before reading any input.
    pub fn with_banner<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output.extend(lines.into_iter().map(Into::into));
        self
    }

    /// Handle on the record of flushed input lines.
    pub fn log(&self) -> WrittenLog {
        self.log.clone()
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, text: &str) -> Result<()> {
        if self.shut_down {
            return Err(crate::BridgeError::transport_msg("scripted guest has exited"));
        }
        self.pending_input.push_str(text);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        while let Some(pos) = self.pending_input.find('\n') {
            let line: String = self.pending_input.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']).to_string();
            let replies = (self.responder)(&line);
            self.log.push(line);
            self.output.extend(replies);
        }
        Ok(())
    }

    fn read_line(&mut self, _timeout: Option<Duration>) -> Result<Option<String>> {
        Ok(self.output.pop_front())
    }

    fn shutdown(&mut self, _grace: Duration) -> Result<()> {
        self.shut_down = true;
        self.output.clear();
        Ok(())
    }
}
