//! Request/response correlation over a single unframed duplex stream.
//!
//! Every fragment is written together with a fresh sentinel; the sentinel's
//! match text is queued. Reading pops the oldest match text and accumulates
//! guest output until that text shows up. The guest is assumed to process
//! fragments in submission order, so positional FIFO order is the only
//! request identity.
//!
//! # Concurrency
//!
//! Engines are not safe for concurrent use. The type is `!Sync`; share one
//! across threads only behind external locking.

use crate::config::EngineConfig;
use crate::convert::Operand;
use crate::error::{BridgeError, Result};
use crate::proxy::{Guest, Proxy};
use crate::transport::{DeclarationKind, Dialect, LaunchSpec, ProcessTransport, Transport};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Constructing,
    Handshaking,
    Ready,
    Closing,
    Closed,
}

/// The match text of one submitted fragment.
///
/// Returned by [`Engine::send`] and redeemed once with
/// [`Engine::receive_by_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplyKey(String);

impl ReplyKey {
    /// The key that stands for "nothing outstanding".
    pub fn none() -> Self {
        ReplyKey(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One correlated reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub key: ReplyKey,
    /// Kept output lines, each followed by `\n`.
    pub text: String,
}

/// A fresh uniqueness token for sentinels and temporaries.
pub fn fresh_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

struct Core {
    transport: Box<dyn Transport>,
    pending: VecDeque<ReplyKey>,
    state: EngineState,
    temporaries: usize,
}

impl Core {
    fn ensure_ready(&self) -> Result<()> {
        if self.state == EngineState::Ready {
            Ok(())
        } else {
            Err(BridgeError::NotReady { state: self.state })
        }
    }
}

/// Correlation engine bound to one guest process.
pub struct Engine<D: Dialect> {
    dialect: D,
    config: EngineConfig,
    core: RefCell<Core>,
}

impl<D: Dialect> Engine<D> {
    /// Build an engine over `transport` and perform the handshake.
    pub fn new(transport: impl Transport + 'static, dialect: D) -> Result<Self> {
        Self::with_config(Box::new(transport), dialect, EngineConfig::default())
    }

    /// Build an engine with explicit configuration and perform the handshake.
    pub fn with_config(
        transport: Box<dyn Transport>,
        dialect: D,
        config: EngineConfig,
    ) -> Result<Self> {
        let engine = Self {
            dialect,
            config,
            core: RefCell::new(Core {
                transport,
                pending: VecDeque::new(),
                state: EngineState::Constructing,
                temporaries: 0,
            }),
        };
        engine.handshake()?;
        Ok(engine)
    }

    /// Spawn the guest process described by `spec` and connect to it.
    pub fn launch(spec: &LaunchSpec, dialect: D, config: EngineConfig) -> Result<Self> {
        let transport = ProcessTransport::spawn(spec)?;
        Self::with_config(Box::new(transport), dialect, config)
    }

    /// Absorb the guest's banner: write a sentinel and discard everything
    /// up to its echo.
    fn handshake(&self) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.state = EngineState::Handshaking;

        if let Some(prelude) = self.dialect.handshake_prelude() {
            self.write_raw(&mut core, &prelude)?;
        }
        let pair = self.dialect.sentinel_pair(&fresh_token());
        self.write_raw(&mut core, &pair.submission)?;
        core.transport.flush()?;

        let mut discarded = 0usize;
        loop {
            let line = self.read_raw(&mut core).map_err(|e| match e {
                BridgeError::Transport { message, source } => BridgeError::Transport {
                    message: format!("handshake with {} guest: {}", self.dialect.label(), message),
                    source,
                },
                other => other,
            })?;
            if line == pair.matcher {
                break;
            }
            discarded += 1;
            if let Some(limit) = self.config.handshake_line_limit {
                if discarded > limit {
                    return Err(BridgeError::transport_msg(format!(
                        "handshake with {} guest: banner exceeded {} lines",
                        self.dialect.label(),
                        limit
                    )));
                }
            }
        }

        core.state = EngineState::Ready;
        info!(
            "{} guest ready ({} banner lines discarded)",
            self.dialect.label(),
            discarded
        );
        Ok(())
    }

    fn write_raw(&self, core: &mut Core, text: &str) -> Result<()> {
        if self.config.verbose_logging {
            debug!("{} <- {:?}", self.dialect.label(), text);
        }
        core.transport.write(text)
    }

    fn read_raw(&self, core: &mut Core) -> Result<String> {
        match core.transport.read_line(self.config.read_timeout)? {
            Some(line) => {
                if self.config.verbose_logging {
                    debug!("{} -> {:?}", self.dialect.label(), line);
                }
                Ok(line)
            }
            None => Err(BridgeError::transport_msg(format!(
                "{} guest closed its output stream",
                self.dialect.label()
            ))),
        }
    }

    /// Submit a fragment without waiting for its output.
    ///
    /// The returned key must be redeemed at most once.
    pub fn send(&self, fragment: &str) -> Result<ReplyKey> {
        let mut core = self.core.borrow_mut();
        core.ensure_ready()?;

        let wrapped = self.dialect.wrap_for_submission(fragment);
        self.write_raw(&mut core, &wrapped)?;
        let pair = self.dialect.sentinel_pair(&fresh_token());
        self.write_raw(&mut core, &pair.submission)?;

        let key = ReplyKey(pair.matcher);
        core.pending.push_back(key.clone());
        Ok(key)
    }

    /// Push everything sent so far through to the guest.
    pub fn flush(&self) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.ensure_ready()?;
        core.transport.flush()
    }

    /// Read the reply to the oldest outstanding fragment.
    ///
    /// Returns `None` without touching the transport when nothing is
    /// outstanding.
    pub fn receive_one(&self) -> Result<Option<Reply>> {
        let mut core = self.core.borrow_mut();
        core.ensure_ready()?;

        let Some(key) = core.pending.pop_front() else {
            return Ok(None);
        };

        let mut text = String::new();
        loop {
            let line = self.read_raw(&mut core)?;
            if line == key.0 {
                break;
            }
            if self.dialect.is_not_prompt_echo(&line) {
                text.push_str(&line);
                text.push('\n');
            }
        }
        Ok(Some(Reply { key, text }))
    }

    /// Read replies until the one for `key`, discarding older ones.
    ///
    /// Fails fast with [`BridgeError::ProtocolDesync`] for a key that is not
    /// outstanding (already redeemed or never issued).
    pub fn receive_by_key(&self, key: &ReplyKey) -> Result<String> {
        {
            let core = self.core.borrow();
            core.ensure_ready()?;
            if !core.pending.contains(key) {
                if key.0.is_empty() && core.pending.is_empty() {
                    return Ok(String::new());
                }
                return Err(BridgeError::ProtocolDesync {
                    key: key.0.clone(),
                });
            }
        }

        loop {
            match self.receive_one()? {
                Some(reply) if reply.key == *key => return Ok(reply.text),
                Some(reply) => {
                    if self.config.verbose_logging {
                        debug!(
                            "{} discarding reply for {} while waiting for {}",
                            self.dialect.label(),
                            reply.key,
                            key
                        );
                    }
                }
                None => {
                    return Err(BridgeError::ProtocolDesync {
                        key: key.0.clone(),
                    })
                }
            }
        }
    }

    /// Synchronous round trip: send, flush, and wait for the reply.
    pub fn get(&self, fragment: &str) -> Result<String> {
        let key = self.send(fragment)?;
        self.flush()?;
        self.receive_by_key(&key)
    }

    /// Ask the guest to exit, wait for it, and release the transport.
    ///
    /// Calling `close` again is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut core = self.core.borrow_mut();
        if matches!(core.state, EngineState::Closing | EngineState::Closed) {
            return Ok(());
        }
        core.state = EngineState::Closing;
        info!(
            "Closing {} guest ({} replies outstanding, {} temporaries created)",
            self.dialect.label(),
            core.pending.len(),
            core.temporaries
        );

        let grace = match self.dialect.termination_fragment() {
            Some(farewell) => {
                let sent = self
                    .write_raw(&mut core, &farewell)
                    .and_then(|_| core.transport.flush());
                if let Err(e) = sent {
                    warn!(
                        "Could not send termination fragment to {} guest: {}",
                        self.dialect.label(),
                        e
                    );
                }
                self.config.close_grace
            }
            None => Duration::ZERO,
        };

        let result = core.transport.shutdown(grace);
        core.pending.clear();
        core.state = EngineState::Closed;
        result
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.core.borrow().state
    }

    /// Number of fragments whose replies have not been read yet.
    pub fn outstanding(&self) -> usize {
        self.core.borrow().pending.len()
    }

    /// Number of temporary bindings created in the guest so far.
    pub fn temporaries_created(&self) -> usize {
        self.core.borrow().temporaries
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reserve a fresh temporary binding name.
    pub(crate) fn next_temporary(&self) -> String {
        self.core.borrow_mut().temporaries += 1;
        self.dialect.temporary_name(&fresh_token())
    }
}

impl<G: Guest> Engine<G> {
    /// A lazy handle on the guest expression `name` (`engine[name]`).
    pub fn handle(&self, name: impl Into<String>) -> Proxy<'_, G> {
        Proxy::new(name, self)
    }

    /// Plain assignment (`engine[name] = value`).
    pub fn set<'a>(&self, name: &str, value: impl Into<Operand<'a, G>>) -> Result<()> {
        self.set_binding(name, value, DeclarationKind::Assign)
    }

    /// Bind `name` in the guest using the given declaration form.
    ///
    /// This is a blocking round trip, so a later read observes the write.
    pub fn set_binding<'a>(
        &self,
        name: &str,
        value: impl Into<Operand<'a, G>>,
        kind: DeclarationKind,
    ) -> Result<()> {
        let rendered = value.into().render_in(self)?;
        let fragment = self.dialect.declare_binding(kind, name, &rendered);
        self.get(&fragment)?;
        Ok(())
    }
}

impl<D: Dialect> fmt::Debug for Engine<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Engine");
        out.field("guest", &self.dialect.label());
        match self.core.try_borrow() {
            Ok(core) => out
                .field("state", &core.state)
                .field("outstanding", &core.pending.len()),
            Err(_) => out.field("state", &"<busy>"),
        };
        out.finish()
    }
}

impl<D: Dialect> Drop for Engine<D> {
    fn drop(&mut self) {
        let state = self.core.get_mut().state;
        if matches!(state, EngineState::Ready | EngineState::Handshaking) {
            if let Err(e) = self.close() {
                warn!("Closing {} guest on drop failed: {}", self.dialect.label(), e);
            }
        }
    }
}
