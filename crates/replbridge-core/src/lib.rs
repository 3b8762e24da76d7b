//! replbridge core - drive a line-oriented REPL in a child process as if its
//! values were local.
//!
//! The crate has two layers:
//!
//! - the correlation [`Engine`]: one duplex text stream to the guest, with
//!   in-band sentinels marking where each reply ends;
//! - the lazy [`Proxy`] model on top of it: handles that accumulate guest
//!   expression text and only read from the guest when materialized.
//!
//! Concrete guests implement [`Dialect`] and [`Guest`]; see the
//! `replbridge-guests` crate.
//!
//! # Example
//!
//! ```rust,ignore
//! use replbridge_guests::r;
//!
//! let engine = r::start()?;
//! replbridge_core::declare_let(&engine, "x", 3)?;
//! let x = engine.handle("x");
//! let sum = (&x + 4)?;
//! assert_eq!(sum.to_value()?, 7.0.into());
//! engine.close()?;
//! ```

pub mod config;
pub mod convert;
pub mod declare;
pub mod engine;
pub mod error;
pub mod proxy;
pub mod transport;
pub mod value;

#[cfg(test)]
mod testing;

pub use config::{EngineConfig, ProtocolConfig};
pub use convert::{to_guest_literal, LiteralFn, LiteralTable, Operand, RemoteValue};
pub use declare::{declare_const, declare_let, Const, Let};
pub use engine::{fresh_token, Engine, EngineState, Reply, ReplyKey};
pub use error::{BridgeError, Result};
pub use proxy::{BinaryOp, Guest, IndexKey, Materialized, Proxy};
pub use transport::{
    default_prompt_filter, sentinel_stamp, DeclarationKind, Dialect, LaunchSpec,
    ProcessTransport, ScriptedTransport, SentinelPair, Transport, WrittenLog,
};
pub use value::{HostValue, Table, ValueTag};
