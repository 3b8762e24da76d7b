//! Lazy proxy handles.
//!
//! A [`Proxy`] names a guest expression and evaluates nothing by itself.
//! Calls, indexing and operators bind their result to a fresh guest-side
//! temporary and return a handle on it; only [`Proxy::materialize`] reads
//! from the guest.

use super::{BinaryOp, Guest, IndexKey};
use crate::convert::{Operand, RemoteValue};
use crate::engine::Engine;
use crate::error::{BridgeError, Result};
use crate::value::HostValue;
use std::fmt;
use std::ops::{Add, Div, Mul, Rem, Sub};
use tracing::{debug, warn};

/// Lazy handle on a guest expression.
///
/// Borrows its engine, so a handle can never outlive the session it
/// refers to.
pub struct Proxy<'e, G: Guest> {
    name: String,
    code: String,
    engine: &'e Engine<G>,
}

/// Outcome of [`Proxy::materialize`].
pub enum Materialized<'e, G: Guest> {
    /// The value was transferred into the host.
    Value(HostValue),
    /// The value has no host counterpart (functions, environments,
    /// objects) and stays in the guest.
    Lazy(Proxy<'e, G>),
}

impl<'e, G: Guest> Materialized<'e, G> {
    pub fn is_lazy(&self) -> bool {
        matches!(self, Materialized::Lazy(_))
    }

    pub fn as_value(&self) -> Option<&HostValue> {
        match self {
            Materialized::Value(value) => Some(value),
            Materialized::Lazy(_) => None,
        }
    }

    /// The host value, or `UnsupportedConversion` for a lazy result.
    pub fn into_value(self) -> Result<HostValue> {
        match self {
            Materialized::Value(value) => Ok(value),
            Materialized::Lazy(proxy) => Err(BridgeError::unsupported(
                proxy.engine.dialect().label(),
                format!("`{}` to a host value", proxy.name),
            )),
        }
    }
}

impl<G: Guest> fmt::Debug for Materialized<'_, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Materialized::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Materialized::Lazy(proxy) => f.debug_tuple("Lazy").field(proxy).finish(),
        }
    }
}

impl<'e, G: Guest> Proxy<'e, G> {
    /// A handle on `name`, with `code == name`.
    pub fn new(name: impl Into<String>, engine: &'e Engine<G>) -> Self {
        let name = name.into();
        Self {
            code: name.clone(),
            name,
            engine,
        }
    }

    /// A handle whose code differs from its name.
    pub fn with_code(
        name: impl Into<String>,
        code: impl Into<String>,
        engine: &'e Engine<G>,
    ) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            engine,
        }
    }

    /// The expression this handle was built from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The text substituted when this handle is used as an operand.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn engine(&self) -> &'e Engine<G> {
        self.engine
    }

    /// Whether `code` is a temporary created by composition.
    pub fn is_composed(&self) -> bool {
        self.code != self.name
    }

    /// Bind `expression` to a fresh temporary and hand back a proxy on it.
    ///
    /// Sends and flushes; never reads.
    fn compose(&self, expression: String) -> Result<Proxy<'e, G>> {
        let temporary = self.engine.next_temporary();
        let fragment = self
            .engine
            .dialect()
            .guarded_assignment(&temporary, &expression);
        self.bind(expression, temporary, &fragment)
    }

    fn bind(&self, expression: String, temporary: String, fragment: &str) -> Result<Proxy<'e, G>> {
        self.engine.send(fragment)?;
        self.engine.flush()?;
        Ok(Proxy::with_code(expression, temporary, self.engine))
    }

    /// Call this value with positional arguments.
    pub fn call(&self, args: &[Operand<'_, G>]) -> Result<Proxy<'e, G>> {
        self.call_with(args, &[])
    }

    /// Call this value with positional and named arguments.
    pub fn call_with(
        &self,
        args: &[Operand<'_, G>],
        named: &[(&str, Operand<'_, G>)],
    ) -> Result<Proxy<'e, G>> {
        let rendered = args
            .iter()
            .map(|arg| arg.render_in(self.engine))
            .collect::<Result<Vec<_>>>()?;
        let rendered_named = named
            .iter()
            .map(|(key, value)| Ok((key.to_string(), value.render_in(self.engine)?)))
            .collect::<Result<Vec<_>>>()?;
        let expression = self
            .engine
            .dialect()
            .render_call(&self.code, &rendered, &rendered_named);
        self.compose(expression)
    }

    /// Index (or attribute) access.
    pub fn index(&self, key: impl Into<IndexKey>) -> Result<Proxy<'e, G>> {
        let expression = self.engine.dialect().render_index(&self.code, &key.into())?;
        let temporary = self.engine.next_temporary();
        let fragment = self
            .engine
            .dialect()
            .guarded_index(&temporary, &self.code, &expression);
        self.bind(expression, temporary, &fragment)
    }

    /// Apply a binary operator with `self` on the left.
    pub fn binary<'a>(&self, op: BinaryOp, other: impl Into<Operand<'a, G>>) -> Result<Proxy<'e, G>> {
        let rhs = other.into().render_in(self.engine)?;
        let expression = self.engine.dialect().render_operator(&self.code, op, &rhs);
        self.compose(expression)
    }

    pub fn lt<'a>(&self, other: impl Into<Operand<'a, G>>) -> Result<Proxy<'e, G>> {
        self.binary(BinaryOp::Lt, other)
    }

    pub fn le<'a>(&self, other: impl Into<Operand<'a, G>>) -> Result<Proxy<'e, G>> {
        self.binary(BinaryOp::Le, other)
    }

    pub fn gt<'a>(&self, other: impl Into<Operand<'a, G>>) -> Result<Proxy<'e, G>> {
        self.binary(BinaryOp::Gt, other)
    }

    pub fn ge<'a>(&self, other: impl Into<Operand<'a, G>>) -> Result<Proxy<'e, G>> {
        self.binary(BinaryOp::Ge, other)
    }

    pub fn equals<'a>(&self, other: impl Into<Operand<'a, G>>) -> Result<Proxy<'e, G>> {
        self.binary(BinaryOp::Eq, other)
    }

    pub fn not_equals<'a>(&self, other: impl Into<Operand<'a, G>>) -> Result<Proxy<'e, G>> {
        self.binary(BinaryOp::Ne, other)
    }

    pub fn or<'a>(&self, other: impl Into<Operand<'a, G>>) -> Result<Proxy<'e, G>> {
        self.binary(BinaryOp::Or, other)
    }

    pub fn and<'a>(&self, other: impl Into<Operand<'a, G>>) -> Result<Proxy<'e, G>> {
        self.binary(BinaryOp::And, other)
    }

    /// Evaluate in the guest and transfer the result if it has a host form.
    pub fn materialize(&self) -> Result<Materialized<'e, G>> {
        if self.engine.config().verbose_logging {
            debug!("Materializing {}", self);
        }
        self.engine.dialect().materialize(self)
    }

    /// Materialize and require a host value.
    pub fn to_value(&self) -> Result<HostValue> {
        self.materialize()?.into_value()
    }

    /// Drop the temporary behind a composed handle.
    ///
    /// A no-op for handles on named bindings and for guests without a release
    /// fragment. Other handles sharing the temporary become dangling.
    pub fn dispose(self) -> Result<()> {
        if !self.is_composed() {
            return Ok(());
        }
        let Some(fragment) = self.engine.dialect().release_fragment(&self.code) else {
            return Ok(());
        };
        let reply = self.engine.get(&fragment)?;
        if !self.engine.dialect().release_acknowledged(&reply) {
            warn!("Releasing {} produced output: {}", self.code, reply.trim_end());
        }
        Ok(())
    }
}

impl<G: Guest> Clone for Proxy<'_, G> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            code: self.code.clone(),
            engine: self.engine,
        }
    }
}

impl<G: Guest> fmt::Debug for Proxy<'_, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("name", &self.name)
            .field("code", &self.code)
            .finish()
    }
}

impl<G: Guest> fmt::Display for Proxy<'_, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}: {}]",
            self.engine.dialect().label(),
            self.name,
            self.code
        )
    }
}

impl<G: Guest> RemoteValue for Proxy<'_, G> {
    fn materialize_value(&self) -> Result<HostValue> {
        self.to_value()
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

macro_rules! proxy_operator {
    ($($trait:ident :: $method:ident => $op:ident),* $(,)?) => {
        $(
            impl<'a, 'e, G: Guest, T: Into<Operand<'a, G>>> $trait<T> for &Proxy<'e, G> {
                type Output = Result<Proxy<'e, G>>;

                fn $method(self, rhs: T) -> Self::Output {
                    self.binary(BinaryOp::$op, rhs)
                }
            }
        )*
    };
}

proxy_operator!(
    Add::add => Add,
    Sub::sub => Sub,
    Mul::mul => Mul,
    Div::div => Div,
    Rem::rem => Rem,
);
