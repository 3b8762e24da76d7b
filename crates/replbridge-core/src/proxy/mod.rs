//! Lazy proxy handles on guest values.
//!
//! A [`Proxy`] carries two pieces of text: `name`, the expression it was
//! built from, and `code`, what gets substituted when it is used as an
//! operand. Composition (calls, indexing, operators) never reads from the
//! guest. It binds the composed expression to a fresh temporary with a
//! guarded assignment and returns a handle whose `code` is that temporary.
//! Guest-side failures surface at the next [`Proxy::materialize`].

mod handle;

pub use handle::{Materialized, Proxy};

use crate::convert::LiteralTable;
use crate::error::Result;
use crate::transport::Dialect;
use std::fmt;

/// Binary operators available on proxies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Or,
    And,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 13] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Rem,
        BinaryOp::Or,
        BinaryOp::And,
        BinaryOp::Lt,
        BinaryOp::Le,
        BinaryOp::Gt,
        BinaryOp::Ge,
        BinaryOp::Eq,
        BinaryOp::Ne,
    ];

    /// The operator's spelling in most C-family languages.
    pub fn c_symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
        }
    }
}

/// Index argument for [`Proxy::index`].
///
/// Positions are 0-based on the host side whatever the guest's convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexKey {
    Name(String),
    Position(i64),
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Name(name) => write!(f, "{:?}", name),
            IndexKey::Position(pos) => write!(f, "{}", pos),
        }
    }
}

impl From<&str> for IndexKey {
    fn from(name: &str) -> Self {
        IndexKey::Name(name.to_string())
    }
}

impl From<String> for IndexKey {
    fn from(name: String) -> Self {
        IndexKey::Name(name)
    }
}

impl From<i32> for IndexKey {
    fn from(pos: i32) -> Self {
        IndexKey::Position(pos.into())
    }
}

impl From<i64> for IndexKey {
    fn from(pos: i64) -> Self {
        IndexKey::Position(pos)
    }
}

impl From<usize> for IndexKey {
    fn from(pos: usize) -> Self {
        IndexKey::Position(i64::try_from(pos).unwrap_or(i64::MAX))
    }
}

/// Proxy capabilities of a guest language.
///
/// Everything here is pure text generation except
/// [`materialize`](Guest::materialize), which talks to the guest through the
/// proxy's engine.
pub trait Guest: Dialect + Sized + 'static {
    /// Literal converters, shared by every engine of this guest.
    fn literals() -> &'static LiteralTable;

    /// Render a call of `callee` with rendered positional and named arguments.
    fn render_call(&self, callee: &str, args: &[String], named: &[(String, String)]) -> String;

    /// Render an index (or attribute) access.
    fn render_index(&self, target: &str, key: &IndexKey) -> Result<String>;

    /// Guest spelling of a binary operator.
    fn operator_symbol(&self, op: BinaryOp) -> &'static str {
        op.c_symbol()
    }

    fn render_operator(&self, lhs: &str, op: BinaryOp, rhs: &str) -> String {
        format!("({} {} {})", lhs, self.operator_symbol(op), rhs)
    }

    /// Bind `expression` to `temporary`, catching guest errors into the
    /// temporary instead of letting them escape.
    fn guarded_assignment(&self, temporary: &str, expression: &str) -> String;

    /// Guarded assignment of an index expression on `target`.
    ///
    /// Guests where a bare member lookup loses its receiver override this.
    fn guarded_index(&self, temporary: &str, _target: &str, indexed: &str) -> String {
        self.guarded_assignment(temporary, indexed)
    }

    /// Fetch a proxy's value into the host, or decide it stays remote.
    fn materialize<'e>(&self, proxy: &Proxy<'e, Self>) -> Result<Materialized<'e, Self>>;
}
