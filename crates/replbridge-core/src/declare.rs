//! Declaration helpers for guests that distinguish `let` and `const`.
//!
//! Guests without the distinction render every kind as a plain assignment.

use crate::convert::Operand;
use crate::engine::Engine;
use crate::error::Result;
use crate::proxy::Guest;
use crate::transport::DeclarationKind;

/// Declare a mutable binding.
pub fn declare_let<'a, G: Guest>(
    engine: &Engine<G>,
    name: &str,
    value: impl Into<Operand<'a, G>>,
) -> Result<()> {
    engine.set_binding(name, value, DeclarationKind::Let)
}

/// Declare an immutable binding.
pub fn declare_const<'a, G: Guest>(
    engine: &Engine<G>,
    name: &str,
    value: impl Into<Operand<'a, G>>,
) -> Result<()> {
    engine.set_binding(name, value, DeclarationKind::Const)
}

/// `let` view of an engine: `Let::new(&engine).set("x", 3)`.
#[derive(Debug)]
pub struct Let<'e, G: Guest>(&'e Engine<G>);

impl<'e, G: Guest> Let<'e, G> {
    pub fn new(engine: &'e Engine<G>) -> Self {
        Let(engine)
    }

    pub fn set<'a>(&self, name: &str, value: impl Into<Operand<'a, G>>) -> Result<()> {
        declare_let(self.0, name, value)
    }
}

/// `const` view of an engine.
#[derive(Debug)]
pub struct Const<'e, G: Guest>(&'e Engine<G>);

impl<'e, G: Guest> Const<'e, G> {
    pub fn new(engine: &'e Engine<G>) -> Self {
        Const(engine)
    }

    pub fn set<'a>(&self, name: &str, value: impl Into<Operand<'a, G>>) -> Result<()> {
        declare_const(self.0, name, value)
    }
}
