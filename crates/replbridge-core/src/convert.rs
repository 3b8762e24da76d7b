//! Host-to-guest value conversion.
//!
//! Anything that can stand in an operand position is first resolved into an
//! [`Operand`]. Host values are then rendered through the guest's
//! [`LiteralTable`], one converter per [`ValueTag`]; proxy handles render as
//! their code text.

use crate::engine::Engine;
use crate::error::{BridgeError, Result};
use crate::proxy::{Guest, Proxy};
use crate::value::{HostValue, Table, ValueTag};
use std::fmt;

/// Renders one host value as guest source text.
pub type LiteralFn = fn(&HostValue) -> Result<String>;

/// Per-guest literal converters keyed by value tag.
///
/// A missing entry means the guest cannot express values of that shape.
#[derive(Clone, Copy)]
pub struct LiteralTable {
    guest: &'static str,
    scalar: Option<LiteralFn>,
    sequence: Option<LiteralFn>,
    tabular: Option<LiteralFn>,
}

impl LiteralTable {
    pub const fn new(
        guest: &'static str,
        scalar: Option<LiteralFn>,
        sequence: Option<LiteralFn>,
        tabular: Option<LiteralFn>,
    ) -> Self {
        Self {
            guest,
            scalar,
            sequence,
            tabular,
        }
    }

    /// Converter registered for `tag`.
    pub fn lookup(&self, tag: ValueTag) -> Result<LiteralFn> {
        let entry = match tag {
            ValueTag::Scalar => self.scalar,
            ValueTag::Sequence => self.sequence,
            ValueTag::Tabular => self.tabular,
        };
        entry.ok_or_else(|| BridgeError::unsupported(self.guest, format!("{} values", tag.as_str())))
    }

    /// Render `value` with the converter for its tag.
    pub fn convert(&self, value: &HostValue) -> Result<String> {
        let render = self.lookup(value.tag())?;
        render(value)
    }
}

impl fmt::Debug for LiteralTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiteralTable")
            .field("guest", &self.guest)
            .field("scalar", &self.scalar.is_some())
            .field("sequence", &self.sequence.is_some())
            .field("tabular", &self.tabular.is_some())
            .finish()
    }
}

/// A value living in some other runtime that can be pulled into the host.
///
/// Implemented by every [`Proxy`], so a handle from one engine can be passed
/// to another: it is materialized in its own guest and re-rendered as a
/// literal for the receiving guest.
pub trait RemoteValue {
    fn materialize_value(&self) -> Result<HostValue>;

    /// Human-readable origin, for diagnostics.
    fn describe(&self) -> String;
}

/// Anything accepted in an operand position.
pub enum Operand<'a, G: Guest> {
    /// A handle on the same guest; substituted by its code.
    Handle(&'a Proxy<'a, G>),
    /// A value from another runtime; materialized, then converted.
    Remote(&'a dyn RemoteValue),
    /// A host value; converted through the literal table.
    Value(HostValue),
}

impl<'a, G: Guest> Operand<'a, G> {
    pub fn remote(value: &'a dyn RemoteValue) -> Self {
        Operand::Remote(value)
    }

    /// Render as guest expression text.
    pub fn render(&self) -> Result<String> {
        match self {
            Operand::Handle(proxy) => Ok(proxy.code().to_string()),
            Operand::Remote(remote) => G::literals().convert(&remote.materialize_value()?),
            Operand::Value(value) => G::literals().convert(value),
        }
    }

    /// Render as expression text for `engine`.
    ///
    /// A handle owned by another engine names a binding that does not exist
    /// in `engine`'s guest, so its value is transferred instead.
    pub fn render_in(&self, engine: &Engine<G>) -> Result<String> {
        match self {
            Operand::Handle(proxy) if !std::ptr::eq(proxy.engine(), engine) => {
                G::literals().convert(&proxy.to_value()?)
            }
            _ => self.render(),
        }
    }
}

impl<G: Guest> fmt::Debug for Operand<'_, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Handle(proxy) => f.debug_tuple("Handle").field(proxy).finish(),
            Operand::Remote(remote) => f.debug_tuple("Remote").field(&remote.describe()).finish(),
            Operand::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

/// Render any operand as a literal of guest `G`.
///
/// Unlike [`Operand::render`], handles are materialized first, so the result
/// never refers to guest-side bindings.
pub fn to_guest_literal<G: Guest>(operand: &Operand<'_, G>) -> Result<String> {
    match operand {
        Operand::Handle(proxy) => G::literals().convert(&proxy.to_value()?),
        Operand::Remote(remote) => G::literals().convert(&remote.materialize_value()?),
        Operand::Value(value) => G::literals().convert(value),
    }
}

impl<'a, 'e: 'a, G: Guest> From<&'a Proxy<'e, G>> for Operand<'a, G> {
    fn from(proxy: &'a Proxy<'e, G>) -> Self {
        Operand::Handle(proxy)
    }
}

macro_rules! operand_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<G: Guest> From<$ty> for Operand<'_, G> {
                fn from(value: $ty) -> Self {
                    Operand::Value(value.into())
                }
            }
        )*
    };
}

operand_from_value!(bool, i32, i64, u32, f64, String, HostValue, Table);

impl<G: Guest> From<&str> for Operand<'_, G> {
    fn from(value: &str) -> Self {
        Operand::Value(value.into())
    }
}

impl<G: Guest, T: Into<HostValue>> From<Vec<T>> for Operand<'_, G> {
    fn from(values: Vec<T>) -> Self {
        Operand::Value(values.into())
    }
}

impl<G: Guest, T: Into<HostValue>> From<Option<T>> for Operand<'_, G> {
    fn from(value: Option<T>) -> Self {
        Operand::Value(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::testing::{calculator, CalcGuest};

    struct Fixed(HostValue);

    impl RemoteValue for Fixed {
        fn materialize_value(&self) -> Result<HostValue> {
            Ok(self.0.clone())
        }

        fn describe(&self) -> String {
            "fixed".into()
        }
    }

    #[test]
    fn test_lookup_missing_entry_is_unsupported() {
        let table = CalcGuest::literals();
        match table.lookup(ValueTag::Tabular) {
            Err(BridgeError::UnsupportedConversion { guest, what }) => {
                assert_eq!(guest, "calc");
                assert_eq!(what, "tabular values");
            }
            other => panic!("Expected UnsupportedConversion, got: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_value_operands_use_literal_table() {
        let operand: Operand<'_, CalcGuest> = 42.into();
        assert_eq!(operand.render().unwrap(), "42");

        let operand: Operand<'_, CalcGuest> = true.into();
        assert_eq!(operand.render().unwrap(), "1");
    }

    #[test]
    fn test_handle_operand_renders_code() {
        let engine = Engine::new(calculator(), CalcGuest).unwrap();
        let x = engine.handle("x");
        let operand: Operand<'_, CalcGuest> = (&x).into();
        assert_eq!(operand.render().unwrap(), "x");
    }

    #[test]
    fn test_handle_literal_materializes_first() {
        let engine = Engine::new(calculator(), CalcGuest).unwrap();
        engine.set("x", 9).unwrap();
        let x = engine.handle("x");
        let operand: Operand<'_, CalcGuest> = (&x).into();
        assert_eq!(to_guest_literal(&operand).unwrap(), "9");
    }

    #[test]
    fn test_remote_operand_is_materialized_and_converted() {
        let remote = Fixed(HostValue::Int(5));
        let operand: Operand<'_, CalcGuest> = Operand::remote(&remote);
        assert_eq!(operand.render().unwrap(), "5");

        let remote = Fixed(HostValue::from(Table::new(["a"])));
        let operand: Operand<'_, CalcGuest> = Operand::remote(&remote);
        assert!(matches!(
            operand.render(),
            Err(BridgeError::UnsupportedConversion { .. })
        ));
    }
}
