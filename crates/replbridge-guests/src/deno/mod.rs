//! Deno guest.
//!
//! Temporaries live on a namespace object created by the handshake prelude,
//! so they never collide with user bindings and can be deleted.

mod decode;
mod literal;

use decode::Tag;
use replbridge_core::{
    BinaryOp, BridgeError, DeclarationKind, Dialect, Engine, EngineConfig, Guest, HostValue,
    IndexKey, LaunchSpec, LiteralTable, Materialized, Proxy, Result, SentinelPair,
};
use tracing::debug;

/// Program name used to launch Deno.
pub const PROGRAM: &str = "deno";

/// Namespace object holding temporaries.
const NAMESPACE: &str = "__replbridge";

/// How Deno is launched: the REPL subcommand without color codes.
pub fn launch_spec() -> LaunchSpec {
    LaunchSpec::new(PROGRAM)
        .with_arg("repl")
        .with_env("NO_COLOR", "1")
}

/// Launch Deno with default configuration.
pub fn start() -> Result<Engine<DenoGuest>> {
    start_with(EngineConfig::default())
}

/// Launch Deno with the given engine configuration.
pub fn start_with(config: EngineConfig) -> Result<Engine<DenoGuest>> {
    Engine::launch(&launch_spec(), DenoGuest, config)
}

/// Dialect and proxy hooks for Deno.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenoGuest;

impl Dialect for DenoGuest {
    fn label(&self) -> &'static str {
        "Deno"
    }

    fn wrap_for_submission(&self, fragment: &str) -> String {
        format!("{};\n", fragment)
    }

    fn sentinel_pair(&self, token: &str) -> SentinelPair {
        let stamp = format!("\"{}\"", replbridge_core::sentinel_stamp(token));
        SentinelPair::new(format!("{}\n", stamp), stamp)
    }

    fn temporary_name(&self, token: &str) -> String {
        format!("{}.t{}", NAMESPACE, token)
    }

    fn declare_binding(&self, kind: DeclarationKind, name: &str, value: &str) -> String {
        match kind {
            DeclarationKind::Assign => format!("{} = {}", name, value),
            DeclarationKind::Let => format!("let {} = {}", name, value),
            DeclarationKind::Const => format!("const {} = {}", name, value),
        }
    }

    fn termination_fragment(&self) -> Option<String> {
        Some("close()\n".into())
    }

    fn handshake_prelude(&self) -> Option<String> {
        Some(format!("globalThis.{} = {{}};\n", NAMESPACE))
    }

    fn release_fragment(&self, temporary: &str) -> Option<String> {
        Some(format!("delete {}", temporary))
    }

    /// The REPL echoes the result of `delete`.
    fn release_acknowledged(&self, reply: &str) -> bool {
        matches!(reply.trim(), "" | "true")
    }
}

impl Guest for DenoGuest {
    fn literals() -> &'static LiteralTable {
        &literal::DENO_LITERALS
    }

    fn render_call(&self, callee: &str, args: &[String], named: &[(String, String)]) -> String {
        let mut parts: Vec<String> = args.to_vec();
        if !named.is_empty() {
            let fields: Vec<String> = named
                .iter()
                .map(|(key, value)| {
                    let key = literal::string_literal(key).unwrap_or_else(|_| format!("{:?}", key));
                    format!("{}: {}", key, value)
                })
                .collect();
            parts.push(format!("{{{}}}", fields.join(", ")));
        }
        format!("({})({})", callee, parts.join(", "))
    }

    fn render_index(&self, target: &str, key: &IndexKey) -> Result<String> {
        Ok(match key {
            IndexKey::Name(name) => format!("{}[{}]", target, literal::string_literal(name)?),
            IndexKey::Position(pos) if *pos >= 0 => format!("{}[{}]", target, pos),
            IndexKey::Position(pos) => format!("{}.at({})", target, pos),
        })
    }

    fn operator_symbol(&self, op: BinaryOp) -> &'static str {
        match op {
            BinaryOp::Eq => "===",
            BinaryOp::Ne => "!==",
            other => other.c_symbol(),
        }
    }

    fn guarded_assignment(&self, temporary: &str, expression: &str) -> String {
        format!(
            "try {{ {t} = ({e}); }} catch (er) {{ {t} = er; }}",
            t = temporary,
            e = expression
        )
    }

    /// Methods looked up by index keep their receiver.
    fn guarded_index(&self, temporary: &str, target: &str, indexed: &str) -> String {
        format!(
            "try {{ {t} = ({e}); if (typeof {t} === \"function\") {t} = {t}.bind({r}); }} \
             catch (er) {{ {t} = er; }}",
            t = temporary,
            e = indexed,
            r = target
        )
    }

    fn materialize<'e>(&self, proxy: &Proxy<'e, Self>) -> Result<Materialized<'e, Self>> {
        let engine = proxy.engine();
        let code = proxy.code();

        let probe = engine.send(&decode::probe_fragment(code))?;
        let payload = engine.send(&decode::payload_fragment(code))?;
        engine.flush()?;
        let probe = engine.receive_by_key(&probe)?;
        let payload = engine.receive_by_key(&payload)?;

        let tag = decode::parse_probe(&probe, proxy.name())?;
        if engine.config().verbose_logging {
            debug!("Deno value {} has type {:?}", proxy, tag);
        }
        match tag {
            Tag::Error(message) => Err(BridgeError::remote(proxy.name(), message)),
            Tag::Null | Tag::Undefined => Ok(Materialized::Value(HostValue::Null)),
            Tag::Function | Tag::Object => Ok(Materialized::Lazy(proxy.clone())),
            Tag::BigInt | Tag::Symbol => Err(BridgeError::unsupported(
                "Deno",
                format!("{:?} value `{}`", tag, proxy.name()),
            )),
            Tag::Number | Tag::String | Tag::Boolean | Tag::Array => {
                decode::decode_payload(&tag, &payload, proxy.name()).map(Materialized::Value)
            }
        }
    }
}
