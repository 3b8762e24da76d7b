//! R guest.
//!
//! R is driven non-interactively (`--no-readline`), so it echoes every input
//! line behind a `> ` or `+ ` prompt. Top-level errors would end a
//! non-interactive session, which is why every fragment runs inside `try`.

mod decode;
mod literal;

use decode::Shape;
use replbridge_core::{
    BinaryOp, BridgeError, DeclarationKind, Dialect, Engine, EngineConfig, Guest, HostValue,
    IndexKey, LaunchSpec, LiteralTable, Materialized, Proxy, Result, SentinelPair,
};
use tracing::debug;

/// Program name used to launch R.
pub const PROGRAM: &str = "R";

/// How R is launched: vanilla session, no banner, plain stdin.
pub fn launch_spec() -> LaunchSpec {
    LaunchSpec::new(PROGRAM).with_args(["--vanilla", "--quiet", "--no-readline"])
}

/// Launch R with default configuration.
pub fn start() -> Result<Engine<RGuest>> {
    start_with(EngineConfig::default())
}

/// Launch R with the given engine configuration.
pub fn start_with(config: EngineConfig) -> Result<Engine<RGuest>> {
    Engine::launch(&launch_spec(), RGuest, config)
}

/// Deferred warnings print after the value, before the sentinel, and would
/// end up in the parsed reply.
fn quiet(fragment: String) -> String {
    format!("suppressWarnings({})", fragment)
}

/// Dialect and proxy hooks for R.
#[derive(Debug, Clone, Copy, Default)]
pub struct RGuest;

impl Dialect for RGuest {
    fn label(&self) -> &'static str {
        "R"
    }

    fn is_not_prompt_echo(&self, line: &str) -> bool {
        !line.is_empty() && !line.starts_with('>') && !line.starts_with('+')
    }

    fn wrap_for_submission(&self, fragment: &str) -> String {
        format!("try({{{}}})\n", fragment)
    }

    fn sentinel_pair(&self, token: &str) -> SentinelPair {
        let stamp = replbridge_core::sentinel_stamp(token);
        SentinelPair::new(
            format!("print(\"{}\")\n", stamp),
            format!("[1] \"{}\"", stamp),
        )
    }

    fn temporary_name(&self, token: &str) -> String {
        format!(".replbridge_{}", token)
    }

    fn declare_binding(&self, _kind: DeclarationKind, name: &str, value: &str) -> String {
        format!("invisible({} <- {})", name, value)
    }

    fn termination_fragment(&self) -> Option<String> {
        Some("q(\"no\")\n".into())
    }

    fn release_fragment(&self, temporary: &str) -> Option<String> {
        Some(format!("rm({})", temporary))
    }
}

impl Guest for RGuest {
    fn literals() -> &'static LiteralTable {
        &literal::R_LITERALS
    }

    fn render_call(&self, callee: &str, args: &[String], named: &[(String, String)]) -> String {
        let mut parts: Vec<String> = args.to_vec();
        parts.extend(
            named
                .iter()
                .map(|(key, value)| format!("{} = {}", literal::quote_name(key), value)),
        );
        format!("{}({})", callee, parts.join(", "))
    }

    fn render_index(&self, target: &str, key: &IndexKey) -> Result<String> {
        match key {
            IndexKey::Name(name) => Ok(format!("{}[[{}]]", target, literal::string_literal(name))),
            IndexKey::Position(pos) if *pos >= 0 => Ok(format!("{}[[{}]]", target, pos + 1)),
            IndexKey::Position(pos) => Err(BridgeError::unsupported(
                "R",
                format!("negative position {}", pos),
            )),
        }
    }

    fn operator_symbol(&self, op: BinaryOp) -> &'static str {
        match op {
            BinaryOp::Rem => "%%",
            other => other.c_symbol(),
        }
    }

    fn guarded_assignment(&self, temporary: &str, expression: &str) -> String {
        format!("{} <- try({}, silent = TRUE)", temporary, expression)
    }

    fn materialize<'e>(&self, proxy: &Proxy<'e, Self>) -> Result<Materialized<'e, Self>> {
        let engine = proxy.engine();
        let code = proxy.code();

        let probe = engine.send(&quiet(format!("writeLines(class(try({})))", code)))?;
        let class = engine.send(&quiet(format!("writeLines(class({}))", code)))?;
        let is_vector = engine.send(&quiet(format!("writeLines(as.character(is.vector({})))", code)))?;
        let length = engine.send(&quiet(format!("writeLines(as.character(length({})))", code)))?;
        engine.flush()?;

        let probe = engine.receive_by_key(&probe)?;
        let class = engine.receive_by_key(&class)?;
        let is_vector = engine.receive_by_key(&is_vector)?;
        let length = engine.receive_by_key(&length)?;

        if let Some(message) = decode::try_error(&probe) {
            let diagnostic = if message.trim().is_empty() {
                // A stored try-error: its condition message is the diagnostic.
                engine.get(&quiet(format!("cat({})", code)))?
            } else {
                message
            };
            return Err(BridgeError::remote(proxy.name(), diagnostic));
        }

        let classes: Vec<&str> = class.lines().map(str::trim).collect();
        let shape = Shape::classify(&classes, decode::parse_flag(&is_vector, proxy.name())?);
        if engine.config().verbose_logging {
            debug!("R value {} has class {:?}, decoding as {:?}", proxy, classes, shape);
        }

        let Some(fragment) = shape.fragment(code) else {
            return Ok(match shape {
                Shape::Null => Materialized::Value(HostValue::Null),
                _ => Materialized::Lazy(proxy.clone()),
            });
        };
        let length = if matches!(shape, Shape::Printed | Shape::DataFrame | Shape::Matrix) {
            0
        } else {
            decode::parse_count(&length, proxy.name())?
        };
        let text = engine.get(&quiet(fragment))?;
        decode::decode(shape, &text, length, proxy.name()).map(Materialized::Value)
    }
}
