//! A toy guest for unit tests: an integer calculator spoken over a
//! [`ScriptedTransport`].
//!
//! Commands, one per line:
//!
//! - `mark S` prints `S` (the sentinel)
//! - `set NAME EXPR` binds the result (or the error) of `EXPR`
//! - `show EXPR` prints `value N`, `bool B`, `function F` or `error MSG`
//! - `drop NAME` forgets a binding
//! - `noisy` prints a prompt echo, a blank line and `kept`
//! - `hang` goes silent for good
//! - `quit`

use crate::convert::LiteralTable;
use crate::engine::Engine;
use crate::error::{BridgeError, Result};
use crate::proxy::{Guest, IndexKey, Materialized, Proxy};
use crate::transport::{DeclarationKind, Dialect, ScriptedTransport, SentinelPair};
use crate::value::HostValue;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Int(i64),
    Bool(bool),
    Func(String),
}

type Binding = std::result::Result<Cell, String>;

pub(crate) fn calculator() -> ScriptedTransport {
    let mut env: HashMap<String, Binding> = HashMap::new();
    env.insert("sum".into(), Ok(Cell::Func("sum".into())));
    let mut hung = false;

    ScriptedTransport::new(move |line| {
        if hung {
            return vec![];
        }
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "mark" => vec![rest.to_string()],
            "set" => {
                let (name, expr) = rest.split_once(' ').unwrap_or((rest, ""));
                let value = eval(expr, &env);
                env.insert(name.to_string(), value);
                vec![]
            }
            "show" => vec![match eval(rest, &env) {
                Ok(Cell::Int(n)) => format!("value {}", n),
                Ok(Cell::Bool(b)) => format!("bool {}", b),
                Ok(Cell::Func(f)) => format!("function {}", f),
                Err(msg) => format!("error {}", msg),
            }],
            "drop" => {
                env.remove(rest);
                vec![]
            }
            "noisy" => vec!["> noisy".into(), String::new(), "kept".into()],
            "hang" => {
                hung = true;
                vec![]
            }
            "quit" => vec![],
            other => vec![format!("error unknown command {}", other)],
        }
    })
}

fn eval(expr: &str, env: &HashMap<String, Binding>) -> Binding {
    let expr = expr.trim();
    if let Some(inner) = expr.strip_prefix('(').and_then(|e| e.strip_suffix(')')) {
        let (lhs, op, rhs) = split_operator(inner).ok_or_else(|| format!("bad expression {}", expr))?;
        return apply(op, eval(lhs, env)?, eval(rhs, env)?);
    }
    if let Some((callee, args)) = expr.strip_suffix(')').and_then(|e| e.split_once('(')) {
        match eval(callee, env)? {
            Cell::Func(_) => {
                let mut total = 0;
                for arg in split_args(args) {
                    let arg = arg.split_once('=').map_or(arg, |(_, v)| v);
                    match eval(arg, env)? {
                        Cell::Int(n) => total += n,
                        other => return Err(format!("cannot sum {:?}", other)),
                    }
                }
                return Ok(Cell::Int(total));
            }
            _ => return Err(format!("{} is not a function", callee)),
        }
    }
    if let Ok(n) = expr.parse::<i64>() {
        return Ok(Cell::Int(n));
    }
    env.get(expr)
        .cloned()
        .unwrap_or_else(|| Err(format!("unknown name {}", expr)))
}

fn split_operator(inner: &str) -> Option<(&str, &str, &str)> {
    let mut depth = 0i32;
    for (i, c) in inner.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ' ' if depth == 0 => {
                let rest = &inner[i + 1..];
                let (op, rhs) = rest.split_once(' ')?;
                return Some((&inner[..i], op, rhs));
            }
            _ => {}
        }
    }
    None
}

fn split_args(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in args.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = args[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    parts
}

fn apply(op: &str, lhs: Cell, rhs: Cell) -> Binding {
    let (Cell::Int(a), Cell::Int(b)) = (&lhs, &rhs) else {
        return Err(format!("cannot apply {} to {:?} and {:?}", op, lhs, rhs));
    };
    let (a, b) = (*a, *b);
    Ok(match op {
        "+" => Cell::Int(a + b),
        "-" => Cell::Int(a - b),
        "*" => Cell::Int(a * b),
        "/" | "%" if b == 0 => return Err("division by zero".into()),
        "/" => Cell::Int(a / b),
        "%" => Cell::Int(a % b),
        "<" => Cell::Bool(a < b),
        "<=" => Cell::Bool(a <= b),
        ">" => Cell::Bool(a > b),
        ">=" => Cell::Bool(a >= b),
        "==" => Cell::Bool(a == b),
        "!=" => Cell::Bool(a != b),
        other => return Err(format!("unknown operator {}", other)),
    })
}

fn scalar_literal(value: &HostValue) -> Result<String> {
    match value {
        HostValue::Int(n) => Ok(n.to_string()),
        HostValue::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        other => Err(BridgeError::unsupported("calc", other.type_name())),
    }
}

static CALC_LITERALS: LiteralTable = LiteralTable::new("calc", Some(scalar_literal), None, None);

/// Dialect and proxy hooks of the calculator.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CalcGuest;

impl Dialect for CalcGuest {
    fn label(&self) -> &'static str {
        "calc"
    }

    fn wrap_for_submission(&self, fragment: &str) -> String {
        format!("{}\n", fragment)
    }

    fn sentinel_pair(&self, token: &str) -> SentinelPair {
        let stamp = crate::transport::sentinel_stamp(token);
        SentinelPair::new(format!("mark {}\n", stamp), stamp)
    }

    fn temporary_name(&self, token: &str) -> String {
        format!("tmp_{}", token)
    }

    fn declare_binding(&self, _kind: DeclarationKind, name: &str, value: &str) -> String {
        format!("set {} {}", name, value)
    }

    fn termination_fragment(&self) -> Option<String> {
        Some("quit\n".into())
    }

    fn release_fragment(&self, temporary: &str) -> Option<String> {
        Some(format!("drop {}", temporary))
    }
}

impl Guest for CalcGuest {
    fn literals() -> &'static LiteralTable {
        &CALC_LITERALS
    }

    fn render_call(&self, callee: &str, args: &[String], named: &[(String, String)]) -> String {
        let mut parts: Vec<String> = args.to_vec();
        parts.extend(named.iter().map(|(k, v)| format!("{}={}", k, v)));
        format!("{}({})", callee, parts.join(", "))
    }

    fn render_index(&self, _target: &str, key: &IndexKey) -> Result<String> {
        Err(BridgeError::unsupported("calc", format!("index {}", key)))
    }

    fn guarded_assignment(&self, temporary: &str, expression: &str) -> String {
        format!("set {} {}", temporary, expression)
    }

    fn materialize<'e>(&self, proxy: &Proxy<'e, Self>) -> Result<Materialized<'e, Self>> {
        let engine: &Engine<Self> = proxy.engine();
        let reply = engine.get(&format!("show {}", proxy.code()))?;
        let line = reply.trim_end();
        let (kind, payload) = line.split_once(' ').unwrap_or((line, ""));
        match kind {
            "value" => payload
                .parse::<i64>()
                .map(|n| Materialized::Value(HostValue::Int(n)))
                .map_err(|e| BridgeError::decode(proxy.name(), e.to_string())),
            "bool" => Ok(Materialized::Value(HostValue::Bool(payload == "true"))),
            "function" => Ok(Materialized::Lazy(proxy.clone())),
            "error" => Err(BridgeError::remote(proxy.name(), payload)),
            _ => Err(BridgeError::decode(proxy.name(), format!("unexpected reply {:?}", line))),
        }
    }
}
