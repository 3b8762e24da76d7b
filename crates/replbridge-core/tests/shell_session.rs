//! Integration tests against a real child process.
//!
//! A POSIX shell is the smallest line-oriented REPL available everywhere,
//! which makes it a good stand-in for exercising the process transport,
//! handshake, ordering and shutdown without any guest language installed.

#![cfg(unix)]

use replbridge_core::{
    BridgeError, DeclarationKind, Dialect, Engine, EngineConfig, EngineState, LaunchSpec,
    SentinelPair,
};
use std::time::Duration;
use tempfile::TempDir;

struct Shell;

impl Dialect for Shell {
    fn label(&self) -> &'static str {
        "sh"
    }

    fn wrap_for_submission(&self, fragment: &str) -> String {
        format!("{}\n", fragment)
    }

    fn sentinel_pair(&self, token: &str) -> SentinelPair {
        let stamp = replbridge_core::sentinel_stamp(token);
        SentinelPair::new(format!("echo '{}'\n", stamp), stamp)
    }

    fn temporary_name(&self, token: &str) -> String {
        format!("_rb_{}", token)
    }

    fn declare_binding(&self, _kind: DeclarationKind, name: &str, value: &str) -> String {
        format!("{}={}", name, value)
    }

    fn termination_fragment(&self) -> Option<String> {
        Some("exit\n".into())
    }
}

fn shell() -> Engine<Shell> {
    Engine::launch(&LaunchSpec::new("/bin/sh"), Shell, EngineConfig::default())
        .expect("Failed to start /bin/sh")
}

#[test]
fn test_get_returns_guest_output() {
    let engine = shell();
    assert_eq!(engine.get("echo hello").unwrap(), "hello\n");
    engine.close().unwrap();
}

#[test]
fn test_replies_in_submission_order() {
    let engine = shell();
    let first = engine.send("echo one").unwrap();
    let second = engine.send("echo two").unwrap();
    engine.flush().unwrap();

    let reply = engine.receive_one().unwrap().unwrap();
    assert_eq!(reply.key, first);
    assert_eq!(reply.text, "one\n");

    let reply = engine.receive_one().unwrap().unwrap();
    assert_eq!(reply.key, second);
    assert_eq!(reply.text, "two\n");

    assert!(engine.receive_one().unwrap().is_none());
}

#[test]
fn test_stderr_is_merged_in_band() {
    let engine = shell();
    assert_eq!(engine.get("echo oops 1>&2").unwrap(), "oops\n");
}

#[test]
fn test_separate_stderr_discards_it() {
    let spec = LaunchSpec::new("/bin/sh").separate_stderr();
    let engine = Engine::launch(&spec, Shell, EngineConfig::default()).unwrap();
    assert_eq!(engine.get("echo oops 1>&2; echo fine").unwrap(), "fine\n");
}

#[test]
fn test_large_output_does_not_deadlock() {
    let engine = shell();
    let text = engine.get("i=0; while [ $i -lt 20000 ]; do echo $i; i=$((i+1)); done").unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 20000);
    assert_eq!(lines[0], "0");
    assert_eq!(lines[19999], "19999");
}

#[test]
fn test_handshake_absorbs_banner() {
    let spec = LaunchSpec::new("/bin/sh").with_args([
        "-c",
        "echo 'Welcome to the shell'; echo; echo '> not a prompt'; exec /bin/sh",
    ]);
    let engine = Engine::launch(&spec, Shell, EngineConfig::default()).unwrap();
    assert_eq!(engine.state(), EngineState::Ready);
    assert_eq!(engine.get("echo after").unwrap(), "after\n");
}

#[test]
fn test_bindings_persist() {
    let engine = shell();
    let declaration = engine
        .dialect()
        .declare_binding(DeclarationKind::Assign, "greeting", "hi");
    assert_eq!(engine.get(&declaration).unwrap(), "");
    assert_eq!(engine.get("echo $greeting").unwrap(), "hi\n");
}

#[test]
fn test_environment_and_working_dir() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let spec = LaunchSpec::new("/bin/sh")
        .with_env("REPLBRIDGE_MARK", "42")
        .with_current_dir(temp_dir.path());
    let engine = Engine::launch(&spec, Shell, EngineConfig::default()).unwrap();

    assert_eq!(engine.get("echo $REPLBRIDGE_MARK").unwrap(), "42\n");
    let expected = std::fs::canonicalize(temp_dir.path()).unwrap();
    assert_eq!(
        engine.get("pwd -P").unwrap().trim_end(),
        expected.to_string_lossy()
    );
}

#[test]
fn test_close_is_idempotent_and_final() {
    let engine = shell();
    engine.close().unwrap();
    engine.close().unwrap();
    assert_eq!(engine.state(), EngineState::Closed);

    match engine.get("echo late") {
        Err(BridgeError::NotReady { state }) => assert_eq!(state, EngineState::Closed),
        other => panic!("Expected NotReady, got: {:?}", other),
    }
}

#[test]
fn test_guest_exit_is_transport_error() {
    let engine = shell();
    match engine.get("exit 0") {
        Err(err @ BridgeError::Transport { .. }) => {
            assert!(err.is_fatal());
            assert!(err.to_string().contains("closed its output stream"));
        }
        other => panic!("Expected Transport error, got: {:?}", other),
    }
    engine.close().unwrap();
}

#[test]
fn test_read_timeout() {
    let config = EngineConfig::new()
        .with_read_timeout(Duration::from_millis(200))
        .with_close_grace(Duration::from_millis(100));
    let engine = Engine::launch(&LaunchSpec::new("/bin/sh"), Shell, config).unwrap();

    match engine.get("sleep 2") {
        Err(BridgeError::Transport { message, .. }) => assert!(message.contains("within")),
        other => panic!("Expected Transport error, got: {:?}", other),
    }
    engine.close().unwrap();
}
