//! Guest availability checks.

use std::process::Command;

fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Result of looking for a guest interpreter.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GuestCheck {
    /// Whether the interpreter is on `PATH`.
    pub available: bool,
    /// Path to the binary if found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// First line of `--version` output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Look for `program` on `PATH` and ask it for its version.
pub fn check_guest(program: &str) -> GuestCheck {
    let available = command_exists(program);
    if !available {
        return GuestCheck {
            available,
            path: None,
            version: None,
        };
    }

    let path = Command::new("which")
        .arg(program)
        .output()
        .ok()
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string());

    let version = Command::new(program)
        .arg("--version")
        .output()
        .ok()
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .and_then(|s| s.lines().next().map(|line| line.trim().to_string()));

    GuestCheck {
        available,
        path,
        version,
    }
}

/// Check for R.
pub fn check_r() -> GuestCheck {
    check_guest(crate::r::PROGRAM)
}

/// Check for Deno.
pub fn check_deno() -> GuestCheck {
    check_guest(crate::deno::PROGRAM)
}
