//! Embeds a human-readable version string for `--version`.
//!
//! The string combines the crate version, `git describe` output when the
//! build happens inside a checkout, and the compiler version, for example
//! `0.1.0 (v0.1.0-3-g1a2b3c4d-dirty) rustc 1.85.0 (4d91de4e4 2025-02-17)`.

use std::process::Command;

fn main() {
    for path in ["src", "build.rs", "Cargo.toml"] {
        println!("cargo:rerun-if-changed={path}");
    }

    println!("cargo:rustc-env=BUILD_INFO_HUMAN={}", build_info());
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn build_info() -> String {
    [
        Some(env!("CARGO_PKG_VERSION").to_string()),
        command_output("git", &["describe", "--tags", "--always", "--dirty"])
            .map(|desc| format!("({desc})")),
        command_output("rustc", &["--version"]),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ")
}
