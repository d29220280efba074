//! Build script for structure_type_api crate.
//!
//! Extracts the Rust compiler version and exposes it as an environment variable
//! so that `ABI_VERSION` can embed it.

use std::process::Command;

fn main() {
    let rust_version = get_rust_version();

    println!("cargo:rustc-env=STRUCTURE_TYPE_RUSTC_VERSION={}", rust_version);

    println!("cargo:rerun-if-env-changed=RUSTC_VERSION");
    println!("cargo:rerun-if-changed=build.rs");
}

fn get_rust_version() -> String {
    // Some CI systems export this directly
    if let Ok(version) = std::env::var("RUSTC_VERSION") {
        return version;
    }

    if let Ok(output) = Command::new("rustc").arg("--version").output() {
        if output.status.success() {
            let version_output = String::from_utf8_lossy(&output.stdout);
            // "rustc 1.75.0 (82e1608df 2023-12-21)" -> "1.75.0"
            if let Some(version_line) = version_output.lines().next() {
                let parts: Vec<&str> = version_line.split_whitespace().collect();
                if parts.len() >= 2 && parts[0] == "rustc" {
                    return parts[1].to_string();
                }
            }
        }
    }

    "unknown".to_string()
}
