//! Build stamps for the startup banner: GIT_HASH, BUILD_TIMESTAMP, BUILD_PROFILE

use std::process::Command;

/// Trimmed stdout of a successful `git` invocation
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn main() {
    let git_hash = match (git(&["rev-parse", "--short=8", "HEAD"]), git(&["status", "--porcelain"])) {
        (Some(hash), Some(_)) => format!("{}-dirty", hash),
        (Some(hash), None) => hash,
        (None, _) => "unknown".to_string(),
    };

    // Restamp when HEAD moves; outside a checkout these paths simply never change
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/index");
    println!("cargo:rerun-if-env-changed=PROFILE");

    println!("cargo:rustc-env=GIT_HASH={}", git_hash);
    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    );
    println!(
        "cargo:rustc-env=BUILD_PROFILE={}",
        std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string())
    );
}
