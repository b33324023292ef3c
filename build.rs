fn main() {
    // Release builds set TASKY_VERSION; local builds fall back to the crate version plus the git hash.
    println!("cargo:rerun-if-env-changed=TASKY_VERSION");
    if let Ok(version) = std::env::var("TASKY_VERSION") {
        println!("cargo:rustc-env=TASKY_VERSION={version}");
        return;
    }

    let pkg = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());
    let hash = std::process::Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .unwrap_or_default()
        .trim()
        .to_string();

    if hash.is_empty() {
        println!("cargo:rustc-env=TASKY_VERSION={pkg}");
    } else {
        println!("cargo:rustc-env=TASKY_VERSION={pkg}+{hash}");
    }
}
