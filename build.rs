// Version reported in the user agent and the startup log
fn main() {
    let base = env!("CARGO_PKG_VERSION");
    let version = match std::env::var("GIT_SHA") {
        Ok(sha) if !sha.trim().is_empty() => format!("{}+{}", base, sha.trim()),
        _ => base.to_string(),
    };
    println!("cargo:rustc-env=APP_VERSION={}", version);
    println!("cargo:rerun-if-env-changed=GIT_SHA");
}
