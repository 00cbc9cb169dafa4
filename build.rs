use std::env;
use std::path::PathBuf;

const ROOT_HINT: &str = "HAZARD_RESOLVER_ROOT_HINT";
const SENTINEL: &str = "config/mitigations.json";

// Bakes a fallback repository root into the binaries so an installed copy
// can still find the shipped catalog. The hint is only emitted when it
// passes the same sentinel check the runtime applies.
fn main() {
    println!("cargo:rerun-if-env-changed={ROOT_HINT}");
    println!("cargo:rerun-if-changed={SENTINEL}");

    let Some(root) = env::var_os(ROOT_HINT)
        .or_else(|| env::var_os("CARGO_MANIFEST_DIR"))
        .map(PathBuf::from)
    else {
        return;
    };
    let root = root.canonicalize().unwrap_or(root);
    if root.join(SENTINEL).is_file() {
        println!("cargo:rustc-env={ROOT_HINT}={}", root.display());
    } else {
        println!(
            "cargo:warning={} has no {SENTINEL}; binaries will rely on HAZARD_RESOLVER_ROOT",
            root.display()
        );
    }
}
