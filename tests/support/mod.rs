use anyhow::{Context, Result, bail};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

/// Variables the binaries read; cleared so the host environment cannot leak
/// into a test.
const CONFIG_ENV: &[&str] = &[
    "HAZARD_CATALOG",
    "HAZARD_TRAINING_DATA",
    "HAZARD_CLASSIFIER",
    "HAZARD_CLASSIFIER_COMMAND",
    "HAZARD_CLASSIFIER_TIMEOUT_MS",
    "HAZARD_CLASSIFIER_CATEGORIES",
    "HAZARD_DATASET",
    "RUST_LOG",
];

pub fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn helper_binary(name: &str) -> PathBuf {
    let path = match name {
        "hazard-resolve" => env!("CARGO_BIN_EXE_hazard-resolve"),
        "hazard-listen" => env!("CARGO_BIN_EXE_hazard-listen"),
        "catalog-check" => env!("CARGO_BIN_EXE_catalog-check"),
        "hazard-dataset" => env!("CARGO_BIN_EXE_hazard-dataset"),
        other => panic!("unknown helper {other}"),
    };
    PathBuf::from(path)
}

/// A command for `name` pinned to this repository's shipped configuration.
pub fn helper_command(name: &str) -> Command {
    let mut cmd = Command::new(helper_binary(name));
    for key in CONFIG_ENV {
        cmd.env_remove(key);
    }
    cmd.env("HAZARD_RESOLVER_ROOT", repo_root());
    cmd
}

pub fn run_command(mut cmd: Command) -> Result<Output> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to run command: {:?}", cmd))?;
    if output.status.success() {
        Ok(output)
    } else {
        bail!(
            "command {:?} failed: status {:?}\nstdout: {}\nstderr: {}",
            cmd,
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    }
}

/// Run `cmd` with `input` on stdin; the exit status is left to the caller.
pub fn run_with_stdin(mut cmd: Command, input: &str) -> Result<Output> {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn {:?}", cmd))?;
    child
        .stdin
        .take()
        .context("stdin not captured")?
        .write_all(input.as_bytes())?;
    Ok(child.wait_with_output()?)
}

pub fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms)?;
    }
    Ok(())
}
