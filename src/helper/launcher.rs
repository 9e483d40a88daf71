//! Starting helper processes detached from the manager.

use std::io;
use std::process::Stdio;

use metrics::counter;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::registry::HelperDescriptor;
use super::HelperError;

/// Spawn `helper` in its own session with stdio nulled and return its pid.
///
/// Returns as soon as the child exists; a detached task reaps it. Must be
/// called inside a tokio runtime.
pub fn launch_helper(helper: &HelperDescriptor, config_name: &str, display_name: &str) -> Result<u32, HelperError> {
    let mut command = Command::new(&helper.exec);
    command
        .args(&helper.args)
        .arg("--config")
        .arg(config_name)
        .arg("--display")
        .arg(display_name)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(false);

    // SAFETY: runs in the forked child before exec; setsid is async-signal-safe.
    unsafe {
        command.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let mut child = command.spawn().map_err(|source| HelperError::Launch {
        uuid: helper.uuid.clone(),
        source,
    })?;
    let pid = child.id().unwrap_or_default();
    counter!("ime_bridge_helpers_launched_total").increment(1);
    info!(uuid = %helper.uuid, name = %helper.name, pid, display = %display_name, "Helper launched");

    let uuid = helper.uuid.clone();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => debug!(uuid = %uuid, pid, status = %status, "Helper exited"),
            Err(e) => warn!(uuid = %uuid, pid, error = %e, "Failed to reap helper"),
        }
    });
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;

    fn descriptor(exec: &str, args: &[&str]) -> HelperDescriptor {
        HelperDescriptor {
            uuid: "5b0e9c6a-2f9d-4c34-9a55-0c1ac7a51b11".into(),
            name: "Test".into(),
            icon: String::new(),
            description: String::new(),
            flags: Vec::new(),
            exec: PathBuf::from(exec),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_launch_passes_config_and_display() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("args");
        let script = format!("echo \"$@\" > {}", out.display());
        let helper = descriptor("/bin/sh", &["-c", &script, "helper"]);

        let pid = launch_helper(&helper, "socket", ":9").unwrap();
        assert!(pid > 0);

        let mut written = String::new();
        for _ in 0..100 {
            if let Ok(text) = std::fs::read_to_string(&out) {
                if text.ends_with('\n') {
                    written = text;
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(written.trim(), "--config socket --display :9");
    }

    #[tokio::test]
    async fn test_launch_missing_program_fails() {
        let helper = descriptor("/nonexistent/ime-bridge-helper", &[]);
        assert!(matches!(
            launch_helper(&helper, "socket", ":0"),
            Err(HelperError::Launch { .. })
        ));
    }
}
