use std::{env, path::PathBuf};

use tauri::AppHandle;

use crate::runtime_paths;

const BACKEND_CMD_ENV: &str = "BLUEPRINT_BACKEND_CMD";
const PYTHON_ENV: &str = "BLUEPRINT_PYTHON";
const BACKEND_ENTRY_SCRIPT: &str = "server.py";

#[derive(Debug)]
pub struct LaunchPlan {
    pub cmd: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl LaunchPlan {
    pub fn debug_command(&self) -> Vec<String> {
        let mut parts = vec![self.cmd.clone()];
        parts.extend(self.args.clone());
        parts
    }
}

pub fn resolve_launch_plan<F>(app: &AppHandle, log: F) -> Result<LaunchPlan, String>
where
    F: Fn(&str) + Copy,
{
    if let Some(custom_cmd) = env::var(BACKEND_CMD_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    {
        return resolve_custom_launch(custom_cmd);
    }

    let backend_dir = choose_backend_dir(
        runtime_paths::explicit_backend_dir(),
        || {
            runtime_paths::resolve_resource_path(app, "python-backend", log)
                .filter(|dir| runtime_paths::is_backend_dir(dir))
        },
        runtime_paths::detect_dev_backend_dir,
    )
    .ok_or_else(|| {
        "Cannot locate the trading backend directory. Set BLUEPRINT_BACKEND_DIR or BLUEPRINT_BACKEND_CMD.".to_string()
    })?;
    Ok(backend_plan(backend_dir))
}

/// Resolution order: explicit override, packaged resource, then the
/// development workspace layout.
fn choose_backend_dir<P, D>(explicit: Option<PathBuf>, packaged: P, dev: D) -> Option<PathBuf>
where
    P: FnOnce() -> Option<PathBuf>,
    D: FnOnce() -> Option<PathBuf>,
{
    explicit.or_else(packaged).or_else(dev)
}

fn backend_plan(backend_dir: PathBuf) -> LaunchPlan {
    LaunchPlan {
        cmd: python_command(),
        args: vec![BACKEND_ENTRY_SCRIPT.to_string()],
        cwd: backend_dir,
    }
}

fn python_command() -> String {
    env::var(PYTHON_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "python".to_string())
}

fn resolve_custom_launch(custom_cmd: String) -> Result<LaunchPlan, String> {
    let mut pieces =
        shlex::split(&custom_cmd).ok_or_else(|| format!("Invalid {BACKEND_CMD_ENV}: {custom_cmd}"))?;
    if pieces.is_empty() {
        return Err(format!("{BACKEND_CMD_ENV} is empty."));
    }

    let cmd = pieces.remove(0);
    let cwd = env::var("BLUEPRINT_BACKEND_DIR")
        .map(PathBuf::from)
        .ok()
        .or_else(runtime_paths::detect_dev_backend_dir)
        .unwrap_or_else(runtime_paths::workspace_root_dir);

    Ok(LaunchPlan {
        cmd,
        args: pieces,
        cwd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_launch_splits_command_line() {
        let plan = resolve_custom_launch("python3 -u server.py --port 5000".to_string())
            .expect("parse custom command");
        assert_eq!(plan.cmd, "python3");
        assert_eq!(
            plan.args,
            vec!["-u", "server.py", "--port", "5000"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn custom_launch_rejects_unbalanced_quotes() {
        assert!(resolve_custom_launch("python \"server.py".to_string()).is_err());
    }

    #[test]
    fn debug_command_joins_cmd_and_args() {
        let plan = backend_plan(PathBuf::from("/tmp/backend"));
        assert_eq!(plan.debug_command(), vec!["python", "server.py"]);
    }

    #[test]
    fn explicit_backend_dir_outranks_the_packaged_resource() {
        let packaged_probed = std::cell::Cell::new(false);
        let chosen = choose_backend_dir(
            Some(PathBuf::from("/opt/override")),
            || {
                packaged_probed.set(true);
                Some(PathBuf::from("/opt/packaged"))
            },
            || Some(PathBuf::from("/opt/dev")),
        );

        assert_eq!(chosen, Some(PathBuf::from("/opt/override")));
        assert!(!packaged_probed.get());
    }

    #[test]
    fn packaged_resource_outranks_the_workspace_layout() {
        let chosen = choose_backend_dir(
            None,
            || Some(PathBuf::from("/opt/packaged")),
            || Some(PathBuf::from("/opt/dev")),
        );
        assert_eq!(chosen, Some(PathBuf::from("/opt/packaged")));

        let fallback = choose_backend_dir(None, || None, || Some(PathBuf::from("/opt/dev")));
        assert_eq!(fallback, Some(PathBuf::from("/opt/dev")));
    }
}
