//! `shell.run`: run a command through `sh -c`.

use std::process::Stdio;
use std::time::Duration;

use serde_json::{Value, json};
use traverse_core::activity::{Activity, ActivityContext, ActivityError, ActivityOutput};
use traverse_types::workflow::VarMap;

use super::{optional_bool, optional_str, optional_u64, required_str};

/// Parameters: `command` (required), `cwd`, `env` (string map),
/// `timeout_ms`, `allow_nonzero` (default false). Result: `{exit_code,
/// stdout, stderr}`. A non-zero exit fails the activity unless
/// `allow_nonzero` is set. The child process is killed on cancellation.
pub struct ShellRunActivity;

impl Activity for ShellRunActivity {
    fn name(&self) -> &str {
        "shell.run"
    }

    async fn execute(
        &self,
        ctx: ActivityContext<'_>,
        params: VarMap,
    ) -> Result<ActivityOutput, ActivityError> {
        let command = required_str(&params, "command")?;

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = optional_str(&params, "cwd") {
            cmd.current_dir(cwd);
        }
        if let Some(Value::Object(env)) = params.get("env") {
            for (key, value) in env {
                let value = value.as_str().map(str::to_string).unwrap_or(value.to_string());
                cmd.env(key, value);
            }
        }

        let run = cmd.output();
        let output = match optional_u64(&params, "timeout_ms") {
            Some(timeout_ms) => tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    return Err(ActivityError::canceled("shell command canceled"));
                }
                res = tokio::time::timeout(Duration::from_millis(timeout_ms), run) => match res {
                    Ok(output) => output,
                    Err(_) => {
                        return Err(ActivityError::timeout(format!(
                            "command did not finish within {timeout_ms}ms"
                        )));
                    }
                },
            },
            None => tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    return Err(ActivityError::canceled("shell command canceled"));
                }
                res = run => res,
            },
        };

        let output = output.map_err(|e| ActivityError::failed(e.to_string()))?;
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if exit_code != 0 && !optional_bool(&params, "allow_nonzero") {
            return Err(ActivityError::failed(format!(
                "command exited with {exit_code}: {}",
                stderr.trim()
            )));
        }

        Ok(ActivityOutput::value(json!({
            "exit_code": exit_code,
            "stdout": stdout,
            "stderr": stderr,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::JexlEngine;
    use std::collections::HashMap;
    use tokio_util::sync::CancellationToken;
    use traverse_core::logger::NullActivityLogger;
    use traverse_core::state::PathState;
    use uuid::Uuid;

    async fn run(params: VarMap) -> Result<ActivityOutput, ActivityError> {
        let cancel = CancellationToken::new();
        let state = PathState::new(HashMap::new(), HashMap::new());
        let engine = JexlEngine::new();
        let logger = NullActivityLogger;
        let ctx = ActivityContext {
            execution_id: Uuid::now_v7(),
            path_id: "main",
            step: "sh",
            cancel: &cancel,
            state: &state,
            engine: &engine,
            logger: &logger,
        };
        ShellRunActivity.execute(ctx, params).await
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let out = run(HashMap::from([(
            "command".to_string(),
            json!("printf hello"),
        )]))
        .await
        .unwrap();
        assert_eq!(out.value["exit_code"], json!(0));
        assert_eq!(out.value["stdout"], json!("hello"));
    }

    #[tokio::test]
    async fn nonzero_exit_fails_by_default() {
        let err = run(HashMap::from([("command".to_string(), json!("exit 3"))]))
            .await
            .unwrap_err();
        assert_eq!(err.kind, traverse_types::error::ErrorKind::Activity);
        assert!(err.message.contains('3'));
    }

    #[tokio::test]
    async fn nonzero_exit_allowed_when_opted_in() {
        let out = run(HashMap::from([
            ("command".to_string(), json!("exit 3")),
            ("allow_nonzero".to_string(), json!(true)),
        ]))
        .await
        .unwrap();
        assert_eq!(out.value["exit_code"], json!(3));
    }

    #[tokio::test]
    async fn env_vars_are_passed() {
        let out = run(HashMap::from([
            ("command".to_string(), json!("printf \"$GREETING\"")),
            ("env".to_string(), json!({"GREETING": "hi"})),
        ]))
        .await
        .unwrap();
        assert_eq!(out.value["stdout"], json!("hi"));
    }

    #[tokio::test]
    async fn timeout_maps_to_timeout_kind() {
        let err = run(HashMap::from([
            ("command".to_string(), json!("sleep 5")),
            ("timeout_ms".to_string(), json!(50)),
        ]))
        .await
        .unwrap_err();
        assert_eq!(err.kind, traverse_types::error::ErrorKind::Timeout);
    }
}
