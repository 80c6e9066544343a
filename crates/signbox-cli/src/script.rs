//! Processor that runs the signing entrypoint as a child process.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use signbox_core::{IntegratedConfig, JobContext, JobProcessor, Secrets, SignboxError};
use tokio::process::Command;

/// Runs `<sign_files_dir>/<entrypoint>` once per job.
///
/// The child gets the current secrets as environment variables plus
/// `SIGNBOX_JOB_ID` and `SIGNBOX_UPLOADS_DIR`, and is killed once the job
/// deadline passes.
pub struct ScriptProcessor {
    entrypoint: PathBuf,
    workdir: PathBuf,
    uploads_dir: PathBuf,
    interpreter: Option<String>,
    secrets: Arc<Secrets>,
}

impl ScriptProcessor {
    pub fn new(
        config: &IntegratedConfig,
        uploads_dir: impl Into<PathBuf>,
        secrets: Arc<Secrets>,
    ) -> Self {
        Self {
            entrypoint: config.entrypoint_path(),
            workdir: config.sign_files_dir().to_path_buf(),
            uploads_dir: uploads_dir.into(),
            interpreter: None,
            secrets,
        }
    }

    pub fn with_interpreter(mut self, interpreter: Option<String>) -> Self {
        self.interpreter = interpreter;
        self
    }

    fn command(&self, ctx: &JobContext) -> Command {
        let mut cmd = match &self.interpreter {
            Some(program) => {
                let mut cmd = Command::new(program);
                cmd.arg(&self.entrypoint);
                cmd
            }
            None => Command::new(&self.entrypoint),
        };
        cmd.current_dir(&self.workdir)
            .envs(self.secrets.get().iter())
            .env("SIGNBOX_JOB_ID", ctx.job_id.to_string())
            .env("SIGNBOX_UPLOADS_DIR", &self.uploads_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl JobProcessor for ScriptProcessor {
    async fn process(&self, ctx: JobContext) -> Result<(), SignboxError> {
        let job_id = ctx.job_id;
        let child = self.command(&ctx).spawn().map_err(|e| {
            SignboxError::processing(format!("start {}: {e}", self.entrypoint.display()))
        })?;
        tracing::info!(%job_id, entrypoint = %self.entrypoint.display(), "signing started");

        // dropping the wait future on timeout drops the child, which kills it
        let output = match tokio::time::timeout_at(ctx.deadline, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| {
                SignboxError::processing(format!("wait {}: {e}", self.entrypoint.display()))
            })?,
            Err(_) => {
                return Err(SignboxError::processing(format!(
                    "timed out after {}s",
                    ctx.timeout.as_secs()
                )));
            }
        };

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            tracing::debug!(%job_id, "{line}");
        }
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(SignboxError::processing(format!(
                "{} exited with {}: {}",
                self.entrypoint.display(),
                output.status,
                stderr.trim()
            )))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use signbox_core::JobId;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup(script: &str) -> (TempDir, ScriptProcessor, Arc<Secrets>) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("sign.sh"), script).unwrap();
        let config = IntegratedConfig {
            enable: true,
            sign_files_dir: dir.path().to_path_buf(),
            entrypoint: "sign.sh".to_string(),
            ..Default::default()
        };
        let secrets = Arc::new(Secrets::new());
        let processor = ScriptProcessor::new(&config, dir.path().join("uploads"), Arc::clone(&secrets))
            .with_interpreter(Some("sh".to_string()));
        (dir, processor, secrets)
    }

    fn ctx(timeout: Duration) -> JobContext {
        JobContext::new(JobId::new(1), timeout)
    }

    #[tokio::test]
    async fn successful_script_passes_env() {
        let (dir, processor, secrets) = setup(
            "echo \"$TEAM_ID $SIGNBOX_JOB_ID\" > out.txt\n",
        );
        secrets.set(HashMap::from([("TEAM_ID".to_string(), "XYZ".to_string())]));

        processor.process(ctx(Duration::from_secs(10))).await.unwrap();
        let out = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(out.trim(), "XYZ job-1");
    }

    #[tokio::test]
    async fn failing_script_is_a_processing_error() {
        let (_dir, processor, _) = setup("echo bad cert >&2\nexit 3\n");
        let err = processor.process(ctx(Duration::from_secs(10))).await.unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, SignboxError::Processing(_)));
        assert!(msg.contains("bad cert"), "{msg}");
    }

    #[tokio::test]
    async fn overrunning_script_is_stopped_at_the_deadline() {
        let (_dir, processor, _) = setup("sleep 10\n");
        let started = std::time::Instant::now();
        let err = processor
            .process(ctx(Duration::from_millis(200)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_interpreter_fails_at_invocation() {
        let (_dir, processor, _) = setup("exit 0\n");
        let processor = processor.with_interpreter(Some("/nonexistent/interpreter".to_string()));
        let err = processor.process(ctx(Duration::from_secs(10))).await.unwrap_err();
        assert!(err.to_string().contains("start"));
    }
}
