//! Python subprocess sandbox.
//!
//! Each call spawns a fresh interpreter running a small harness, sends a JSON
//! payload (code, inputs, builtin allow-list) on stdin, and reads a one-line
//! JSON outcome from stdout. Candidate code runs under a restricted global
//! namespace with its stdout captured, so the outcome line is the only thing
//! the harness prints. A deadline bounds every run; expiry kills the child
//! and surfaces as a resource-kind failure.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::classifier::ErrorKind;
use crate::error::{Error, Result};
use crate::syntax::strip_code_fences;

use super::{CodeSandbox, ExecutionOutcome};

/// Default builtin allow-list for candidate code.
///
/// `__import__` is included because generated analysis code routinely imports
/// its libraries; remove it from a custom list to forbid imports entirely.
pub const DEFAULT_ALLOWED_BUILTINS: &[&str] = &[
    "__import__",
    "print",
    "len",
    "str",
    "int",
    "float",
    "bool",
    "list",
    "dict",
    "set",
    "tuple",
    "range",
    "enumerate",
    "zip",
    "map",
    "filter",
    "sorted",
    "min",
    "max",
    "sum",
    "abs",
    "round",
    "type",
    "isinstance",
    "hasattr",
    "getattr",
    "repr",
    "format",
    "any",
    "all",
    "reversed",
    "chr",
    "ord",
    "Exception",
    "ValueError",
    "TypeError",
    "KeyError",
    "ZeroDivisionError",
];

/// Harness executed via `python3 -c`. Reads the payload from stdin, runs the
/// candidate under restricted globals with captured stdout, and prints exactly
/// one JSON outcome line on the real stdout.
const HARNESS: &str = r#"
import builtins
import io
import json
import sys

payload = json.load(sys.stdin)

allowed = {}
for name in payload.get("allowed_builtins", []):
    if hasattr(builtins, name):
        allowed[name] = getattr(builtins, name)

env = {"__builtins__": allowed}
env.update(payload.get("inputs", {}))

captured = io.StringIO()
real_stdout = sys.stdout
sys.stdout = captured

try:
    exec(compile(payload["code"], "<candidate>", "exec"), env)
except BaseException as exc:
    sys.stdout = real_stdout
    outcome = {
        "ok": False,
        "error": "{}: {}".format(type(exc).__name__, exc),
        "stdout": captured.getvalue(),
    }
    print(json.dumps(outcome, default=str))
else:
    sys.stdout = real_stdout
    marker = object()
    value = env.get("result", marker)
    outcome = {
        "ok": True,
        "has_result": value is not marker,
        "value": None if value is marker else value,
        "stdout": captured.getvalue(),
    }
    print(json.dumps(outcome, default=str))
"#;

/// Configuration for the Python sandbox.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Path to the Python executable
    pub python_path: String,
    /// Deadline for one run in milliseconds
    pub timeout_ms: u64,
    /// Builtin symbols available to candidate code
    pub allowed_builtins: Vec<String>,
    /// Source prepended to every candidate (import header)
    pub preamble: Option<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let python_path = which::which("python3")
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "python3".to_string());

        Self {
            python_path,
            timeout_ms: 30_000,
            allowed_builtins: DEFAULT_ALLOWED_BUILTINS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            preamble: None,
        }
    }
}

impl SandboxConfig {
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    pub fn with_allowed_builtins(mut self, allowed: Vec<String>) -> Self {
        self.allowed_builtins = allowed;
        self
    }
}

/// Harness outcome line.
#[derive(Debug, Deserialize)]
struct HarnessOutcome {
    ok: bool,
    #[serde(default)]
    has_result: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    stdout: String,
}

/// Subprocess-per-call Python sandbox.
pub struct PythonSandbox {
    config: SandboxConfig,
}

impl PythonSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    fn prepare_code(&self, code: &str) -> String {
        let body = strip_code_fences(code);
        match &self.config.preamble {
            Some(preamble) => format!("{}\n{}", preamble, body),
            None => body,
        }
    }

    async fn run_inner(
        &self,
        code: &str,
        inputs: &HashMap<String, Value>,
    ) -> Result<ExecutionOutcome> {
        let payload = serde_json::json!({
            "code": self.prepare_code(code),
            "inputs": inputs,
            "allowed_builtins": self.config.allowed_builtins,
        });
        let payload = serde_json::to_vec(&payload)?;

        let mut child = Command::new(&self.config.python_path)
            .arg("-c")
            .arg(HARNESS)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::SubprocessComm(format!(
                    "Failed to spawn sandbox (python_path='{}'): {}",
                    self.config.python_path, e
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::SubprocessComm("Failed to get stdin handle".to_string()))?;
        stdin
            .write_all(&payload)
            .await
            .map_err(|e| Error::SubprocessComm(format!("Failed to send payload: {}", e)))?;
        drop(stdin);

        let deadline = Duration::from_millis(self.config.timeout_ms);
        let output = tokio::time::timeout(deadline, child.wait_with_output())
            .await
            .map_err(|_| Error::timeout(self.config.timeout_ms))?
            .map_err(|e| Error::SubprocessComm(format!("Failed to read sandbox output: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_default();

        if line.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(500).collect();
            return Err(Error::SubprocessComm(format!(
                "Sandbox exited without an outcome line; stderr: {}",
                excerpt
            )));
        }

        let outcome: HarnessOutcome = serde_json::from_str(line).map_err(|e| {
            Error::SubprocessComm(format!("Invalid outcome line: {}; payload={}", e, line))
        })?;

        if !outcome.stdout.is_empty() {
            debug!(captured_len = outcome.stdout.len(), "candidate stdout captured");
        }

        if outcome.ok {
            if outcome.has_result {
                Ok(ExecutionOutcome::success(outcome.value))
            } else {
                Ok(ExecutionOutcome::no_result())
            }
        } else {
            let message = outcome
                .error
                .unwrap_or_else(|| "Execution failed without an error message".to_string());
            Ok(ExecutionOutcome::failure(ErrorKind::Unknown, message))
        }
    }
}

#[async_trait::async_trait]
impl CodeSandbox for PythonSandbox {
    async fn run(&self, code: &str, inputs: &HashMap<String, Value>) -> ExecutionOutcome {
        match self.run_inner(code, inputs).await {
            Ok(outcome) => outcome,
            // The deadline is the one failure the sandbox itself classifies;
            // it is the resource signal the retry loop expects.
            Err(Error::Timeout { duration_ms }) => {
                warn!(duration_ms, "sandbox run timed out");
                ExecutionOutcome::failure(
                    ErrorKind::Resource,
                    format!("Execution timed out after {}ms", duration_ms),
                )
            }
            Err(e) => {
                warn!(error = %e, "sandbox run failed");
                ExecutionOutcome::failure(ErrorKind::Unknown, e.to_string())
            }
        }
    }
}
