use rquickjs::{Context as JsContext, FromJs, Runtime as JsRuntime};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::{ActchainError, Result};

/// Code language
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CodeLanguage {
    Python,
    Bash,
    Javascript,
}

/// Global buffer the injected console writes into.
const OUTPUT_BUFFER: &str = "__actchain_output";

/// Injected before user code: every console method appends one line to the buffer.
const CONSOLE_SHIM: &str = r#"
globalThis.__actchain_output = [];
(() => {
    const format = (arg) => (typeof arg === "object" && arg !== null ? JSON.stringify(arg) : String(arg));
    const write = (...args) => { globalThis.__actchain_output.push(args.map(format).join(" ")); };
    globalThis.console = { log: write, info: write, warn: write, error: write, debug: write };
})();
"#;

/// Runs python and bash sources in an interpreter subprocess.
pub struct ProcessExecutor;

impl ProcessExecutor {
    /// Executes `<program> -c <code>` and returns stdout followed by stderr.
    ///
    /// A non-zero exit status is an error carrying the captured output.
    pub async fn execute(
        program: &str,
        code: &str,
    ) -> Result<String> {
        let output = Command::new(program)
            .arg("-c")
            .arg(code)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ActchainError::Script(format!("failed to start {}: {}", program, e)))?;

        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        captured.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(ActchainError::Script(format!("{} exited with {}, output: {}", program, output.status, captured)));
        }
        Ok(captured)
    }
}

/// Runs javascript in an embedded QuickJS context.
pub struct JavascriptExecutor;

impl JavascriptExecutor {
    /// Executes `code` and returns everything written through `console`, one line per call.
    pub fn execute(code: &str) -> Result<String> {
        let runtime = JsRuntime::new().map_err(|e| ActchainError::Script(e.to_string()))?;
        let ctx = JsContext::full(&runtime).map_err(|e| ActchainError::Script(e.to_string()))?;

        ctx.with(|ctx| {
            ctx.eval::<(), _>(CONSOLE_SHIM).map_err(|e| ActchainError::Script(format!("failed to install console: {}", e)))?;

            let result = ctx.eval::<rquickjs::Value, _>(code);
            let lines: Vec<String> = ctx.globals().get(OUTPUT_BUFFER).unwrap_or_default();
            let mut output = lines.join("\n");
            if !output.is_empty() {
                output.push('\n');
            }

            match result {
                Ok(_) => Ok(output),
                Err(rquickjs::Error::Exception) => {
                    let message = rquickjs::Exception::from_js(&ctx, ctx.catch()).ok().and_then(|e| e.message()).unwrap_or_else(|| "uncaught exception".to_string());
                    Err(ActchainError::Script(format!("javascript exception: {}, output: {}", message, output)))
                }
                Err(e) => Err(ActchainError::Script(format!("javascript error: {}, output: {}", e, output))),
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::{JavascriptExecutor, ProcessExecutor};
    use crate::ActchainError;

    #[test]
    fn test_javascript_console_capture() {
        let output = JavascriptExecutor::execute(
            r#"
            const items = [1, 2, 3];
            console.log("sum", items.reduce((a, b) => a + b, 0));
            console.log({ ok: true });
            "#,
        )
        .unwrap();

        assert_eq!(output, "sum 6\n{\"ok\":true}\n");
    }

    #[test]
    fn test_javascript_without_output() {
        assert_eq!(JavascriptExecutor::execute("1 + 1").unwrap(), "");
    }

    #[test]
    fn test_javascript_exception_keeps_output() {
        let err = JavascriptExecutor::execute("console.log('before'); throw new Error('broken');").unwrap_err();
        let ActchainError::Script(message) = err else {
            panic!("expected a script error");
        };
        assert!(message.contains("broken"));
        assert!(message.contains("before"));
    }

    #[test]
    fn test_javascript_syntax_error() {
        assert!(JavascriptExecutor::execute("function (").is_err());
    }

    #[tokio::test]
    async fn test_bash_stdout_then_stderr() {
        let output = ProcessExecutor::execute("bash", "echo err 1>&2; echo out").await.unwrap();
        assert_eq!(output, "out\nerr\n");
    }

    #[tokio::test]
    async fn test_bash_failure() {
        let err = ProcessExecutor::execute("bash", "echo partial; exit 3").await.unwrap_err();
        let ActchainError::Script(message) = err else {
            panic!("expected a script error");
        };
        assert!(message.contains("partial"));
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        assert!(ProcessExecutor::execute("actchain-no-such-binary", "true").await.is_err());
    }
}
