//! The resource sandbox: a hard wall-clock deadline plus cooperative
//! cancellation wrapped around a node's execution future, with an
//! additional isolated-environment hook for `code` nodes.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutorError;

/// Default timeout applied to `tool` nodes when none is declared.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs untrusted `code` node source inside an isolated execution
/// environment (e.g. a WebAssembly runtime). Implementations live outside
/// this crate; this trait is the seam the `code` executor dispatches
/// through.
#[async_trait]
pub trait CodeSandboxRunner: Send + Sync {
    /// Execute `code` with `imports` allow-listed, returning the
    /// sandbox's own return code alongside the script's result value.
    async fn run(&self, language: &str, code: &str, imports: &[String], input: Value) -> Result<CodeSandboxOutput, ExecutorError>;
}

/// The shape a `code` node's sandboxed execution returns.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CodeSandboxOutput {
    /// The sandbox runtime's own exit/return code.
    pub wasm_return_code: i32,
    /// The script's result value.
    pub result: Value,
}

/// Wrap `fut` with a hard deadline and a cancellation token. Returns
/// `Err(Timeout)` if the deadline elapses first, `Err(Cancelled)` if the
/// token fires first, otherwise the future's own result.
pub async fn run_guarded<F, T>(
    timeout: Duration,
    cancellation: &CancellationToken,
    fut: F,
) -> Result<T, ExecutorError>
where
    F: std::future::Future<Output = Result<T, ExecutorError>>,
{
    tokio::select! {
        biased;
        () = cancellation.cancelled() => Err(ExecutorError::Cancelled),
        result = tokio::time::timeout(timeout, fut) => {
            result.map_err(|_| ExecutorError::Timeout(timeout))?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_before_deadline() {
        let token = CancellationToken::new();
        let result = run_guarded(Duration::from_millis(50), &token, async { Ok::<_, ExecutorError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn times_out_when_future_is_slow() {
        let token = CancellationToken::new();
        let result = run_guarded(Duration::from_millis(5), &token, async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, ExecutorError>(42)
        })
        .await;
        assert!(matches!(result, Err(ExecutorError::Timeout(_))));
    }

    #[tokio::test]
    async fn cancellation_wins_over_slow_future() {
        let token = CancellationToken::new();
        token.cancel();
        let result = run_guarded(Duration::from_secs(5), &token, async { Ok::<_, ExecutorError>(42) }).await;
        assert!(matches!(result, Err(ExecutorError::Cancelled)));
    }
}
