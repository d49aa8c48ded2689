//! Restricted execution environment for page-supplied dynamic content.
//!
//! Dynamic pages are not handed a general-purpose scripting VM: they are
//! handed a tiny deterministic language (see [`interpreter`]) run inside a
//! wall-clock budget, with every failure — timeout, parse error, panic in the
//! interpreter itself — normalized to a short [`SandboxError`] string. Callers
//! never see a host-level stack trace.

pub mod config;
pub mod error;
pub mod interpreter;
pub mod request;

use std::panic::{self, AssertUnwindSafe};

pub use config::Config;
pub use error::SandboxError;
pub use request::{SandboxOutput, SandboxRequest};
use tracing::{debug, warn};

pub struct Sandbox {
    config: Config,
}

impl Sandbox {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Execute `code` against `request`, enforcing the execution-time budget
    /// and output-size cap. Never panics and never returns a host-level
    /// error: interpreter panics are caught and folded into
    /// [`SandboxError::Runtime`].
    ///
    /// Runs the interpreter on a blocking-pool thread so a timeout can
    /// actually preempt it: the interpreter has no yield points, so an
    /// `async` block wrapping it would resolve on its first poll no matter
    /// how long that poll runs. A timed-out run keeps executing on its
    /// abandoned thread; the caller doesn't wait on it.
    pub async fn execute(&self, code: &str, request: SandboxRequest) -> Result<SandboxOutput, SandboxError> {
        let code = code.to_string();
        let handle = tokio::task::spawn_blocking(move || {
            panic::catch_unwind(AssertUnwindSafe(|| interpreter::run(&code, &request))).unwrap_or_else(|payload| Err(panic_message(payload)))
        });

        let result = tokio::time::timeout(self.config.max_execution_time, handle)
            .await
            .map_err(|_| {
                debug!("sandbox execution exceeded the time budget");
                SandboxError::Timeout
            })?
            .unwrap_or_else(|join_err| Err(panic_message(join_err.into_panic())));

        match result {
            Ok(mut output) => {
                if output.len() > self.config.max_output_bytes {
                    warn!(
                        limit = self.config.max_output_bytes,
                        produced = output.len(),
                        "sandbox output truncated at the configured cap"
                    );
                    output.truncate(self.config.max_output_bytes);
                }
                Ok(SandboxOutput { output })
            },
            Err(message) => Err(SandboxError::Runtime(message)),
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "interpreter panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    fn request() -> SandboxRequest {
        SandboxRequest {
            url: "shop.comp1.rednet/greet".to_string(),
            method: "GET".to_string(),
            params: HashMap::from([("name".to_string(), "ava".to_string())]),
            headers: HashMap::new(),
            cookies: HashMap::new(),
            body: None,
        }
    }

    #[tokio::test]
    async fn executes_valid_code_and_returns_its_output() {
        let sandbox = Sandbox::new(Config::default());
        let code = r#"let greeting = concat("hi ", request.param.name)
print greeting"#;
        let output = sandbox.execute(code, request()).await.unwrap();
        assert_eq!(output.output, "hi ava\n");
    }

    #[tokio::test]
    async fn normalizes_a_runtime_error_to_a_short_string() {
        let sandbox = Sandbox::new(Config::default());
        let err = sandbox.execute("print nonexistent", request()).await.unwrap_err();
        assert!(matches!(err, SandboxError::Runtime(_)));
    }

    #[tokio::test]
    async fn times_out_code_that_never_finishes_within_the_budget() {
        let mut config = Config::default();
        config.max_execution_time = Duration::from_millis(1);
        let sandbox = Sandbox::new(config);
        let mut code = String::new();
        for i in 0..200_000 {
            code.push_str(&format!("let v{i} = add({i}, 1)\n"));
        }
        let err = sandbox.execute(&code, request()).await.unwrap_err();
        assert_eq!(err, SandboxError::Timeout);
    }

    #[tokio::test]
    async fn truncates_output_exceeding_the_configured_cap() {
        let mut config = Config::default();
        config.max_output_bytes = 4;
        let sandbox = Sandbox::new(config);
        let output = sandbox.execute(r#"print "hello world""#, request()).await.unwrap();
        assert_eq!(output.output.len(), 4);
    }
}
