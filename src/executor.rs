// Tool execution boundary: runs registered actions on the blocking pool and publishes a
// processing flag and an error stream. What a tool does is supplied by the caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

pub const DEFAULT_ERROR_CAPACITY: usize = 32;

type ToolAction = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolExecutionError {
    #[error("unsupported tool: {0}")]
    UnsupportedTool(String),
    #[error("tool {tool_id} failed: {message}")]
    Failed { tool_id: String, message: String },
}

struct Shared {
    in_flight: AtomicUsize,
    processing_tx: watch::Sender<bool>,
    errors_tx: broadcast::Sender<ToolExecutionError>,
}

impl Shared {
    fn report(&self, error: ToolExecutionError) {
        tracing::warn!(error = %error, operation = "execute_tool", "tool execution failed");
        // Nobody listening is fine; the failure is already logged.
        let _ = self.errors_tx.send(error);
    }

    fn start(self: &Arc<Self>) -> InFlight {
        if self.in_flight.fetch_add(1, Ordering::AcqRel) == 0 {
            self.processing_tx.send_replace(true);
        }
        InFlight(self.clone())
    }
}

/// Counts one running tool; the processing flag clears when the last one drops,
/// including when its task is aborted or the runtime shuts down.
struct InFlight(Arc<Shared>);

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.processing_tx.send_replace(false);
        }
    }
}

pub struct ToolExecutor {
    actions: RwLock<HashMap<String, ToolAction>>,
    shared: Arc<Shared>,
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_CAPACITY)
    }
}

impl ToolExecutor {
    pub fn new(error_capacity: usize) -> Self {
        let (processing_tx, _) = watch::channel(false);
        let (errors_tx, _) = broadcast::channel(error_capacity.max(1));
        Self {
            actions: RwLock::new(HashMap::new()),
            shared: Arc::new(Shared {
                in_flight: AtomicUsize::new(0),
                processing_tx,
                errors_tx,
            }),
        }
    }

    pub fn register<F>(&self, tool_id: impl Into<String>, action: F)
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let tool_id = tool_id.into();
        tracing::debug!(tool_id = %tool_id, "tool registered");
        self.actions
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(tool_id, Arc::new(action));
    }

    /// True while at least one tool is running.
    pub fn processing(&self) -> watch::Receiver<bool> {
        self.shared.processing_tx.subscribe()
    }

    pub fn errors(&self) -> broadcast::Receiver<ToolExecutionError> {
        self.shared.errors_tx.subscribe()
    }

    /// Starts `tool_id` on the blocking pool. Unknown ids are reported on the error stream
    /// and return `None`. Must be called from within a tokio runtime.
    ///
    /// Aborting the returned handle stops tracking the tool: the processing flag clears even
    /// though an action already running on the blocking pool is left to finish.
    pub fn execute(&self, tool_id: &str) -> Option<JoinHandle<()>> {
        let action = self
            .actions
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(tool_id)
            .cloned();
        let Some(action) = action else {
            self.shared
                .report(ToolExecutionError::UnsupportedTool(tool_id.to_string()));
            return None;
        };

        let in_flight = self.shared.start();
        let shared = self.shared.clone();
        let tool_id = tool_id.to_string();
        Some(tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || action()).await;
            match result {
                Ok(Ok(())) => tracing::debug!(tool_id = %tool_id, "tool finished"),
                Ok(Err(e)) => shared.report(ToolExecutionError::Failed {
                    tool_id,
                    message: format!("{e:#}"),
                }),
                Err(e) => shared.report(ToolExecutionError::Failed {
                    tool_id,
                    message: format!("tool task aborted: {e}"),
                }),
            }
            drop(in_flight);
        }))
    }
}
