//! Async boundary around the blocking engine.
//!
//! Every call runs on tokio's blocking pool so SQLite and file IO never stall the
//! host's runtime. Calls are serialized through one mutex: the store has a single
//! writer.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use rollback_types::{Checkpoint, CheckpointId, Coordinates, RevertReport, ToolInvocation};

use crate::{CheckpointEngine, EngineError, ResolveOutcome};

#[derive(Clone)]
pub struct EngineHandle {
    engine: Arc<Mutex<CheckpointEngine>>,
}

impl EngineHandle {
    #[must_use]
    pub fn new(engine: CheckpointEngine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    async fn run<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce(&mut CheckpointEngine) -> Result<T, EngineError> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || {
            let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut *engine)
        })
        .await?
    }

    pub async fn is_enabled(&self) -> Result<bool, EngineError> {
        self.run(|engine| Ok(engine.is_enabled())).await
    }

    pub async fn record_tool_call(
        &self,
        session: &str,
        message: &str,
        invocation: ToolInvocation,
    ) -> Result<Option<CheckpointId>, EngineError> {
        let coords = Coordinates::new(session, message)?;
        self.run(move |engine| engine.record_tool_call(&coords, &invocation))
            .await
    }

    pub async fn resolve_pending(
        &self,
        id: CheckpointId,
        file_path: PathBuf,
    ) -> Result<ResolveOutcome, EngineError> {
        self.run(move |engine| engine.resolve_pending(id, &file_path))
            .await
    }

    pub async fn resolve_pending_for_message(
        &self,
        session: &str,
        message: &str,
    ) -> Result<Vec<ResolveOutcome>, EngineError> {
        let coords = Coordinates::new(session, message)?;
        self.run(move |engine| engine.resolve_pending_for_message(&coords))
            .await
    }

    pub async fn list_pending(
        &self,
        session: &str,
        message: &str,
    ) -> Result<Vec<Checkpoint>, EngineError> {
        let coords = Coordinates::new(session, message)?;
        self.run(move |engine| engine.list_pending(&coords)).await
    }

    pub async fn list_checkpoints(
        &self,
        session: &str,
        message: &str,
    ) -> Result<Vec<Checkpoint>, EngineError> {
        let coords = Coordinates::new(session, message)?;
        self.run(move |engine| engine.list_checkpoints(&coords)).await
    }

    pub async fn window_checkpoints(
        &self,
        session: &str,
        message: &str,
    ) -> Result<Vec<Checkpoint>, EngineError> {
        let coords = Coordinates::new(session, message)?;
        self.run(move |engine| engine.window_checkpoints(&coords))
            .await
    }

    pub async fn has_file_changes(
        &self,
        session: &str,
        message: &str,
    ) -> Result<bool, EngineError> {
        let coords = Coordinates::new(session, message)?;
        self.run(move |engine| engine.has_file_changes(&coords)).await
    }

    pub async fn revert(&self, session: &str, message: &str) -> Result<RevertReport, EngineError> {
        let coords = Coordinates::new(session, message)?;
        self.run(move |engine| engine.revert(&coords)).await
    }

    pub async fn unrevert(
        &self,
        session: &str,
        message: &str,
    ) -> Result<RevertReport, EngineError> {
        let coords = Coordinates::new(session, message)?;
        self.run(move |engine| engine.unrevert(&coords)).await
    }
}
