//! The consensus event loop.
//!
//! [`Core`] is the engine handle owned by the backend: it starts and stops a
//! single tokio task that owns a [`ConsensusContext`] and feeds it events in
//! arrival order. All state transitions happen on that task.

mod commit;
mod context;
mod handler;
mod prepare;
mod preprepare;
mod request;
mod round_change;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::config::BftConfig;
use crate::error::ConsensusError;
use crate::events::EventMux;

pub use context::ConsensusContext;

/// Start/stop handle for the consensus task
pub struct Core {
    config: BftConfig,
    mux: Arc<EventMux>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Core {
    pub fn new(config: BftConfig, mux: Arc<EventMux>) -> Self {
        Core {
            config,
            mux,
            task: Mutex::new(None),
        }
    }

    pub fn event_mux(&self) -> &Arc<EventMux> {
        &self.mux
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Spawn the event loop. Must be called from within a tokio runtime.
    pub fn start<B: Backend>(&self, backend: Arc<B>) -> Result<(), ConsensusError> {
        let mut task = self.task.lock();
        if task.is_some() {
            return Err(ConsensusError::EngineStarted);
        }

        let events = self.mux.subscribe();
        let context = ConsensusContext::new(self.config.clone(), backend, self.mux.clone());
        *task = Some(tokio::spawn(context.run(events)));

        info!("Consensus engine started");
        Ok(())
    }

    /// Close the event stream and wait for the loop to exit
    pub async fn stop(&self) -> Result<(), ConsensusError> {
        let handle = self.task.lock().take().ok_or(ConsensusError::EngineStopped)?;
        self.mux.unsubscribe();

        if let Err(e) = handle.await {
            warn!("Consensus task ended abnormally: {}", e);
        }
        info!("Consensus engine stopped");
        Ok(())
    }
}
