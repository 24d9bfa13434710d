use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio::sync::oneshot;
use tokio::sync::{RwLock, RwLockReadGuard};

use crate::metrics::Metrics;
use crate::model::{Command, Rejection, State};

/// Everything a request handler needs: read access to the state, the command
/// channel into the desk loop, and the metrics registry. Cheap to clone, one
/// copy per connection.
#[derive(Clone)]
pub struct ApiContext {
    tx: Sender<Command>,
    state: Arc<RwLock<State>>,
    metrics: Arc<Metrics>,
}

impl ApiContext {
    pub fn new(tx: Sender<Command>, state: Arc<RwLock<State>>, metrics: Arc<Metrics>) -> Self {
        Self { tx, state, metrics }
    }

    pub async fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().await
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Ships a command to the desk and waits for its reply. The outer error
    /// means the desk is gone; the inner one is a business rejection.
    pub async fn execute<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, Rejection>>) -> Command,
    ) -> anyhow::Result<Result<T, Rejection>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(make(reply_tx)).await?;
        Ok(reply_rx.await?)
    }
}
