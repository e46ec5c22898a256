//! Drives a [`DetailsModal`] against a backend.
//!
//! Panel fetches run concurrently in a `JoinSet`; each completion is stored in
//! its own panel slot. Closing the session cancels whatever is still running.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use omix_core::{
    DetailsModal, OmixError, Panel, PanelData, PanelSource, PanelState, Result, SelectedRow,
};
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Where details-panel payloads come from.
pub trait AnalysisSource: Send + Sync + 'static {
    fn fetch_panel(
        &self,
        source: PanelSource,
        row: &SelectedRow,
        token: CancellationToken,
    ) -> impl Future<Output = Result<PanelData>> + Send;
}

/// A finished panel fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelCompletion {
    pub source: PanelSource,
    /// Alert to show, when the fetch failed.
    pub alert: Option<String>,
}

pub struct DetailsSession<B> {
    backend: Arc<B>,
    modal: DetailsModal,
    tasks: JoinSet<(PanelSource, Result<PanelData>)>,
    /// Source of every task still in `tasks`.
    running: HashMap<Id, PanelSource>,
    token: CancellationToken,
}

impl<B: AnalysisSource> DetailsSession<B> {
    pub fn open(backend: Arc<B>, row: SelectedRow) -> Self {
        debug!(
            experiment = row.experiment_id,
            gene = %row.gene,
            gem = %row.gem,
            "Opened details"
        );
        Self {
            backend,
            modal: DetailsModal::new(row),
            tasks: JoinSet::new(),
            running: HashMap::new(),
            token: CancellationToken::new(),
        }
    }

    pub fn modal(&self) -> &DetailsModal {
        &self.modal
    }

    pub fn state(&self, panel: Panel) -> &PanelState {
        self.modal.state(panel)
    }

    /// Activates `panel`, starting a fetch if its data is not cached.
    /// Must be called from within a tokio runtime.
    pub fn select(&mut self, panel: Panel) -> Result<()> {
        if let Some(source) = self.modal.select(panel)? {
            let backend = Arc::clone(&self.backend);
            let row = self.modal.row().clone();
            let token = self.token.child_token();
            debug!(?source, "Fetching details panel");
            let handle = self.tasks.spawn(async move {
                let result = backend.fetch_panel(source, &row, token).await;
                (source, result)
            });
            self.running.insert(handle.id(), source);
        }
        Ok(())
    }

    /// Waits for the next fetch to finish and stores it. `None` once nothing
    /// is in flight.
    pub async fn next_completion(&mut self) -> Option<PanelCompletion> {
        loop {
            let (source, result) = match self.tasks.join_next_with_id().await? {
                Ok((id, (source, result))) => {
                    self.running.remove(&id);
                    (source, result)
                }
                Err(e) => {
                    let Some(source) = self.running.remove(&e.id()) else {
                        continue;
                    };
                    if e.is_cancelled() {
                        continue;
                    }
                    error!(?source, error = %e, "Details fetch task failed");
                    (source, Err(OmixError::TaskFailed(e.to_string())))
                }
            };
            let alert = self.modal.complete(source, result);
            if let Some(msg) = &alert {
                warn!(?source, alert = %msg, "Details panel has no data");
            }
            return Some(PanelCompletion { source, alert });
        }
    }

    /// Selects `panel` and waits until its data has settled.
    ///
    /// Completions of other panels that arrive first are stored on the way.
    pub async fn load(&mut self, panel: Panel) -> Result<&PanelState> {
        self.select(panel)?;
        let wanted = panel.source();
        while matches!(self.modal.state(panel), PanelState::Loading) {
            match self.next_completion().await {
                Some(done) if done.source == wanted => break,
                Some(_) => continue,
                None => break,
            }
        }
        Ok(self.modal.state(panel))
    }

    /// Cancels every in-flight fetch and drops the cached data.
    pub fn close(mut self) {
        self.token.cancel();
        self.tasks.abort_all();
        self.running.clear();
        debug!(experiment = self.modal.row().experiment_id, "Closed details");
    }
}

impl<B> Drop for DetailsSession<B> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
