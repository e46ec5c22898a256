//! Result-table session: the background task that owns every open tab.
//!
//! `ResultTableSession::spawn()` starts a tokio task holding the
//! [`TabRegistry`]. Callers talk to it through a channel; table changes are
//! debounced per tab, fetches run as their own tasks and report back to the
//! session, which applies only the latest dispatched response per tab.

use std::collections::HashMap;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;

use omix_core::{
    ActiveView, ClientConfig, Experiment, FetchOutcome, FetchTicket, OmixError, Page, Result,
    ResultRow, TabRegistry, TableAction,
};
use omix_core::tabs::OpenOutcome;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::debounce::{sleep_until_deadline, Debouncer};

/// Where result pages come from.
pub trait ResultSource: Send + Sync + 'static {
    fn fetch_rows(
        &self,
        ticket: &FetchTicket,
        token: CancellationToken,
    ) -> impl Future<Output = Result<Page<ResultRow>>> + Send;
}

/// Notifications from the session to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    TabOpened(u64),
    /// Already open; it is now the active view.
    TabActivated(u64),
    /// A new page of rows was applied.
    RowsUpdated(u64),
    /// A display-only setting changed; no fetch was made.
    ControlChanged(u64),
    TabClosed {
        experiment_id: u64,
        /// Set when the tab was closed because of a failure.
        alert: Option<String>,
    },
    Alert(String),
}

enum SessionCommand {
    Open(Experiment),
    Close(u64),
    Activate(ActiveView),
    Control {
        experiment_id: u64,
        action: TableAction,
    },
    /// Re-fetch immediately with the current control.
    Refresh(u64),
    RefreshAll,
    Snapshot(oneshot::Sender<TabRegistry>),
    Shutdown(oneshot::Sender<()>),
}

struct Completion {
    ticket: FetchTicket,
    result: Result<Page<ResultRow>>,
}

/// Handle to a running session. Dropping every handle stops the task.
#[derive(Clone)]
pub struct ResultTableSession {
    sender: mpsc::UnboundedSender<SessionCommand>,
}

impl ResultTableSession {
    /// Spawns the session task on the current tokio runtime.
    pub fn spawn<B: ResultSource>(
        backend: Arc<B>,
        config: &ClientConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (sender, commands) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        let task = SessionTask {
            backend,
            registry: TabRegistry::new(config.max_tabs, config.page_size),
            debouncer: Debouncer::new(config.debounce()),
            in_flight: HashMap::new(),
            root: CancellationToken::new(),
            events,
            done_tx,
        };
        tokio::spawn(task.run(commands, done_rx));

        info!(
            max_tabs = config.max_tabs,
            debounce_ms = config.debounce_ms,
            "Result table session started"
        );
        (Self { sender }, event_rx)
    }

    /// Opens (or re-activates) a tab. A new tab is loaded right away.
    pub fn open(&self, experiment: Experiment) {
        self.send(SessionCommand::Open(experiment));
    }

    pub fn close(&self, experiment_id: u64) {
        self.send(SessionCommand::Close(experiment_id));
    }

    pub fn activate(&self, view: ActiveView) {
        self.send(SessionCommand::Activate(view));
    }

    /// Applies a table action. Changes that need new rows are debounced.
    pub fn apply(&self, experiment_id: u64, action: TableAction) {
        self.send(SessionCommand::Control {
            experiment_id,
            action,
        });
    }

    pub fn refresh(&self, experiment_id: u64) {
        self.send(SessionCommand::Refresh(experiment_id));
    }

    pub fn refresh_all(&self) {
        self.send(SessionCommand::RefreshAll);
    }

    /// Copy of the current tab registry.
    pub async fn snapshot(&self) -> Result<TabRegistry> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Snapshot(tx))
            .map_err(|_| OmixError::SessionClosed)?;
        rx.await.map_err(|_| OmixError::SessionClosed)
    }

    /// Cancels every in-flight fetch and stops the task.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(SessionCommand::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    fn send(&self, command: SessionCommand) {
        // A stopped session drops commands.
        let _ = self.sender.send(command);
    }
}

struct SessionTask<B> {
    backend: Arc<B>,
    registry: TabRegistry,
    debouncer: Debouncer<u64>,
    /// Latest dispatched fetch per tab: (seq, token).
    in_flight: HashMap<u64, (u64, CancellationToken)>,
    root: CancellationToken,
    events: mpsc::UnboundedSender<SessionEvent>,
    done_tx: mpsc::UnboundedSender<Completion>,
}

impl<B: ResultSource> SessionTask<B> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut done_rx: mpsc::UnboundedReceiver<Completion>,
    ) {
        loop {
            let deadline = self.debouncer.next_deadline();
            tokio::select! {
                biased;
                cmd = commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle(cmd).is_break() {
                        break;
                    }
                }
                Some(done) = done_rx.recv() => self.on_completion(done),
                _ = sleep_until_deadline(deadline) => {
                    for experiment_id in self.debouncer.take_due(Instant::now()) {
                        self.dispatch(experiment_id);
                    }
                }
            }
        }
        self.root.cancel();
        debug!("Result table session stopped");
    }

    fn handle(&mut self, command: SessionCommand) -> ControlFlow<()> {
        match command {
            SessionCommand::Open(experiment) => {
                let id = experiment.id;
                match self.registry.open(experiment) {
                    Ok(OpenOutcome::Created) => {
                        info!(experiment = id, tabs = self.registry.len(), "Opened result tab");
                        self.emit(SessionEvent::TabOpened(id));
                        self.dispatch(id);
                    }
                    Ok(OpenOutcome::Activated) => self.emit(SessionEvent::TabActivated(id)),
                    Err(e) => {
                        warn!(experiment = id, error = %e, "Cannot open result tab");
                        self.emit(SessionEvent::Alert(e.alert_message()));
                    }
                }
            }
            SessionCommand::Close(id) => {
                if self.registry.close(id).is_some() {
                    self.forget(id);
                    info!(experiment = id, "Closed result tab");
                    self.emit(SessionEvent::TabClosed {
                        experiment_id: id,
                        alert: None,
                    });
                }
            }
            SessionCommand::Activate(view) => {
                if let Err(e) = self.registry.activate(view) {
                    debug!(error = %e, "Ignoring activation");
                }
            }
            SessionCommand::Control {
                experiment_id,
                action,
            } => match self.registry.apply(experiment_id, action) {
                Ok(true) => self.debouncer.trigger(experiment_id, Instant::now()),
                Ok(false) => self.emit(SessionEvent::ControlChanged(experiment_id)),
                Err(e) => debug!(experiment = experiment_id, error = %e, "Ignoring table action"),
            },
            SessionCommand::Refresh(id) => {
                if self.registry.get(id).is_some() {
                    self.debouncer.cancel(&id);
                    self.dispatch(id);
                }
            }
            SessionCommand::RefreshAll => {
                let ids: Vec<u64> = self
                    .registry
                    .tabs()
                    .iter()
                    .map(|t| t.experiment_id())
                    .collect();
                for id in ids {
                    self.debouncer.cancel(&id);
                    self.dispatch(id);
                }
            }
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.registry.clone());
            }
            SessionCommand::Shutdown(reply) => {
                self.root.cancel();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn dispatch(&mut self, experiment_id: u64) {
        match self.registry.begin_fetch(experiment_id) {
            Ok(ticket) => self.spawn_fetch(ticket),
            Err(e) => debug!(experiment = experiment_id, error = %e, "Skipping fetch"),
        }
    }

    fn spawn_fetch(&mut self, ticket: FetchTicket) {
        let token = self.root.child_token();
        let previous = self
            .in_flight
            .insert(ticket.experiment_id, (ticket.seq, token.clone()));
        if let Some((seq, superseded)) = previous {
            superseded.cancel();
            debug!(experiment = ticket.experiment_id, seq, "Cancelled superseded fetch");
        }
        debug!(
            experiment = ticket.experiment_id,
            seq = ticket.seq,
            page = ticket.control.page_number,
            "Dispatching result fetch"
        );

        let backend = Arc::clone(&self.backend);
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let result = backend.fetch_rows(&ticket, token).await;
            let _ = done.send(Completion { ticket, result });
        });
    }

    fn on_completion(&mut self, done: Completion) {
        let Completion { ticket, result } = done;
        let id = ticket.experiment_id;
        if matches!(self.in_flight.get(&id), Some((seq, _)) if *seq == ticket.seq) {
            self.in_flight.remove(&id);
        }

        match self.registry.complete_fetch(&ticket, result) {
            FetchOutcome::Applied => {
                debug!(experiment = id, seq = ticket.seq, "Applied result page");
                self.emit(SessionEvent::RowsUpdated(id));
            }
            FetchOutcome::Stale => {
                debug!(experiment = id, seq = ticket.seq, "Dropped stale result page");
            }
            FetchOutcome::Retry(retry) => {
                info!(
                    experiment = id,
                    page = retry.control.page_number,
                    "Page out of range, retrying previous page"
                );
                self.spawn_fetch(retry);
            }
            FetchOutcome::Closed(e) => {
                warn!(experiment = id, error = %e, "Closing result tab");
                self.forget(id);
                self.emit(SessionEvent::TabClosed {
                    experiment_id: id,
                    alert: Some(e.alert_message()),
                });
            }
            FetchOutcome::Failed(e) => {
                warn!(experiment = id, error = %e, "Result fetch failed");
                self.emit(SessionEvent::Alert(e.alert_message()));
            }
        }
    }

    /// Drops the pending schedule and in-flight fetch of a closed tab.
    fn forget(&mut self, experiment_id: u64) {
        self.debouncer.cancel(&experiment_id);
        if let Some((_, token)) = self.in_flight.remove(&experiment_id) {
            token.cancel();
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
