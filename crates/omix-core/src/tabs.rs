//! Registry of open experiment result tabs.
//!
//! Each tab exclusively owns its [`TableControl`] and its current page of
//! rows. Fetches are tagged with a per-tab sequence number; only the response
//! to the most recently dispatched request is ever applied.

use crate::error::{OmixError, Result};
use crate::models::{Experiment, Page, ResultRow};
use crate::table::{TableAction, TableControl};

/// Which view the result area is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveView {
    AllExperiments,
    Tab(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentInfo {
    pub experiment: Experiment,
    pub rows: Vec<ResultRow>,
    pub total_row_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentTab {
    pub name: String,
    pub info: ExperimentInfo,
    pub control: TableControl,
    /// Sequence number of the latest dispatched fetch.
    last_dispatched: u64,
    /// Sequence number of the response currently shown, 0 if none yet.
    applied: u64,
}

impl ExperimentTab {
    fn new(experiment: Experiment, page_size: u32) -> Self {
        Self {
            name: experiment.name.clone(),
            info: ExperimentInfo {
                experiment,
                rows: vec![],
                total_row_count: 0,
            },
            control: TableControl::with_page_size(page_size),
            last_dispatched: 0,
            applied: 0,
        }
    }

    pub fn experiment_id(&self) -> u64 {
        self.info.experiment.id
    }

    /// `true` once at least one page has been applied.
    pub fn is_loaded(&self) -> bool {
        self.applied > 0
    }

    pub fn has_pending_fetch(&self) -> bool {
        self.last_dispatched > self.applied
    }
}

/// A dispatched result fetch. Carries the control it was built from, so the
/// request always reflects the state at dispatch time.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    pub experiment_id: u64,
    pub seq: u64,
    pub control: TableControl,
}

impl FetchTicket {
    pub fn query(&self) -> Vec<(&'static str, String)> {
        self.control.result_query(self.experiment_id)
    }
}

#[derive(Debug)]
pub enum FetchOutcome {
    /// Rows and count replaced.
    Applied,
    /// A newer request was dispatched, or the tab is gone; response dropped.
    Stale,
    /// Page out of range: retry with the previous page.
    Retry(FetchTicket),
    /// Terminal failure: the tab has been closed.
    Closed(OmixError),
    /// Non-terminal failure: previous rows kept.
    Failed(OmixError),
}

#[derive(Debug)]
pub enum OpenOutcome {
    Created,
    /// Already open: it was activated instead.
    Activated,
}

#[derive(Debug, Clone)]
pub struct TabRegistry {
    tabs: Vec<ExperimentTab>,
    active: ActiveView,
    max_tabs: usize,
    page_size: u32,
}

impl TabRegistry {
    pub fn new(max_tabs: usize, page_size: u32) -> Self {
        Self {
            tabs: vec![],
            active: ActiveView::AllExperiments,
            max_tabs: max_tabs.max(1),
            page_size,
        }
    }

    pub fn tabs(&self) -> &[ExperimentTab] {
        &self.tabs
    }

    pub fn active(&self) -> ActiveView {
        self.active
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn get(&self, experiment_id: u64) -> Option<&ExperimentTab> {
        self.tabs.iter().find(|t| t.experiment_id() == experiment_id)
    }

    fn get_mut(&mut self, experiment_id: u64) -> Result<&mut ExperimentTab> {
        self.tabs
            .iter_mut()
            .find(|t| t.experiment_id() == experiment_id)
            .ok_or(OmixError::TabNotFound(experiment_id))
    }

    /// Opens a tab for `experiment` and makes it active.
    pub fn open(&mut self, experiment: Experiment) -> Result<OpenOutcome> {
        let id = experiment.id;
        if self.get(id).is_some() {
            self.active = ActiveView::Tab(id);
            return Ok(OpenOutcome::Activated);
        }
        if self.tabs.len() >= self.max_tabs {
            return Err(OmixError::TooManyTabs { max: self.max_tabs });
        }
        self.tabs.push(ExperimentTab::new(experiment, self.page_size));
        self.active = ActiveView::Tab(id);
        Ok(OpenOutcome::Created)
    }

    /// Removes exactly one tab. Falls back to the experiment list when the
    /// closed tab was active.
    pub fn close(&mut self, experiment_id: u64) -> Option<ExperimentTab> {
        let idx = self
            .tabs
            .iter()
            .position(|t| t.experiment_id() == experiment_id)?;
        let tab = self.tabs.remove(idx);
        if self.active == ActiveView::Tab(experiment_id) {
            self.active = ActiveView::AllExperiments;
        }
        Some(tab)
    }

    pub fn activate(&mut self, view: ActiveView) -> Result<()> {
        if let ActiveView::Tab(id) = view {
            if self.get(id).is_none() {
                return Err(OmixError::TabNotFound(id));
            }
        }
        self.active = view;
        Ok(())
    }

    /// Applies a table action to one tab. Returns whether a fetch is needed.
    pub fn apply(&mut self, experiment_id: u64, action: TableAction) -> Result<bool> {
        let tab = self.get_mut(experiment_id)?;
        let update = tab.control.apply(action);
        tab.control = update.control;
        Ok(update.needs_fetch)
    }

    /// Tags a new fetch for `experiment_id` with the next sequence number.
    pub fn begin_fetch(&mut self, experiment_id: u64) -> Result<FetchTicket> {
        let tab = self.get_mut(experiment_id)?;
        tab.last_dispatched += 1;
        Ok(FetchTicket {
            experiment_id,
            seq: tab.last_dispatched,
            control: tab.control.clone(),
        })
    }

    pub fn complete_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Page<ResultRow>>,
    ) -> FetchOutcome {
        let tab = match self.get_mut(ticket.experiment_id) {
            Ok(tab) => tab,
            Err(_) => return FetchOutcome::Stale,
        };
        if ticket.seq != tab.last_dispatched {
            return FetchOutcome::Stale;
        }

        match result {
            Ok(page) => {
                tab.info.rows = page.results;
                tab.info.total_row_count = page.count;
                tab.applied = ticket.seq;
                FetchOutcome::Applied
            }
            Err(OmixError::Cancelled) => FetchOutcome::Stale,
            Err(e) if e.is_not_found() && ticket.control.page_number > 1 => {
                let previous = ticket.control.page_number - 1;
                tab.control = tab.control.apply(TableAction::SetPage(previous)).control;
                match self.begin_fetch(ticket.experiment_id) {
                    Ok(retry) => FetchOutcome::Retry(retry),
                    Err(_) => FetchOutcome::Stale,
                }
            }
            Err(e) if e.is_not_found() || e.is_experiment_gone() => {
                self.close(ticket.experiment_id);
                FetchOutcome::Closed(e)
            }
            Err(e) => {
                // Keep showing the previous page.
                tab.applied = ticket.seq;
                FetchOutcome::Failed(e)
            }
        }
    }
}
