//! Details-panel state for one selected result row.
//!
//! Each panel is backed by a data source. A source is fetched once and cached
//! for the lifetime of the session; Statistical Properties and Assumptions
//! share the same source. Completions land in their own source slot whatever
//! panel is active at the time.

use std::collections::HashMap;

use crate::analysis::{
    Assumptions, CorrelationGraphData, MirnaDisease, MirnaDrug, MirnaTargetInteraction,
    StatisticalProperties, SurvivalData,
};
use crate::charts::ChartKind;
use crate::error::{OmixError, Result};
use crate::models::ExperimentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    StatisticalProperties,
    CorrelationGraph,
    Assumptions,
    MirnaTargetInteraction,
    MirnaInteraction,
    DiseaseAssociation,
    DrugAssociation,
    SurvivalAnalysis,
}

impl Panel {
    pub const ALL: &'static [Panel] = &[
        Panel::StatisticalProperties,
        Panel::CorrelationGraph,
        Panel::Assumptions,
        Panel::MirnaTargetInteraction,
        Panel::MirnaInteraction,
        Panel::DiseaseAssociation,
        Panel::DrugAssociation,
        Panel::SurvivalAnalysis,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Panel::StatisticalProperties => "Statistical Properties",
            Panel::CorrelationGraph => "Correlation Graph",
            Panel::Assumptions => "Assumptions",
            Panel::MirnaTargetInteraction => "miRNA-target interaction",
            Panel::MirnaInteraction => "miRNA interaction",
            Panel::DiseaseAssociation => "Disease association",
            Panel::DrugAssociation => "Drug association",
            Panel::SurvivalAnalysis => "Survival Analysis",
        }
    }

    pub fn source(self) -> PanelSource {
        match self {
            Panel::StatisticalProperties | Panel::Assumptions => PanelSource::StatisticalProperties,
            Panel::CorrelationGraph => PanelSource::CorrelationGraph,
            Panel::MirnaTargetInteraction => PanelSource::MirnaTargetInteraction,
            Panel::MirnaInteraction => PanelSource::MirnaInteraction,
            Panel::DiseaseAssociation => PanelSource::DiseaseAssociation,
            Panel::DrugAssociation => PanelSource::DrugAssociation,
            Panel::SurvivalAnalysis => PanelSource::Survival,
        }
    }

    /// The miRNA metadata panels only make sense when the GEM is a miRNA.
    pub fn is_available_for(self, experiment_type: ExperimentType) -> bool {
        match self {
            Panel::MirnaTargetInteraction
            | Panel::MirnaInteraction
            | Panel::DiseaseAssociation
            | Panel::DrugAssociation => experiment_type == ExperimentType::Mirna,
            _ => true,
        }
    }
}

impl std::fmt::Display for Panel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Backend dataset a panel is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelSource {
    StatisticalProperties,
    CorrelationGraph,
    MirnaTargetInteraction,
    MirnaInteraction,
    DiseaseAssociation,
    DrugAssociation,
    Survival,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelData {
    StatisticalProperties(StatisticalProperties),
    CorrelationGraph(CorrelationGraphData),
    MirnaTargets(Vec<MirnaTargetInteraction>),
    MirnaInteractions(Vec<MirnaTargetInteraction>),
    Diseases(Vec<MirnaDisease>),
    Drugs(Vec<MirnaDrug>),
    Survival(SurvivalData),
}

impl PanelData {
    fn source(&self) -> PanelSource {
        match self {
            PanelData::StatisticalProperties(_) => PanelSource::StatisticalProperties,
            PanelData::CorrelationGraph(_) => PanelSource::CorrelationGraph,
            PanelData::MirnaTargets(_) => PanelSource::MirnaTargetInteraction,
            PanelData::MirnaInteractions(_) => PanelSource::MirnaInteraction,
            PanelData::Diseases(_) => PanelSource::DiseaseAssociation,
            PanelData::Drugs(_) => PanelSource::DrugAssociation,
            PanelData::Survival(_) => PanelSource::Survival,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PanelState {
    #[default]
    Idle,
    Loading,
    Ready(PanelData),
    /// Fetch or parse failed; the alert has already been raised.
    NoData,
}

/// The row the details view was opened for.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedRow {
    pub experiment_id: u64,
    pub experiment_type: ExperimentType,
    pub gene: String,
    pub gem: String,
}

#[derive(Debug, Clone)]
pub struct DetailsModal {
    row: SelectedRow,
    active: Panel,
    sources: HashMap<PanelSource, PanelState>,
}

impl DetailsModal {
    pub fn new(row: SelectedRow) -> Self {
        Self {
            row,
            active: Panel::StatisticalProperties,
            sources: HashMap::new(),
        }
    }

    pub fn row(&self) -> &SelectedRow {
        &self.row
    }

    pub fn active(&self) -> Panel {
        self.active
    }

    pub fn available_panels(&self) -> Vec<Panel> {
        Panel::ALL
            .iter()
            .copied()
            .filter(|p| p.is_available_for(self.row.experiment_type))
            .collect()
    }

    /// Makes `panel` active. Returns the source to fetch, or `None` when it
    /// is already cached or loading.
    pub fn select(&mut self, panel: Panel) -> Result<Option<PanelSource>> {
        if !panel.is_available_for(self.row.experiment_type) {
            return Err(OmixError::PanelUnavailable(panel.label().to_string()));
        }
        self.active = panel;
        let source = panel.source();
        let state = self.sources.entry(source).or_default();
        match *state {
            PanelState::Idle | PanelState::NoData => {
                *state = PanelState::Loading;
                Ok(Some(source))
            }
            PanelState::Loading | PanelState::Ready(_) => Ok(None),
        }
    }

    /// Stores a finished fetch. Returns the alert to show on failure.
    pub fn complete(&mut self, source: PanelSource, result: Result<PanelData>) -> Option<String> {
        let (state, alert) = match result {
            Ok(data) if data.source() == source => (PanelState::Ready(data), None),
            Ok(_) => (
                PanelState::NoData,
                Some(crate::error::GENERIC_ALERT.to_string()),
            ),
            Err(OmixError::Cancelled) => (PanelState::Idle, None),
            Err(e) => (PanelState::NoData, Some(e.alert_message())),
        };
        self.sources.insert(source, state);
        alert
    }

    pub fn state(&self, panel: Panel) -> &PanelState {
        static IDLE: PanelState = PanelState::Idle;
        self.sources.get(&panel.source()).unwrap_or(&IDLE)
    }

    /// Assumption reading, once statistical properties are loaded.
    pub fn assumptions(&self) -> Option<Assumptions> {
        match self.state(Panel::Assumptions) {
            PanelState::Ready(PanelData::StatisticalProperties(p)) => Some(Assumptions::from(p)),
            _ => None,
        }
    }

    /// Chart kind for the correlation panel, once its data is loaded.
    pub fn chart_kind(&self, max_distinct_for_boxplot: usize) -> Option<ChartKind> {
        match self.state(Panel::CorrelationGraph) {
            PanelState::Ready(PanelData::CorrelationGraph(data)) => Some(ChartKind::for_data(
                self.row.experiment_type,
                data,
                max_distinct_for_boxplot,
            )),
            _ => None,
        }
    }
}
