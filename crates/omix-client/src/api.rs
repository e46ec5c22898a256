//! Typed backend endpoints.

use omix_core::analysis::{
    CorrelationGraphData, MirnaDisease, MirnaDrug, MirnaTargetInteraction, StatisticalProperties,
    SurvivalData,
};
use omix_core::models::{DomainCode, Envelope, ResponseStatus, STATUS_SUCCESS};
use omix_core::{
    Experiment, ExperimentListQuery, FetchTicket, OmixError, Page, PanelData, PanelSource,
    Result, ResultRow, SelectedRow,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::details::AnalysisSource;
use crate::http::ApiClient;
use crate::session::ResultSource;

#[derive(Debug, Serialize)]
struct SurvivalRequest<'a> {
    experiment_id: u64,
    gene: &'a str,
    gem: &'a str,
}

#[derive(Debug, Deserialize)]
struct StatusOnly {
    status: ResponseStatus,
}

impl ApiClient {
    pub async fn list_experiments(
        &self,
        query: &ExperimentListQuery,
        token: &CancellationToken,
    ) -> Result<Page<Experiment>> {
        self.get(&self.config().endpoints.experiments, &query.to_query(), token)
            .await
    }

    pub async fn get_experiment(&self, id: u64, token: &CancellationToken) -> Result<Experiment> {
        self.get(&self.experiment_path(id), &[], token).await
    }

    pub async fn delete_experiment(&self, id: u64, token: &CancellationToken) -> Result<()> {
        self.delete(&self.experiment_path(id), token).await?;
        info!(experiment = id, "Deleted experiment");
        Ok(())
    }

    pub async fn stop_experiment(&self, id: u64, token: &CancellationToken) -> Result<()> {
        let query = [("experimentId", id.to_string())];
        let reply: StatusOnly = self
            .get(&self.config().endpoints.stop_experiment, &query, token)
            .await?;
        if reply.status.code != STATUS_SUCCESS {
            return Err(OmixError::Domain {
                code: DomainCode::from(reply.status.internal_code.unwrap_or_default()),
                message: reply.status.message,
            });
        }
        info!(experiment = id, "Stopped experiment");
        Ok(())
    }

    pub async fn result_rows(
        &self,
        ticket: &FetchTicket,
        token: &CancellationToken,
    ) -> Result<Page<ResultRow>> {
        debug!(
            experiment = ticket.experiment_id,
            seq = ticket.seq,
            page = ticket.control.page_number,
            "Fetching result rows"
        );
        self.get(&self.config().endpoints.results, &ticket.query(), token)
            .await
    }

    pub async fn panel_data(
        &self,
        source: PanelSource,
        row: &SelectedRow,
        token: &CancellationToken,
    ) -> Result<PanelData> {
        let endpoints = &self.config().endpoints;
        let keyed = [
            ("experiment_id", row.experiment_id.to_string()),
            ("gene", row.gene.clone()),
            ("gem", row.gem.clone()),
        ];
        let mirna = [("mirna", row.gem.clone())];

        debug!(experiment = row.experiment_id, gene = %row.gene, gem = %row.gem, ?source, "Fetching panel data");
        let data = match source {
            PanelSource::StatisticalProperties => {
                let env: Envelope<StatisticalProperties> =
                    self.get(&endpoints.statistical_properties, &keyed, token).await?;
                PanelData::StatisticalProperties(env.into_result()?)
            }
            PanelSource::CorrelationGraph => {
                let env: Envelope<CorrelationGraphData> =
                    self.get(&endpoints.correlation_graph, &keyed, token).await?;
                PanelData::CorrelationGraph(env.into_result()?)
            }
            PanelSource::Survival => {
                let body = SurvivalRequest {
                    experiment_id: row.experiment_id,
                    gene: &row.gene,
                    gem: &row.gem,
                };
                let env: Envelope<SurvivalData> =
                    self.post(&endpoints.survival, &body, token).await?;
                PanelData::Survival(env.into_result()?)
            }
            PanelSource::MirnaTargetInteraction => {
                let query = [("mirna", row.gem.clone()), ("gene", row.gene.clone())];
                let list: Vec<MirnaTargetInteraction> = self
                    .get(&endpoints.mirna_target_interactions, &query, token)
                    .await?;
                PanelData::MirnaTargets(list)
            }
            PanelSource::MirnaInteraction => {
                let list: Vec<MirnaTargetInteraction> =
                    self.get(&endpoints.mirna_interactions, &mirna, token).await?;
                PanelData::MirnaInteractions(list)
            }
            PanelSource::DiseaseAssociation => {
                let list: Vec<MirnaDisease> =
                    self.get(&endpoints.mirna_diseases, &mirna, token).await?;
                PanelData::Diseases(list)
            }
            PanelSource::DrugAssociation => {
                let list: Vec<MirnaDrug> = self.get(&endpoints.mirna_drugs, &mirna, token).await?;
                PanelData::Drugs(list)
            }
        };
        Ok(data)
    }

    fn experiment_path(&self, id: u64) -> String {
        format!(
            "{}/{}/",
            self.config().endpoints.experiments.trim_end_matches('/'),
            id
        )
    }
}

impl ResultSource for ApiClient {
    async fn fetch_rows(
        &self,
        ticket: &FetchTicket,
        token: CancellationToken,
    ) -> Result<Page<ResultRow>> {
        self.result_rows(ticket, &token).await
    }
}

impl AnalysisSource for ApiClient {
    async fn fetch_panel(
        &self,
        source: PanelSource,
        row: &SelectedRow,
        token: CancellationToken,
    ) -> Result<PanelData> {
        self.panel_data(source, row, &token).await
    }
}
