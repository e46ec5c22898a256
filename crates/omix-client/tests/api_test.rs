//! Client tests against the in-process stub backend.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::spawn_stub;
use omix_client::{ApiClient, DetailsSession, ResultTableSession, SessionEvent};
use omix_core::charts::ChartKind;
use omix_core::config::AuthConfig;
use omix_core::error::GENERIC_ALERT;
use omix_core::models::DomainCode;
use omix_core::{
    ClientConfig, ExperimentListQuery, ExperimentType, OmixError, Panel, PanelData, PanelState,
    SelectedRow, TabRegistry, TableAction,
};
use tokio_util::sync::CancellationToken;

fn client(base_url: &str) -> ApiClient {
    let config = ClientConfig {
        base_url: base_url.to_string(),
        debounce_ms: 20,
        auth: AuthConfig {
            token: Some("secret".into()),
            ..Default::default()
        },
        ..Default::default()
    };
    ApiClient::new(Arc::new(config)).unwrap()
}

fn row(experiment_type: ExperimentType, gene: &str) -> SelectedRow {
    SelectedRow {
        experiment_id: 7,
        experiment_type,
        gene: gene.into(),
        gem: "hsa-miR-21".into(),
    }
}

#[tokio::test]
async fn test_listing_sends_query_and_token() {
    let (base, stub) = spawn_stub().await;
    let api = client(&base);
    let query = ExperimentListQuery {
        search: "breast".into(),
        experiment_type: Some(ExperimentType::Cna),
        ..Default::default()
    };

    let page = api
        .list_experiments(&query, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(page.count, 2);
    assert_eq!(page.results[1].experiment_type, ExperimentType::Cna);

    let seen = stub.seen("/api-service/user-experiments");
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].authorization.as_deref(), Some("Token secret"));
    assert_eq!(seen[0].query["search"], "breast");
    assert_eq!(seen[0].query["type"], "2");
    assert_eq!(seen[0].query["ordering"], "-submit_date");
}

#[tokio::test]
async fn test_http_status_and_parse_failures() {
    let (base, _stub) = spawn_stub().await;
    let api = client(&base);
    let token = CancellationToken::new();

    let err = api.get_experiment(404, &token).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.alert_message(), GENERIC_ALERT);

    let exp = api.get_experiment(9, &token).await.unwrap();
    assert_eq!(exp.id, 9);

    let err = api
        .panel_data(
            omix_core::PanelSource::DrugAssociation,
            &row(ExperimentType::Mirna, "TP53"),
            &token,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OmixError::Json(_)));
}

#[tokio::test]
async fn test_network_failure_and_cancellation() {
    // Grab a free port, then close it.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = client(&format!("http://{addr}"));
    let err = api.get_experiment(1, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, OmixError::Network(_)));

    let (base, _stub) = spawn_stub().await;
    let api = client(&base);
    let token = CancellationToken::new();
    token.cancel();
    let err = api.get_experiment(1, &token).await.unwrap_err();
    assert!(matches!(err, OmixError::Cancelled));
}

#[tokio::test]
async fn test_stop_and_delete() {
    let (base, stub) = spawn_stub().await;
    let api = client(&base);
    let token = CancellationToken::new();

    api.stop_experiment(1, &token).await.unwrap();
    let err = api.stop_experiment(2, &token).await.unwrap_err();
    assert!(err.is_experiment_gone());

    api.delete_experiment(5, &token).await.unwrap();
    assert_eq!(stub.seen("/api-service/user-experiments/5/").len(), 1);
}

#[tokio::test]
async fn test_domain_failure_has_specific_alert() {
    let (base, _stub) = spawn_stub().await;
    let api = client(&base);
    let err = api
        .panel_data(
            omix_core::PanelSource::StatisticalProperties,
            &row(ExperimentType::Mirna, "MISSING"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OmixError::Domain {
            code: DomainCode::GeneOrGemNotFound,
            ..
        }
    ));
    assert_eq!(
        err.alert_message(),
        "The gene or GEM was not found in the experiment data"
    );
}

#[tokio::test]
async fn test_session_steps_back_from_out_of_range_page() {
    let (base, stub) = spawn_stub().await;
    let api = Arc::new(client(&base));
    let config = api.config().clone();
    let token = CancellationToken::new();
    let experiment = api.get_experiment(7, &token).await.unwrap();

    let (session, mut events) = ResultTableSession::spawn(Arc::clone(&api), &config);
    session.open(experiment);
    assert_eq!(events.recv().await, Some(SessionEvent::TabOpened(7)));
    assert_eq!(events.recv().await, Some(SessionEvent::RowsUpdated(7)));

    // 25 rows at 10 per page: pages 5 and 4 are out of range.
    session.apply(7, TableAction::SetPage(5));
    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap();
    assert_eq!(event, Some(SessionEvent::RowsUpdated(7)));

    let registry: TabRegistry = session.snapshot().await.unwrap();
    let tab = registry.get(7).unwrap();
    assert_eq!(tab.control.page_number, 3);
    assert_eq!(tab.info.rows.len(), 5);
    assert_eq!(tab.info.total_row_count, 25);

    let pages: Vec<String> = stub
        .seen("/api-service/experiment-result")
        .iter()
        .map(|s| s.query["page"].clone())
        .collect();
    assert_eq!(pages, vec!["1", "5", "4", "3"]);
    session.shutdown().await;
}

#[tokio::test]
async fn test_details_for_cna_row() {
    let (base, stub) = spawn_stub().await;
    let api = Arc::new(client(&base));
    let mut details = DetailsSession::open(api, row(ExperimentType::Cna, "EGFR"));

    let state = details.load(Panel::CorrelationGraph).await.unwrap();
    assert!(matches!(state, PanelState::Ready(PanelData::CorrelationGraph(_))));
    // Levels -1, 0, 1, 2.
    assert_eq!(details.modal().chart_kind(5), Some(ChartKind::BoxPlot));
    assert_eq!(details.modal().chart_kind(3), Some(ChartKind::Scatter));

    details.load(Panel::StatisticalProperties).await.unwrap();
    // Served from the same payload.
    details.select(Panel::Assumptions).unwrap();
    let assumptions = details.modal().assumptions().unwrap();
    assert!(assumptions.gene_is_normal);
    assert!(!assumptions.gem_is_normal);
    assert_eq!(assumptions.outliers, 1);

    let state = details.load(Panel::SurvivalAnalysis).await.unwrap();
    match state {
        PanelState::Ready(PanelData::Survival(data)) => {
            assert_eq!(data.groups.len(), 2);
            assert_eq!(
                data.median_survival(),
                vec![("low".to_string(), Some(12.0)), ("high".to_string(), None)]
            );
        }
        other => panic!("unexpected state {other:?}"),
    }
    let body = stub.seen("/api-service/survival")[0].body.clone().unwrap();
    assert_eq!(body["gene"], "EGFR");
    assert_eq!(body["experiment_id"], 7);

    assert!(details.select(Panel::DrugAssociation).is_err());
    details.close();
}

#[tokio::test]
async fn test_details_failure_leaves_other_panels_alone() {
    let (base, _stub) = spawn_stub().await;
    let api = Arc::new(client(&base));
    let mut details = DetailsSession::open(api, row(ExperimentType::Mirna, "TP53"));

    details.select(Panel::DrugAssociation).unwrap();
    details.select(Panel::DiseaseAssociation).unwrap();
    let mut alerts = vec![];
    while let Some(done) = details.next_completion().await {
        alerts.extend(done.alert);
    }
    assert_eq!(alerts, vec![GENERIC_ALERT.to_string()]);
    assert_eq!(details.state(Panel::DrugAssociation), &PanelState::NoData);
    match details.state(Panel::DiseaseAssociation) {
        PanelState::Ready(PanelData::Diseases(list)) => {
            assert_eq!(list[0].mirna, "hsa-miR-21");
        }
        other => panic!("unexpected state {other:?}"),
    }
    assert_eq!(details.modal().active(), Panel::DiseaseAssociation);
}
