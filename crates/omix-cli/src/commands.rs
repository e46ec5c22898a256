//! Command implementations.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use comfy_table::{presets::UTF8_FULL, Table};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use omix::analysis::Assumptions;
use omix::charts::{box_plot_summaries, regression_line, ChartKind};
use omix::format::{format_correlation, format_p_value, RenderedRow};
use omix::{
    ApiClient, ClientConfig, DetailsSession, Experiment, ExperimentListQuery, FilterChange,
    Notifier, OmixError, Panel, PanelData, PanelState, ResultTableSession, SelectedRow,
    SessionEvent, SortOrder, TableAction, UPDATE_EXPERIMENTS,
};

use crate::{Cli, Commands};

pub async fn run(cli: Cli) -> Result<()> {
    let config = Arc::new(cli.client_config()?);
    let api = ApiClient::new(Arc::clone(&config))?;
    debug!(base_url = %config.base_url, "Using backend");

    match cli.command {
        Commands::Experiments {
            search,
            sort,
            page,
            page_size,
            experiment_type,
            tag,
            method,
        } => {
            let mut query = ExperimentListQuery {
                page,
                page_size: page_size.unwrap_or(config.page_size),
                search: search.unwrap_or_default(),
                experiment_type,
                tag,
                correlation_method: method,
                ..Default::default()
            };
            if !sort.is_empty() {
                query.sort = SortOrder::from_specs(&sort);
            }
            cmd_experiments(&api, &query).await?;
        }
        Commands::Results {
            experiment_id,
            search,
            sort,
            correlation_type,
            threshold,
            page,
            page_size,
            high_precision,
        } => {
            let mut actions = vec![];
            if let Some(size) = page_size {
                actions.push(TableAction::SetPageSize(size));
            }
            if let Some(text) = search {
                actions.push(TableAction::filter(FilterChange::Text(text)));
            }
            if let Some(t) = correlation_type {
                actions.push(TableAction::filter(FilterChange::CorrelationType(t)));
            }
            if let Some(v) = threshold {
                actions.push(TableAction::filter(FilterChange::CoefficientThreshold(v)));
            }
            if !sort.is_empty() {
                actions.push(TableAction::SetSort(SortOrder::from_specs(&sort)));
            }
            // Page last: filter changes reset it.
            if let Some(p) = page {
                actions.push(TableAction::SetPage(p));
            }
            if high_precision {
                actions.push(TableAction::SetHighPrecision(true));
            }
            cmd_results(api, &config, experiment_id, actions).await?;
        }
        Commands::Details {
            experiment_id,
            gene,
            gem,
            panel,
        } => {
            cmd_details(api, &config, experiment_id, gene, gem, panel.into()).await?;
        }
        Commands::Delete {
            experiment_id,
            force,
        } => {
            cmd_delete(&api, experiment_id, force).await?;
        }
        Commands::Stop { experiment_id } => {
            cmd_stop(&api, experiment_id).await?;
        }
        Commands::Watch { user_id } => {
            let user_id = user_id
                .or(config.user_id)
                .context("No user id: pass --user-id or set user_id in the config file")?;
            cmd_watch(&api, &config, user_id).await?;
        }
    }

    Ok(())
}

// ─── Command implementations ──────────────────────────────────────────────────

async fn cmd_experiments(api: &ApiClient, query: &ExperimentListQuery) -> Result<()> {
    let page = api
        .list_experiments(query, &CancellationToken::new())
        .await
        .map_err(alert)?;

    if page.results.is_empty() {
        println!("No experiments found");
        return Ok(());
    }

    println!("{}", experiments_table(&page.results));
    let pages = page.count.div_ceil(u64::from(query.page_size.max(1)));
    println!(
        "Page {} of {} ({} experiments)",
        query.page,
        pages.max(1),
        page.count
    );
    Ok(())
}

async fn cmd_results(
    api: ApiClient,
    config: &ClientConfig,
    experiment_id: u64,
    actions: Vec<TableAction>,
) -> Result<()> {
    let experiment = api
        .get_experiment(experiment_id, &CancellationToken::new())
        .await
        .map_err(alert)?;
    let title = format!(
        "{} ({}, {})",
        experiment.name, experiment.experiment_type, experiment.correlation_method
    );

    let progress = spinner("Loading results...");
    let (session, mut events) = ResultTableSession::spawn(Arc::new(api), config);
    session.open(experiment);
    if !actions.is_empty() {
        for action in actions {
            session.apply(experiment_id, action);
        }
        // Fetch the final state now instead of waiting out the debounce.
        session.refresh(experiment_id);
    }

    let tab = loop {
        match events.recv().await {
            Some(SessionEvent::RowsUpdated(id)) if id == experiment_id => {
                let registry = session.snapshot().await?;
                match registry.get(experiment_id) {
                    Some(tab) if !tab.has_pending_fetch() => break tab.clone(),
                    _ => continue,
                }
            }
            Some(SessionEvent::TabClosed {
                alert: Some(msg), ..
            })
            | Some(SessionEvent::Alert(msg)) => {
                progress.finish_and_clear();
                bail!(msg);
            }
            Some(_) => continue,
            None => bail!(OmixError::SessionClosed),
        }
    };
    progress.finish_and_clear();
    session.shutdown().await;

    let control = &tab.control;
    if tab.info.rows.is_empty() {
        println!("{}: no rows match the current filters", title);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Gene", "GEM", "Correlation", "P-value", "Adj. P-value", "Description"]);
    for row in &tab.info.rows {
        let r = RenderedRow::new(row, control.show_high_precision);
        table.add_row([
            r.gene,
            r.gem,
            r.correlation,
            r.p_value,
            r.adjusted_p_value,
            r.gene_description,
        ]);
    }

    println!("{}", title);
    println!("{}", table);
    let pages = tab
        .info
        .total_row_count
        .div_ceil(u64::from(control.page_size.max(1)));
    println!(
        "Page {} of {} ({} rows)",
        control.page_number,
        pages.max(1),
        tab.info.total_row_count
    );
    Ok(())
}

async fn cmd_details(
    api: ApiClient,
    config: &ClientConfig,
    experiment_id: u64,
    gene: String,
    gem: String,
    panel: Panel,
) -> Result<()> {
    let experiment = api
        .get_experiment(experiment_id, &CancellationToken::new())
        .await
        .map_err(alert)?;
    let row = SelectedRow {
        experiment_id,
        experiment_type: experiment.experiment_type,
        gene,
        gem,
    };

    let progress = spinner(&format!("Loading {}...", panel));
    let mut details = DetailsSession::open(Arc::new(api), row);
    details.select(panel).map_err(alert)?;
    while let Some(done) = details.next_completion().await {
        if done.source != panel.source() {
            continue;
        }
        if let Some(msg) = done.alert {
            progress.finish_and_clear();
            bail!(msg);
        }
        break;
    }
    progress.finish_and_clear();

    let modal = details.modal();
    println!("── {} ── {} / {}", panel, modal.row().gene, modal.row().gem);
    match details.state(panel) {
        PanelState::Ready(data) => print_panel(panel, data, modal.assumptions(), config, modal.row()),
        _ => println!("No data"),
    }
    details.close();
    Ok(())
}

async fn cmd_delete(api: &ApiClient, experiment_id: u64, force: bool) -> Result<()> {
    let token = CancellationToken::new();
    let experiment = api.get_experiment(experiment_id, &token).await.map_err(alert)?;
    println!(
        "Will delete experiment {} '{}' ({})",
        experiment.id, experiment.name, experiment.state
    );

    if !force {
        println!("\nDry run. Use --force to actually delete.");
        return Ok(());
    }

    api.delete_experiment(experiment_id, &token)
        .await
        .map_err(alert)?;
    println!("  ✓ Deleted {}", experiment.name);
    Ok(())
}

async fn cmd_stop(api: &ApiClient, experiment_id: u64) -> Result<()> {
    let token = CancellationToken::new();
    let experiment = api.get_experiment(experiment_id, &token).await.map_err(alert)?;
    if !experiment.state.is_stoppable() {
        bail!(
            "Experiment '{}' is {} and cannot be stopped",
            experiment.name,
            experiment.state
        );
    }
    api.stop_experiment(experiment_id, &token)
        .await
        .map_err(alert)?;
    println!("  ✓ Stop requested for {}", experiment.name);
    Ok(())
}

async fn cmd_watch(api: &ApiClient, config: &ClientConfig, user_id: u64) -> Result<()> {
    let (tx, mut updates) = mpsc::unbounded_channel();
    let token = CancellationToken::new();
    let notifier = Notifier::new(config, user_id)?.on(UPDATE_EXPERIMENTS, move || {
        let _ = tx.send(());
    });
    println!("Watching {} (Ctrl-C to stop)", notifier.url());
    let handle = notifier.spawn(token.clone());

    let query = ExperimentListQuery {
        page_size: config.page_size,
        ..Default::default()
    };
    print_experiment_page(api, &query).await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            update = updates.recv() => {
                if update.is_none() {
                    break;
                }
                info!("Experiments changed");
                print_experiment_page(api, &query).await;
            }
        }
    }

    token.cancel();
    let _ = handle.await;
    Ok(())
}

// ─── Utilities ────────────────────────────────────────────────────────────────

/// Turns a client error into its user-facing alert.
fn alert(e: OmixError) -> anyhow::Error {
    debug!(error = %e, "Request failed");
    anyhow::anyhow!(e.alert_message())
}

fn spinner(message: &str) -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        progress.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    progress.set_message(message.to_string());
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

/// A failed refresh while watching is reported and the watch goes on.
async fn print_experiment_page(api: &ApiClient, query: &ExperimentListQuery) {
    match api.list_experiments(query, &CancellationToken::new()).await {
        Ok(page) => println!("{}", experiments_table(&page.results)),
        Err(e) => eprintln!("{}", e.alert_message()),
    }
}

fn experiments_table(experiments: &[Experiment]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["ID", "Name", "Type", "Method", "State", "Submitted", "Rows", "Tag"]);
    for e in experiments {
        table.add_row([
            e.id.to_string(),
            e.name.clone(),
            e.experiment_type.to_string(),
            e.correlation_method.to_string(),
            e.state.to_string(),
            e.submit_date.format("%Y-%m-%d %H:%M").to_string(),
            e.result_final_row_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
            e.tag
                .as_ref()
                .map(|t| t.name.clone())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table
}

fn key_value_table(rows: Vec<(&str, String)>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Property", "Value"]);
    for (k, v) in rows {
        table.add_row([k.to_string(), v]);
    }
    table
}

fn print_panel(
    panel: Panel,
    data: &PanelData,
    assumptions: Option<Assumptions>,
    config: &ClientConfig,
    row: &SelectedRow,
) {
    match data {
        PanelData::StatisticalProperties(p) if panel == Panel::Assumptions => {
            let Some(a) = assumptions else { return };
            let yes_no = |b: bool| if b { "yes" } else { "no" }.to_string();
            println!(
                "{}",
                key_value_table(vec![
                    ("Gene is normal", yes_no(a.gene_is_normal)),
                    ("GEM is normal", yes_no(a.gem_is_normal)),
                    (
                        "Homoscedastic",
                        a.is_homoscedastic.map(yes_no).unwrap_or_else(|| "-".into())
                    ),
                    ("Outliers", a.outliers.to_string()),
                    ("Common samples", p.common_samples.to_string()),
                    (
                        "Parametric method suitable",
                        yes_no(a.supports_parametric())
                    ),
                ])
            );
        }
        PanelData::StatisticalProperties(p) => {
            println!(
                "{}",
                key_value_table(vec![
                    ("Gene mean", format!("{:.4}", p.gene_mean)),
                    ("GEM mean", format!("{:.4}", p.gem_mean)),
                    ("Gene std. dev.", format!("{:.4}", p.gene_standard_deviation)),
                    ("GEM std. dev.", format!("{:.4}", p.gem_standard_deviation)),
                    (
                        "Gene normality p",
                        format_p_value(Some(p.gene_normality_p_value), true)
                    ),
                    (
                        "GEM normality p",
                        format_p_value(Some(p.gem_normality_p_value), true)
                    ),
                    (
                        "Heteroscedasticity p",
                        format_p_value(p.heteroscedasticity_p_value, true)
                    ),
                    ("Common samples", p.common_samples.to_string()),
                ])
            );
        }
        PanelData::CorrelationGraph(g) => {
            let kind =
                ChartKind::for_data(row.experiment_type, g, config.cna_boxplot_max_distinct);
            println!("Chart: {:?} ({} samples)", kind, g.gene_values.len());
            match kind {
                ChartKind::BoxPlot => {
                    let mut table = Table::new();
                    table.load_preset(UTF8_FULL);
                    table.set_header(["GEM level", "n", "Min", "Q1", "Median", "Q3", "Max"]);
                    for b in box_plot_summaries(&g.gene_values, &g.gem_values) {
                        table.add_row([
                            format!("{}", b.level),
                            b.count.to_string(),
                            format!("{:.3}", b.min),
                            format!("{:.3}", b.q1),
                            format!("{:.3}", b.median),
                            format!("{:.3}", b.q3),
                            format!("{:.3}", b.max),
                        ]);
                    }
                    println!("{}", table);
                }
                ChartKind::Scatter => match regression_line(&g.gene_values, &g.gem_values) {
                    Some(line) => println!(
                        "Regression: y = {} x + {}",
                        format_correlation(line.slope),
                        format_correlation(line.intercept)
                    ),
                    None => println!("Not enough points for a regression line"),
                },
            }
        }
        PanelData::MirnaTargets(list) | PanelData::MirnaInteractions(list) => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(["miRNA", "Gene", "Score", "Source", "PubMed"]);
            for i in list {
                table.add_row([
                    i.mirna.clone(),
                    i.gene.clone(),
                    format!("{:.3}", i.score),
                    i.source_name.clone(),
                    i.pubmeds.join(", "),
                ]);
            }
            println!("{}", table);
        }
        PanelData::Diseases(list) => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(["miRNA", "Disease", "PubMed"]);
            for d in list {
                table.add_row([
                    d.mirna.clone(),
                    d.disease.clone(),
                    d.pubmed_id.clone().unwrap_or_else(|| "-".into()),
                ]);
            }
            println!("{}", table);
        }
        PanelData::Drugs(list) => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(["miRNA", "Small molecule", "FDA", "Condition"]);
            for d in list {
                table.add_row([
                    d.mirna.clone(),
                    d.small_molecule.clone(),
                    if d.fda_approved { "approved" } else { "-" }.to_string(),
                    d.condition.clone().unwrap_or_else(|| "-".into()),
                ]);
            }
            println!("{}", table);
        }
        PanelData::Survival(s) => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(["Group", "Points", "Median survival"]);
            for (group, (label, median)) in s.groups.iter().zip(s.median_survival()) {
                table.add_row([
                    label,
                    group.data.len().to_string(),
                    median
                        .map(|m| format!("{:.1}", m))
                        .unwrap_or_else(|| "not reached".into()),
                ]);
            }
            println!("{}", table);
            if let Some(test) = &s.log_rank {
                println!(
                    "Log-rank: statistic {:.3}, p = {}",
                    test.test_statistic,
                    format_p_value(Some(test.p_value), true)
                );
            }
        }
    }
}
