//! omix CLI: browse experiments and their correlation results from the terminal.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use omix::{ClientConfig, CorrelationMethod, CorrelationType, ExperimentType, Panel};

pub mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "omix",
    about = "🧬 omix: browse correlation results of omics experiments",
    version
)]
pub struct Cli {
    /// YAML config file
    #[arg(long, global = true, env = "OMIX_CONFIG", default_value = "omix.yaml")]
    pub config: PathBuf,
    /// Backend URL, overrides the config file
    #[arg(long, global = true, env = "OMIX_BASE_URL")]
    pub base_url: Option<String>,
    /// API token, overrides the config file
    #[arg(long, global = true, env = "OMIX_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
    /// Debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List experiments
    Experiments {
        /// Free-text search
        #[arg(long, short)]
        search: Option<String>,
        /// Sort key, repeatable; prefix with '-' for descending
        #[arg(long, allow_hyphen_values = true)]
        sort: Vec<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        page_size: Option<u32>,
        /// mirna, cna, methylation or clinical
        #[arg(long = "type")]
        experiment_type: Option<ExperimentType>,
        /// Tag id
        #[arg(long)]
        tag: Option<u64>,
        /// spearman, kendall or pearson
        #[arg(long)]
        method: Option<CorrelationMethod>,
    },
    /// Show one page of an experiment's correlation results
    Results {
        experiment_id: u64,
        /// Gene/GEM search
        #[arg(long, short)]
        search: Option<String>,
        /// Sort key, repeatable; prefix with '-' for descending
        #[arg(long, allow_hyphen_values = true)]
        sort: Vec<String>,
        /// both, positive or negative
        #[arg(long)]
        correlation_type: Option<CorrelationType>,
        /// Minimum absolute correlation
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        page_size: Option<u32>,
        /// Show p-values in full exponential notation
        #[arg(long)]
        high_precision: bool,
    },
    /// Load one details panel for a gene/GEM pair
    Details {
        experiment_id: u64,
        gene: String,
        gem: String,
        #[arg(long, short, value_enum, default_value_t = PanelArg::Stats)]
        panel: PanelArg,
    },
    /// Delete an experiment
    Delete {
        experiment_id: u64,
        /// Actually delete (default: dry run)
        #[arg(long)]
        force: bool,
    },
    /// Stop a running experiment
    Stop { experiment_id: u64 },
    /// Watch for experiment updates and reprint the list
    Watch {
        /// Overrides `user_id` from the config file
        #[arg(long)]
        user_id: Option<u64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelArg {
    Stats,
    Correlation,
    Assumptions,
    Targets,
    Interactions,
    Diseases,
    Drugs,
    Survival,
}

impl From<PanelArg> for Panel {
    fn from(arg: PanelArg) -> Panel {
        match arg {
            PanelArg::Stats => Panel::StatisticalProperties,
            PanelArg::Correlation => Panel::CorrelationGraph,
            PanelArg::Assumptions => Panel::Assumptions,
            PanelArg::Targets => Panel::MirnaTargetInteraction,
            PanelArg::Interactions => Panel::MirnaInteraction,
            PanelArg::Diseases => Panel::DiseaseAssociation,
            PanelArg::Drugs => Panel::DrugAssociation,
            PanelArg::Survival => Panel::SurvivalAnalysis,
        }
    }
}

impl Cli {
    /// Config file, then flag and environment overrides.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::load(&self.config)?;
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(token) = &self.token {
            config.auth.token = Some(token.clone());
        }
        config.validate()?;
        Ok(config)
    }
}
