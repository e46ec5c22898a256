//! Error types for omix-core.

use thiserror::Error;

use crate::models::DomainCode;

/// Message shown for any failure the UI does not anticipate.
pub const GENERIC_ALERT: &str = "An error has occurred. Please try again later.";

#[derive(Error, Debug)]
pub enum OmixError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Backend reported failure (internal code {code:?})")]
    Domain {
        code: DomainCode,
        message: Option<String>,
    },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Only {max} result tabs can be open at the same time")]
    TooManyTabs { max: usize },

    #[error("No open tab for experiment {0}")]
    TabNotFound(u64),

    #[error("Session closed")]
    SessionClosed,

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    #[error("Panel {0} is not available for this experiment")]
    PanelUnavailable(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OmixError>;

impl OmixError {
    /// User-facing alert text for this failure.
    ///
    /// Transport, status and parse failures all collapse into the generic
    /// alert; domain codes the UI knows about get their own wording.
    pub fn alert_message(&self) -> String {
        match self {
            OmixError::Domain { code, .. } => match code.alert_message() {
                Some(msg) => msg.to_string(),
                None => GENERIC_ALERT.to_string(),
            },
            OmixError::TooManyTabs { .. } | OmixError::PanelUnavailable(_) => self.to_string(),
            _ => GENERIC_ALERT.to_string(),
        }
    }

    /// `true` when the backend rejected the requested page number.
    pub fn is_not_found(&self) -> bool {
        matches!(self, OmixError::HttpStatus { status: 404, .. })
    }

    /// `true` for failures after which a result tab cannot be kept open.
    pub fn is_experiment_gone(&self) -> bool {
        matches!(
            self,
            OmixError::Domain {
                code: DomainCode::ExperimentDoesNotExist,
                ..
            }
        )
    }
}
