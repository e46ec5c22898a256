//! Data models shared by the client and the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OmixError, Result};

/// Generates an enum carried on the wire as a small integer, with a
/// human-readable name for display and CLI parsing.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "u8", into = "u8")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = String;

            fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
                match v {
                    $($value => Ok($name::$variant),)+
                    other => Err(format!("invalid {} value: {}", stringify!($name), other)),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(v: $name) -> u8 {
                match v {
                    $($name::$variant => $value),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.label().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| format!("unknown {}: {}", stringify!($name), s))
            }
        }
    };
}

wire_enum! {
    /// Kind of GEM an experiment correlates against mRNA.
    pub enum ExperimentType {
        Mirna = 1 => "mirna",
        Cna = 2 => "cna",
        Methylation = 3 => "methylation",
        Clinical = 4 => "clinical",
    }
}

wire_enum! {
    pub enum CorrelationMethod {
        Spearman = 1 => "spearman",
        Kendall = 2 => "kendall",
        Pearson = 3 => "pearson",
    }
}

wire_enum! {
    /// Sign filter applied to result rows.
    #[derive(Default)]
    pub enum CorrelationType {
        #[default]
        Both = 0 => "both",
        Positive = 1 => "positive",
        Negative = 2 => "negative",
    }
}

wire_enum! {
    pub enum ExperimentState {
        Completed = 1 => "completed",
        Failed = 2 => "failed",
        InProcess = 3 => "in-process",
        Waiting = 4 => "waiting",
        NoSamplesInCommon = 5 => "no-samples-in-common",
        Stopping = 6 => "stopping",
        Stopped = 7 => "stopped",
        ReachedAttemptsLimit = 8 => "reached-attempts-limit",
    }
}

impl ExperimentType {
    /// CNA values are ordinal (copy-number levels), not continuous.
    pub fn is_ordinal(self) -> bool {
        matches!(self, ExperimentType::Cna)
    }
}

impl ExperimentState {
    /// States in which the backend accepts a stop request.
    pub fn is_stoppable(self) -> bool {
        matches!(self, ExperimentState::InProcess | ExperimentState::Waiting)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: u64,
    pub name: String,
}

/// An experiment as returned by the listing and detail endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Experiment {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub experiment_type: ExperimentType,
    pub correlation_method: CorrelationMethod,
    pub state: ExperimentState,
    pub submit_date: DateTime<Utc>,
    /// Rows left after the backend's filtering step.
    #[serde(default)]
    pub result_final_row_count: Option<u64>,
    #[serde(default)]
    pub tag: Option<Tag>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GeneAnnotation {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub chromosome: Option<String>,
    #[serde(default)]
    pub gene_type: Option<String>,
}

/// One gene/GEM correlation result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultRow {
    pub id: u64,
    pub gene: String,
    pub gem: String,
    pub correlation: f64,
    #[serde(default)]
    pub p_value: Option<f64>,
    #[serde(default)]
    pub adjusted_p_value: Option<f64>,
    #[serde(default)]
    pub gene_extra: Option<GeneAnnotation>,
}

/// Paginated response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub count: u64,
    pub results: Vec<T>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            count: 0,
            results: vec![],
        }
    }
}

/// Wire value of `status.code` for a successful request.
pub const STATUS_SUCCESS: i32 = 1;

/// Backend failure codes the UI distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainCode {
    ExperimentDoesNotExist,
    GeneOrGemNotFound,
    NotEnoughSamples,
    Other(i32),
}

impl From<i32> for DomainCode {
    fn from(v: i32) -> Self {
        match v {
            1 => DomainCode::ExperimentDoesNotExist,
            2 => DomainCode::GeneOrGemNotFound,
            3 => DomainCode::NotEnoughSamples,
            other => DomainCode::Other(other),
        }
    }
}

impl DomainCode {
    pub fn alert_message(self) -> Option<&'static str> {
        match self {
            DomainCode::ExperimentDoesNotExist => Some("The experiment does not exist"),
            DomainCode::GeneOrGemNotFound => {
                Some("The gene or GEM was not found in the experiment data")
            }
            DomainCode::NotEnoughSamples => Some("There are not enough samples to run this analysis"),
            DomainCode::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseStatus {
    pub code: i32,
    #[serde(default)]
    pub internal_code: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `{ status, data }` body used by the secondary-analysis endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T> {
    pub status: ResponseStatus,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Unwraps the payload, turning a non-success status into a domain error.
    pub fn into_result(self) -> Result<T> {
        if self.status.code != STATUS_SUCCESS {
            return Err(OmixError::Domain {
                code: DomainCode::from(self.status.internal_code.unwrap_or_default()),
                message: self.status.message,
            });
        }
        self.data.ok_or_else(|| OmixError::Domain {
            code: DomainCode::Other(0),
            message: Some("response carried no data".to_string()),
        })
    }
}
