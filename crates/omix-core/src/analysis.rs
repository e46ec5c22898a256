//! Payloads of the secondary analyses shown for a selected result row.

use serde::{Deserialize, Serialize};

/// Significance level used to read the assumption tests.
pub const ASSUMPTION_ALPHA: f64 = 0.05;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Outlier {
    pub sample: String,
    pub value: f64,
}

/// Descriptive statistics and assumption tests for one gene/GEM pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatisticalProperties {
    pub gene_mean: f64,
    pub gem_mean: f64,
    pub gene_standard_deviation: f64,
    pub gem_standard_deviation: f64,
    /// Shapiro-Wilk p-values.
    pub gene_normality_p_value: f64,
    pub gem_normality_p_value: f64,
    /// Breusch-Pagan p-value.
    #[serde(default)]
    pub heteroscedasticity_p_value: Option<f64>,
    #[serde(default)]
    pub gene_outliers: Vec<Outlier>,
    #[serde(default)]
    pub gem_outliers: Vec<Outlier>,
    pub common_samples: u64,
}

/// Reading of the assumption tests, as shown in the Assumptions panel.
#[derive(Debug, Clone, PartialEq)]
pub struct Assumptions {
    pub gene_is_normal: bool,
    pub gem_is_normal: bool,
    /// `None` when the backend did not run the test.
    pub is_homoscedastic: Option<bool>,
    pub outliers: usize,
}

impl From<&StatisticalProperties> for Assumptions {
    fn from(p: &StatisticalProperties) -> Self {
        Self {
            gene_is_normal: p.gene_normality_p_value > ASSUMPTION_ALPHA,
            gem_is_normal: p.gem_normality_p_value > ASSUMPTION_ALPHA,
            is_homoscedastic: p.heteroscedasticity_p_value.map(|v| v > ASSUMPTION_ALPHA),
            outliers: p.gene_outliers.len() + p.gem_outliers.len(),
        }
    }
}

impl Assumptions {
    /// Whether a parametric method (Pearson) is a sound choice.
    pub fn supports_parametric(&self) -> bool {
        self.gene_is_normal && self.gem_is_normal && self.is_homoscedastic.unwrap_or(true)
    }
}

/// Paired expression values for the correlation chart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorrelationGraphData {
    pub gene_values: Vec<f64>,
    pub gem_values: Vec<f64>,
    #[serde(default)]
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MirnaTargetInteraction {
    pub id: u64,
    pub mirna: String,
    pub gene: String,
    pub score: f64,
    pub source_name: String,
    #[serde(default)]
    pub pubmeds: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MirnaDisease {
    pub id: u64,
    pub mirna: String,
    pub disease: String,
    #[serde(default)]
    pub pubmed_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MirnaDrug {
    pub id: u64,
    pub mirna: String,
    pub small_molecule: String,
    #[serde(default)]
    pub fda_approved: bool,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub pubmed_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct KaplanMeierPoint {
    pub time: f64,
    pub probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurvivalGroup {
    pub label: String,
    pub data: Vec<KaplanMeierPoint>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LogRankTest {
    pub test_statistic: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurvivalData {
    pub groups: Vec<SurvivalGroup>,
    #[serde(default)]
    pub log_rank: Option<LogRankTest>,
}

impl SurvivalData {
    /// Median survival time per group: the first time the curve drops to 0.5
    /// or below. `None` if it never does.
    pub fn median_survival(&self) -> Vec<(String, Option<f64>)> {
        self.groups
            .iter()
            .map(|g| {
                let median = g
                    .data
                    .iter()
                    .find(|p| p.probability <= 0.5)
                    .map(|p| p.time);
                (g.label.clone(), median)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(gene_p: f64, gem_p: f64, hetero: Option<f64>) -> StatisticalProperties {
        StatisticalProperties {
            gene_mean: 1.0,
            gem_mean: 2.0,
            gene_standard_deviation: 0.3,
            gem_standard_deviation: 0.4,
            gene_normality_p_value: gene_p,
            gem_normality_p_value: gem_p,
            heteroscedasticity_p_value: hetero,
            gene_outliers: vec![Outlier {
                sample: "TCGA-01".into(),
                value: 9.5,
            }],
            gem_outliers: vec![],
            common_samples: 120,
        }
    }

    #[test]
    fn test_assumptions_from_properties() {
        let a = Assumptions::from(&props(0.2, 0.6, Some(0.3)));
        assert!(a.gene_is_normal && a.gem_is_normal);
        assert_eq!(a.is_homoscedastic, Some(true));
        assert_eq!(a.outliers, 1);
        assert!(a.supports_parametric());

        let b = Assumptions::from(&props(0.01, 0.6, None));
        assert!(!b.gene_is_normal);
        assert_eq!(b.is_homoscedastic, None);
        assert!(!b.supports_parametric());
    }

    #[test]
    fn test_median_survival() {
        let data = SurvivalData {
            groups: vec![
                SurvivalGroup {
                    label: "high".into(),
                    data: vec![
                        KaplanMeierPoint { time: 0.0, probability: 1.0 },
                        KaplanMeierPoint { time: 12.0, probability: 0.7 },
                        KaplanMeierPoint { time: 30.0, probability: 0.45 },
                    ],
                },
                SurvivalGroup {
                    label: "low".into(),
                    data: vec![KaplanMeierPoint { time: 0.0, probability: 1.0 }],
                },
            ],
            log_rank: None,
        };
        assert_eq!(
            data.median_survival(),
            vec![("high".to_string(), Some(30.0)), ("low".to_string(), None)]
        );
    }
}
