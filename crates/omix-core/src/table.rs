//! Table-control state for a result table.
//!
//! Every change goes through [`TableControl::apply`], which returns a fresh
//! control plus whether the change needs a re-fetch. Nothing is mutated in
//! place, so each transition can be checked in isolation.

use serde::{Deserialize, Serialize};

use crate::models::{CorrelationMethod, CorrelationType, ExperimentType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

/// Ordered multi-column sort. Earlier keys win ties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    fields: Vec<SortField>,
}

impl SortOrder {
    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn direction_of(&self, field: &str) -> Option<SortDirection> {
        self.fields
            .iter()
            .find(|f| f.field == field)
            .map(|f| f.direction)
    }

    /// Column-header click: absent → ascending (appended) → descending →
    /// removed.
    pub fn toggled(&self, field: &str) -> SortOrder {
        let mut fields = self.fields.clone();
        match fields.iter().position(|f| f.field == field) {
            None => fields.push(SortField {
                field: field.to_string(),
                direction: SortDirection::Ascending,
            }),
            Some(idx) => match fields[idx].direction {
                SortDirection::Ascending => fields[idx].direction = SortDirection::Descending,
                SortDirection::Descending => {
                    fields.remove(idx);
                }
            },
        }
        SortOrder { fields }
    }

    /// Parses `field` / `-field` specs, dropping later duplicates.
    pub fn from_specs<I, S>(specs: I) -> SortOrder
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fields: Vec<SortField> = vec![];
        for spec in specs {
            let spec = spec.as_ref().trim();
            let (field, direction) = match spec.strip_prefix('-') {
                Some(rest) => (rest, SortDirection::Descending),
                None => (spec, SortDirection::Ascending),
            };
            if field.is_empty() || fields.iter().any(|f| f.field == field) {
                continue;
            }
            fields.push(SortField {
                field: field.to_string(),
                direction,
            });
        }
        SortOrder { fields }
    }

    /// The `ordering` query value: comma-separated, `-` marks descending.
    pub fn to_ordering(&self) -> String {
        self.fields
            .iter()
            .map(|f| match f.direction {
                SortDirection::Ascending => f.field.clone(),
                SortDirection::Descending => format!("-{}", f.field),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Filter part of the table state.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterChange {
    Text(String),
    CorrelationType(CorrelationType),
    CoefficientThreshold(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableAction {
    /// Pagination: the page is taken verbatim (clamped to 1).
    SetPage(u32),
    SetPageSize(u32),
    Filter {
        change: FilterChange,
        /// `false` keeps the current page.
        reset_page: bool,
    },
    ToggleSort(String),
    SetSort(SortOrder),
    SetHighPrecision(bool),
    /// Clears filters and sort.
    Clean,
    /// Clears filters, keeps sort.
    ResetFilters,
}

impl TableAction {
    pub fn filter(change: FilterChange) -> Self {
        TableAction::Filter {
            change,
            reset_page: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableControl {
    pub page_number: u32,
    pub page_size: u32,
    pub text_filter: String,
    pub sort: SortOrder,
    pub correlation_type: CorrelationType,
    pub coefficient_threshold: f64,
    pub show_high_precision: bool,
}

/// Result of [`TableControl::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct TableUpdate {
    pub control: TableControl,
    pub needs_fetch: bool,
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_COEFFICIENT_THRESHOLD: f64 = 0.7;

impl Default for TableControl {
    fn default() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }
}

impl TableControl {
    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            page_number: 1,
            page_size: page_size.max(1),
            text_filter: String::new(),
            sort: SortOrder::default(),
            correlation_type: CorrelationType::Both,
            coefficient_threshold: DEFAULT_COEFFICIENT_THRESHOLD,
            show_high_precision: false,
        }
    }

    pub fn apply(&self, action: TableAction) -> TableUpdate {
        let mut next = self.clone();
        let needs_fetch = match action {
            TableAction::SetPage(page) => {
                next.page_number = page.max(1);
                true
            }
            TableAction::SetPageSize(size) => {
                next.page_size = size.max(1);
                next.page_number = 1;
                true
            }
            TableAction::Filter { change, reset_page } => {
                match change {
                    FilterChange::Text(text) => next.text_filter = text,
                    FilterChange::CorrelationType(t) => next.correlation_type = t,
                    FilterChange::CoefficientThreshold(v) => {
                        next.coefficient_threshold = v.clamp(0.0, 1.0)
                    }
                }
                if reset_page {
                    next.page_number = 1;
                }
                true
            }
            TableAction::ToggleSort(field) => {
                next.sort = self.sort.toggled(&field);
                true
            }
            TableAction::SetSort(order) => {
                next.sort = order;
                true
            }
            TableAction::SetHighPrecision(on) => {
                next.show_high_precision = on;
                false
            }
            TableAction::Clean => {
                next = next.without_filters();
                next.sort = SortOrder::default();
                true
            }
            TableAction::ResetFilters => {
                next = next.without_filters();
                true
            }
        };
        TableUpdate {
            control: next,
            needs_fetch,
        }
    }

    fn without_filters(self) -> TableControl {
        let defaults = TableControl::with_page_size(self.page_size);
        TableControl {
            page_number: 1,
            text_filter: defaults.text_filter,
            correlation_type: defaults.correlation_type,
            coefficient_threshold: defaults.coefficient_threshold,
            ..self
        }
    }

    /// Query parameters for the result-rows endpoint.
    pub fn result_query(&self, experiment_id: u64) -> Vec<(&'static str, String)> {
        let mut q = vec![
            ("experiment_id", experiment_id.to_string()),
            ("page", self.page_number.to_string()),
            ("page_size", self.page_size.to_string()),
            ("search", self.text_filter.clone()),
            ("coefficientThreshold", self.coefficient_threshold.to_string()),
            ("correlationType", u8::from(self.correlation_type).to_string()),
        ];
        if !self.sort.is_empty() {
            q.push(("ordering", self.sort.to_ordering()));
        }
        q
    }
}

/// Query for the experiment listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentListQuery {
    pub page: u32,
    pub page_size: u32,
    pub search: String,
    pub sort: SortOrder,
    pub experiment_type: Option<ExperimentType>,
    pub tag: Option<u64>,
    pub correlation_method: Option<CorrelationMethod>,
}

impl Default for ExperimentListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            search: String::new(),
            sort: SortOrder::from_specs(["-submit_date"]),
            experiment_type: None,
            tag: None,
            correlation_method: None,
        }
    }
}

impl ExperimentListQuery {
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut q = vec![
            ("page", self.page.max(1).to_string()),
            ("page_size", self.page_size.max(1).to_string()),
            ("search", self.search.clone()),
        ];
        if !self.sort.is_empty() {
            q.push(("ordering", self.sort.to_ordering()));
        }
        if let Some(t) = self.experiment_type {
            q.push(("type", u8::from(t).to_string()));
        }
        if let Some(tag) = self.tag {
            q.push(("tag", tag.to_string()));
        }
        if let Some(m) = self.correlation_method {
            q.push(("correlation_method", u8::from(m).to_string()));
        }
        q
    }
}
