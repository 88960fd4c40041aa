//! Query types shared by the backend and its callers

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::SaleStatus;

/// Filters accepted by the sale listing
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SaleFilter {
    pub status: Option<SaleStatus>,
    /// First day included (by creation date, UTC)
    pub from: Option<NaiveDate>,
    /// Last day included (by creation date, UTC)
    pub to: Option<NaiveDate>,
    /// Free text matched against id, notes and customer fields
    pub q: Option<String>,
}

impl SaleFilter {
    pub fn with_status(status: SaleStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Search text trimmed and lowercased, or `None` when blank
    pub fn normalized_query(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }
}

/// Filters accepted by the product listing
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductFilter {
    pub active: Option<bool>,
    /// Only active products with stock on hand
    #[serde(default)]
    pub available_only: bool,
    pub q: Option<String>,
}

impl ProductFilter {
    pub fn normalized_query(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }
}
