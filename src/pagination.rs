use serde::Deserialize;

use crate::error::ApiError;
use crate::pipeline::SortOrder;
use crate::store::{FindQuery, TextSearch};

pub const DEFAULT_LIST_LIMIT: u64 = 5;
pub const MAX_LIMIT: u64 = 100;

fn default_list_limit() -> u64 {
    DEFAULT_LIST_LIMIT
}

/// Query string of a plain listing: `?skip=0&limit=5&sort=-created_at`.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: u64,
    #[serde(default = "default_list_limit")]
    pub limit: u64,
    pub sort: Option<String>,
}

/// Query string of a search: the needle plus a window.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(alias = "name", alias = "email")]
    pub query: String,
    #[serde(default)]
    pub skip: u64,
    #[serde(default = "default_list_limit")]
    pub limit: u64,
}

pub fn check_limit(limit: u64) -> Result<(), ApiError> {
    if limit == 0 || limit > MAX_LIMIT {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }
    Ok(())
}

/// Parses `field` or `-field`, accepting only `sortable` fields.
fn parse_sort(raw: &str, sortable: &[&str]) -> Result<(String, SortOrder), ApiError> {
    let (field, order) = match raw.strip_prefix('-') {
        Some(field) => (field, SortOrder::Descending),
        None => (raw, SortOrder::Ascending),
    };
    if !sortable.contains(&field) {
        return Err(ApiError::Validation(format!(
            "cannot sort by '{field}', expected one of: {}",
            sortable.join(", ")
        )));
    }
    Ok((field.to_string(), order))
}

impl ListQuery {
    pub fn into_find_query(self, sortable: &[&str]) -> Result<FindQuery, ApiError> {
        check_limit(self.limit)?;
        let sort = self
            .sort
            .as_deref()
            .map(|raw| parse_sort(raw, sortable))
            .transpose()?;
        Ok(FindQuery {
            search: None,
            sort,
            skip: self.skip,
            limit: self.limit,
        })
    }
}

impl SearchQuery {
    pub fn into_find_query(self, fields: &[&'static str]) -> Result<FindQuery, ApiError> {
        check_limit(self.limit)?;
        if self.query.trim().is_empty() {
            return Err(ApiError::Validation("search query must not be empty".into()));
        }
        Ok(FindQuery {
            search: Some(TextSearch {
                fields: fields.to_vec(),
                needle: self.query.trim().to_string(),
            }),
            sort: None,
            skip: self.skip,
            limit: self.limit,
        })
    }
}
