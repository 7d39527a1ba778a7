use serde::Serialize;
use utoipa::ToSchema;

use crate::routes::params::Pagination;

/// Paging information; all `None` on single-resource responses.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Meta {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub total: Option<i64>,
}

impl Meta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
            total: Some(total),
        }
    }

    /// Meta for a listing, with the same clamping the query used.
    pub fn paged(pagination: Pagination, total: i64) -> Self {
        let (page, per_page, _) = pagination.normalize();
        Self::new(page, per_page, total)
    }

    pub fn empty() -> Self {
        Self {
            page: None,
            per_page: None,
            total: None,
        }
    }
}

/// Envelope for every JSON response except the gateway acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }

    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::success(message, data, Some(Meta::empty()))
    }

    pub fn page(message: impl Into<String>, data: T, pagination: Pagination, total: i64) -> Self {
        Self::success(message, data, Some(Meta::paged(pagination, total)))
    }
}
