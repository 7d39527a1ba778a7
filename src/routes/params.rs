use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::OrderStatus,
};

#[derive(Debug, Default, Clone, Copy, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

pub const MAX_PAGE: i64 = 1_000_000;

impl Pagination {
    /// `(page, per_page, offset)` with page in 1..=MAX_PAGE and per_page in 1..=100.
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).clamp(1, MAX_PAGE);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortBy {
    CreatedAt,
    Name,
}

// Paging fields sit directly on each query struct: `serde(flatten)` loses
// the numeric types when decoding query strings.
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub q: Option<String>,
    pub sort_by: Option<ProductSortBy>,
    pub sort_order: Option<SortOrder>,
}

impl ProductQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<OrderStatus>,
    pub sort_order: Option<SortOrder>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// Admin listing. `ids`, `user_ids` and `statuses` are comma separated.
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminOrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub ids: Option<String>,
    pub user_ids: Option<String>,
    pub statuses: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl AdminOrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }

    pub fn ids(&self) -> AppResult<Vec<Uuid>> {
        split_list(self.ids.as_deref(), "ids", |raw| Uuid::parse_str(raw).ok())
    }

    pub fn user_ids(&self) -> AppResult<Vec<Uuid>> {
        split_list(self.user_ids.as_deref(), "user_ids", |raw| {
            Uuid::parse_str(raw).ok()
        })
    }

    pub fn statuses(&self) -> AppResult<Vec<OrderStatus>> {
        split_list(self.statuses.as_deref(), "statuses", OrderStatus::parse)
    }
}

fn split_list<T>(
    raw: Option<&str>,
    field: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> AppResult<Vec<T>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            parse(part).ok_or_else(|| AppError::bad_request(format!("invalid {field} value: {part}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_is_clamped() {
        let p = Pagination {
            page: Some(0),
            per_page: Some(1000),
        };
        assert_eq!(p.normalize(), (1, 100, 0));
        assert_eq!(Pagination::default().normalize(), (1, 20, 0));
        let p = Pagination {
            page: Some(3),
            per_page: Some(10),
        };
        assert_eq!(p.normalize(), (3, 10, 20));
        let p = Pagination {
            page: Some(i64::MAX),
            per_page: Some(i64::MAX),
        };
        assert_eq!(p.normalize(), (MAX_PAGE, 100, (MAX_PAGE - 1) * 100));
        let p = Pagination {
            page: Some(i64::MIN),
            per_page: Some(i64::MIN),
        };
        assert_eq!(p.normalize(), (1, 1, 0));
    }

    #[test]
    fn admin_filters_parse_comma_lists() {
        let id = Uuid::new_v4();
        let query: AdminOrderListQuery =
            serde_urlencoded::from_str(&format!("ids={id},&statuses=pending,%20cancelled&page=2"))
                .unwrap();
        assert_eq!(query.ids().unwrap(), vec![id]);
        assert!(query.user_ids().unwrap().is_empty());
        assert_eq!(
            query.statuses().unwrap(),
            vec![OrderStatus::Pending, OrderStatus::Cancelled]
        );
        assert_eq!(query.pagination().normalize().0, 2);
    }

    #[test]
    fn bad_filter_values_are_rejected() {
        let query: AdminOrderListQuery = serde_urlencoded::from_str("statuses=lost").unwrap();
        assert!(matches!(query.statuses(), Err(AppError::BadRequest(_))));
        let query: AdminOrderListQuery = serde_urlencoded::from_str("user_ids=nope").unwrap();
        assert!(query.user_ids().is_err());
    }
}
