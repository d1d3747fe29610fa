//! Response DTOs - Buste di risposta comuni a tutte le API
//!
//! Successo: `{ success: true, data }`, liste: `{ success: true, data, pagination }`,
//! operazioni senza payload: `{ success: true, message }`.

use super::query::PageRequest;
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: &'static str) -> Self {
        Self {
            success: true,
            data,
            message: Some(message),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(request: PageRequest, total: i64) -> Self {
        let limit = i64::from(request.limit);
        Self {
            page: request.page,
            limit: request.limit,
            total,
            pages: (total + limit - 1) / limit,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct Paginated<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            success: true,
            data,
            pagination: Pagination::new(request, total),
        }
    }

    /// Converte gli elementi mantenendo la paginazione
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            success: self.success,
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

impl MessageResponse {
    pub fn new(message: &'static str) -> Self {
        Self {
            success: true,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_round_up() {
        let pagination = Pagination::new(PageRequest::new(Some(2), Some(20)), 41);
        assert_eq!(pagination.pages, 3);
        assert_eq!(pagination.page, 2);
    }

    #[test]
    fn empty_result_has_zero_pages() {
        let pagination = Pagination::new(PageRequest::new(None, None), 0);
        assert_eq!(pagination.pages, 0);
        assert_eq!(pagination.total, 0);
    }

    #[test]
    fn envelope_serializes_success_flag() {
        let body = serde_json::to_value(ApiResponse::new(5)).unwrap();
        assert_eq!(body, serde_json::json!({ "success": true, "data": 5 }));
    }
}
