//! Extractors - `Json`, `Path` e `Query` con gli errori nel formato `{ success: false, message }`
//!
//! Sostituiscono quelli di axum negli handler: un body non valido, un parametro di path non
//! numerico o una query string malformata diventano `AppError` invece del testo semplice di axum.

use crate::core::AppError;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_macros::{FromRequest, FromRequestParts};
use serde::Serialize;
use tracing::warn;

#[derive(FromRequest, Debug)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(FromRequestParts, Debug)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

#[derive(FromRequestParts, Debug)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let details = rejection.body_text();
        warn!("Rejected request body: {}", details);
        let error = match rejection {
            JsonRejection::MissingJsonContentType(_) => Self::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Expected a JSON request body",
            ),
            _ => Self::bad_request("Invalid request body"),
        };
        error.with_details(details)
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        warn!("Rejected path parameters: {}", rejection.body_text());
        Self::bad_request("Invalid path parameter").with_details(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        warn!("Rejected query string: {}", rejection.body_text());
        Self::bad_request("Invalid query parameters").with_details(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        routing::{get, post},
    };
    use axum_test::TestServer;
    use serde::Deserialize;

    #[derive(Deserialize, Serialize)]
    struct Visit {
        patient_id: i32,
    }

    #[derive(Deserialize)]
    struct Window {
        months: Option<u32>,
    }

    fn server() -> TestServer {
        let app = Router::new()
            .route("/visits", post(|Json(visit): Json<Visit>| async move { Json(visit) }))
            .route(
                "/visits/{id}/teeth/{tooth}",
                get(|Path((id, tooth)): Path<(i32, u8)>| async move { format!("{id}-{tooth}") }),
            )
            .route(
                "/revenue",
                get(|Query(window): Query<Window>| async move {
                    window.months.unwrap_or_default().to_string()
                }),
            );
        TestServer::new(app).expect("Failed to create test server")
    }

    fn assert_envelope(body: &serde_json::Value, message: &str) {
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], message);
        assert!(body["details"].is_string());
    }

    #[tokio::test]
    async fn malformed_json_uses_the_error_envelope() {
        let response = server()
            .post("/visits")
            .content_type("application/json")
            .bytes("{not json".into())
            .await;

        response.assert_status_bad_request();
        assert_envelope(&response.json(), "Invalid request body");
    }

    #[tokio::test]
    async fn missing_fields_and_content_type() {
        let server = server();

        let response = server
            .post("/visits")
            .json(&serde_json::json!({ "other": 1 }))
            .await;
        response.assert_status_bad_request();
        assert_envelope(&response.json(), "Invalid request body");

        let response = server.post("/visits").text("patient_id=1").await;
        response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_envelope(&response.json(), "Expected a JSON request body");

        // il body valido passa invariato
        let response = server
            .post("/visits")
            .json(&serde_json::json!({ "patient_id": 3 }))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<serde_json::Value>()["patient_id"], 3);
    }

    #[tokio::test]
    async fn bad_path_parameters() {
        let server = server();

        let response = server.get("/visits/abc/teeth/11").await;
        response.assert_status_bad_request();
        assert_envelope(&response.json(), "Invalid path parameter");

        // 300 non sta in un u8
        let response = server.get("/visits/1/teeth/300").await;
        response.assert_status_bad_request();
        assert_envelope(&response.json(), "Invalid path parameter");

        server.get("/visits/1/teeth/46").await.assert_text("1-46");
    }

    #[tokio::test]
    async fn bad_query_string() {
        let server = server();

        let response = server.get("/revenue").add_query_param("months", "many").await;
        response.assert_status_bad_request();
        assert_envelope(&response.json(), "Invalid query parameters");

        server
            .get("/revenue")
            .add_query_param("months", 3)
            .await
            .assert_text("3");
    }
}
