//! Integration tests per l'organizzazione interna della clinica
//!
//! Test per:
//! - /api/departments (responsabile, assegnazione dei membri)
//! - /api/trainings, /api/trainings/{id}/progress

#![cfg(feature = "db-tests")]

mod common;

#[cfg(test)]
mod department_tests {
    use super::common::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::MySqlPool;

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics")))]
    async fn test_department_lifecycle(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        // solo l'admin crea reparti
        let response = server
            .post("/api/departments")
            .add_header("authorization", bearer(NURSE))
            .json(&json!({ "name": "Ortodonzia" }))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);

        // il responsabile deve essere un membro della clinica
        let response = server
            .post("/api/departments")
            .add_header("authorization", bearer(ADMIN))
            .json(&json!({ "name": "Ortodonzia", "head_id": BRIGHT_OWNER }))
            .await;

        response.assert_status_bad_request();

        let response = server
            .post("/api/departments")
            .add_header("authorization", bearer(ADMIN))
            .json(&json!({ "name": "Ortodonzia", "head_id": DOCTOR_BRUNO }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let json: serde_json::Value = response.json();
        let department_id = json["data"]["department_id"].as_i64().unwrap();
        assert_eq!(json["data"]["head_id"], DOCTOR_BRUNO);
        assert_eq!(json["data"]["member_count"], 0);

        // nome duplicato nella stessa clinica
        let response = server
            .post("/api/departments")
            .add_header("authorization", bearer(ADMIN))
            .json(&json!({ "name": "Ortodonzia" }))
            .await;

        response.assert_status(StatusCode::CONFLICT);

        let response = server
            .patch(&format!("/api/clinics/current/members/{}", NURSE))
            .add_header("authorization", bearer(ADMIN))
            .json(&json!({ "department_id": department_id }))
            .await;

        response.assert_status_ok();

        // tutti i membri leggono i reparti
        let response = server
            .get(&format!("/api/departments/{}", department_id))
            .add_header("authorization", bearer(STAFF))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["data"]["member_count"], 1);

        // un'altra clinica non lo vede
        let response = server
            .get(&format!("/api/departments/{}", department_id))
            .add_header("authorization", bearer(BRIGHT_OWNER))
            .await;

        response.assert_status_not_found();

        let response = server
            .delete(&format!("/api/departments/{}", department_id))
            .add_header("authorization", bearer(ADMIN))
            .await;

        response.assert_status_ok();

        let response = server
            .get("/api/clinics/current/members")
            .add_header("authorization", bearer(ADMIN))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        let nurse = json["data"]
            .as_array()
            .unwrap()
            .iter()
            .find(|m| m["user_id"] == NURSE)
            .unwrap();
        assert!(nurse["department_id"].is_null());
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics")))]
    async fn test_member_department_must_be_local(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let response = server
            .post("/api/departments")
            .add_header("authorization", bearer(BRIGHT_OWNER))
            .json(&json!({ "name": "Igiene" }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let json: serde_json::Value = response.json();
        let foreign_department = json["data"]["department_id"].as_i64().unwrap();

        let response = server
            .patch(&format!("/api/clinics/current/members/{}", NURSE))
            .add_header("authorization", bearer(ADMIN))
            .json(&json!({ "department_id": foreign_department }))
            .await;

        response.assert_status_bad_request();
        Ok(())
    }
}

#[cfg(test)]
mod training_tests {
    use super::common::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::MySqlPool;

    async fn create_training(server: &axum_test::TestServer) -> i64 {
        let response = server
            .post("/api/trainings")
            .add_header("authorization", bearer(ADMIN))
            .json(&json!({
                "title": "Sterilizzazione strumenti",
                "category": "safety",
                "duration_hours": 4,
                "is_mandatory": true,
                "due_date": "2026-12-31"
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let json: serde_json::Value = response.json();
        json["data"]["training_id"].as_i64().unwrap()
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics")))]
    async fn test_trainings_are_managed_by_admins(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let response = server
            .post("/api/trainings")
            .add_header("authorization", bearer(STAFF))
            .json(&json!({ "title": "Primo soccorso" }))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);

        let response = server
            .post("/api/trainings")
            .add_header("authorization", bearer(ADMIN))
            .json(&json!({ "title": "Primo soccorso", "duration_hours": 0 }))
            .await;

        response.assert_status_bad_request();

        let training_id = create_training(&server).await;

        let response = server
            .get("/api/trainings")
            .add_header("authorization", bearer(STAFF))
            .add_query_param("mandatory", "true")
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["pagination"]["total"], 1);
        assert_eq!(json["data"][0]["duration_hours"], 4);

        let response = server
            .get(&format!("/api/trainings/{}", training_id))
            .add_header("authorization", bearer(BRIGHT_OWNER))
            .await;

        response.assert_status_not_found();
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics")))]
    async fn test_progress_only_moves_forward(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let training_id = create_training(&server).await;
        let progress_url = format!("/api/trainings/{}/progress", training_id);

        let response = server
            .put(&progress_url)
            .add_header("authorization", bearer(STAFF))
            .json(&json!({ "progress_percent": 40 }))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["data"]["user_id"], STAFF);
        assert_eq!(json["data"]["status"], "in_progress");

        let response = server
            .put(&progress_url)
            .add_header("authorization", bearer(STAFF))
            .json(&json!({ "progress_percent": 20 }))
            .await;

        response.assert_status_bad_request();

        let response = server
            .put(&progress_url)
            .add_header("authorization", bearer(STAFF))
            .json(&json!({ "progress_percent": 150 }))
            .await;

        response.assert_status_bad_request();

        let response = server
            .put(&progress_url)
            .add_header("authorization", bearer(STAFF))
            .json(&json!({ "progress_percent": 100 }))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["data"]["status"], "completed");
        assert!(!json["data"]["completed_at"].is_null());

        // completato resta completato
        let response = server
            .put(&progress_url)
            .add_header("authorization", bearer(STAFF))
            .json(&json!({ "progress_percent": 100 }))
            .await;

        response.assert_status_bad_request();

        // ognuno vede solo il proprio avanzamento, l'admin vede tutti
        let response = server
            .get(&progress_url)
            .add_header("authorization", bearer(NURSE))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert!(json["data"].as_array().unwrap().is_empty());

        let response = server
            .get(&progress_url)
            .add_header("authorization", bearer(ADMIN))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
        assert_eq!(json["data"][0]["user_id"], STAFF);

        // programma di un'altra clinica
        let response = server
            .put(&progress_url)
            .add_header("authorization", bearer(BRIGHT_OWNER))
            .json(&json!({ "progress_percent": 10 }))
            .await;

        response.assert_status_not_found();
        Ok(())
    }
}
