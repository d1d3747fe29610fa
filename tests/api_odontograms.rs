//! Integration tests per gli odontogrammi
//!
//! Test per:
//! - POST /api/odontograms (versioni, copia della versione attiva)
//! - GET /api/odontograms/patient/{patient_id}[/history]
//! - PUT /api/odontograms/{id}/teeth/{tooth_number}
//! - POST/PATCH /api/odontograms/{id}/teeth/{tooth_number}/treatments
//! - POST /api/odontograms/{id}/activate

#![cfg(feature = "db-tests")]

mod common;

#[cfg(test)]
mod odontogram_tests {
    use super::common::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;
    use sqlx::MySqlPool;

    async fn create_chart(server: &TestServer, body: serde_json::Value) -> serde_json::Value {
        let response = server
            .post("/api/odontograms")
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&body)
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    fn chart_id(json: &serde_json::Value) -> i64 {
        json["data"]["odontogram_id"].as_i64().unwrap()
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_versions_and_active_chart(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let first = create_chart(
            &server,
            json!({
                "patient_id": 1,
                "teeth": [
                    { "tooth_number": 11, "status": "present" },
                    { "tooth_number": 36, "status": "crown", "notes": "Corona in ceramica" }
                ]
            }),
        )
        .await;
        assert_eq!(first["data"]["version"], 1);
        assert_eq!(first["data"]["is_active"], true);
        assert_eq!(first["data"]["doctor_id"], DOCTOR_BRUNO);

        let second = create_chart(
            &server,
            json!({ "patient_id": 1, "copy_from_active": true }),
        )
        .await;
        assert_eq!(second["data"]["version"], 2);
        assert_eq!(second["data"]["is_active"], true);
        // i denti della versione attiva vengono copiati
        assert_eq!(second["data"]["teeth"].as_array().unwrap().len(), 2);

        let response = server
            .get("/api/odontograms/patient/1")
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["data"]["odontogram_id"], second["data"]["odontogram_id"]);

        let response = server
            .get("/api/odontograms/patient/1/history")
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        let versions = json["data"].as_array().unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions.iter().filter(|v| v["is_active"] == true).count(), 1);

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_invalid_teeth_are_rejected(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        // dente deciduo in una dentizione permanente
        let response = server
            .post("/api/odontograms")
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&json!({
                "patient_id": 1,
                "teeth": [{ "tooth_number": 51, "status": "present" }]
            }))
            .await;

        response.assert_status_bad_request();

        // duplicati
        let response = server
            .post("/api/odontograms")
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&json!({
                "patient_id": 1,
                "teeth": [
                    { "tooth_number": 11, "status": "present" },
                    { "tooth_number": 11, "status": "missing" }
                ]
            }))
            .await;

        response.assert_status_bad_request();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_treatments_update_summary(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let chart = create_chart(&server, json!({ "patient_id": 1 })).await;
        let id = chart_id(&chart);

        let response = server
            .post(&format!("/api/odontograms/{}/teeth/26/treatments", id))
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&json!({
                "procedure": "Otturazione composita",
                "surfaces": ["occlusal", "mesial"],
                "estimated_cost": 120.0
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let json: serde_json::Value = response.json();
        let summary = &json["data"]["treatment_summary"];
        assert_eq!(summary["total_treatments"], 1);
        assert_eq!(summary["planned"], 1);
        assert_eq!(summary["estimated_total"], 120.0);
        // il dente non registrato viene creato come presente
        let tooth = &json["data"]["teeth"][0];
        assert_eq!(tooth["tooth_number"], 26);
        assert_eq!(tooth["status"], "present");
        let treatment_id = tooth["treatments"][0]["id"].as_u64().unwrap();

        let treatment_url = format!(
            "/api/odontograms/{}/teeth/26/treatments/{}",
            id, treatment_id
        );
        let response = server
            .patch(&treatment_url)
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&json!({ "status": "completed" }))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        let treatment = &json["data"]["teeth"][0]["treatments"][0];
        assert_eq!(treatment["status"], "completed");
        assert!(treatment["completed_at"].is_string());
        assert_eq!(json["data"]["treatment_summary"]["completed"], 1);
        assert_eq!(json["data"]["treatment_summary"]["completed_total"], 120.0);

        // un trattamento completato non si modifica più
        let response = server
            .patch(&treatment_url)
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&json!({ "estimated_cost": 90.0 }))
            .await;

        response.assert_status_bad_request();

        // trattamento inesistente
        let response = server
            .patch(&format!("/api/odontograms/{}/teeth/26/treatments/999", id))
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&json!({ "status": "cancelled" }))
            .await;

        response.assert_status_not_found();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_upsert_tooth(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let chart = create_chart(&server, json!({ "patient_id": 1 })).await;
        let id = chart_id(&chart);

        let response = server
            .put(&format!("/api/odontograms/{}/teeth/47", id))
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&json!({
                "status": "root_canal",
                "conditions": [{ "condition": "caries", "surfaces": ["distal"] }]
            }))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["data"]["teeth"][0]["status"], "root_canal");
        assert_eq!(json["data"]["teeth"][0]["conditions"][0]["condition"], "caries");

        let response = server
            .put(&format!("/api/odontograms/{}/teeth/19", id))
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&json!({ "status": "missing" }))
            .await;

        response.assert_status_bad_request();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_only_active_version_is_editable(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let first = create_chart(&server, json!({ "patient_id": 1 })).await;
        let first_id = chart_id(&first);
        create_chart(&server, json!({ "patient_id": 1 })).await;

        let response = server
            .put(&format!("/api/odontograms/{}/teeth/11", first_id))
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&json!({ "status": "missing" }))
            .await;

        response.assert_status_bad_request();

        // riattivando la prima versione torna modificabile
        let response = server
            .post(&format!("/api/odontograms/{}/activate", first_id))
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["data"]["is_active"], true);
        assert_eq!(json["data"]["version"], 1);

        let response = server
            .get("/api/odontograms/patient/1")
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["data"]["odontogram_id"], first_id);

        server
            .put(&format!("/api/odontograms/{}/teeth/11", first_id))
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&json!({ "status": "missing" }))
            .await
            .assert_status_ok();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_access_rules(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let chart = create_chart(&server, json!({ "patient_id": 1 })).await;
        let id = chart_id(&chart);

        // un altro medico non vede il grafico
        let response = server
            .get(&format!("/api/odontograms/{}", id))
            .add_header("authorization", bearer(DOCTOR_CARLA))
            .await;

        response.assert_status_not_found();

        // l'infermiere legge ma non scrive
        server
            .get(&format!("/api/odontograms/{}", id))
            .add_header("authorization", bearer(NURSE))
            .await
            .assert_status_ok();

        let response = server
            .post("/api/odontograms")
            .add_header("authorization", bearer(NURSE))
            .json(&json!({ "patient_id": 1, "doctor_id": DOCTOR_BRUNO }))
            .await;

        response.assert_status_forbidden();

        // paziente di un'altra clinica
        let response = server
            .post("/api/odontograms")
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&json!({ "patient_id": 4 }))
            .await;

        response.assert_status_not_found();

        // nessuna versione attiva
        let response = server
            .get("/api/odontograms/patient/3")
            .add_header("authorization", bearer(ADMIN))
            .await;

        response.assert_status_not_found();

        Ok(())
    }
}
