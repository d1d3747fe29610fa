//! Integration tests per anagrafica pazienti e record clinici
//!
//! Test per:
//! - /api/patients (lista filtrata per ruolo, creazione, aggiornamento, cancellazione)
//! - /api/prescriptions, /api/medical-records, /api/test-reports

#![cfg(feature = "db-tests")]

mod common;

#[cfg(test)]
mod patient_tests {
    use super::common::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::MySqlPool;

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_receptionist_creates_patient(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let body = json!({
            "first_name": "Sara",
            "last_name": "Gialli",
            "phone": "+39 333 5550000",
            "gender": "female",
            "allergies": ["latex"],
            "assigned_doctor_id": DOCTOR_CARLA
        });

        let response = server
            .post("/api/patients")
            .add_header("authorization", bearer(RECEPTIONIST))
            .json(&body)
            .await;

        response.assert_status(StatusCode::CREATED);
        let json: serde_json::Value = response.json();
        assert_eq!(json["data"]["clinic_id"], 1);
        assert_eq!(json["data"]["assigned_doctor_id"], DOCTOR_CARLA);
        assert_eq!(json["data"]["status"], "active");

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_doctor_becomes_assigned_doctor(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let body = json!({
            "first_name": "Luca",
            "last_name": "Blu",
            "phone": "+39 333 5550001"
        });

        let response = server
            .post("/api/patients")
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&body)
            .await;

        response.assert_status(StatusCode::CREATED);
        let json: serde_json::Value = response.json();
        assert_eq!(json["data"]["assigned_doctor_id"], DOCTOR_BRUNO);

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_assigned_doctor_must_be_a_doctor(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let body = json!({
            "first_name": "Luca",
            "last_name": "Blu",
            "phone": "+39 333 5550001",
            "assigned_doctor_id": NURSE
        });

        let response = server
            .post("/api/patients")
            .add_header("authorization", bearer(RECEPTIONIST))
            .json(&body)
            .await;

        response.assert_status_bad_request();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_invalid_phone_is_rejected(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let body = json!({
            "first_name": "Luca",
            "last_name": "Blu",
            "phone": "call me"
        });

        let response = server
            .post("/api/patients")
            .add_header("authorization", bearer(RECEPTIONIST))
            .json(&body)
            .await;

        response.assert_status_bad_request();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_accountant_cannot_create_patient(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let body = json!({
            "first_name": "Luca",
            "last_name": "Blu",
            "phone": "+39 333 5550001"
        });

        let response = server
            .post("/api/patients")
            .add_header("authorization", bearer(ACCOUNTANT))
            .json(&body)
            .await;

        response.assert_status_forbidden();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_doctor_sees_only_own_patients(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let response = server
            .get("/api/patients")
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["pagination"]["total"], 1);
        assert_eq!(json["data"][0]["patient_id"], 1);

        // il paziente di un altro medico risulta inesistente
        let response = server
            .get("/api/patients/2")
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .await;

        response.assert_status_not_found();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_staff_cannot_list_patients(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let response = server
            .get("/api/patients")
            .add_header("authorization", bearer(STAFF))
            .await;

        response.assert_status_forbidden();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_search_and_pagination(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let response = server
            .get("/api/patients")
            .add_query_param("search", "Rossi")
            .add_header("authorization", bearer(ADMIN))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["pagination"]["total"], 1);
        assert_eq!(json["data"][0]["last_name"], "Rossi");

        let response = server
            .get("/api/patients")
            .add_query_param("page", 2)
            .add_query_param("limit", 2)
            .add_header("authorization", bearer(ADMIN))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["pagination"]["total"], 3);
        assert_eq!(json["pagination"]["pages"], 2);
        assert_eq!(json["data"].as_array().unwrap().len(), 1);

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_update_patient(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let body = json!({ "address": "Via Milano 5", "status": "inactive" });

        let response = server
            .put("/api/patients/3")
            .add_header("authorization", bearer(NURSE))
            .json(&body)
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["data"]["address"], "Via Milano 5");
        assert_eq!(json["data"]["status"], "inactive");
        // i campi non inviati restano invariati
        assert_eq!(json["data"]["first_name"], "Paolo");

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_only_admin_deletes_patients(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let response = server
            .delete("/api/patients/3")
            .add_header("authorization", bearer(RECEPTIONIST))
            .await;

        response.assert_status_forbidden();

        let response = server
            .delete("/api/patients/3")
            .add_header("authorization", bearer(ADMIN))
            .await;

        response.assert_status_ok();

        let response = server
            .get("/api/patients/3")
            .add_header("authorization", bearer(ADMIN))
            .await;

        response.assert_status_not_found();

        Ok(())
    }
}

#[cfg(test)]
mod clinical_record_tests {
    use super::common::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::MySqlPool;

    fn prescription_body(patient_id: i32) -> serde_json::Value {
        json!({
            "patient_id": patient_id,
            "diagnosis": "Pulpite acuta",
            "medications": [{
                "name": "Amoxicillina",
                "dosage": "1g",
                "frequency": "ogni 12 ore",
                "duration": "6 giorni"
            }]
        })
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_doctor_writes_prescription(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let response = server
            .post("/api/prescriptions")
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&prescription_body(1))
            .await;

        response.assert_status(StatusCode::CREATED);
        let json: serde_json::Value = response.json();
        assert_eq!(json["data"]["doctor_id"], DOCTOR_BRUNO);
        assert_eq!(json["data"]["status"], "active");

        // l'altro medico non la vede
        let response = server
            .get("/api/prescriptions")
            .add_header("authorization", bearer(DOCTOR_CARLA))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["pagination"]["total"], 0);

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_doctor_cannot_prescribe_for_colleague(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let mut body = prescription_body(1);
        body["doctor_id"] = json!(DOCTOR_CARLA);

        let response = server
            .post("/api/prescriptions")
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&body)
            .await;

        response.assert_status_forbidden();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_nurse_cannot_prescribe(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let mut body = prescription_body(1);
        body["doctor_id"] = json!(DOCTOR_BRUNO);

        let response = server
            .post("/api/prescriptions")
            .add_header("authorization", bearer(NURSE))
            .json(&body)
            .await;

        response.assert_status_forbidden();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_prescription_for_foreign_patient(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let response = server
            .post("/api/prescriptions")
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&prescription_body(4))
            .await;

        response.assert_status_not_found();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_nurse_records_visit_for_doctor(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        // un ruolo non medico deve indicare il medico responsabile
        let body = json!({
            "patient_id": 2,
            "chief_complaint": "Dolore al molare inferiore",
            "vital_signs": { "heart_rate": 72 }
        });

        let response = server
            .post("/api/medical-records")
            .add_header("authorization", bearer(NURSE))
            .json(&body)
            .await;

        response.assert_status_bad_request();

        let body = json!({
            "patient_id": 2,
            "doctor_id": DOCTOR_CARLA,
            "chief_complaint": "Dolore al molare inferiore",
            "vital_signs": { "heart_rate": 72 }
        });

        let response = server
            .post("/api/medical-records")
            .add_header("authorization", bearer(NURSE))
            .json(&body)
            .await;

        response.assert_status(StatusCode::CREATED);
        let json: serde_json::Value = response.json();
        assert_eq!(json["data"]["doctor_id"], DOCTOR_CARLA);

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_receptionist_cannot_read_records(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let response = server
            .get("/api/medical-records")
            .add_header("authorization", bearer(RECEPTIONIST))
            .await;

        response.assert_status_forbidden();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_report_counts_flagged_results(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let body = json!({
            "patient_id": 1,
            "test_name": "Emocromo",
            "results": [
                { "parameter": "Emoglobina", "value": "13.5", "unit": "g/dL", "reference_range": "12-16" },
                { "parameter": "Leucociti", "value": "14.2", "unit": "10^3/uL", "flag": "high" }
            ]
        });

        let response = server
            .post("/api/test-reports")
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&body)
            .await;

        response.assert_status(StatusCode::CREATED);
        let json: serde_json::Value = response.json();
        assert_eq!(json["data"]["flagged_count"], 1);
        assert_eq!(json["data"]["test_name"], "Emocromo");

        Ok(())
    }
}
