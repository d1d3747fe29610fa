//! Integration tests per gli appuntamenti
//!
//! Test per:
//! - POST /api/appointments (sovrapposizioni per medico -> 409)
//! - PUT /api/appointments/{id} (riprogrammazione)
//! - PATCH /api/appointments/{id}/status (stati terminali)
//! - DELETE /api/appointments/{id} e collegamenti da fatture / prescrizioni

#![cfg(feature = "db-tests")]

mod common;

#[cfg(test)]
mod appointment_tests {
    use super::common::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;
    use sqlx::MySqlPool;

    async fn book(server: &TestServer, user_id: i32, body: serde_json::Value) -> serde_json::Value {
        let response = server
            .post("/api/appointments")
            .add_header("authorization", bearer(user_id))
            .json(&body)
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_overlapping_booking_is_rejected(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let created = book(
            &server,
            RECEPTIONIST,
            json!({
                "patient_id": 1,
                "doctor_id": DOCTOR_BRUNO,
                "start_time": "2030-03-04T10:00:00Z",
                "duration_minutes": 30
            }),
        )
        .await;
        assert_eq!(created["data"]["status"], "scheduled");

        let response = server
            .post("/api/appointments")
            .add_header("authorization", bearer(RECEPTIONIST))
            .json(&json!({
                "patient_id": 2,
                "doctor_id": DOCTOR_BRUNO,
                "start_time": "2030-03-04T10:15:00Z",
                "duration_minutes": 30
            }))
            .await;

        response.assert_status(StatusCode::CONFLICT);

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_adjacent_slots_and_other_doctors_are_free(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        book(
            &server,
            RECEPTIONIST,
            json!({
                "patient_id": 1,
                "doctor_id": DOCTOR_BRUNO,
                "start_time": "2030-03-04T10:00:00Z",
                "duration_minutes": 30
            }),
        )
        .await;

        // inizia esattamente quando finisce il precedente
        book(
            &server,
            RECEPTIONIST,
            json!({
                "patient_id": 2,
                "doctor_id": DOCTOR_BRUNO,
                "start_time": "2030-03-04T10:30:00Z"
            }),
        )
        .await;

        // stesso orario, medico diverso
        book(
            &server,
            RECEPTIONIST,
            json!({
                "patient_id": 2,
                "doctor_id": DOCTOR_CARLA,
                "start_time": "2030-03-04T10:00:00Z",
                "duration_minutes": 60
            }),
        )
        .await;

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_cancelled_appointment_frees_the_slot(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let created = book(
            &server,
            DOCTOR_BRUNO,
            json!({
                "patient_id": 1,
                "start_time": "2030-03-05T09:00:00Z",
                "duration_minutes": 45
            }),
        )
        .await;
        assert_eq!(created["data"]["doctor_id"], DOCTOR_BRUNO);
        let appointment_id = created["data"]["appointment_id"].as_i64().unwrap();

        server
            .patch(&format!("/api/appointments/{}/status", appointment_id))
            .add_header("authorization", bearer(RECEPTIONIST))
            .json(&json!({ "status": "cancelled" }))
            .await
            .assert_status_ok();

        book(
            &server,
            RECEPTIONIST,
            json!({
                "patient_id": 2,
                "doctor_id": DOCTOR_BRUNO,
                "start_time": "2030-03-05T09:00:00Z"
            }),
        )
        .await;

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_terminal_status_cannot_change(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let created = book(
            &server,
            RECEPTIONIST,
            json!({
                "patient_id": 1,
                "doctor_id": DOCTOR_BRUNO,
                "start_time": "2030-03-06T11:00:00Z"
            }),
        )
        .await;
        let appointment_id = created["data"]["appointment_id"].as_i64().unwrap();
        let status_url = format!("/api/appointments/{}/status", appointment_id);

        server
            .patch(&status_url)
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&json!({ "status": "completed" }))
            .await
            .assert_status_ok();

        let response = server
            .patch(&status_url)
            .add_header("authorization", bearer(RECEPTIONIST))
            .json(&json!({ "status": "scheduled" }))
            .await;

        response.assert_status_bad_request();

        // neanche la riprogrammazione è ammessa
        let response = server
            .put(&format!("/api/appointments/{}", appointment_id))
            .add_header("authorization", bearer(RECEPTIONIST))
            .json(&json!({ "start_time": "2030-03-07T11:00:00Z" }))
            .await;

        response.assert_status_bad_request();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_reschedule_checks_overlaps(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        book(
            &server,
            RECEPTIONIST,
            json!({
                "patient_id": 1,
                "doctor_id": DOCTOR_CARLA,
                "start_time": "2030-04-01T14:00:00Z",
                "duration_minutes": 60
            }),
        )
        .await;
        let second = book(
            &server,
            RECEPTIONIST,
            json!({
                "patient_id": 2,
                "doctor_id": DOCTOR_CARLA,
                "start_time": "2030-04-01T16:00:00Z",
                "duration_minutes": 30
            }),
        )
        .await;
        let url = format!(
            "/api/appointments/{}",
            second["data"]["appointment_id"].as_i64().unwrap()
        );

        let response = server
            .put(&url)
            .add_header("authorization", bearer(RECEPTIONIST))
            .json(&json!({ "start_time": "2030-04-01T14:30:00Z" }))
            .await;

        response.assert_status(StatusCode::CONFLICT);

        // allungare la durata senza toccare altri slot non entra in conflitto con sé stesso
        let response = server
            .put(&url)
            .add_header("authorization", bearer(RECEPTIONIST))
            .json(&json!({ "duration_minutes": 90 }))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["data"]["duration_minutes"], 90);

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_invalid_duration(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let response = server
            .post("/api/appointments")
            .add_header("authorization", bearer(RECEPTIONIST))
            .json(&json!({
                "patient_id": 1,
                "doctor_id": DOCTOR_BRUNO,
                "start_time": "2030-03-04T10:00:00Z",
                "duration_minutes": 3
            }))
            .await;

        response.assert_status_bad_request();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_staff_cannot_book(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let response = server
            .post("/api/appointments")
            .add_header("authorization", bearer(STAFF))
            .json(&json!({
                "patient_id": 1,
                "doctor_id": DOCTOR_BRUNO,
                "start_time": "2030-03-04T10:00:00Z"
            }))
            .await;

        response.assert_status_forbidden();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_doctor_sees_only_own_appointments(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        book(
            &server,
            RECEPTIONIST,
            json!({
                "patient_id": 1,
                "doctor_id": DOCTOR_BRUNO,
                "start_time": "2030-05-02T08:00:00Z"
            }),
        )
        .await;
        let other = book(
            &server,
            RECEPTIONIST,
            json!({
                "patient_id": 2,
                "doctor_id": DOCTOR_CARLA,
                "start_time": "2030-05-02T08:00:00Z"
            }),
        )
        .await;

        let response = server
            .get("/api/appointments")
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["pagination"]["total"], 1);
        assert_eq!(json["data"][0]["doctor_id"], DOCTOR_BRUNO);

        let response = server
            .get(&format!(
                "/api/appointments/{}",
                other["data"]["appointment_id"].as_i64().unwrap()
            ))
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .await;

        response.assert_status_not_found();

        // il filtro per data restringe la lista dell'admin
        let response = server
            .get("/api/appointments")
            .add_query_param("date", "2030-05-02")
            .add_header("authorization", bearer(ADMIN))
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["pagination"]["total"], 2);

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_list_until_last_calendar_day(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        book(
            &server,
            RECEPTIONIST,
            json!({
                "patient_id": 1,
                "doctor_id": DOCTOR_BRUNO,
                "start_time": "2030-06-03T09:00:00Z"
            }),
        )
        .await;

        let response = server
            .get("/api/appointments")
            .add_header("authorization", bearer(RECEPTIONIST))
            .add_query_param("to", "+262142-12-31")
            .await;

        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["pagination"]["total"], 1);

        let response = server
            .get("/api/payments")
            .add_header("authorization", bearer(ACCOUNTANT))
            .add_query_param("to", "+262142-12-31")
            .await;
        response.assert_status_ok();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_foreign_appointment_cannot_be_linked(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool.clone());
        let server = create_test_server(state.clone());

        // appuntamento della clinica BRIGHT (paziente 4)
        let foreign_id = sqlx::query(
            r#"
            INSERT INTO appointments (clinic_id, patient_id, doctor_id, start_time, created_by)
            VALUES (2, 4, ?, '2030-06-04 09:00:00', ?)
            "#,
        )
        .bind(BRIGHT_OWNER)
        .bind(BRIGHT_OWNER)
        .execute(&pool)
        .await?
        .last_insert_id();

        let response = server
            .post("/api/invoices")
            .add_header("authorization", bearer(RECEPTIONIST))
            .json(&json!({
                "patient_id": 1,
                "appointment_id": foreign_id,
                "items": [{ "description": "Visita", "quantity": 1, "unit_price": 60.0 }]
            }))
            .await;
        response.assert_status_bad_request();

        // appuntamento della stessa clinica ma di un altro paziente
        let other_patient = book(
            &server,
            RECEPTIONIST,
            json!({
                "patient_id": 2,
                "doctor_id": DOCTOR_BRUNO,
                "start_time": "2030-06-04T10:00:00Z"
            }),
        )
        .await;

        let response = server
            .post("/api/prescriptions")
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&json!({
                "patient_id": 1,
                "appointment_id": other_patient["data"]["appointment_id"],
                "diagnosis": "Gengivite",
                "medications": [{
                    "name": "Clorexidina",
                    "dosage": "0.2%",
                    "frequency": "2/day",
                    "duration": "7 days"
                }]
            }))
            .await;
        response.assert_status_bad_request();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_deleted_appointment_is_unlinked(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let created = book(
            &server,
            RECEPTIONIST,
            json!({
                "patient_id": 1,
                "doctor_id": DOCTOR_BRUNO,
                "start_time": "2030-06-05T09:00:00Z"
            }),
        )
        .await;
        let appointment_id = created["data"]["appointment_id"].as_i64().unwrap();

        let response = server
            .post("/api/invoices")
            .add_header("authorization", bearer(RECEPTIONIST))
            .json(&json!({
                "patient_id": 1,
                "appointment_id": appointment_id,
                "items": [{ "description": "Visita", "quantity": 1, "unit_price": 60.0 }]
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let invoice: serde_json::Value = response.json();
        assert_eq!(invoice["data"]["appointment_id"], appointment_id);
        let invoice_id = invoice["data"]["invoice_id"].as_i64().unwrap();

        server
            .delete(&format!("/api/appointments/{}", appointment_id))
            .add_header("authorization", bearer(RECEPTIONIST))
            .await
            .assert_status_ok();

        let response = server
            .get(&format!("/api/invoices/{}", invoice_id))
            .add_header("authorization", bearer(RECEPTIONIST))
            .await;
        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert!(json["data"]["appointment_id"].is_null());

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "clinics", "patients")))]
    async fn test_status_change_after_completion_is_rejected(pool: MySqlPool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let created = book(
            &server,
            RECEPTIONIST,
            json!({
                "patient_id": 1,
                "doctor_id": DOCTOR_BRUNO,
                "start_time": "2030-06-06T09:00:00Z"
            }),
        )
        .await;
        let status_url = format!(
            "/api/appointments/{}/status",
            created["data"]["appointment_id"].as_i64().unwrap()
        );

        server
            .patch(&status_url)
            .add_header("authorization", bearer(RECEPTIONIST))
            .json(&json!({ "status": "no_show" }))
            .await
            .assert_status_ok();

        let response = server
            .patch(&status_url)
            .add_header("authorization", bearer(DOCTOR_BRUNO))
            .json(&json!({ "status": "completed" }))
            .await;
        response.assert_status_bad_request();
        let json: serde_json::Value = response.json();
        assert_eq!(json["message"], "Appointment status can no longer change");

        Ok(())
    }
}
