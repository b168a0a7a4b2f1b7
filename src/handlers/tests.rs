//! End-to-end tests for the HTTP surface: the real router against an
//! in-memory SQLite database, the fallback classifier and a temp upload dir.

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::classifier::preprocess::tests::solid_png;
use crate::config::Config;
use crate::db::{self, Backend};
use crate::{create_router, AppState};

const BOUNDARY: &str = "leafsense-test-boundary";

struct TestApp {
    router: Router,
    _uploads: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    async fn with_config(configure: impl FnOnce(&mut Config)) -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let mut config = Config::for_tests(uploads.path().to_path_buf());
        configure(&mut config);

        let pool = tokio_test::assert_ok!(db::create_pool(&config.database_url, 1).await);
        tokio_test::assert_ok!(db::run_migrations(&pool, Backend::Sqlite).await);
        tokio_test::assert_ok!(db::seed_plant_info(&pool).await);

        let router = create_router(AppState::new(pool, config));
        Self { router, _uploads: uploads }
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn json(&self, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    async fn book(&self, user_id: &str) -> i64 {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/appointments/",
                json!({
                    "user_id": user_id,
                    "name": "Asha",
                    "email": "asha@example.com",
                    "date": "15/12/2024",
                    "time": "10:30 AM",
                    "reason": "Persistent cough"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["id"].as_i64().unwrap()
    }
}

fn multipart(uri: &str, fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    if let Some((content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"leaf.png\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post(uri)
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn health_reports_fallback_model() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], false);
    assert_eq!(body["model_type"], "feature_hash");
}

#[tokio::test]
async fn model_info_and_class_names() {
    let app = TestApp::new().await;

    let (_, info) = app.get("/model/info").await;
    assert_eq!(info["num_classes"], 10);
    assert_eq!(info["input_shape"], json!([1, 64, 64, 3]));
    assert_eq!(info["confidence_threshold"], 0.5);
    assert_eq!(info["preprocessing"], "RGB conversion, resize to 64x64, normalize by /255.0");

    let (status, plants) = app.get("/plants").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plants.as_array().unwrap().len(), 10);
    assert_eq!(plants[0], "Basale");
}

#[tokio::test]
async fn predict_returns_distribution_over_all_classes() {
    let app = TestApp::new().await;
    let png = solid_png(32, 32, [40, 170, 60]);
    let (status, body) = app.send(multipart("/predict", &[], Some(("image/png", &png[..])))).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let all = body["all_predictions"].as_object().unwrap();
    assert_eq!(all.len(), 10);
    assert_eq!(all.keys().next().map(String::as_str), Some("Basale"));
    let total: f64 = all.values().map(|v| v.as_f64().unwrap()).sum();
    assert!((total - 1.0).abs() < 1e-2);

    assert_eq!(body["model_type"], "feature_hash");
    assert!(body["predicted_class"].is_string());
    assert!(body["safety_note"].as_str().unwrap().contains("Never consume unknown plants"));

    // Same bytes, same answer
    let (_, again) = app.send(multipart("/predict", &[], Some(("image/png", &png[..])))).await;
    assert_eq!(again["all_predictions"], body["all_predictions"]);
}

#[tokio::test]
async fn predict_rejects_bad_uploads() {
    let app = TestApp::new().await;

    let (status, body) = app.send(multipart("/predict", &[], None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file uploaded");

    let png = solid_png(4, 4, [1, 2, 3]);
    let (status, _) = app.send(multipart("/predict", &[], Some(("text/plain", &png[..])))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(multipart("/predict", &[], Some(("image/png", &b"definitely not a png"[..]))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Image preprocessing failed"));
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let app = TestApp::with_config(|config| config.body_limit_bytes = 1024).await;
    let big = vec![0u8; 8 * 1024];

    let (status, body) = app.send(multipart("/predict", &[], Some(("image/png", &big[..])))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["status"], 413);
}

#[tokio::test]
async fn user_prediction_is_stored_with_image() {
    let app = TestApp::new().await;
    let png = solid_png(16, 16, [200, 30, 30]);

    let (status, body) = app
        .send(multipart("/api/predict", &[("user_id", "user-7")], Some(("image/png", &png[..]))))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "success");
    let image_url = body["data"]["image_url"].as_str().unwrap().to_string();
    assert!(image_url.starts_with("uploads/predictions/"));

    let (status, _) = app.get(&format!("/{image_url}")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, history) = app.get("/api/predictions/user/user-7").await;
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["id"], body["data"]["prediction_id"]);
    assert_eq!(history[0]["prediction_result"], body["data"]["predicted_class"]);

    let (_, all) = app.get("/api/predictions").await;
    assert_eq!(all.as_array().unwrap().len(), 1);

    let (status, _) = app
        .send(multipart("/api/predict", &[], Some(("image/png", &png[..]))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn plant_lookup_is_case_insensitive() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/plant/neem").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plant_name"], "Neem");
    assert!(body["dosage_guidance"].as_str().unwrap().contains("consultation"));

    let (status, _) = app.get("/api/plant/SINENSIS").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/api/plant/Mandrake").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);

    let (_, names) = app.get("/api/plants").await;
    assert_eq!(names, json!(["Betle", "Neem", "sinensis"]));
}

#[tokio::test]
async fn feedback_roundtrip() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(Method::POST, "/api/feedback/", json!({"user_id": "u1", "message": "Great app"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Feedback received successfully");

    app.json(Method::POST, "/api/feedback", json!({"user_id": "u2", "message": "Needs tulsi"}))
        .await;

    let (status, _) = app
        .json(Method::POST, "/api/feedback/", json!({"user_id": "u1", "message": ""}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, all) = app.get("/api/feedback/").await;
    assert_eq!(all.as_array().unwrap().len(), 2);
    assert_eq!(all[0]["user_id"], "u2");

    let (_, mine) = app.get("/api/feedback/user/u1").await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["message"], "Great app");
}

#[tokio::test]
async fn appointment_lifecycle() {
    let app = TestApp::new().await;
    let id = app.book("user-1").await;

    let (_, appointment) = app.get(&format!("/api/appointments/{id}")).await;
    assert_eq!(appointment["status"], "pending");
    assert!(appointment.get("hidden_from_user").is_none());

    let (_, pending) = app.get("/api/appointments/pending").await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let uri = format!("/api/appointments/{id}");
    let (status, body) = app.json(Method::PATCH, &uri, json!({"status": "approved"})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Appointment approved successfully");
    assert_eq!(body["data"]["meet_link"], format!("https://meet.google.com/mock-{id}"));

    let (status, _) = app.json(Method::PATCH, &uri, json!({"status": "rejected"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app.json(Method::PATCH, &uri, json!({"status": "approved"})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let cancel = Request::post(format!("/cancel_appointment/{id}")).body(Body::empty()).unwrap();
    let (status, body) = app.send(cancel).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");

    let cancel = Request::post(format!("/cancel_appointment/{id}")).body(Body::empty()).unwrap();
    let (status, body) = app.send(cancel).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Appointment is already cancelled");

    let (_, appointment) = app.get(&uri).await;
    assert_eq!(appointment["meet_link"], format!("https://meet.google.com/mock-{id}"));

    let (_, pending) = app.get("/api/appointments/pending").await;
    assert!(pending.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn appointment_validation_and_missing_records() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/appointments",
            json!({
                "user_id": "u1",
                "name": "Asha",
                "email": "asha@example.com",
                "date": "tomorrow",
                "reason": "Checkup"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("date"));

    let (status, _) = app.get("/api/appointments/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .json(Method::PATCH, "/api/appointments/999", json!({"status": "approved"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn hiding_is_per_owner() {
    let app = TestApp::new().await;
    let id = app.book("owner").await;
    let uri = format!("/api/appointments/{id}/hide");

    let (status, _) = app.json(Method::POST, &uri, json!({"user_id": "intruder"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.json(Method::POST, &uri, json!({"user_id": "owner"})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, mine) = app.get("/api/appointments/user/owner").await;
    assert!(mine.as_array().unwrap().is_empty());

    let (_, all) = app.get("/api/appointments/").await;
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn admin_delete_removes_record() {
    let app = TestApp::new().await;
    let id = app.book("u1").await;

    let req = Request::delete(format!("/admin/appointments/{id}")).body(Body::empty()).unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/api/appointments/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = Request::delete(format!("/admin/appointments/{id}")).body(Body::empty()).unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_token_guards_moderation() {
    let app = TestApp::with_config(|c| c.admin_token = Some("s3cret".to_string())).await;
    let id = app.book("u1").await;
    let uri = format!("/api/appointments/{id}");

    // Reads stay open
    let (status, _) = app.get(&uri).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.json(Method::PATCH, &uri, json!({"status": "approved"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = Request::patch(&uri)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, "Bearer nope")
        .body(Body::from(r#"{"status":"approved"}"#))
        .unwrap();
    let (status, _) = app.send(wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let right = Request::patch(&uri)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, "Bearer s3cret")
        .body(Body::from(r#"{"status":"approved"}"#))
        .unwrap();
    let (status, _) = app.send(right).await;
    assert_eq!(status, StatusCode::OK);

    let req = Request::delete(format!("/admin/appointments/{id}")).body(Body::empty()).unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_crud_and_image_upload() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/profile/",
            json!({"user_id": "u1", "name": "Asha", "email": "asha@example.com", "state": "Kerala"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["name"], "Asha");

    let (status, _) = app.json(Method::POST, "/api/profile", json!({"user_id": "u1"})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .json(Method::POST, "/api/profile/", json!({"user_id": "u2", "email": "nope"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.json(Method::PUT, "/api/profile/u1", json!({"phone": "12345"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phone"], "12345");
    assert_eq!(body["data"]["name"], "Asha");
    assert_eq!(body["data"]["state"], "Kerala");

    let (status, _) = app.json(Method::PUT, "/api/profile/ghost", json!({"name": "x"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let png = solid_png(8, 8, [10, 200, 10]);
    let (status, body) = app
        .send(multipart("/api/profile/u1/image", &[], Some(("image/png", &png[..]))))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let url = body["data"]["profile_image_url"].as_str().unwrap().to_string();
    assert!(url.starts_with("uploads/profiles/") && url.ends_with(".png"));

    let (_, profile) = app.get("/api/profile/u1").await;
    assert_eq!(profile["profile_image_url"], url.as_str());

    let (status, _) = app
        .send(multipart("/api/profile/u1/image", &[], Some(("image/png", &b"plain text"[..]))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/profile/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, profiles) = app.get("/api/profiles").await;
    assert_eq!(profiles.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn stats_count_everything() {
    let app = TestApp::new().await;
    let first = app.book("u1").await;
    app.book("u2").await;
    app.json(Method::PATCH, &format!("/api/appointments/{first}"), json!({"status": "approved"}))
        .await;
    app.json(Method::POST, "/api/feedback/", json!({"user_id": "u1", "message": "hi"}))
        .await;
    app.json(Method::POST, "/api/profile/", json!({"user_id": "u1"})).await;

    let (status, stats) = app.get("/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        stats,
        json!({
            "total_predictions": 0,
            "total_appointments": 2,
            "total_feedback": 1,
            "total_profiles": 1,
            "pending_appointments": 1,
            "approved_appointments": 1
        })
    );
}
