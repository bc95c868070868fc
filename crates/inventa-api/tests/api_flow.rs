use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use inventa_api::config::Config;
use inventa_api::state::AppStateInner;
use inventa_crypto::{hash, sign};

const ADMIN_TOKEN: &str = "test-admin-token";
const BOUNDARY: &str = "inventa-test-boundary";

fn app() -> Router {
    let config = Config {
        admin_token: Some(ADMIN_TOKEN.into()),
        ..Config::in_memory()
    };
    inventa_api::router(AppStateInner::new(config).unwrap())
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, body)
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, req).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, "api-flow-test");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn admin(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-admin-token", token)
        .body(Body::empty())
        .unwrap()
}

enum Part<'a> {
    File(&'a str, &'a str, &'a [u8]),
    Text(&'a str, &'a str),
}

fn multipart(uri: &str, token: Option<&str>, parts: &[Part]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File(name, filename, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

async fn register(app: &Router, username: &str, email: &str) -> (String, Value) {
    let (status, body) = send_json(
        app,
        json_request(
            "POST",
            "/api/register",
            None,
            json!({ "username": username, "email": email, "password": "correct horse" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    (body["token"].as_str().unwrap().to_string(), body["user"].clone())
}

async fn upload(app: &Router, token: &str, filename: &str, bytes: &[u8]) -> (StatusCode, Value) {
    send_json(
        app,
        multipart(
            "/api/upload",
            Some(token),
            &[
                Part::File("file", filename, bytes),
                Part::Text("description", "first draft"),
                Part::Text("documentType", "article"),
                Part::Text("workType", "human"),
            ],
        ),
    )
    .await
}

/// Value of a `Label: value` line in the proof certificate.
fn field<'a>(text: &'a str, label: &str) -> &'a str {
    let prefix = format!("{}: ", label);
    text.lines()
        .find_map(|line| line.strip_prefix(prefix.as_str()))
        .unwrap_or_else(|| panic!("missing {} in proof:\n{}", label, text))
}

#[tokio::test]
async fn health_is_public() {
    let app = app();
    let (status, body) = send_json(&app, get("/api/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn first_registration_wins_and_duplicates_are_rejected() {
    let app = app();
    let (alice, alice_user) = register(&app, "alice", "alice@example.com").await;
    let (bob, _) = register(&app, "bob", "bob@example.com").await;
    let content = b"the manuscript, chapter one";

    let (status, body) = upload(&app, &alice, "chapter1.txt", content).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let document = &body["document"];
    assert_eq!(document["fingerprint"], hash::fingerprint(content));
    assert_eq!(document["ownerId"], alice_user["id"]);
    assert_eq!(document["metadata"]["ownerName"], "alice");
    assert_eq!(document["metadata"]["documentType"], "article");

    let (status, body) = upload(&app, &bob, "copied.txt", content).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_registered_by_other");
    assert_eq!(body["existingDocument"]["id"], document["id"]);

    let (status, body) = upload(&app, &alice, "again.txt", content).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_registered_by_you");

    let (_, list) = send_json(&app, get("/api/documents", Some(&bob))).await;
    assert_eq!(list["count"], 0);
    let (_, list) = send_json(&app, get("/api/documents", Some(&alice))).await;
    assert_eq!(list["count"], 1);
}

#[tokio::test]
async fn verify_by_file_matches_verify_by_hash() {
    let app = app();
    let (alice, _) = register(&app, "alice", "alice@example.com").await;
    let content = b"%PDF-1.7 a small original work";
    let (status, _) = upload(&app, &alice, "work.pdf", content).await;
    assert_eq!(status, StatusCode::CREATED);

    let fingerprint = hash::fingerprint(content);

    let (status, by_file) = send_json(
        &app,
        multipart("/api/verify", None, &[Part::File("file", "work.pdf", content)]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, by_json) = send_json(
        &app,
        json_request("POST", "/api/verify", None, json!({ "hash": fingerprint })),
    )
    .await;
    let (_, by_path) = send_json(&app, get(&format!("/api/verify/{}", fingerprint), None)).await;

    for result in [&by_file, &by_json, &by_path] {
        assert_eq!(result["verified"], true);
        assert_eq!(result["fingerprint"], fingerprint.as_str());
        assert_eq!(result["owner"]["username"], "alice");
        assert_eq!(result["signatureValid"], true);
    }

    let (_, missing) = send_json(
        &app,
        get(&format!("/api/verify/{}", hash::fingerprint(b"other")), None),
    )
    .await;
    assert_eq!(missing["verified"], false);

    let (status, body) = send_json(&app, json_request("POST", "/api/verify", None, json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn only_the_owner_may_delete_or_download() {
    let app = app();
    let (alice, _) = register(&app, "alice", "alice@example.com").await;
    let (bob, _) = register(&app, "bob", "bob@example.com").await;
    let content = b"pixels";
    let (_, body) = upload(&app, &alice, "art.png", content).await;
    let id = body["document"]["id"].as_str().unwrap().to_string();

    let delete_as = |token: &str| {
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/documents/{}", id))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = send_json(&app, delete_as(&bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "not_owner");

    let (status, _) = send(&app, get(&format!("/api/documents/{}/download", id), Some(&bob))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, bytes) =
        send(&app, get(&format!("/api/documents/{}/download", id), Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, content);

    let (status, _) = send(&app, delete_as(&alice)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, delete_as(&alice)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn proof_certificate_carries_verifiable_signature() {
    let app = app();
    let (alice, user) = register(&app, "alice", "alice@example.com").await;
    let content = b"lyrics and chords";
    let (_, body) = upload(&app, &alice, "song.txt", content).await;
    let id = body["document"]["id"].as_str().unwrap().to_string();

    let (status, json_proof) =
        send_json(&app, get(&format!("/api/proof/{}", id), Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_proof["proof"]["ownerUsername"], "alice");

    let (status, text) =
        send(&app, get(&format!("/api/proof/{}?format=text", id), Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(text).unwrap();

    let fingerprint = field(&text, "Document Fingerprint");
    let owner_id = field(&text, "Owner ID");
    let public_key = field(&text, "Owner Public Key");
    let registered_at = field(&text, "Registered At");
    let generated_at = field(&text, "Proof Generated At");
    let proof_signature = field(&text, "Proof Signature");
    let registration_signature = field(&text, "Registration Signature");

    assert_eq!(fingerprint, hash::fingerprint(content));
    assert_eq!(owner_id, user["id"].as_str().unwrap());
    assert_eq!(public_key, user["publicKey"].as_str().unwrap());

    let message = sign::proof_message(fingerprint, registered_at, owner_id, generated_at);
    assert!(sign::verify(&message, proof_signature, public_key));

    let registration = sign::registration_message(fingerprint, registered_at, owner_id);
    assert!(sign::verify(&registration, registration_signature, public_key));

    // The JSON proof verifies on its own fields as well.
    let proof = &json_proof["proof"];
    let json_message = sign::proof_message(
        proof["fingerprint"].as_str().unwrap(),
        proof["registeredAt"].as_str().unwrap(),
        proof["ownerId"].as_str().unwrap(),
        proof["generatedAt"].as_str().unwrap(),
    );
    assert!(sign::verify(
        &json_message,
        proof["proofSignature"].as_str().unwrap(),
        proof["ownerPublicKey"].as_str().unwrap(),
    ));

    let (bob, _) = register(&app, "bob", "bob@example.com").await;
    let (status, body) = send_json(&app, get(&format!("/api/proof/{}", id), Some(&bob))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "not_owner");
}

#[tokio::test]
async fn rejected_requests_still_get_json_errors() {
    let app = app();
    let (alice, _) = register(&app, "alice", "alice@example.com").await;

    let (status, body) = send_json(&app, get("/api/proof/not-a-uuid", Some(&alice))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = send_json(
        &app,
        json_request("POST", "/api/login", None, json!({ "email": "alice@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = send_json(
        &app,
        admin("GET", "/api/admin/login-history?limit=lots", ADMIN_TOKEN),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn refresh_extends_the_session() {
    let app = app();
    let (status, registered) = send_json(
        &app,
        json_request(
            "POST",
            "/api/register",
            None,
            json!({ "username": "alice", "email": "alice@example.com", "password": "correct horse" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = registered["token"].as_str().unwrap();

    let (status, refreshed) =
        send_json(&app, json_request("POST", "/api/refresh", Some(token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["token"], token);
    assert!(
        refreshed["expiresAt"].as_str().unwrap() >= registered["expiresAt"].as_str().unwrap()
    );

    let (status, _) = send(&app, json_request("POST", "/api/refresh", None, json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_attempts_are_recorded_with_reasons() {
    let app = app();
    register(&app, "alice", "alice@example.com").await;

    let (status, unknown) = send_json(
        &app,
        json_request(
            "POST",
            "/api/login",
            None,
            json!({ "email": "nobody@example.com", "password": "whatever1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, wrong) = send_json(
        &app,
        json_request(
            "POST",
            "/api/login",
            None,
            json!({ "email": "ALICE@example.com", "password": "wrong password" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown["error"], wrong["error"]);

    let (status, ok) = send_json(
        &app,
        json_request(
            "POST",
            "/api/login",
            None,
            json!({ "email": "alice@example.com", "password": "correct horse" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = ok["token"].as_str().unwrap().to_string();

    let (status, _) = send_json(&app, json_request("POST", "/api/logout", Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, get("/api/me", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, history) =
        send_json(&app, admin("GET", "/api/admin/login-history?limit=10", ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["count"], 5);

    let events = history["history"].as_array().unwrap();
    let reasons: Vec<&str> = events
        .iter()
        .filter_map(|e| e["failReason"].as_str())
        .collect();
    assert!(reasons.contains(&"User not found"));
    assert!(reasons.contains(&"Invalid password"));
    assert_eq!(events[0]["action"], "logout");
    assert_eq!(events[0]["userAgent"], "api-flow-test");

    let (_, stats) = send_json(&app, admin("GET", "/api/admin/stats", ADMIN_TOKEN)).await;
    assert_eq!(stats["stats"]["users"], 1);
    assert_eq!(stats["stats"]["logins"]["failedLogins"], 2);
}

#[tokio::test]
async fn duplicate_accounts_are_rejected() {
    let app = app();
    register(&app, "alice", "alice@example.com").await;

    let (status, body) = send_json(
        &app,
        json_request(
            "POST",
            "/api/register",
            None,
            json!({ "username": "alice2", "email": "Alice@Example.com", "password": "long enough" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "email_taken");

    let (status, body) = send_json(
        &app,
        json_request(
            "POST",
            "/api/register",
            None,
            json!({ "username": "alice", "email": "other@example.com", "password": "long enough" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "username_taken");
}

#[tokio::test]
async fn admin_export_has_no_secrets() {
    let app = app();
    let (alice, _) = register(&app, "alice", "alice@example.com").await;
    upload(&app, &alice, "notes.md", b"# secret plans").await;

    let (status, _) = send(&app, admin("GET", "/api/admin/export", "wrong")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, export) = send_json(&app, admin("GET", "/api/admin/export", ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(export["data"]["users"].as_array().unwrap().len(), 1);
    assert_eq!(export["data"]["documents"].as_array().unwrap().len(), 1);

    let raw = export.to_string();
    for forbidden in ["password", "wrapped", "ciphertext", "privateKey", "secret plans"] {
        assert!(!raw.contains(forbidden), "export leaked {}", forbidden);
    }

    let (status, _) = send_json(&app, admin("DELETE", "/api/admin/data", ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, get("/api/me", Some(&alice))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (_, users) = send_json(&app, admin("GET", "/api/admin/users", ADMIN_TOKEN)).await;
    assert_eq!(users["count"], 0);
}

#[tokio::test]
async fn admin_api_is_disabled_without_token() {
    let app = inventa_api::router(AppStateInner::new(Config::in_memory()).unwrap());
    let (status, body) = send_json(&app, admin("GET", "/api/admin/users", "")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
}

#[tokio::test]
async fn upload_rejects_disallowed_extension_and_missing_session() {
    let app = app();
    let (alice, _) = register(&app, "alice", "alice@example.com").await;

    let (status, body) = upload(&app, &alice, "tool.exe", b"MZ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = send(
        &app,
        multipart("/api/upload", None, &[Part::File("file", "a.txt", b"a")]),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
