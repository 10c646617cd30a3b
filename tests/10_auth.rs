mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

use school_api_rust::auth::{device_fingerprint, Identity, TokenService};
use school_api_rust::config::SecurityConfig;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = server
        .client
        .get(format!("{}/health", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn first_user_is_bootstrapped_then_creation_needs_a_token() -> Result<()> {
    let server = common::spawn_server().await?;
    let root_token = server.bootstrap_super_admin().await?;

    let identity = server.state.tokens.verify_long_token(&root_token).expect("valid token");
    assert!(matches!(identity, Identity::SuperAdmin { .. }));

    let (status, body) = server
        .post(
            "/api/user/createUser",
            None,
            json!({ "email": "intruder@school.edu", "password": common::PASSWORD, "role": "super_admin" }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "unauthorized");
    Ok(())
}

#[tokio::test]
async fn admins_cannot_create_users() -> Result<()> {
    let server = common::spawn_server().await?;
    let root = server.bootstrap_super_admin().await?;
    let school = server.create_school(&root, "Alpha").await?;
    let admin = server.create_admin(&root, "adm@alpha.edu", &school).await?;

    let (status, body) = server
        .post(
            "/api/user/createUser",
            Some(&admin),
            json!({ "email": "new@alpha.edu", "password": common::PASSWORD, "role": "admin", "schoolID": school }),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "forbidden");
    Ok(())
}

#[tokio::test]
async fn login_failures_are_uniform() -> Result<()> {
    let server = common::spawn_server().await?;
    server.bootstrap_super_admin().await?;

    let (wrong_status, wrong_body) = server
        .post("/api/user/login", None, json!({ "email": "root@school.edu", "password": "Wrong9999" }))
        .await?;
    let (unknown_status, unknown_body) = server
        .post("/api/user/login", None, json!({ "email": "ghost@school.edu", "password": common::PASSWORD }))
        .await?;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);

    let (status, body) = server
        .post("/api/user/login", None, json!({ "email": "root@school.edu", "password": common::PASSWORD }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["user"].get("passwordHash").is_none());
    assert!(common::token_of(&body).is_ok());
    Ok(())
}

#[tokio::test]
async fn bad_tokens_get_the_same_answer() -> Result<()> {
    let server = common::spawn_server().await?;
    server.bootstrap_super_admin().await?;

    let foreign = TokenService::new(&SecurityConfig {
        long_token_secret: "someone-elses-secret".into(),
        short_token_secret: "another-secret".into(),
        ..SecurityConfig::default()
    })?;
    let forged = foreign.issue_long_token(&Identity::SuperAdmin { user_id: "root".into() })?;

    let (missing_status, missing_body) = server
        .send(reqwest::Method::GET, "/api/school/getAll", None, None)
        .await?;
    let (garbage_status, garbage_body) = server.get("/api/school/getAll", "not-a-token").await?;
    let (forged_status, forged_body) = server.get("/api/school/getAll", &forged).await?;

    for status in [missing_status, garbage_status, forged_status] {
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    assert_eq!(missing_body, garbage_body);
    assert_eq!(garbage_body, forged_body);
    Ok(())
}

#[tokio::test]
async fn bearer_header_is_accepted() -> Result<()> {
    let server = common::spawn_server().await?;
    let root = server.bootstrap_super_admin().await?;

    let res = server
        .client
        .get(format!("{}/api/school/getAll", server.base_url))
        .bearer_auth(&root)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn short_token_is_bound_to_the_device() -> Result<()> {
    let server = common::spawn_server().await?;
    let root = server.bootstrap_super_admin().await?;

    let res = server
        .client
        .post(format!("{}/api/token/createShortToken", server.base_url))
        .header("token", &root)
        .header("user-agent", "test-device/1.0")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    let short = body["data"]["shortToken"].as_str().expect("short token");

    let payload = server.state.tokens.verify_short_token(short).expect("verifiable");
    assert_eq!(payload.device_id, device_fingerprint(b"test-device/1.0"));

    // A short token is not an identity token.
    let (status, _) = server.get("/api/school/getAll", short).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}
