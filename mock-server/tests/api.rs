use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_server::{app, DEMO_HASH, DEMO_LOGIN};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(uri: &str, cookie: Option<&str>, body: &str) -> Request<String> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(http::header::COOKIE, cookie);
    }
    builder.body(body.to_string()).unwrap()
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<String> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(http::header::COOKIE, cookie);
    }
    builder.body(String::new()).unwrap()
}

fn login_body(login: &str, hash: &str) -> String {
    format!(r#"{{"USER_LOGIN":"{login}","USER_HASH":"{hash}"}}"#)
}

/// Log in on `app` and return the `name=value` part of the session cookie.
async fn login(app: &Router) -> String {
    let resp = app
        .clone()
        .oneshot(json_request(
            "/private/api/auth.php?type=json",
            None,
            &login_body(DEMO_LOGIN, DEMO_HASH),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp
        .headers()
        .get(http::header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("session_id="));
    cookie
}

// --- login ---

#[tokio::test]
async fn login_with_demo_credentials_sets_cookie() {
    let app = app();
    let resp = app
        .oneshot(json_request(
            "/private/api/auth.php",
            None,
            &login_body(DEMO_LOGIN, DEMO_HASH),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp.headers().get(http::header::SET_COOKIE).unwrap();
    assert!(set_cookie.to_str().unwrap().contains("Path=/"));
    let body = body_json(resp).await;
    assert_eq!(body["response"]["auth"], true);
}

#[tokio::test]
async fn login_with_wrong_hash_returns_401() {
    let app = app();
    let resp = app
        .oneshot(json_request(
            "/private/api/auth.php",
            None,
            &login_body(DEMO_LOGIN, "wrong"),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get(http::header::SET_COOKIE).is_none());
    let body = body_json(resp).await;
    assert_eq!(body["response"]["auth"], false);
}

// --- session ---

#[tokio::test]
async fn pipelines_without_session_return_401() {
    let app = app();
    let resp = app
        .oneshot(get_request("/private/api/v2/json/pipelines/list", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_session_returns_401() {
    let app = app();
    let resp = app
        .oneshot(get_request(
            "/api/v2/leads",
            Some("session_id=00000000-0000-0000-0000-000000000000"),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- pipelines ---

#[tokio::test]
async fn update_unknown_pipeline_returns_404() {
    let app = app();
    let cookie = login(&app).await;
    let resp = app
        .oneshot(json_request(
            "/private/api/v2/json/pipelines/set",
            Some(&cookie),
            r#"{"request":{"pipelines":{"update":{"99":{"name":"x","is_main":false,"sort":1}}}}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_unknown_pipeline_returns_404() {
    let app = app();
    let cookie = login(&app).await;
    let resp = app
        .oneshot(json_request(
            "/private/api/v2/json/pipelines/delete",
            Some(&cookie),
            r#"{"request":{"id":99}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bad_id_filter_returns_400() {
    let app = app();
    let cookie = login(&app).await;
    let resp = app
        .oneshot(get_request(
            "/private/api/v2/json/pipelines/list?id=abc",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- leads ---

#[tokio::test]
async fn empty_lead_list_returns_204() {
    let app = app();
    let cookie = login(&app).await;
    let resp = app
        .oneshot(get_request("/api/v2/leads?type=json&limit_rows=500", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn lead_for_unknown_pipeline_returns_400() {
    let app = app();
    let cookie = login(&app).await;
    let resp = app
        .oneshot(json_request(
            "/api/v2/leads",
            Some(&cookie),
            r#"{"add":[{"name":"Deal","pipeline_id":42,"status_id":1}]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- full lifecycle ---

#[tokio::test]
async fn pipeline_and_lead_lifecycle() {
    let app = app();
    let cookie = login(&app).await;

    // add pipeline
    let resp = app
        .clone()
        .oneshot(json_request(
            "/private/api/v2/json/pipelines/set?type=json",
            Some(&cookie),
            r##"{"request":{"pipelines":{"add":[{"name":"Sales","is_main":true,"sort":1,
                "statuses":{"new":{"color":"#fff","name":"New","sort":10}}}]}}}"##,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let pipeline_id = body["response"]["pipelines"]["add"][0]["id"].as_i64().unwrap();

    // get single pipeline
    let resp = app
        .clone()
        .oneshot(get_request(
            &format!("/private/api/v2/json/pipelines/list?type=json&id={pipeline_id}"),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let pipeline = &body["response"]["pipelines"][pipeline_id.to_string()];
    assert_eq!(pipeline["name"], "Sales");
    assert_eq!(pipeline["statuses"]["new"]["name"], "New");

    // update without statuses keeps the old ones
    let resp = app
        .clone()
        .oneshot(json_request(
            "/private/api/v2/json/pipelines/set",
            Some(&cookie),
            &format!(
                r#"{{"request":{{"pipelines":{{"update":{{"{pipeline_id}":{{"name":"Renamed","is_main":false,"sort":2}}}}}}}}}}"#
            ),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(get_request("/private/api/v2/json/pipelines/list", Some(&cookie)))
        .await
        .unwrap();
    let body = body_json(resp).await;
    let pipeline = &body["response"]["pipelines"][pipeline_id.to_string()];
    assert_eq!(pipeline["name"], "Renamed");
    assert_eq!(pipeline["is_main"], false);
    assert_eq!(pipeline["statuses"]["new"]["sort"], 10);

    // add lead
    let resp = app
        .clone()
        .oneshot(json_request(
            "/api/v2/leads",
            Some(&cookie),
            &format!(r#"{{"add":[{{"name":"Deal A","pipeline_id":{pipeline_id},"status_id":10,"sale":500}}]}}"#),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let lead_id = body["_embedded"]["items"][0]["id"].as_i64().unwrap();

    // move lead
    let resp = app
        .clone()
        .oneshot(json_request(
            "/api/v2/leads",
            Some(&cookie),
            &format!(r#"{{"update":[{{"id":{lead_id},"status_id":20,"updated_at":1700000000}}]}}"#),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // get single lead
    let resp = app
        .clone()
        .oneshot(get_request(&format!("/api/v2/leads?id={lead_id}"), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let lead = &body["_embedded"]["items"][0];
    assert_eq!(lead["status_id"], 20);
    assert_eq!(lead["updated_at"], 1_700_000_000);
    assert_eq!(lead["sale"], 500);

    // delete pipeline drops its leads
    let resp = app
        .clone()
        .oneshot(json_request(
            "/private/api/v2/json/pipelines/delete",
            Some(&cookie),
            &format!(r#"{{"request":{{"id":{pipeline_id}}}}}"#),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(get_request("/api/v2/leads", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}
