//! Verify request building and response parsing against the JSON vectors in
//! `test-vectors/`.
//!
//! Each vector names an operation and gives its input, the expected request,
//! a simulated response and either the expected payload or the expected
//! error. Bodies are compared as parsed JSON so key order does not matter.

use amocrm_core::{
    ApiError, Credentials, CrmClient, Endpoint, EndpointRegistry, HttpMethod, HttpRequest,
    HttpResponse, NewLead, NewPipeline, Payload, PipelineUpdate, ResponseFormat, UreqTransport,
    UrlBuilder,
};
use serde_json::Value;

const BASE_URL: &str = "https://acme.amocrm.ru";

fn client(credentials: Credentials) -> CrmClient {
    CrmClient::with_transport(
        credentials,
        UrlBuilder::new(EndpointRegistry::default(), "acme", ResponseFormat::Json),
        UreqTransport::new(),
    )
}

fn default_client() -> CrmClient {
    client(Credentials::new("user@example.com", "0123abcd"))
}

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        other => panic!("unknown method: {other}"),
    }
}

fn simulated_response(case: &Value) -> HttpResponse {
    let sim = &case["simulated_response"];
    HttpResponse {
        status: sim["status"].as_u64().unwrap() as u16,
        headers: Vec::new(),
        body: sim["body"].as_str().unwrap().as_bytes().to_vec(),
    }
}

fn check_request(name: &str, req: &HttpRequest, expected: &Value) {
    assert_eq!(
        req.method,
        parse_method(expected["method"].as_str().unwrap()),
        "{name}: method"
    );
    assert_eq!(
        req.url,
        format!("{BASE_URL}{}", expected["path"].as_str().unwrap()),
        "{name}: url"
    );
    match expected.get("body") {
        Some(body) => {
            let actual: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
            assert_eq!(&actual, body, "{name}: body");
        }
        None => assert!(req.body.is_none(), "{name}: body should be None"),
    }
}

fn check_result(name: &str, case: &Value, result: Result<Payload, ApiError>) {
    if let Some(expected_error) = case.get("expected_error") {
        let err = result.unwrap_err();
        let matched = match expected_error.as_str().unwrap() {
            "Unauthorized" => matches!(err, ApiError::Unauthorized { .. }),
            "NotFound" => matches!(err, ApiError::NotFound),
            "Http" => matches!(err, ApiError::Http { .. }),
            other => panic!("{name}: unknown expected_error: {other}"),
        };
        assert!(matched, "{name}: got {err:?}");
    } else {
        let payload = result.unwrap();
        assert_eq!(
            payload,
            Payload::Json(case["expected_result"].clone()),
            "{name}: parsed result"
        );
    }
}

fn load(raw: &str) -> Vec<Value> {
    let vectors: Value = serde_json::from_str(raw).unwrap();
    vectors["cases"].as_array().unwrap().clone()
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

#[test]
fn login_test_vectors() {
    for case in load(include_str!("../../test-vectors/login.json")) {
        let name = case["name"].as_str().unwrap();
        let credentials = Credentials::new(
            case["input"]["login"].as_str().unwrap(),
            case["input"]["hash"].as_str().unwrap(),
        );
        let c = client(credentials);

        let req = c.build_login().unwrap();
        check_request(name, &req, &case["expected_request"]);

        let result = c.parse_response(Endpoint::Login, simulated_response(&case));
        check_result(name, &case, result);
    }
}

// ---------------------------------------------------------------------------
// Pipelines
// ---------------------------------------------------------------------------

#[test]
fn pipeline_test_vectors() {
    let c = default_client();
    for case in load(include_str!("../../test-vectors/pipelines.json")) {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];

        let (endpoint, req) = match case["operation"].as_str().unwrap() {
            "get_pipelines" => (Endpoint::GetPipelines, c.build_get_pipelines()),
            "get_single_pipeline" => (
                Endpoint::GetPipelines,
                c.build_get_single_pipeline(input["id"].as_i64().unwrap()),
            ),
            "add_pipeline" => {
                let pipeline: NewPipeline = serde_json::from_value(input.clone()).unwrap();
                (Endpoint::SetPipelines, c.build_add_pipeline(&pipeline).unwrap())
            }
            "update_pipeline" => {
                // `statuses` in the input is ignored; it never reaches the wire.
                let update: PipelineUpdate = serde_json::from_value(input.clone()).unwrap();
                (
                    Endpoint::SetPipelines,
                    c.build_update_pipeline(input["id"].as_i64().unwrap(), &update)
                        .unwrap(),
                )
            }
            "delete_pipeline" => (
                Endpoint::DeletePipelines,
                c.build_delete_pipeline(input["id"].as_i64().unwrap()).unwrap(),
            ),
            other => panic!("{name}: unknown operation {other}"),
        };
        check_request(name, &req, &case["expected_request"]);

        let result = c.parse_response(endpoint, simulated_response(&case));
        check_result(name, &case, result);
    }
}

// ---------------------------------------------------------------------------
// Leads
// ---------------------------------------------------------------------------

#[test]
fn lead_test_vectors() {
    let c = default_client();
    for case in load(include_str!("../../test-vectors/leads.json")) {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];

        let req = match case["operation"].as_str().unwrap() {
            "add_lead" => {
                let lead = NewLead::new(
                    input["name"].as_str().unwrap(),
                    input["pipeline_id"].as_i64().unwrap(),
                    input["status_id"].as_i64().unwrap(),
                    input.get("extra").cloned(),
                )
                .unwrap();
                c.build_add_lead(lead).unwrap()
            }
            "get_leads" => c.build_get_leads(),
            "get_single_lead" => c.build_get_single_lead(input["id"].as_i64().unwrap()),
            other => panic!("{name}: unknown operation {other}"),
        };
        check_request(name, &req, &case["expected_request"]);

        let result = c.parse_response(Endpoint::SetLeads, simulated_response(&case));
        check_result(name, &case, result);
    }
}
