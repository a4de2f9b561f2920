//! HTTP Dispatcher: turns a claimed task into an outbound HTTP call and
//! normalizes the response into a result payload or a typed error.
//!
//! This is the single choke-point through which every downstream call
//! flows — every worker routes its dispatch through `Dispatcher::dispatch`,
//! never constructing its own `reqwest::Client` request.

use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

use td_config::DownstreamConfig;
use td_schemas::{ClaimedTask, HttpMethod};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid downstream url: {0}")]
    UrlJoin(#[from] url::ParseError),

    /// Downstream returned a non-2xx status. Carries the raw response body
    /// so the caller (the worker) can attempt to parse it as JSON before
    /// falling back to a `{"detail": ...}` wrapper.
    #[error("downstream returned http status {status}")]
    HttpStatus { status: u16, body: Vec<u8> },

    #[error("downstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Builds the shared `reqwest::Client` used for every outbound call.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Resolve `task.service` to a base URL and append `task.route` onto it with
/// a single `/` separator, regardless of whether either side carries one.
///
/// This is plain string concatenation, not `Url::join` — `join` implements
/// RFC 3986 relative-reference merging, which drops the base URL's last path
/// segment whenever that path doesn't end in `/` (e.g. a gateway prefix like
/// `https://gw.example.com/ext/users` would lose `/users`). spec.md §4.3
/// defines the target as the literal `base(service) + "/" + route`, so the
/// base's full path is always kept.
pub fn resolve_url(downstream: &DownstreamConfig, task: &ClaimedTask) -> Result<url::Url, DispatchError> {
    let base = downstream.base_for(task.service);
    let route = task.route.trim_start_matches('/');
    let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), route);
    url::Url::parse(&joined).map_err(DispatchError::from)
}

/// Issue the outbound HTTP call for a claimed task and normalize the
/// downstream response per spec:
///
/// - GET/HEAD/OPTIONS: `params` serialized as query parameters.
/// - POST/PUT/DELETE/PATCH: `params` sent as a JSON body.
/// - 2xx + JSON body -> parsed JSON value.
/// - 2xx + non-JSON body -> `{"status_code": <code>, "text": <raw>}`.
/// - HEAD -> `{"status_code": <code>, "headers": {...}}`.
/// - OPTIONS -> `{"status_code": <code>, "headers": {...}, "text": <raw>}`.
/// - non-2xx -> `DispatchError::HttpStatus`.
pub async fn dispatch(
    http: &reqwest::Client,
    downstream: &DownstreamConfig,
    task: &ClaimedTask,
) -> Result<Value, DispatchError> {
    let url = resolve_url(downstream, task)?;

    let mut builder = http.request(to_reqwest_method(task.method), url);
    builder = if task.method.sends_json_body() {
        builder.json(&task.params)
    } else {
        builder.query(&query_pairs(&task.params))
    };

    let resp = builder.send().await?;
    let status = resp.status();
    let headers = headers_to_json(resp.headers());
    let bytes = resp.bytes().await?;

    if !status.is_success() {
        return Err(DispatchError::HttpStatus {
            status: status.as_u16(),
            body: bytes.to_vec(),
        });
    }

    match task.method {
        HttpMethod::Head => Ok(serde_json::json!({
            "status_code": status.as_u16(),
            "headers": headers,
        })),
        HttpMethod::Options => Ok(serde_json::json!({
            "status_code": status.as_u16(),
            "headers": headers,
            "text": String::from_utf8_lossy(&bytes).into_owned(),
        })),
        _ => match serde_json::from_slice::<Value>(&bytes) {
            Ok(v) => Ok(v),
            Err(_) => Ok(serde_json::json!({
                "status_code": status.as_u16(),
                "text": String::from_utf8_lossy(&bytes).into_owned(),
            })),
        },
    }
}

fn to_reqwest_method(m: HttpMethod) -> reqwest::Method {
    match m {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
    }
}

/// Flatten a JSON object's top-level scalar values into query pairs. Params
/// are documented (spec.md §3) as a structured JSON mapping; non-scalar
/// values are stringified via their JSON representation.
fn query_pairs(params: &Value) -> Vec<(String, String)> {
    let Some(map) = params.as_object() else {
        return Vec::new();
    };
    map.iter()
        .map(|(k, v)| (k.clone(), value_to_query_string(v)))
        .collect()
}

fn value_to_query_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn headers_to_json(headers: &reqwest::header::HeaderMap) -> Value {
    let mut map = Map::new();
    for (name, value) in headers.iter() {
        let v = value.to_str().unwrap_or("").to_string();
        map.insert(name.as_str().to_string(), Value::String(v));
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use td_schemas::Service;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downstream_all_pointing_at(base: &str) -> DownstreamConfig {
        DownstreamConfig {
            user: url::Url::parse(base).unwrap(),
            payment: url::Url::parse(base).unwrap(),
            flight: url::Url::parse(base).unwrap(),
        }
    }

    fn task(method: HttpMethod, route: &str, params: Value) -> ClaimedTask {
        ClaimedTask {
            id: uuid::Uuid::new_v4(),
            task_id: uuid::Uuid::new_v4(),
            service: Service::User,
            route: route.to_string(),
            method,
            params,
        }
    }

    #[test]
    fn resolve_url_joins_with_single_slash_regardless_of_leading_slash() {
        let downstream = downstream_all_pointing_at("https://svc.example.com");
        let with_slash = task(HttpMethod::Get, "/create-user", Value::Null);
        let without_slash = task(HttpMethod::Get, "create-user", Value::Null);

        let a = resolve_url(&downstream, &with_slash).unwrap();
        let b = resolve_url(&downstream, &without_slash).unwrap();

        assert_eq!(a.as_str(), "https://svc.example.com/create-user");
        assert_eq!(b.as_str(), "https://svc.example.com/create-user");
    }

    #[test]
    fn resolve_url_keeps_a_base_path_prefix_without_trailing_slash() {
        let downstream = downstream_all_pointing_at("https://gw.example.com/ext/users");
        let t = task(HttpMethod::Get, "create-user", Value::Null);

        let url = resolve_url(&downstream, &t).unwrap();

        assert_eq!(url.as_str(), "https://gw.example.com/ext/users/create-user");
    }

    #[tokio::test]
    async fn post_sends_json_body_and_parses_json_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/create-user"))
            .and(body_json(serde_json::json!({"name": "Sean"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "u1"})))
            .mount(&server)
            .await;

        let downstream = downstream_all_pointing_at(&server.uri());
        let http = build_http_client(Duration::from_secs(5)).unwrap();
        let t = task(HttpMethod::Post, "create-user", serde_json::json!({"name": "Sean"}));

        let result = dispatch(&http, &downstream, &t).await.unwrap();
        assert_eq!(result, serde_json::json!({"id": "u1"}));
    }

    #[tokio::test]
    async fn get_sends_params_as_query_string() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lookup"))
            .and(query_param("name", "Sean"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"found": true})))
            .mount(&server)
            .await;

        let downstream = downstream_all_pointing_at(&server.uri());
        let http = build_http_client(Duration::from_secs(5)).unwrap();
        let t = task(HttpMethod::Get, "lookup", serde_json::json!({"name": "Sean"}));

        let result = dispatch(&http, &downstream, &t).await.unwrap();
        assert_eq!(result, serde_json::json!({"found": true}));
    }

    #[tokio::test]
    async fn non_2xx_status_is_a_typed_http_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/create-user"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({"error": "bad input"})))
            .mount(&server)
            .await;

        let downstream = downstream_all_pointing_at(&server.uri());
        let http = build_http_client(Duration::from_secs(5)).unwrap();
        let t = task(HttpMethod::Post, "create-user", serde_json::json!({}));

        let err = dispatch(&http, &downstream, &t).await.unwrap_err();
        match err {
            DispatchError::HttpStatus { status, body } => {
                assert_eq!(status, 422);
                let parsed: Value = serde_json::from_slice(&body).unwrap();
                assert_eq!(parsed, serde_json::json!({"error": "bad input"}));
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_2xx_body_falls_back_to_status_and_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/plain"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let downstream = downstream_all_pointing_at(&server.uri());
        let http = build_http_client(Duration::from_secs(5)).unwrap();
        let t = task(HttpMethod::Get, "plain", Value::Null);

        let result = dispatch(&http, &downstream, &t).await.unwrap();
        assert_eq!(
            result,
            serde_json::json!({"status_code": 200, "text": "not json"})
        );
    }

    #[tokio::test]
    async fn head_response_carries_status_and_headers_only() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/probe"))
            .respond_with(ResponseTemplate::new(200).insert_header("x-probe", "yes"))
            .mount(&server)
            .await;

        let downstream = downstream_all_pointing_at(&server.uri());
        let http = build_http_client(Duration::from_secs(5)).unwrap();
        let t = task(HttpMethod::Head, "probe", Value::Null);

        let result = dispatch(&http, &downstream, &t).await.unwrap();
        let obj = result.as_object().unwrap();
        assert_eq!(obj["status_code"], 200);
        assert_eq!(obj["headers"]["x-probe"], "yes");
        assert!(obj.get("text").is_none());
    }

    #[tokio::test]
    async fn options_response_carries_status_headers_and_text() {
        let server = MockServer::start().await;
        Mock::given(method("OPTIONS"))
            .and(path("/probe"))
            .respond_with(ResponseTemplate::new(200).set_body_string("allowed"))
            .mount(&server)
            .await;

        let downstream = downstream_all_pointing_at(&server.uri());
        let http = build_http_client(Duration::from_secs(5)).unwrap();
        let t = task(HttpMethod::Options, "probe", Value::Null);

        let result = dispatch(&http, &downstream, &t).await.unwrap();
        let obj = result.as_object().unwrap();
        assert_eq!(obj["status_code"], 200);
        assert_eq!(obj["text"], "allowed");
    }

    #[tokio::test]
    async fn transport_error_on_unreachable_host_is_typed_transport() {
        let downstream = downstream_all_pointing_at("http://127.0.0.1:1");
        let http = build_http_client(Duration::from_millis(200)).unwrap();
        let t = task(HttpMethod::Get, "anything", Value::Null);

        let err = dispatch(&http, &downstream, &t).await.unwrap_err();
        assert!(matches!(err, DispatchError::Transport(_)));
    }
}
