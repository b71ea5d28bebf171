//! The HTTP trigger endpoint.
//!
//! `GET /?input-bucket=<name>&output-bucket=<name>` starts a job; the JSON
//! body of the response mirrors the status code. `GET /health` answers
//! liveness probes.

use std::convert::Infallible;
use std::sync::Arc;

use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Deserialize;

use map_phase::starter::{StartResponse, Starter};

#[derive(Debug, Default, Deserialize)]
struct TriggerParams {
    #[serde(rename = "input-bucket")]
    input_bucket: Option<String>,
    #[serde(rename = "output-bucket")]
    output_bucket: Option<String>,
}

/// Route one request.
pub async fn route_request(
    starter: Arc<Starter>,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/") => Ok(trigger(starter, &req).await),
        (&Method::GET, "/health") => Ok(Response::new(Body::from("OK"))),
        _ => Ok(empty_response(StatusCode::NOT_FOUND)),
    }
}

async fn trigger(starter: Arc<Starter>, req: &Request<Body>) -> Response<Body> {
    let params: TriggerParams = req
        .uri()
        .query()
        .and_then(|q| serde_urlencoded::from_str(q).ok())
        .unwrap_or_default();

    let response = starter
        .start(params.input_bucket.as_deref(), params.output_bucket.as_deref())
        .await;
    json_response(&response)
}

fn json_response(response: &StartResponse) -> Response<Body> {
    let status = StatusCode::from_u16(response.response_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match serde_json::to_vec(response) {
        Ok(body) => Response::builder()
            .status(status)
            .header(hyper::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap_or_else(|_| empty_response(StatusCode::INTERNAL_SERVER_ERROR)),
        Err(_) => empty_response(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

fn empty_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}
