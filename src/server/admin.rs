use super::AdminState;
use crate::pool::{Readiness, Tier};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use std::collections::BTreeMap;

pub(crate) type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

const JSON: &str = "application/json";
const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

fn respond(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<BoxBody> {
    let mut resp = Response::new(full_body(body));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}

pub fn handle_admin(
    req: Request<Incoming>,
    state: AdminState,
) -> Result<Response<BoxBody>, hyper::Error> {
    Ok(route(req.uri().path(), &state))
}

pub(crate) fn route(path: &str, state: &AdminState) -> Response<BoxBody> {
    match path {
        "/health" | "/healthz" => respond(StatusCode::OK, JSON, r#"{"status":"ok"}"#),

        "/ready" | "/readyz" => {
            let readiness = state.pool.check_readiness();
            let status = match readiness {
                Readiness::Failed => StatusCode::SERVICE_UNAVAILABLE,
                Readiness::Success | Readiness::Indeterminate => StatusCode::OK,
            };
            let body = serde_json::json!({
                "status": readiness.as_str(),
                "history": state.pool.history_len(),
            });
            respond(status, JSON, body.to_string())
        }

        "/address" => {
            let body = serde_json::json!({ "address": state.pool.get_available_address() });
            respond(StatusCode::OK, JSON, body.to_string())
        }

        "/tiers" => {
            let tiers = state.pool.tiers();
            let status = state.pool.status();
            // BTreeMap keeps the output stable across renders.
            let statuses: BTreeMap<&str, &str> = status
                .iter()
                .map(|(ep, s)| (ep.as_str(), s.as_str()))
                .collect();
            let mut body = serde_json::Map::new();
            for tier in [Tier::Default, Tier::SameAz, Tier::DiffAz] {
                body.insert(tier.as_str().to_string(), serde_json::json!(tiers.get(tier)));
            }
            body.insert("status".to_string(), serde_json::json!(statuses));
            body.insert(
                "lifecycle".to_string(),
                serde_json::json!(format!("{:?}", state.pool.lifecycle()).to_lowercase()),
            );

            let body = serde_json::to_string_pretty(&body).unwrap_or_default();
            respond(StatusCode::OK, JSON, body)
        }

        "/metrics" => {
            let body = state
                .metrics
                .as_ref()
                .map(|m| m.render())
                .unwrap_or_default();
            respond(StatusCode::OK, PROMETHEUS_TEXT, body)
        }

        _ => respond(StatusCode::NOT_FOUND, JSON, r#"{"error":"not found"}"#),
    }
}
