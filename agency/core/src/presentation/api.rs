// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agency HTTP API
//!
//! Peer agencies deliver message batches here; the AMS uses the agent
//! endpoints to place and remove agents.
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | GET | `/api/alive` | 200 |
//! | GET | `/api/agency` | 200 + agency descriptor |
//! | POST | `/api/agency/agents` | 201, 409 on duplicate id |
//! | GET | `/api/agency/agents/{id}/status` | 200 + status, 404 if not local |
//! | DELETE | `/api/agency/agents/{id}` | 200, 404 if not local |
//! | PUT | `/api/agency/agents/{id}/custom` | 200, 404 if not local |
//! | POST | `/api/agency/msgs` | 201 |
//!
//! Unknown paths, unsupported methods and malformed agent ids answer 405.
//! Bodies that fail to parse answer 400.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::application::agency::{Agency, AgencyError};
use crate::domain::agent::{AgentId, AgentInfo};
use crate::domain::message::AclMessage;

pub fn app(agency: Arc<Agency>) -> Router {
    Router::new()
        .route("/api/alive", get(alive))
        .route("/api/agency", get(get_agency))
        .route("/api/agency/agents", post(create_agents))
        .route("/api/agency/agents/{id}", delete(delete_agent))
        .route("/api/agency/agents/{id}/status", get(agent_status))
        .route("/api/agency/agents/{id}/custom", put(update_custom))
        .route("/api/agency/msgs", post(receive_msgs))
        .fallback(not_allowed)
        .method_not_allowed_fallback(not_allowed)
        .layer(TraceLayer::new_for_http())
        .with_state(agency)
}

/// The AMS posts either a single agent or a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum AgentInfoBody {
    Many(Vec<AgentInfo>),
    One(Box<AgentInfo>),
}

fn error_response(status: StatusCode, message: impl ToString) -> Response {
    (status, Json(json!({ "error": message.to_string() }))).into_response()
}

fn agency_error(e: AgencyError) -> Response {
    let status = match &e {
        AgencyError::UnknownAgent(_) => StatusCode::NOT_FOUND,
        AgencyError::DuplicateAgent(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e)
}

fn parse_id(raw: &str) -> Result<AgentId, Response> {
    raw.parse::<AgentId>()
        .map_err(|_| error_response(StatusCode::METHOD_NOT_ALLOWED, format!("invalid agent id '{}'", raw)))
}

async fn not_allowed() -> Response {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

async fn alive() -> StatusCode {
    StatusCode::OK
}

async fn get_agency(State(agency): State<Arc<Agency>>) -> Response {
    Json(agency.info()).into_response()
}

async fn create_agents(State(agency): State<Arc<Agency>>, body: Bytes) -> Response {
    let agents = match serde_json::from_slice::<AgentInfoBody>(&body) {
        Ok(AgentInfoBody::Many(agents)) => agents,
        Ok(AgentInfoBody::One(agent)) => vec![*agent],
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    for agent in agents {
        let id = agent.id;
        if let Err(e) = agency.create_agent(agent).await {
            warn!(agent_id = %id, "Failed to create agent: {}", e);
            return agency_error(e);
        }
    }
    StatusCode::CREATED.into_response()
}

async fn agent_status(State(agency): State<Arc<Agency>>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match agency.agent_status(id) {
        Ok(status) => Json(status).into_response(),
        Err(e) => agency_error(e),
    }
}

async fn delete_agent(State(agency): State<Arc<Agency>>, Path(id): Path<String>) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match agency.delete_agent(id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => agency_error(e),
    }
}

async fn update_custom(
    State(agency): State<Arc<Agency>>,
    Path(id): Path<String>,
    custom: String,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match agency.update_agent_custom(id, custom).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => agency_error(e),
    }
}

async fn receive_msgs(State(agency): State<Arc<Agency>>, body: Bytes) -> Response {
    let msgs: Vec<AclMessage> = match serde_json::from_slice(&body) {
        Ok(msgs) => msgs,
        Err(e) => {
            debug!("Rejected message batch: {}", e);
            return error_response(StatusCode::BAD_REQUEST, e);
        }
    };
    agency.deliver_inbound(msgs).await;
    StatusCode::CREATED.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::agent::{Agent, AgentTask};
    use crate::domain::agent::{AgencyInfo, Status, StatusCode as AgentStatusCode};
    use crate::domain::node_config::AgencyConfig;
    use crate::domain::resolver::{AddressResolver, MessageTransport, ResolveError, TransportError};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use tower::ServiceExt;

    /// Records every message delivered to its default mailbox.
    #[derive(Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<(AgentId, String)>>>,
    }

    #[async_trait]
    impl AgentTask for Recorder {
        async fn run(&self, agent: Agent) -> anyhow::Result<()> {
            loop {
                tokio::select! {
                    _ = agent.terminated() => return Ok(()),
                    msg = agent.acl().recv_message_wait() => {
                        self.seen.lock().push((agent.id(), msg.content));
                    }
                }
            }
        }
    }

    struct Unreachable;

    #[async_trait]
    impl AddressResolver for Unreachable {
        async fn resolve_agent_peer(&self, agent: AgentId) -> Result<String, ResolveError> {
            Err(ResolveError::EmptyAddress(agent))
        }
    }

    #[async_trait]
    impl MessageTransport for Unreachable {
        async fn send(&self, peer: &str, _msgs: &[AclMessage]) -> Result<(), TransportError> {
            Err(TransportError::Rejected {
                peer: peer.to_string(),
                status: 503,
            })
        }
    }

    fn test_app() -> (Router, Arc<Agency>, Arc<Mutex<Vec<(AgentId, String)>>>) {
        let recorder = Recorder::default();
        let seen = recorder.seen.clone();
        let agency = Agency::builder(AgencyConfig::default(), Arc::new(recorder))
            .with_resolver(Arc::new(Unreachable))
            .with_transport(Arc::new(Unreachable))
            .build()
            .unwrap();
        (app(agency.clone()), agency, seen)
    }

    fn request(method: Method, uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_alive_and_agency_descriptor() {
        let (app, _agency, _) = test_app();

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/alive", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request(Method::GET, "/api/agency", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let info: AgencyInfo = body_json(response).await;
        assert_eq!(info.name, "mas-0-im-0-agency-0.mas0agencies");
        assert!(info.agents.is_empty());
    }

    #[tokio::test]
    async fn test_agent_endpoints() {
        let (app, agency, _) = test_app();

        let body = r#"[{"spec": {"name": "a"}, "id": 3}, {"spec": {"name": "b"}, "id": 4}]"#;
        let response = app
            .clone()
            .oneshot(request(Method::POST, "/api/agency/agents", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(agency.info().agents, vec![AgentId(3), AgentId(4)]);

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/api/agency/agents", r#"{"spec": {}, "id": 3}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/agency/agents/3/status", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let status: Status = body_json(response).await;
        assert_ne!(status.code, AgentStatusCode::Terminated);

        let response = app
            .clone()
            .oneshot(request(Method::DELETE, "/api/agency/agents/3", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request(Method::GET, "/api/agency/agents/3/status", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_inbound_messages_reach_local_agent() {
        let (app, agency, seen) = test_app();
        agency
            .create_agent(AgentInfo::new(AgentId(1), Default::default()))
            .await
            .unwrap();

        let body = r#"[{"receiver": 1, "content": "m1"}, {"receiver": 1, "content": "m2"}]"#;
        let response = app
            .oneshot(request(Method::POST, "/api/agency/msgs", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        for _ in 0..100 {
            if seen.lock().len() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let contents: Vec<String> = seen.lock().iter().map(|(_, c)| c.clone()).collect();
        assert_eq!(contents, vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_malformed_requests() {
        let (app, _agency, _) = test_app();

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/api/agency/msgs", "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/agency/msgs", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/agency/agents/abc/status", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = app
            .oneshot(request(Method::GET, "/api/unknown", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_custom_update() {
        let (app, agency, _) = test_app();
        let response = app
            .clone()
            .oneshot(request(Method::PUT, "/api/agency/agents/9/custom", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        agency
            .create_agent(AgentInfo::new(AgentId(9), Default::default()))
            .await
            .unwrap();
        let response = app
            .oneshot(request(Method::PUT, "/api/agency/agents/9/custom", r#"{"k": 1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
