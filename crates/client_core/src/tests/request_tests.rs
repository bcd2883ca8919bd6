use super::*;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode as AxumStatus,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::{
    domain::{Availability, ExperienceTier, PersonId},
    protocol::{PersonBody, RequirementsBody},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::Mutex,
};

use crate::error::SessionFailure;

#[derive(Clone, Default)]
struct ServerState {
    received: Arc<Mutex<Vec<Value>>>,
}

fn sample_request() -> OptimizeRequest {
    OptimizeRequest {
        requirements: RequirementsBody {
            project_name: "Atlas".into(),
            team_size: 1,
            skills: vec!["Rust".into()],
            project_type: "web".into(),
            priority: "high".into(),
            timeline: None,
            budget: None,
        },
        personnel: vec![PersonBody {
            id: PersonId(1),
            name: "Alice Johnson".into(),
            skills: vec!["Rust".into()],
            experience: ExperienceTier::Senior,
            personality: "leadership".into(),
            mbti_type: Some("ENTJ".into()),
            experience_years: 8,
            availability: Availability::FullTime,
            hourly_rate: 85.0,
        }],
    }
}

fn result_body() -> Value {
    json!({
        "status": "success",
        "data": {
            "recommendations": [{
                "rank": 1,
                "team": { "members": [{ "person": { "name": "Alice Johnson" } }], "overallScore": 0.94 },
                "reasoning": ["skills"],
                "strengths": ["leadership"],
                "riskFactors": [],
                "aiInsights": "optimal performance"
            }],
            "metadata": { "totalCandidates": 1, "confidence": 0.94 },
            "aiAnalysis": "summary"
        }
    })
}

async fn spawn_server(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

async fn record_and_succeed(State(state): State<ServerState>, Json(body): Json<Value>) -> Json<Value> {
    state.received.lock().await.push(body);
    Json(result_body())
}

#[tokio::test]
async fn submit_posts_wire_body_and_returns_payload() {
    let state = ServerState::default();
    let app = Router::new()
        .route("/optimize-team", post(record_and_succeed))
        .with_state(state.clone());
    let base = spawn_server(app).await;
    let client = RequestClient::new(format!("{base}/"), Some(Duration::from_secs(5)));

    let payload = client.submit(&sample_request()).await.expect("submit");
    assert_eq!(payload.recommendations.len(), 1);
    assert_eq!(payload.recommendations[0].member_names(), vec!["Alice Johnson"]);
    assert_eq!(payload.metadata.total_candidates, Some(1));
    assert_eq!(payload.ai_analysis.as_deref(), Some("summary"));

    let received = state.received.lock().await.clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["requirements"]["projectName"], "Atlas");
    assert_eq!(received[0]["personnel"][0]["experienceYears"], 8);
}

#[tokio::test]
async fn non_success_with_detail_becomes_http_error() {
    let app = Router::new().route(
        "/optimize-team",
        post(|| async {
            (
                AxumStatus::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": "GOOGLE_API_KEY environment variable is required" })),
            )
        }),
    );
    let base = spawn_server(app).await;
    let client = RequestClient::new(base, None);

    let err = client.submit(&sample_request()).await.expect_err("must fail");
    assert_eq!(
        err,
        RequestError::Http {
            status: 500,
            detail: "GOOGLE_API_KEY environment variable is required".into(),
        }
    );
}

#[tokio::test]
async fn non_success_without_detail_falls_back_to_status_text() {
    let app = Router::new().route(
        "/optimize-team",
        post(|| async { (AxumStatus::BAD_GATEWAY, "upstream down") }),
    );
    let base = spawn_server(app).await;
    let client = RequestClient::new(base, None);

    let err = client.submit(&sample_request()).await.expect_err("must fail");
    assert_eq!(
        err,
        RequestError::Http {
            status: 502,
            detail: "HTTP 502: Bad Gateway".into(),
        }
    );
}

/// Answers one request with `500`, promising more body bytes than it sends,
/// then closes the connection.
async fn spawn_truncated_error_server() -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let Ok(read) = socket.read(&mut buf).await else {
                return;
            };
            if read == 0 {
                return;
            }
            request.extend_from_slice(&buf[..read]);
            if request_complete(&request) {
                break;
            }
        }
        let _ = socket
            .write_all(
                b"HTTP/1.1 500 Internal Server Error\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"det",
            )
            .await;
        let _ = socket.shutdown().await;
    });
    format!("http://{addr}")
}

fn request_complete(raw: &[u8]) -> bool {
    let Some(end) = raw.windows(4).position(|window| window == b"\r\n\r\n") else {
        return false;
    };
    let headers = String::from_utf8_lossy(&raw[..end]).to_ascii_lowercase();
    let body_len = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    raw.len() >= end + 4 + body_len
}

#[tokio::test]
async fn truncated_error_body_still_reports_http_status() {
    let base = spawn_truncated_error_server().await;
    let client = RequestClient::new(base, Some(Duration::from_secs(5)));

    let err = client.submit(&sample_request()).await.expect_err("must fail");
    assert_eq!(
        err,
        RequestError::Http {
            status: 500,
            detail: "HTTP 500: Internal Server Error".into(),
        }
    );
    assert_eq!(
        SessionFailure::from(&err).user_message(),
        "Optimization failed: HTTP 500: Internal Server Error"
    );
}

#[tokio::test]
async fn success_without_data_is_malformed() {
    let app = Router::new().route(
        "/optimize-team",
        post(|| async { Json(json!({ "status": "success" })) }),
    );
    let base = spawn_server(app).await;
    let client = RequestClient::new(base, None);

    let err = client.submit(&sample_request()).await.expect_err("must fail");
    assert!(matches!(err, RequestError::MalformedResponse(_)), "{err:?}");
}

#[tokio::test]
async fn success_with_wrong_shape_is_malformed() {
    let app = Router::new().route(
        "/optimize-team",
        post(|| async { Json(json!({ "data": { "recommendations": "none" } })) }),
    );
    let base = spawn_server(app).await;
    let client = RequestClient::new(base, None);

    let err = client.submit(&sample_request()).await.expect_err("must fail");
    assert!(matches!(err, RequestError::MalformedResponse(_)), "{err:?}");
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = RequestClient::new(format!("http://{addr}"), Some(Duration::from_secs(5)));
    let err = client.submit(&sample_request()).await.expect_err("must fail");
    match err {
        RequestError::Network { url, .. } => assert!(url.ends_with("/optimize-team")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn slow_backend_hits_the_deadline() {
    let app = Router::new().route(
        "/optimize-team",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(result_body())
        }),
    );
    let base = spawn_server(app).await;
    let client = RequestClient::new(base, Some(Duration::from_millis(100)));

    let err = client.submit(&sample_request()).await.expect_err("must time out");
    assert!(
        matches!(err, RequestError::Timeout { after, .. } if after == Duration::from_millis(100)),
        "{err:?}"
    );
}

#[tokio::test]
async fn health_reports_optimizer_status() {
    let app = Router::new().route(
        "/health",
        get(|| async {
            Json(json!({
                "status": "healthy",
                "system": "Real 4-Agent Team Formation Optimizer",
                "agents": 4,
                "version": "3.0.0",
                "timestamp": "2024-01-01T00:00:00"
            }))
        }),
    );
    let base = spawn_server(app).await;
    let client = RequestClient::new(base, None);

    let report = client.health().await.expect("health");
    assert_eq!(report.status, "healthy");
    assert_eq!(report.agents, Some(4));
    assert_eq!(report.version.as_deref(), Some("3.0.0"));
}
