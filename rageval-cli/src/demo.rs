//! Browser demo for the model serving endpoint.
//!
//! `GET /` serves a page with a prompt box; `POST /api/complete` forwards the
//! prompt to the serving endpoint and streams completions back as
//! newline-delimited JSON (`{"text": ...}` per update, `{"error": ...}` on
//! failure).

use axum::Router;
use axum::body::Body;
use axum::extract::{Json, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use rageval_core::config::ServingConfig;
use rageval_core::{GenerateRequest, ServingClient};

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Prompt Completion Demo</title></head>
<body>
<h1>vLLM on Ray Serve: Prompt Completion Demo</h1>
<label>Input<br><textarea id="input" rows="6" cols="80" placeholder="Enter your prompt and press ENTER"></textarea></label>
<br>
<label>Output<br><textarea id="output" rows="12" cols="80" placeholder="Prompt completion from the model" readonly></textarea></label>
<script>
const input = document.getElementById("input");
const output = document.getElementById("output");
input.addEventListener("keydown", async (event) => {
  if (event.key !== "Enter" || event.shiftKey) return;
  event.preventDefault();
  output.value = "";
  const resp = await fetch("/api/complete", {
    method: "POST",
    headers: {"Content-Type": "application/json"},
    body: JSON.stringify({prompt: input.value}),
  });
  const reader = resp.body.getReader();
  const decoder = new TextDecoder();
  let buffer = "";
  for (;;) {
    const {value, done} = await reader.read();
    if (done) break;
    buffer += decoder.decode(value, {stream: true});
    let nl;
    while ((nl = buffer.indexOf("\n")) >= 0) {
      const line = buffer.slice(0, nl);
      buffer = buffer.slice(nl + 1);
      if (!line) continue;
      const msg = JSON.parse(line);
      output.value = msg.error ? "Error: " + msg.error : msg.text;
    }
  }
});
</script>
</body>
</html>
"#;

/// Stop sequence sent with every demo prompt.
const STOP: &str = ">";

struct DemoState {
    client: ServingClient,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct PromptBody {
    prompt: String,
}

/// Build the demo router.
fn router(config: &ServingConfig) -> Router {
    let state = Arc::new(DemoState {
        client: ServingClient::from_config(config),
        max_tokens: config.max_tokens,
    });
    Router::new()
        .route("/", get(index_handler))
        .route("/api/complete", post(complete_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_handler(State(state): State<Arc<DemoState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "model_url": state.client.url(),
    }))
}

fn ndjson(value: Value) -> String {
    format!("{}\n", value)
}

async fn complete_handler(
    State(state): State<Arc<DemoState>>,
    Json(body): Json<PromptBody>,
) -> Response {
    let request = GenerateRequest::new(body.prompt, state.max_tokens)
        .with_stop(STOP)
        .streaming(true);
    let (out_tx, out_rx) = mpsc::channel::<String>(32);

    tokio::spawn(async move {
        let (text_tx, mut text_rx) = mpsc::channel::<String>(32);
        let forward_tx = out_tx.clone();
        let forward = async move {
            while let Some(text) = text_rx.recv().await {
                if forward_tx.send(ndjson(json!({ "text": text }))).await.is_err() {
                    break;
                }
            }
        };
        let (result, ()) = tokio::join!(state.client.complete_stream(&request, text_tx), forward);
        if let Err(e) = result {
            warn!(error = %e, "Completion request failed");
            let _ = out_tx.send(ndjson(json!({ "error": e.to_string() }))).await;
        }
    });

    let stream = ReceiverStream::new(out_rx).map(Ok::<_, Infallible>);
    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Serve the demo until the process is stopped.
pub async fn run(config: &ServingConfig) -> anyhow::Result<()> {
    let app = router(config);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, model_url = %config.model_url, "Demo server listening");
    println!("Demo running at http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    fn config(model_url: &str) -> ServingConfig {
        ServingConfig {
            model_url: model_url.to_string(),
            ..ServingConfig::default()
        }
    }

    async fn body_string(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn complete_request(prompt: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri("/api/complete")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "prompt": prompt }).to_string()))
            .unwrap()
    }

    /// Fake serving endpoint that echoes the prompt in two streamed frames.
    async fn spawn_model_server() -> String {
        let app = Router::new().route(
            "/generate",
            post(|Json(req): Json<Value>| async move {
                assert_eq!(req["stop"], ">");
                assert_eq!(req["stream"], true);
                let prompt = req["prompt"].as_str().unwrap_or_default().to_string();
                format!(
                    "{}\0{}\0",
                    json!({ "text": [format!("{prompt} is")] }),
                    json!({ "text": [format!("{prompt} is done")] })
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/generate", addr)
    }

    #[tokio::test]
    async fn test_index_page() {
        let app = router(&config("http://localhost:8000/generate"));
        let req = axum::http::Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let resp = ServiceExt::<axum::http::Request<Body>>::oneshot(app, req)
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body = body_string(resp).await;
        assert!(body.contains("Prompt Completion Demo"));
        assert!(body.contains("/api/complete"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = router(&config("http://localhost:8000/generate"));
        let req = axum::http::Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = ServiceExt::<axum::http::Request<Body>>::oneshot(app, req)
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let json: Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["model_url"], "http://localhost:8000/generate");
    }

    #[tokio::test]
    async fn test_complete_streams_model_output() {
        let url = spawn_model_server().await;
        let app = router(&config(&url));
        let req = complete_request("The sky");
        let resp = ServiceExt::<axum::http::Request<Body>>::oneshot(app, req)
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "application/x-ndjson"
        );

        let body = body_string(resp).await;
        let lines: Vec<Value> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(
            lines,
            vec![
                json!({ "text": "The sky is" }),
                json!({ "text": "The sky is done" })
            ]
        );
    }

    #[tokio::test]
    async fn test_complete_reports_unreachable_model() {
        let app = router(&config("http://127.0.0.1:1/generate"));
        let req = complete_request("hi");
        let resp = ServiceExt::<axum::http::Request<Body>>::oneshot(app, req)
            .await
            .unwrap();
        let body = body_string(resp).await;
        let msg: Value = serde_json::from_str(body.trim()).unwrap();
        assert!(msg["error"].as_str().unwrap().contains("127.0.0.1:1"));
    }

    #[tokio::test]
    async fn test_complete_rejects_bad_body() {
        let app = router(&config("http://localhost:8000/generate"));
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/api/complete")
            .header("content-type", "application/json")
            .body(Body::from("{\"nope\": 1}"))
            .unwrap();
        let resp = ServiceExt::<axum::http::Request<Body>>::oneshot(app, req)
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
    }
}
