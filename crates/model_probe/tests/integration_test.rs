use model_probe::report::{self, model_entries, PERMISSION_URL};
use model_probe::{
    Category, ChatRequest, HttpTransport, Payload, ProbeConfig, ProbeEvent, ProbeStatus, Prober,
    RawResponse, RunSummary, Transport, TransportError, TransportErrorKind, Verdict,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Canned answer per model; unknown models are refused
struct FakeTransport {
    answers: HashMap<&'static str, (u16, &'static str)>,
}

impl FakeTransport {
    fn new(answers: &[(&'static str, u16, &'static str)]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(model, status, body)| (*model, (*status, *body)))
                .collect(),
        }
    }
}

impl Transport for FakeTransport {
    async fn send(&self, request: &ChatRequest) -> Result<RawResponse, TransportError> {
        match self.answers.get(request.model.as_str()) {
            Some((status, body)) => Ok(RawResponse {
                status: *status,
                body: body.to_string(),
            }),
            None => Err(TransportError::new(
                TransportErrorKind::Connect,
                "Connection refused (os error 111)",
            )),
        }
    }
}

fn models(names: &[&str]) -> Vec<String> {
    names.iter().map(|m| m.to_string()).collect()
}

fn names(bucket: &[&model_probe::ProbeResult]) -> Vec<String> {
    bucket.iter().map(|r| r.model.clone()).collect()
}

#[tokio::test]
async fn test_mixed_outcomes_are_ready() {
    let prober = Prober::new(
        FakeTransport::new(&[
            ("m1", 200, r#"{"choices":[{"message":{"content":"hi"}}]}"#),
            ("m2", 403, r#"{"error":{"message":"no grant"}}"#),
            ("m3", 401, r#"{"error":"bad key"}"#),
        ]),
        10,
    );

    let results = prober.run(&models(&["m1", "m2", "m3"]), |_| {}).await;
    let summary = RunSummary::from_results(&results);

    assert_eq!(names(&summary.available), vec!["m1"]);
    assert_eq!(names(&summary.needs_permission), vec!["m2"]);
    assert_eq!(names(&summary.auth_failed), vec!["m3"]);
    assert!(summary.not_found.is_empty());
    assert!(summary.other.is_empty());
    assert_eq!(summary.verdict(), Verdict::Ready);
}

#[tokio::test]
async fn test_all_unauthorized_is_invalid() {
    let prober = Prober::new(
        FakeTransport::new(&[
            ("a", 401, r#"{"error":"expired"}"#),
            ("b", 401, "{}"),
        ]),
        10,
    );

    let results = prober.run(&models(&["a", "b"]), |_| {}).await;
    assert_eq!(RunSummary::from_results(&results).verdict(), Verdict::Invalid);
}

#[tokio::test]
async fn test_refused_model_goes_to_other_and_run_continues() {
    let prober = Prober::new(
        FakeTransport::new(&[("before", 404, "{}"), ("after", 200, "{}")]),
        10,
    );

    let mut finished = vec![];
    let results = prober
        .run(&models(&["before", "unreachable", "after"]), |event| {
            if let ProbeEvent::Finished { result, .. } = event {
                finished.push(result.model.clone());
            }
        })
        .await;

    assert_eq!(finished, vec!["before", "unreachable", "after"]);
    assert_eq!(results.len(), 3);

    let refused = &results[1];
    assert_eq!(refused.status(), ProbeStatus::TransportError);
    assert!(!refused.is_success());
    assert!(refused.error_message().is_some_and(|m| !m.is_empty()));
    assert_eq!(Category::of(refused), Category::Other);

    let summary = RunSummary::from_results(&results);
    assert_eq!(names(&summary.other), vec!["unreachable"]);
    assert_eq!(names(&summary.not_found), vec!["before"]);
    assert_eq!(names(&summary.available), vec!["after"]);
}

#[tokio::test]
async fn test_config_fragment_matches_available_models() {
    let prober = Prober::new(
        FakeTransport::new(&[("x", 200, "{}"), ("y", 403, "{}"), ("z", 200, "not json")]),
        10,
    );

    let results = prober.run(&models(&["x", "y", "z"]), |_| {}).await;
    let summary = RunSummary::from_results(&results);
    let entries = model_entries(&summary);

    assert_eq!(entries.len(), summary.available.len());
    let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["x", "z"]);

    colored::control::set_override(false);
    let rendered = report::render_summary(&summary).unwrap();
    assert!(rendered.contains(r#""id":"x""#));
    assert!(rendered.contains(PERMISSION_URL));
}

// ── Loopback HTTP stub ─────────────────────────────────────────

#[derive(Debug)]
struct Captured {
    head: String,
    body: Value,
}

async fn read_request(stream: &mut TcpStream) -> Option<(String, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Some((head, buf[header_end..header_end + content_length].to_vec()))
}

/// Serves canned responses keyed by the requested model; returns the base URL
async fn spawn_stub(
    answers: HashMap<&'static str, (u16, &'static str)>,
) -> (String, Arc<Mutex<Vec<Captured>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let Some((head, body)) = read_request(&mut stream).await else {
                continue;
            };
            let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
            let model = body["model"].as_str().unwrap_or_default().to_string();
            sink.lock().unwrap().push(Captured { head, body });

            let (status, text) = answers
                .get(model.as_str())
                .copied()
                .unwrap_or((404, r#"{"error":{"message":"model not found"}}"#));
            let response = format!(
                "HTTP/1.1 {} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                text.len(),
                text
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (format!("http://{}/openapi/v1/", addr), captured)
}

#[tokio::test]
async fn test_http_transport_against_stub() {
    let answers = HashMap::from([
        (
            "qwen-plus",
            (200, r#"{"choices":[{"message":{"content":"你好！"}}]}"#),
        ),
        ("gpt-4", (403, r#"{"error":{"message":"no access"}}"#)),
        ("gpt-4o", (500, "<html>upstream exploded</html>")),
    ]);
    let (base_url, captured) = spawn_stub(answers).await;

    let config = ProbeConfig::new(
        "test-access-key",
        base_url,
        models(&["qwen-plus", "gpt-4", "gpt-4o", "missing"]),
    );
    let prober = Prober::new(HttpTransport::new(&config).unwrap(), config.max_tokens);
    let results = prober.run(&config.models, |_| {}).await;

    assert_eq!(results.len(), 4);
    assert!(results[0].is_success());
    assert_eq!(results[0].reply_preview(50), Some("你好！"));
    assert_eq!(results[1].status_code(), Some(403));
    assert_eq!(results[1].error_message().as_deref(), Some("no access"));
    assert_eq!(results[2].status_code(), Some(500));
    assert!(matches!(results[2].payload(), Some(Payload::Raw(text)) if text.contains("exploded")));
    assert_eq!(results[3].status_code(), Some(404));

    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 4);
    let first = &captured[0];
    assert!(first.head.starts_with("post /openapi/v1/chat/completions "));
    assert!(first.head.contains("accesskey: test-access-key"));
    assert!(first.head.contains("content-type: application/json"));
    assert!(!first.head.contains("authorization:"));
    assert_eq!(
        first.body,
        json!({
            "model": "qwen-plus",
            "messages": [{"role": "user", "content": "你好"}],
            "max_tokens": 10,
            "stream": false
        })
    );
}

#[tokio::test]
async fn test_http_transport_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ProbeConfig::new("key", format!("http://{}", addr), models(&["m"]));
    let prober = Prober::new(HttpTransport::new(&config).unwrap(), config.max_tokens);
    let result = prober.probe("m").await;

    assert_eq!(result.status(), ProbeStatus::TransportError);
    assert_eq!(Category::of(&result), Category::Other);
    match &result.outcome {
        model_probe::ProbeOutcome::Failed(err) => {
            assert_eq!(err.kind, TransportErrorKind::Connect);
            assert!(!err.message.is_empty());
        }
        other => panic!("expected transport failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_http_transport_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // Accept and hold the connection without ever answering
        let mut held = vec![];
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let config = ProbeConfig::new("key", format!("http://{}", addr), models(&["slow"]))
        .with_timeout(Duration::from_millis(200));
    let prober = Prober::new(HttpTransport::new(&config).unwrap(), config.max_tokens);
    let result = prober.probe("slow").await;

    match &result.outcome {
        model_probe::ProbeOutcome::Failed(err) => {
            assert_eq!(err.kind, TransportErrorKind::Timeout)
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(!result.is_success());
}
