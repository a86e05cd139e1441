// ApiClient against a throwaway single-request HTTP responder.

use std::io::{self, BufRead, BufReader, Cursor, Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use model_register::api::{ApiClient, Outcome};
use model_register::config::Settings;
use model_register::model::{ModelConfig, UpdateRequest};
use model_register::ui::{main_menu, run_register, run_update, LinePrompt};
use reqwest::StatusCode;

struct Captured {
    request_line: String,
    content_type: Option<String>,
    body: String,
}

/// Accept one connection, record the request and answer with `status`
/// and `body`.
fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();

        let mut content_length = 0usize;
        let mut content_type = None;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                match name.trim().to_ascii_lowercase().as_str() {
                    "content-length" => content_length = value.trim().parse().unwrap(),
                    "content-type" => content_type = Some(value.trim().to_string()),
                    _ => {}
                }
            }
        }
        let mut buf = vec![0u8; content_length];
        reader.read_exact(&mut buf).unwrap();

        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
        .unwrap();
        stream.flush().unwrap();

        Captured {
            request_line: request_line.trim_end().to_string(),
            content_type,
            body: String::from_utf8(buf).unwrap(),
        }
    });
    (format!("http://{}/meta-manager", addr), handle)
}

fn client(api_url: String, timeout_secs: u64) -> ApiClient {
    let settings = Settings {
        api_url,
        timeout_secs,
        ..Settings::default()
    };
    ApiClient::new(&settings).unwrap()
}

#[test]
fn register_posts_config_and_reads_model_id() {
    let (url, server) = serve_once(
        "201 Created",
        r#"{"response":{"id":"CD:personalization:mlt-batch:sllim-tg-pkg-300-manual-1"}}"#,
    );
    let api = client(url, 5);
    let config = ModelConfig::manual(1);

    let outcome = api.register_model(&config);
    assert_eq!(
        outcome,
        Outcome::Registered {
            status: StatusCode::CREATED,
            model_id: Some("CD:personalization:mlt-batch:sllim-tg-pkg-300-manual-1".into()),
        }
    );

    let captured = server.join().unwrap();
    assert_eq!(
        captured.request_line,
        "POST /meta-manager/v1/models/register HTTP/1.1"
    );
    assert_eq!(captured.content_type.as_deref(), Some("application/json"));
    let sent: ModelConfig = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(sent, config);
}

#[test]
fn register_existing_variant_counts_as_success() {
    let (url, server) = serve_once(
        "400 Bad Request",
        r#"{"detail":"variant sllim-tg-pkg-300-manual-1 already exists"}"#,
    );
    let outcome = client(url, 5).register_model(&ModelConfig::manual(1));
    server.join().unwrap();
    assert!(outcome.is_success());
    assert!(matches!(outcome, Outcome::AlreadyExists { .. }));
}

#[test]
fn register_validation_error_is_failure() {
    let (url, server) = serve_once("422 Unprocessable Entity", r#"{"detail":"bad"}"#);
    let outcome = client(url, 5).register_model(&ModelConfig::manual(1));
    server.join().unwrap();
    assert_eq!(
        outcome,
        Outcome::Rejected {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: r#"{"detail":"bad"}"#.into(),
        }
    );
}

#[test]
fn update_puts_serving_configuration_to_model_path() {
    let (url, server) = serve_once("200 OK", r#"{"status":"ok"}"#);
    let outcome = client(url, 5).update_model(
        "CD:personalization:mlt-batch:sllim-tg-pkg-3",
        &UpdateRequest::scaled_serving(),
    );
    assert_eq!(
        outcome,
        Outcome::Updated {
            status: StatusCode::OK
        }
    );

    let captured = server.join().unwrap();
    assert_eq!(
        captured.request_line,
        "PUT /meta-manager/v1/models/update/CD:personalization:mlt-batch:sllim-tg-pkg-3 HTTP/1.1"
    );
    let sent: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(sent["model"]["serving_configuration"]["max_instance"], 30);
    assert_eq!(
        sent["model"]["serving_configuration"]["autoscale_conditions"]["rps"],
        10
    );
}

#[test]
fn update_not_found_is_failure() {
    let (url, server) = serve_once("404 Not Found", "model not found");
    let outcome = client(url, 5).update_model("missing", &UpdateRequest::scaled_serving());
    server.join().unwrap();
    assert!(!outcome.is_success());
    assert_eq!(outcome.status(), Some(StatusCode::NOT_FOUND));
}

// Bind then drop to get a port nothing listens on.
fn closed_port() -> SocketAddr {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
}

#[test]
fn connection_refused_is_failure_not_error() {
    let api = client(format!("http://{}", closed_port()), 5);

    let outcome = api.register_model(&ModelConfig::manual(1));
    assert!(matches!(outcome, Outcome::Transport(ref msg) if msg.contains("register")));
    assert!(!outcome.is_success());

    let outcome = api.update_model("id", &UpdateRequest::scaled_serving());
    assert!(matches!(outcome, Outcome::Transport(_)));
}

#[test]
fn slow_server_hits_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        thread::sleep(Duration::from_secs(3));
        drop(stream);
    });

    let outcome = client(format!("http://{}", addr), 1).register_model(&ModelConfig::manual(1));
    assert!(matches!(outcome, Outcome::Transport(_)));
    server.join().unwrap();
}

#[test]
fn register_flow_prints_report() {
    let (url, server) = serve_once("200 OK", r#"{"response":{"id":"abc"}}"#);
    let api = client(url, 5);
    let mut out = Vec::new();

    let ok = run_register(&api, &mut out).unwrap();
    server.join().unwrap();

    assert!(ok);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Model: mlt-batch"));
    assert!(text.contains("Variant: sllim-tg-pkg-300-manual-"));
    assert!(text.contains("/meta-manager/v1/models/register"));
    assert!(text.contains("📊 Response Status: 200"));
    assert!(text.contains("📋 Model ID: abc"));
}

/// Shared buffer the fmt subscriber writes into.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

fn with_warn_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs.contents())
}

#[test]
fn rejected_update_is_logged_at_warn() {
    let (url, server) = serve_once("500 Internal Server Error", "boom");
    let api = client(url, 5);

    let (outcome, logs) =
        with_warn_logs(|| api.update_model("some-id", &UpdateRequest::scaled_serving()));
    server.join().unwrap();

    assert!(matches!(outcome, Outcome::Rejected { .. }));
    assert!(logs.contains("WARN"), "logs: {}", logs);
    assert!(logs.contains("update rejected with 500"), "logs: {}", logs);
    assert!(logs.contains("boom"), "logs: {}", logs);
}

#[test]
fn rejected_register_is_logged_at_warn() {
    let (url, server) = serve_once("403 Forbidden", "ip not allowed");
    let api = client(url, 5);

    let (outcome, logs) = with_warn_logs(|| api.register_model(&ModelConfig::manual(1)));
    server.join().unwrap();

    assert!(!outcome.is_success());
    assert!(logs.contains("register rejected with 403"), "logs: {}", logs);
}

#[test]
fn successful_register_logs_no_warning() {
    let (url, server) = serve_once("201 Created", r#"{"response":{"id":"abc"}}"#);
    let api = client(url, 5);

    let (outcome, logs) = with_warn_logs(|| api.register_model(&ModelConfig::manual(1)));
    server.join().unwrap();

    assert!(outcome.is_success());
    assert!(logs.is_empty(), "logs: {}", logs);
}

#[test]
fn update_flow_prints_report() {
    let (url, server) = serve_once("200 OK", "{}");
    let api = client(url, 5);
    let mut out = Vec::new();

    let ok = run_update(&api, "CD:personalization:mlt-batch:sllim-tg-pkg-3", &mut out).unwrap();
    let captured = server.join().unwrap();

    assert!(ok);
    assert!(captured.request_line.starts_with("PUT "));
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("🔄 MANUAL MODEL UPDATE"));
    assert!(text.contains("Model ID: CD:personalization:mlt-batch:sllim-tg-pkg-3"));
    assert!(text.contains(
        "/meta-manager/v1/models/update/CD:personalization:mlt-batch:sllim-tg-pkg-3"
    ));
    assert!(text.contains("📊 Response Status: 200"));
    assert!(text.contains("✅ SUCCESS: Model updated successfully!"));
}

#[test]
fn update_flow_reports_rejection() {
    let (url, server) = serve_once("404 Not Found", "model not found");
    let api = client(url, 5);
    let mut out = Vec::new();

    let ok = run_update(&api, "missing", &mut out).unwrap();
    server.join().unwrap();

    assert!(!ok);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("❌ FAILED: Status 404"));
    assert!(text.contains("Response: model not found"));
}

#[test]
fn menu_update_then_exit() {
    let (url, server) = serve_once("200 OK", "{}");
    let api = client(url, 5);
    let mut prompt = LinePrompt::new(Cursor::new("2\n3\n"), io::sink());
    let mut out = Vec::new();

    main_menu(&api, "CD:personalization:mlt-batch:sllim-tg-pkg-3", &mut prompt, &mut out).unwrap();
    let captured = server.join().unwrap();

    assert!(captured.request_line.contains("/v1/models/update/"));
    let text = String::from_utf8(out).unwrap();
    let done = text.find("🎉 Model update completed!").expect("update summary");
    let bye = text.find("👋 Goodbye!").expect("goodbye");
    assert!(done < bye);
    // The menu is shown again after the action before exiting.
    assert_eq!(text.matches("1. Register new model").count(), 2);
}

#[test]
fn menu_register_failure_keeps_looping() {
    let api = client(format!("http://{}", closed_port()), 5);
    let mut prompt = LinePrompt::new(Cursor::new("1\n3\n"), io::sink());
    let mut out = Vec::new();

    main_menu(&api, "unused", &mut prompt, &mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("❌ FAILED: Request error:"));
    let failed = text.find("❌ Model registration failed!").expect("failure summary");
    let bye = text.find("👋 Goodbye!").expect("goodbye");
    assert!(failed < bye);
    assert_eq!(text.matches("Choose an action:").count(), 2);
}
