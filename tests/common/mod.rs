#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use actix_web::{dev::ServerHandle, http::StatusCode, web, App, HttpRequest, HttpResponse, HttpServer};
use vision_relay::{config::RelayConfig, models::TaskType};

/// What the mock classifier answers with.
#[derive(Clone, Debug)]
pub struct MockReply {
    pub status: u16,
    pub body: String,
    pub delay: Option<Duration>,
}

impl MockReply {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Clone, Debug)]
pub struct CapturedRequest {
    pub path: String,
    pub prediction_key: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

struct MockState {
    reply: MockReply,
    requests: Mutex<Vec<CapturedRequest>>,
}

/// In-process stand-in for the cloud prediction endpoint.
pub struct MockUpstream {
    pub url: String,
    state: web::Data<MockState>,
    handle: ServerHandle,
}

impl MockUpstream {
    pub async fn start(reply: MockReply) -> Self {
        let state = web::Data::from(Arc::new(MockState {
            reply,
            requests: Mutex::new(Vec::new()),
        }));

        let app_state = state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(app_state.clone())
                .default_service(web::to(mock_handler))
        })
        .workers(1)
        .disable_signals()
        .bind(("127.0.0.1", 0))
        .expect("Failed to bind mock upstream");

        let address = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_rt::spawn(server);

        Self {
            url: format!("http://{address}"),
            state,
            handle,
        }
    }

    pub fn calls(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

async fn mock_handler(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<MockState>,
) -> HttpResponse {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    state.requests.lock().unwrap().push(CapturedRequest {
        path: req.uri().path().to_string(),
        prediction_key: header("Prediction-Key"),
        content_type: header("Content-Type"),
        body: body.to_vec(),
    });

    if let Some(delay) = state.reply.delay {
        actix_rt::time::sleep(delay).await;
    }

    HttpResponse::build(StatusCode::from_u16(state.reply.status).unwrap())
        .content_type("application/json")
        .body(state.reply.body.clone())
}

pub fn relay_config(endpoint: &str) -> RelayConfig {
    RelayConfig {
        endpoint: endpoint.to_string(),
        project_id: "project-1".to_string(),
        model_name: "Iteration 2".to_string(),
        prediction_key: "test-key".to_string(),
        task: TaskType::Classify,
        api_path: "customvision/v3.0/Prediction".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        upstream_timeout: Duration::from_secs(5),
        max_upload_bytes: 64 * 1024,
        allowed_origins: vec!["*".to_string()],
    }
}

/// One part of a hand-built `multipart/form-data` body.
pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub data: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn image(data: &'a [u8]) -> Self {
        Self {
            name: "image",
            file_name: Some("car.jpg"),
            content_type: Some("image/jpeg"),
            data,
        }
    }

    pub fn text(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            file_name: None,
            content_type: None,
            data: value.as_bytes(),
        }
    }
}

const BOUNDARY: &str = "vision-relay-test-boundary";

/// Returns the `Content-Type` header value and the encoded body.
pub fn multipart(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();

    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(file_name) = part.file_name {
            disposition.push_str(&format!("; filename=\"{file_name}\""));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

/// Bytes that start like a JPEG, padded to `len`.
pub fn fake_jpeg(len: usize) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
    data.resize(len, 0x42);
    data
}
