// tests/common/mod.rs

#![allow(dead_code)]

use std::{
    io::{Cursor, Write},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    routing::post,
};
use serde_json::{Value, json};
use zip::{ZipWriter, write::SimpleFileOptions};

pub const COMPLETIONS_PATH: &str = "/v1/chat/completions";

pub const TWO_QUESTIONS: &str = r#"{"questions":[{"question":"Q1","options":[{"text":"A","is_correct":true},{"text":"B","is_correct":false}]},{"question":"Q2","options":[{"text":"C","is_correct":false},{"text":"D","is_correct":false}]}]}"#;

/// A stand-in for the chat-completions endpoint.
///
/// Answers every request with the configured status and message content and
/// records what it was sent.
pub struct FakeLlm {
    status: StatusCode,
    content: Option<String>,
    hits: AtomicUsize,
    last_authorization: Mutex<Option<String>>,
    last_body: Mutex<Option<Value>>,
}

impl FakeLlm {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.last_authorization.lock().unwrap().clone()
    }

    pub fn last_body(&self) -> Option<Value> {
        self.last_body.lock().unwrap().clone()
    }
}

async fn complete(
    State(fake): State<Arc<FakeLlm>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    fake.hits.fetch_add(1, Ordering::SeqCst);
    *fake.last_authorization.lock().unwrap() = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *fake.last_body.lock().unwrap() = Some(body);

    if !fake.status.is_success() {
        return (fake.status, Json(json!({ "message": "upstream exploded" })));
    }

    (
        StatusCode::OK,
        Json(json!({
            "id": "cmpl-test",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": fake.content },
                "finish_reason": "stop"
            }]
        })),
    )
}

/// Spawns a fake model endpoint and returns its full completions URL.
pub async fn spawn_fake_llm(status: StatusCode, content: Option<&str>) -> (String, Arc<FakeLlm>) {
    let fake = Arc::new(FakeLlm {
        status,
        content: content.map(str::to_string),
        hits: AtomicUsize::new(0),
        last_authorization: Mutex::new(None),
        last_body: Mutex::new(None),
    });

    let app = Router::new()
        .route(COMPLETIONS_PATH, post(complete))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://127.0.0.1:{}{}", port, COMPLETIONS_PATH), fake)
}

/// Builds a minimal DOCX with one body paragraph per entry.
pub fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(document.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}
