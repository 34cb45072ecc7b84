//! HTTP tests for [`VoicevoxClient`] against a fake VOICEVOX engine.
//!
//! The fake engine runs on its own tokio runtime in a background thread; the
//! blocking client is driven from the plain test thread.

use std::{
    collections::HashMap,
    io::Cursor,
    net::{SocketAddr, TcpListener as StdListener},
    sync::mpsc,
    thread,
    time::Duration,
};

use axum::{
    extract::{Json, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use rsspeaker::{
    error::{Step, SynthesisError},
    run_batch, Article, NarratorConfig, SpeechBackend, VoicevoxClient,
};
use serde_json::{json, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Fake engine
// ─────────────────────────────────────────────────────────────────────────────

/// 24 kHz mono 16-bit, one frame per character of `kana`.
fn wav_for(kana: &str) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 24_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut buf = Vec::new();
    {
        let mut w = hound::WavWriter::new(Cursor::new(&mut buf), spec).unwrap();
        for i in 0..kana.chars().count() {
            w.write_sample(i as i16).unwrap();
        }
        w.finalize().unwrap();
    }
    buf
}

async fn audio_query(Query(params): Query<HashMap<String, String>>) -> Response {
    let text = params.get("text").cloned().unwrap_or_default();
    let Some(speaker) = params.get("speaker").and_then(|s| s.parse::<u32>().ok()) else {
        return (StatusCode::UNPROCESSABLE_ENTITY, "speaker is required").into_response();
    };
    if text.contains("エラー") {
        return (StatusCode::UNPROCESSABLE_ENTITY, "text is invalid").into_response();
    }
    if text.contains("遅い") {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    Json(json!({ "kana": text, "speaker": speaker, "speedScale": 1.0 })).into_response()
}

async fn synthesis(
    Query(params): Query<HashMap<String, String>>,
    Json(query): Json<Value>,
) -> Response {
    // The engine only accepts a query built for the same speaker.
    let built_for = query["speaker"].to_string();
    if params.get("speaker") != Some(&built_for) {
        return (StatusCode::BAD_REQUEST, "speaker mismatch").into_response();
    }
    let kana = query["kana"].as_str().unwrap_or_default();
    ([(header::CONTENT_TYPE, "audio/wav")], wav_for(kana)).into_response()
}

fn spawn_engine() -> String {
    let (tx, rx) = mpsc::channel::<SocketAddr>();
    thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            let app = Router::new()
                .route("/audio_query", post(audio_query))
                .route("/synthesis", post(synthesis));
            axum::serve(listener, app).await.unwrap();
        });
    });
    format!("http://{}", rx.recv().unwrap())
}

fn client(url: &str) -> VoicevoxClient {
    VoicevoxClient::new(url, Duration::from_secs(5)).unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn query_then_synthesis_round_trip() {
    let c = client(&spawn_engine());

    let query = c.audio_query("こんにちは。", 3).unwrap();
    assert_eq!(query["kana"], "こんにちは。");
    assert_eq!(query["speaker"], 3);

    let audio = c.synthesis(&query, 3).unwrap();
    assert_eq!(audio, wav_for("こんにちは。"));
}

#[test]
fn error_status_keeps_step_and_body() {
    let c = client(&spawn_engine());

    match c.speak("エラーになる文。", 3) {
        Err(SynthesisError::Status { step, status, body }) => {
            assert_eq!(step, Step::AudioQuery);
            assert_eq!(status, 422);
            assert_eq!(body, "text is invalid");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[test]
fn synthesis_status_error() {
    let c = client(&spawn_engine());
    let query = c.audio_query("はい。", 3).unwrap();

    let err = c.synthesis(&query, 8).unwrap_err();
    assert_eq!(err.step(), Some(Step::Synthesis));
    assert!(matches!(err, SynthesisError::Status { status: 400, .. }));
}

#[test]
fn request_timeout_is_transport_error() {
    let c = VoicevoxClient::new(&spawn_engine(), Duration::from_millis(200)).unwrap();

    match c.audio_query("遅い応答。", 3) {
        Err(SynthesisError::Transport { step, source }) => {
            assert_eq!(step, Step::AudioQuery);
            assert!(source.is_timeout(), "{source}");
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[test]
fn unreachable_engine_is_transport_error() {
    let addr = {
        let listener = StdListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let c = client(&format!("http://{addr}"));

    assert!(matches!(
        c.speak("はい。", 3),
        Err(SynthesisError::Transport { step: Step::AudioQuery, .. })
    ));
}

#[test]
fn batch_against_engine() {
    let url = spawn_engine();
    let out = tempfile::tempdir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let config = NarratorConfig {
        endpoint: url,
        chunk_max_chars: 10,
        throttle_ms: 10,
        output_dir: out.path().to_path_buf(),
        temp_dir: tmp.path().to_path_buf(),
        ..Default::default()
    };
    let client = VoicevoxClient::from_config(&config).unwrap();
    let articles = vec![
        Article::new("API/Update: v2?", "これはテストです。次の文です。"),
        Article::new("broken", "正常な文。エラーの文。"),
    ];

    let report = run_batch(&client, &articles, &config).unwrap();
    assert_eq!(report.summary(), "1/2 articles produced audio");

    let episode = report.outcomes[0].episode().unwrap();
    assert_eq!(episode.path, out.path().join("APIUpdate_v2.wav"));
    assert_eq!(episode.frames, 15);
    assert_eq!(episode.format.sample_rate, 24_000);
    assert_eq!(episode.format.channels, 1);
    assert_eq!(episode.format.bits_per_sample, 16);

    let reason = report.outcomes[1].reason().unwrap();
    assert!(reason.contains("chunk 2") && reason.contains("422"), "{reason}");
    assert!(!out.path().join("broken.wav").exists());
}
