//! JSON-RPC surface over HTTP, on an ephemeral port

use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::core::ClientError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::server::ServerHandle;
use quizgen_api_rpc::{RpcServer, RpcServerConfig};
use quizgen_core::application::GenerationService;
use quizgen_core::domain::{JobRecord, JobStatus, CANCELLED_MESSAGE};
use quizgen_core::port::generator::mocks::{ScriptedGenerator, Step};
use quizgen_core::port::job_store::mocks::InMemoryJobStore;
use quizgen_core::port::source::mocks::StaticSources;
use quizgen_core::port::{SourceCatalog, SystemTimeProvider, UuidProvider};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

struct Fixture {
    client: HttpClient,
    service: Arc<GenerationService>,
    _handle: ServerHandle,
}

async fn fixture(steps: Vec<Step>) -> Fixture {
    let sources = StaticSources::new()
        .with_subject("geography", &["Rivers", "Mountains"])
        .with_document("atlas", "The Nile is long.");
    let service = Arc::new(
        GenerationService::start(
            Arc::new(InMemoryJobStore::new()),
            Arc::new(ScriptedGenerator::new(steps)),
            SourceCatalog::from_shared(Arc::new(sources)),
            Arc::new(UuidProvider),
            Arc::new(SystemTimeProvider),
        )
        .await
        .unwrap(),
    );

    let config = RpcServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let (addr, handle) = RpcServer::new(config, Arc::clone(&service))
        .start()
        .await
        .unwrap();
    let client = HttpClientBuilder::default()
        .build(format!("http://{}", addr))
        .unwrap();

    Fixture {
        client,
        service,
        _handle: handle,
    }
}

fn object(value: Value) -> ObjectParams {
    let mut params = ObjectParams::new();
    if let Value::Object(map) = value {
        for (key, value) in map {
            params.insert(&key, value).unwrap();
        }
    }
    params
}

async fn call(client: &HttpClient, method: &str, params: Value) -> Result<Value, ClientError> {
    client.request(method, object(params)).await
}

fn error_code(result: Result<Value, ClientError>) -> i32 {
    match result {
        Err(ClientError::Call(err)) => err.code(),
        other => panic!("expected a call error, got {:?}", other),
    }
}

async fn wait_until<F>(rx: &mut broadcast::Receiver<JobRecord>, mut pred: F) -> JobRecord
where
    F: FnMut(&JobRecord) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let record = rx.recv().await.unwrap();
            if pred(&record) {
                return record;
            }
        }
    })
    .await
    .unwrap()
}

fn rivers_submit() -> Value {
    json!({
        "source": {"kind": "syllabus_topics", "subject": "geography", "topics": ["Rivers", "Mountains"]},
        "config": {"count": 5, "difficulty": "Easy", "mode": "exam", "duration_minutes": 20}
    })
}

#[tokio::test]
async fn test_submit_observe_list_delete() {
    let fx = fixture(vec![]).await;
    let mut rx = fx.service.subscribe();

    let submitted = call(&fx.client, "generation.submit.v1", rivers_submit())
        .await
        .unwrap();
    assert_eq!(submitted["status"], "PROCESSING");
    let id = submitted["job_id"].as_str().unwrap().to_string();

    wait_until(&mut rx, |r| r.id == id && r.status.is_terminal()).await;

    let record = call(&fx.client, "generation.observe.v1", json!({"job_id": id}))
        .await
        .unwrap();
    assert_eq!(record["status"], "COMPLETED");
    assert_eq!(record["progress_percent"], 100);
    assert_eq!(record["result"].as_array().map(Vec::len), Some(5));
    assert_eq!(record["config"]["duration_minutes"], 20);
    assert_eq!(record["step_labels"], json!(["Rivers", "Mountains"]));

    let listed = call(&fx.client, "generation.list.v1", json!({"status": "COMPLETED"}))
        .await
        .unwrap();
    let jobs = listed["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["job_id"], id.as_str());
    assert_eq!(jobs[0]["source_kind"], "syllabus_topics");
    assert_eq!(jobs[0]["item_count"], 5);

    let none = call(&fx.client, "generation.list.v1", json!({"status": "ERROR"}))
        .await
        .unwrap();
    assert!(none["jobs"].as_array().unwrap().is_empty());

    let deleted = call(&fx.client, "generation.delete.v1", json!({"job_id": id}))
        .await
        .unwrap();
    assert_eq!(deleted["deleted"], true);
    assert_eq!(
        error_code(call(&fx.client, "generation.observe.v1", json!({"job_id": id})).await),
        4001
    );
}

#[tokio::test]
async fn test_invalid_submit_is_rejected() {
    let fx = fixture(vec![]).await;

    let params = json!({
        "source": {"kind": "syllabus_topics", "subject": "geography", "topics": []},
        "config": {"count": 5, "difficulty": "Easy"}
    });
    assert_eq!(
        error_code(call(&fx.client, "generation.submit.v1", params).await),
        4000
    );

    let listed = call(&fx.client, "generation.list.v1", json!({})).await.unwrap();
    assert!(listed["jobs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_and_retry_over_rpc() {
    let release = Arc::new(Notify::new());
    let fx = fixture(vec![Step::WaitFor(release.clone())]).await;
    let mut rx = fx.service.subscribe();

    let submitted = call(
        &fx.client,
        "generation.submit.v1",
        json!({
            "source": {"kind": "uploaded_document", "document_id": "atlas"},
            "config": {"count": 3, "difficulty": "Medium"}
        }),
    )
    .await
    .unwrap();
    let id = submitted["job_id"].as_str().unwrap().to_string();
    wait_until(&mut rx, |r| r.id == id && r.progress_label.contains("waiting")).await;

    assert_eq!(
        error_code(call(&fx.client, "generation.delete.v1", json!({"job_id": id})).await),
        4002
    );

    let cancelled = call(&fx.client, "generation.cancel.v1", json!({"job_id": id}))
        .await
        .unwrap();
    assert_eq!(cancelled["signalled"], true);
    release.notify_one();

    let finished = wait_until(&mut rx, |r| r.id == id && r.status.is_terminal()).await;
    assert_eq!(finished.status, JobStatus::Error);
    assert_eq!(finished.error_message.as_deref(), Some(CANCELLED_MESSAGE));

    let retried = call(&fx.client, "generation.retry.v1", json!({"job_id": id}))
        .await
        .unwrap();
    assert_eq!(retried["retry_of"], id.as_str());
    let retry_id = retried["job_id"].as_str().unwrap().to_string();

    let done = wait_until(&mut rx, |r| r.id == retry_id && r.status.is_terminal()).await;
    assert_eq!(done.status, JobStatus::Completed);

    let again = call(&fx.client, "generation.cancel.v1", json!({"job_id": id}))
        .await
        .unwrap();
    assert_eq!(again["signalled"], false);
}

#[tokio::test]
async fn test_unknown_job_errors() {
    let fx = fixture(vec![]).await;

    assert_eq!(
        error_code(call(&fx.client, "generation.retry.v1", json!({"job_id": "nope"})).await),
        4001
    );
    let deleted = call(&fx.client, "generation.delete.v1", json!({"job_id": "nope"}))
        .await
        .unwrap();
    assert_eq!(deleted["deleted"], false);
}
