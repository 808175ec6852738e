//! Request server and health endpoint through the full bootstrap.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use kv_pipeline::handler::{HandlerFactory, HandlerMode, LineHandler};
use kv_pipeline::{Bootstrap, BoxError, RequestHandler, ServiceConfig, ServiceContext};

mod common;
use common::test_config;

struct Client {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer,
        }
    }

    async fn send(&mut self, line: &str) -> String {
        self.writer.write_all(format!("{line}\n").as_bytes()).await.unwrap();
        let mut reply = String::new();
        tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut reply))
            .await
            .expect("reply timed out")
            .unwrap();
        reply.trim_end().to_string()
    }
}

fn counting_factory(built: Arc<AtomicUsize>) -> HandlerFactory {
    let inner = LineHandler::factory();
    Arc::new(move |ctx: &ServiceContext| -> Result<Arc<dyn RequestHandler>, BoxError> {
        built.fetch_add(1, Ordering::SeqCst);
        inner(ctx)
    })
}

#[tokio::test]
async fn singleton_handler_serves_every_connection() {
    let dir = tempfile::tempdir().unwrap();
    let built = Arc::new(AtomicUsize::new(0));
    let service = ServiceConfig::builder(counting_factory(built.clone())).build();
    let bootstrap = Bootstrap::launch(service, test_config(dir.path())).await.unwrap();

    let mut a = Client::connect(bootstrap.local_addr()).await;
    let mut b = Client::connect(bootstrap.local_addr()).await;
    assert_eq!(a.send("PING").await, "PONG");
    assert_eq!(a.send("SET greeting hello").await, "OK");
    assert_eq!(b.send("GET greeting").await, "hello");
    assert_eq!(b.send("DEL greeting").await, "1");
    assert_eq!(a.send("GET greeting").await, "(nil)");
    assert_eq!(built.load(Ordering::SeqCst), 1);

    let report = bootstrap.shutdown().await;
    assert!(report.is_clean());
}

#[tokio::test]
async fn per_connection_mode_builds_a_handler_per_client() {
    let dir = tempfile::tempdir().unwrap();
    let built = Arc::new(AtomicUsize::new(0));
    let service = ServiceConfig::builder(counting_factory(built.clone()))
        .handler_mode(HandlerMode::PerConnection)
        .build();
    let bootstrap = Bootstrap::launch(service, test_config(dir.path())).await.unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 0);

    let mut a = Client::connect(bootstrap.local_addr()).await;
    assert_eq!(a.send("PING").await, "PONG");
    let mut b = Client::connect(bootstrap.local_addr()).await;
    assert_eq!(b.send("PING").await, "PONG");
    assert_eq!(built.load(Ordering::SeqCst), 2);

    bootstrap.shutdown().await;
}

#[tokio::test]
async fn failed_handler_construction_drops_only_that_connection() {
    let dir = tempfile::tempdir().unwrap();
    let attempts = Arc::new(AtomicUsize::new(0));
    let inner = LineHandler::factory();
    let counter = attempts.clone();
    let factory: HandlerFactory =
        Arc::new(move |ctx: &ServiceContext| -> Result<Arc<dyn RequestHandler>, BoxError> {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err("first connection refused".into());
            }
            inner(ctx)
        });
    let service = ServiceConfig::builder(factory)
        .handler_mode(HandlerMode::PerConnection)
        .build();
    let bootstrap = Bootstrap::launch(service, test_config(dir.path())).await.unwrap();

    let mut refused = TcpStream::connect(bootstrap.local_addr()).await.unwrap();
    let mut buf = [0u8; 8];
    let read = tokio::time::timeout(Duration::from_secs(5), tokio::io::AsyncReadExt::read(&mut refused, &mut buf))
        .await
        .expect("refused connection should close");
    assert!(matches!(read, Ok(0) | Err(_)));

    let mut accepted = Client::connect(bootstrap.local_addr()).await;
    assert_eq!(accepted.send("PING").await, "PONG");

    bootstrap.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_open_connections() {
    let dir = tempfile::tempdir().unwrap();
    let service = ServiceConfig::builder(LineHandler::factory()).build();
    let bootstrap = Bootstrap::launch(service, test_config(dir.path())).await.unwrap();
    let addr = bootstrap.local_addr();

    let mut idle = Client::connect(addr).await;
    assert_eq!(idle.send("PING").await, "PONG");

    tokio::time::timeout(Duration::from_secs(5), bootstrap.shutdown())
        .await
        .expect("shutdown must not wait for idle clients");
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn health_endpoint_reports_server_and_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.http.enabled = true;
    let service = ServiceConfig::builder(LineHandler::factory()).build();
    let bootstrap = Bootstrap::launch(service, config).await.unwrap();
    let http = bootstrap.http_addr().expect("endpoint enabled");

    let mut client = Client::connect(bootstrap.local_addr()).await;
    assert_eq!(client.send("PING").await, "PONG");

    let health = reqwest::get(format!("http://{http}/health")).await.unwrap();
    assert_eq!(health.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = health.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["server_port"], bootstrap.local_addr().port());

    let metrics = reqwest::get(format!("http://{http}/metrics")).await.unwrap();
    assert_eq!(metrics.status(), reqwest::StatusCode::OK);
    let text = metrics.text().await.unwrap();
    assert!(text.contains("pipeline_connections_total"), "{text}");

    drop(client);
    bootstrap.shutdown().await;
    assert!(reqwest::get(format!("http://{http}/health")).await.is_err());
}
