//! End-to-end tests of the load-balanced client over the real transport.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use http::Method;
use resilient_client::config::{parse_config, ClientConfig};
use resilient_client::load_balancer::{
    CompletionContext, CompletionStatus, ConfiguredClientFactory, LoadBalancerLifecycle, LoadBalancerRequest,
    ServiceInstance,
};
use resilient_client::{build_client, Client, HttpTransport, OutboundRequest, RequestOptions, StaticLoadBalancer};

mod common;

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl LoadBalancerLifecycle for Recorder {
    fn on_start(&self, request: &LoadBalancerRequest) {
        self.events.lock().unwrap().push(format!("start:{}", request.hint));
    }

    fn on_start_request(&self, _request: &LoadBalancerRequest, instance: &ServiceInstance) {
        self.events.lock().unwrap().push(format!("selected:{}", instance.instance_id));
    }

    fn on_complete(&self, completion: &CompletionContext<'_>) {
        self.events.lock().unwrap().push(format!("complete:{}", completion.status.as_str()));
    }
}

fn config(raw: &str) -> ClientConfig {
    parse_config(raw).expect("valid config")
}

fn instance_toml(service: &str, id: &str, addr: SocketAddr, hint: &str) -> String {
    format!(
        r#"
        [[services.{service}]]
        instance_id = "{id}"
        host = "{host}"
        port = {port}
        metadata = {{ hint = "{hint}" }}
        "#,
        service = service,
        id = id,
        host = addr.ip(),
        port = addr.port(),
        hint = hint,
    )
}

fn client_for(config: &ClientConfig, recorder: Arc<Recorder>) -> Arc<dyn Client> {
    let options = RequestOptions::from(&config.timeouts);
    let factory = ConfiguredClientFactory::from_client_config(config).with_lifecycle(recorder);
    build_client(
        Arc::new(HttpTransport::new(&options)),
        Arc::new(StaticLoadBalancer::new(config)),
        Arc::new(factory),
        config.loadbalancer.defaults.retry.enabled,
    )
}

fn get(url: &str) -> OutboundRequest {
    OutboundRequest::builder(Method::GET, url).build().unwrap()
}

#[tokio::test]
async fn test_request_reaches_instance_with_path_and_query() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let addr = common::start_programmable_backend(move |request| {
        let s = s.clone();
        async move {
            s.lock().unwrap().push(request);
            (200, r#"{"id":7}"#.to_string())
        }
    })
    .await;

    let config = config(&instance_toml("orders", "orders-1", addr, "blue"));
    let recorder = Arc::new(Recorder::default());
    let client = client_for(&config, recorder.clone());

    let request = OutboundRequest::builder(Method::GET, "http://orders/api/orders/7?expand=lines")
        .header("x-tenant", "acme")
        .unwrap()
        .build()
        .unwrap();
    let response = client.execute(request, &RequestOptions::default()).await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text(), r#"{"id":7}"#);
    assert_eq!(response.request().url().port(), Some(addr.port()));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].path, "/api/orders/7?expand=lines");
    assert_eq!(seen[0].header("x-tenant"), Some("acme"));

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["start:default", "selected:orders-1", "complete:success"]
    );
}

#[tokio::test]
async fn test_unknown_service_yields_503_and_one_discard() {
    let config = ClientConfig::default();
    let recorder = Arc::new(Recorder::default());
    let client = client_for(&config, recorder.clone());

    let response = client
        .execute(get("http://inventory/stock"), &RequestOptions::default())
        .await
        .unwrap();

    assert_eq!(response.status(), 503);
    assert_eq!(
        response.text(),
        "Load balancer does not contain an instance for the service inventory"
    );
    // Retry is enabled by default but 503 is not a retryable status unless configured.
    assert_eq!(*recorder.events.lock().unwrap(), vec!["start:default", "complete:discard"]);
}

#[tokio::test]
async fn test_connection_failure_retries_on_next_instance() {
    let dead = common::closed_port().await;
    let live = common::start_mock_backend("live").await;

    let raw = format!(
        "{}{}",
        instance_toml("orders", "dead", dead, "none"),
        instance_toml("orders", "live", live, "none")
    );
    let config = config(&raw);
    let recorder = Arc::new(Recorder::default());
    let client = client_for(&config, recorder.clone());

    let response = client.execute(get("http://orders/ping"), &RequestOptions::default()).await.unwrap();

    assert_eq!(response.text(), "live");
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec![
            "start:default",
            "selected:dead",
            "complete:failed",
            "start:default",
            "selected:live",
            "complete:success",
        ]
    );
}

#[tokio::test]
async fn test_retry_disabled_surfaces_transport_failure() {
    let dead = common::closed_port().await;
    let raw = format!(
        "[loadbalancer.retry]\nenabled = false\n{}",
        instance_toml("orders", "dead", dead, "none")
    );
    let config = config(&raw);
    let recorder = Arc::new(Recorder::default());
    let client = client_for(&config, recorder.clone());

    let err = client.execute(get("http://orders/ping"), &RequestOptions::default()).await.unwrap_err();

    assert!(matches!(err, resilient_client::FeignError::Transport(_)), "{:?}", err);
    assert_eq!(
        recorder.events.lock().unwrap().iter().filter(|e| e.starts_with("complete")).count(),
        1
    );
}

#[tokio::test]
async fn test_hint_header_routes_to_matching_instance() {
    let blue = common::start_mock_backend("blue").await;
    let green = common::start_mock_backend("green").await;

    let raw = format!(
        "[loadbalancer.hint]\norders = \"blue\"\n{}{}",
        instance_toml("orders", "blue-1", blue, "blue"),
        instance_toml("orders", "green-1", green, "green")
    );
    let config = config(&raw);
    let client = client_for(&config, Arc::new(Recorder::default()));

    for _ in 0..3 {
        let response = client.execute(get("http://orders/x"), &RequestOptions::default()).await.unwrap();
        assert_eq!(response.text(), "blue");
    }

    let overridden = OutboundRequest::builder(Method::GET, "http://orders/x")
        .header("X-SC-LB-Hint", "green")
        .unwrap()
        .build()
        .unwrap();
    let response = client.execute(overridden, &RequestOptions::default()).await.unwrap();
    assert_eq!(response.text(), "green");
}

#[tokio::test]
async fn test_missing_host_is_rejected_before_selection() {
    let recorder = Arc::new(Recorder::default());
    let client = client_for(&ClientConfig::default(), recorder.clone());

    let err = client
        .execute(get("file:///etc/hosts"), &RequestOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_precondition());
    assert!(recorder.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_status_is_reported_in_completion_status() {
    let addr = common::start_programmable_backend(|_| async { (500, "boom".to_string()) }).await;
    let config = config(&instance_toml("orders", "orders-1", addr, "none"));
    let recorder = Arc::new(Recorder::default());
    let client = client_for(&config, recorder.clone());

    let response = client.execute(get("http://orders/x"), &RequestOptions::default()).await.unwrap();

    assert_eq!(response.status(), 500);
    // An error status is still a response, so the exchange completes successfully.
    let expected = format!("complete:{}", CompletionStatus::Success.as_str());
    assert_eq!(recorder.events.lock().unwrap().last(), Some(&expected));
}
