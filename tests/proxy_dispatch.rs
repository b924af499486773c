//! End-to-end tests of breaker-guarded proxies over the load-balanced stack.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use http::Method;
use resilient_client::config::{parse_config, BreakerSettings, ClientConfig};
use resilient_client::load_balancer::ConfiguredClientFactory;
use resilient_client::proxy::{
    Args, CallContext, DispatchTable, FallbackMethods, JsonMethodHandler, RequestTemplate, X_REQUEST_ID,
};
use resilient_client::resilience::CircuitState;
use resilient_client::{
    build_client, CircuitBreakerBuilder, Client, DefaultCircuitBreakerFactory, FeignError, FeignResult,
    HttpTransport, InvocationDispatcher, MethodSignature, RequestOptions, StaticLoadBalancer, Target,
};
use serde_json::{json, Value};

mod common;

const GET_ORDER: MethodSignature = MethodSignature::new("OrdersClient", "get_order", &["u64"]);
const CREATE_ORDER: MethodSignature = MethodSignature::new("OrdersClient", "create_order", &["Order"]);

/// Fallback serving orders from a local snapshot.
struct SnapshotOrders {
    cause: Option<FeignError>,
}

/// Typed facade over the dispatcher, the way generated clients use it.
struct OrdersClient {
    proxy: InvocationDispatcher<SnapshotOrders>,
}

impl OrdersClient {
    async fn get_order(&self, id: u64) -> FeignResult<Value> {
        self.proxy.invoke(&GET_ORDER, vec![json!(id)]).await
    }

    async fn create_order(&self, order: Value) -> FeignResult<Value> {
        self.proxy.invoke(&CREATE_ORDER, vec![order]).await
    }
}

fn stack(config: &ClientConfig) -> Arc<dyn Client> {
    let options = RequestOptions::from(&config.timeouts);
    build_client(
        Arc::new(HttpTransport::new(&options)),
        Arc::new(StaticLoadBalancer::new(config)),
        Arc::new(ConfiguredClientFactory::new(config.loadbalancer.clone())),
        config.loadbalancer.defaults.retry.enabled,
    )
}

fn dispatch(target: &Target, client: Arc<dyn Client>) -> DispatchTable {
    let options = RequestOptions::default();
    DispatchTable::new()
        .with(
            GET_ORDER,
            JsonMethodHandler::new(
                target.clone(),
                RequestTemplate::new(Method::GET, "/orders/{0}"),
                client.clone(),
                options,
            ),
        )
        .with(
            CREATE_ORDER,
            JsonMethodHandler::new(
                target.clone(),
                RequestTemplate::new(Method::POST, "/orders").body(0),
                client,
                options,
            ),
        )
}

fn snapshot_methods() -> FallbackMethods<SnapshotOrders> {
    FallbackMethods::new()
        .with(GET_ORDER, |fb: Arc<SnapshotOrders>, args: Args| async move {
            let cause = fb.cause.as_ref().map(ToString::to_string);
            Ok::<_, FeignError>(json!({ "id": args[0], "source": "snapshot", "cause": cause }))
        })
        .with(CREATE_ORDER, |_fb: Arc<SnapshotOrders>, _args: Args| async {
            Err::<Value, _>(FeignError::invocation(FeignError::Codec("snapshot is read-only".into())))
        })
}

fn orders_config(addr: std::net::SocketAddr, threshold: u32) -> ClientConfig {
    parse_config(&format!(
        r#"
        [circuit_breaker]
        failure_threshold = {threshold}
        open_duration_ms = 60000

        [[services.orders]]
        host = "{host}"
        port = {port}
        "#,
        threshold = threshold,
        host = addr.ip(),
        port = addr.port(),
    ))
    .expect("valid config")
}

#[tokio::test]
async fn test_typed_client_reads_remote_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let addr = common::start_programmable_backend(move |request| {
        let s = s.clone();
        async move {
            s.lock().unwrap().push(request);
            (200, r#"{"id":42,"status":"shipped"}"#.to_string())
        }
    })
    .await;

    let config = orders_config(addr, 5);
    let target = Target::for_service("OrdersClient", "orders");
    let factory = Arc::new(DefaultCircuitBreakerFactory::new(config.circuit_breaker.clone()));
    let proxy = CircuitBreakerBuilder::from_config(factory, &config.circuit_breaker)
        .target_with_fallback(
            target.clone(),
            dispatch(&target, stack(&config)),
            Arc::new(SnapshotOrders { cause: None }),
            snapshot_methods(),
        )
        .unwrap();
    let client = OrdersClient { proxy };

    let order = client.get_order(42).await.unwrap();
    assert_eq!(order, json!({ "id": 42, "status": "shipped" }));

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].path, "/orders/42");
    assert!(seen[0].header(X_REQUEST_ID).is_some());
}

#[tokio::test]
async fn test_request_id_from_context_reaches_backend() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let addr = common::start_programmable_backend(move |request| {
        let s = s.clone();
        async move {
            s.lock().unwrap().push(request);
            (200, "{}".to_string())
        }
    })
    .await;

    let config = orders_config(addr, 5);
    let target = Target::for_service("OrdersClient", "orders");
    let proxy = CircuitBreakerBuilder::new(Arc::new(DefaultCircuitBreakerFactory::default()))
        .target(target.clone(), dispatch(&target, stack(&config)));

    let ctx = CallContext::new();
    let expected = ctx.request_id().to_string();
    proxy.invoke_with_context(&GET_ORDER, vec![json!(1)], ctx).await.unwrap();

    assert_eq!(seen.lock().unwrap()[0].header(X_REQUEST_ID), Some(expected.as_str()));
}

#[tokio::test]
async fn test_error_status_is_served_by_fallback_factory() {
    let addr = common::start_programmable_backend(|_| async { (500, r#"{"error":"db down"}"#.to_string()) }).await;
    let config = orders_config(addr, 5);
    let target = Target::for_service("OrdersClient", "orders");

    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    let proxy = CircuitBreakerBuilder::new(Arc::new(DefaultCircuitBreakerFactory::default()))
        .target_with_fallback_factory(
            target.clone(),
            dispatch(&target, stack(&config)),
            move |cause: &FeignError| {
                counter.fetch_add(1, Ordering::SeqCst);
                Arc::new(SnapshotOrders {
                    cause: Some(cause.clone()),
                })
            },
            snapshot_methods(),
        )
        .unwrap();
    let client = OrdersClient { proxy };

    let order = client.get_order(9).await.unwrap();
    assert_eq!(order["source"], "snapshot");
    assert_eq!(order["id"], 9);
    assert!(order["cause"].as_str().unwrap().contains("returned status 500"));
    assert_eq!(created.load(Ordering::SeqCst), 1);

    // The fallback's own failure surfaces with its wrapper removed.
    let err = client.create_order(json!({ "sku": "A1" })).await.unwrap_err();
    assert_eq!(err, FeignError::Codec("snapshot is read-only".into()));
    assert_eq!(created.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_breaker_opens_and_stops_calling_backend() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let addr = common::start_programmable_backend(move |_| {
        let h = h.clone();
        async move {
            h.fetch_add(1, Ordering::SeqCst);
            (503, "unavailable".to_string())
        }
    })
    .await;

    let config = orders_config(addr, 2);
    let target = Target::for_service("OrdersClient", "orders");
    let factory = Arc::new(DefaultCircuitBreakerFactory::new(config.circuit_breaker.clone()));
    let proxy = CircuitBreakerBuilder::from_config(factory.clone(), &config.circuit_breaker)
        .target(target.clone(), dispatch(&target, stack(&config)));

    for _ in 0..2 {
        let err = proxy.invoke(&GET_ORDER, vec![json!(1)]).await.unwrap_err();
        assert!(matches!(err, FeignError::Status { status: 503, .. }), "{:?}", err);
    }
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    let breaker = factory.get("OrdersClient#get_order(u64)", None).unwrap();
    assert_eq!(breaker.state(), CircuitState::Open);

    let rejected = proxy.invoke(&GET_ORDER, vec![json!(1)]).await.unwrap_err();
    assert_eq!(
        rejected,
        FeignError::NoFallbackAvailable(Box::new(FeignError::CircuitOpen("OrdersClient#get_order(u64)".into())))
    );
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    // Breakers are per method: creating an order still reaches the backend.
    proxy.invoke(&CREATE_ORDER, vec![json!({})]).await.unwrap_err();
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_grouped_breakers_are_scoped_by_client_name() {
    let addr = common::start_programmable_backend(|_| async { (500, "boom".to_string()) }).await;
    let mut config = orders_config(addr, 1);
    config.circuit_breaker.group_enabled = true;
    config
        .circuit_breaker
        .groups
        .insert("orders-admin".into(), BreakerSettings { failure_threshold: 3, ..Default::default() });

    let target = Target::for_service("OrdersClient", "orders");
    let factory = Arc::new(DefaultCircuitBreakerFactory::new(config.circuit_breaker.clone()));
    let admin = CircuitBreakerBuilder::from_config(factory.clone(), &config.circuit_breaker)
        .client_name("orders-admin")
        .target(target.clone(), dispatch(&target, stack(&config)));
    let public = CircuitBreakerBuilder::from_config(factory.clone(), &config.circuit_breaker)
        .target(target.clone(), dispatch(&target, stack(&config)));

    admin.invoke(&GET_ORDER, vec![json!(1)]).await.unwrap_err();
    public.invoke(&GET_ORDER, vec![json!(1)]).await.unwrap_err();

    let admin_breaker = factory.get("OrdersClient#get_order(u64)", Some("orders-admin")).unwrap();
    let public_breaker = factory.get("OrdersClient#get_order(u64)", Some("orders")).unwrap();
    assert_eq!(admin_breaker.state(), CircuitState::Closed);
    assert_eq!(public_breaker.state(), CircuitState::Open);
    assert_eq!(admin, public);
}

#[tokio::test]
async fn test_unreachable_service_fails_fast_through_fallback() {
    let config = ClientConfig::default();
    let target = Target::for_service("OrdersClient", "orders");
    let proxy = CircuitBreakerBuilder::new(Arc::new(DefaultCircuitBreakerFactory::default()))
        .target_with_fallback(
            target.clone(),
            dispatch(&target, stack(&config)),
            Arc::new(SnapshotOrders { cause: None }),
            snapshot_methods(),
        )
        .unwrap();

    // No instances: the executor answers 503 and the fallback takes over.
    let order = proxy.invoke(&GET_ORDER, vec![json!(5)]).await.unwrap();
    assert_eq!(order["source"], "snapshot");
}
