//! End-to-end tests for the tracking middleware over real tower services.

use std::convert::Infallible;
use std::io;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::routing::get;
use axum::Router;
use request_tracking::{
    CorrelationIdLayer, InMemorySink, OperationHandle, RequestTelemetry, SinkError,
    TelemetrySink, TrackingConfig, TrackingLayer,
};
use tower::{service_fn, Layer, Service, ServiceExt};

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Downstream that sleeps briefly and answers with the given status.
fn downstream(
    status: StatusCode,
) -> impl Service<Request<Body>, Response = Response<Body>, Error = Infallible, Future: Send>
       + Clone
       + Send
       + 'static {
    service_fn(move |_req: Request<Body>| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(Response::builder()
            .status(status)
            .body(Body::from("hello"))
            .unwrap())
    })
}

#[tokio::test]
async fn successful_exchange_emits_one_request_record() {
    let sink = InMemorySink::new();
    let service = TrackingLayer::new(sink.clone()).layer(downstream(StatusCode::OK));

    let response = service
        .oneshot(request(Method::GET, "http://example.com/orders/42"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let records = sink.requests();
    assert_eq!(records.len(), 1);
    assert!(sink.exceptions().is_empty());
    assert_eq!(sink.open_operations(), 0);

    let record = &records[0];
    assert_eq!(record.name, "GET /orders/42");
    assert_eq!(record.method, "GET");
    assert_eq!(record.url, "http://example.com/orders/42");
    assert!(record.success);
    assert_eq!(record.response_code.as_deref(), Some("200"));
    assert!(record.duration >= Duration::from_millis(5));
    assert!(record.duration < Duration::from_secs(1));
}

#[tokio::test]
async fn client_and_server_errors_are_unsuccessful() {
    for status in [StatusCode::NOT_FOUND, StatusCode::INTERNAL_SERVER_ERROR] {
        let sink = InMemorySink::new();
        let service = TrackingLayer::new(sink.clone()).layer(downstream(status));

        let response = service
            .oneshot(request(Method::GET, "/missing"))
            .await
            .unwrap();
        assert_eq!(response.status(), status);

        let records = sink.requests();
        assert_eq!(records.len(), 1);
        assert!(!records[0].success);
        assert_eq!(
            records[0].response_code.as_deref(),
            Some(status.as_u16().to_string().as_str())
        );
    }
}

#[tokio::test]
async fn status_just_below_400_is_successful() {
    let sink = InMemorySink::new();
    let service = TrackingLayer::new(sink.clone()).layer(downstream(StatusCode::PERMANENT_REDIRECT));

    service
        .oneshot(request(Method::GET, "/moved"))
        .await
        .unwrap();

    let records = sink.requests();
    assert!(records[0].success);
    assert_eq!(records[0].response_code.as_deref(), Some("308"));
}

#[tokio::test]
async fn downstream_fault_is_captured_and_returned_unchanged() {
    let sink = InMemorySink::new();
    let service = TrackingLayer::new(sink.clone()).layer(service_fn(
        |_req: Request<Body>| async move {
            Err::<Response<Body>, io::Error>(io::Error::new(
                io::ErrorKind::InvalidInput,
                "bad payload",
            ))
        },
    ));

    let error = service
        .oneshot(request(Method::POST, "/orders"))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), io::ErrorKind::InvalidInput);
    assert_eq!(error.to_string(), "bad payload");

    let records = sink.requests();
    let exceptions = sink.exceptions();
    assert_eq!(records.len(), 1);
    assert_eq!(exceptions.len(), 1);
    assert_eq!(sink.open_operations(), 0);

    let record = &records[0];
    assert_eq!(record.name, "POST /orders");
    assert!(!record.success);
    assert_eq!(record.response_code.as_deref(), Some("InternalServerError"));

    assert_eq!(exceptions[0].message, "bad payload");
    assert_eq!(exceptions[0].operation_id, record.id);
}

#[tokio::test]
async fn untracked_exchange_passes_through_with_no_telemetry() {
    let sink = InMemorySink::new();
    let config = TrackingConfig::ignoring_path_prefixes(["/health"]);
    let service =
        TrackingLayer::with_config(sink.clone(), config).layer(downstream(StatusCode::OK));

    let response = service
        .oneshot(request(Method::GET, "/health/live"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&body[..], b"hello");

    assert!(sink.requests().is_empty());
    assert!(sink.exceptions().is_empty());
    assert_eq!(sink.open_operations(), 0);
}

#[tokio::test]
async fn untracked_fault_passes_through_with_no_telemetry() {
    let sink = InMemorySink::new();
    let config = TrackingConfig::new().with_filter(|_| false);
    let service = TrackingLayer::with_config(sink.clone(), config).layer(service_fn(
        |_req: Request<Body>| async move {
            Err::<Response<Body>, io::Error>(io::Error::other("boom"))
        },
    ));

    let error = service
        .oneshot(request(Method::GET, "/anything"))
        .await
        .unwrap_err();
    assert_eq!(error.to_string(), "boom");
    assert!(sink.requests().is_empty());
    assert!(sink.exceptions().is_empty());
}

#[tokio::test]
async fn name_reflects_request_before_downstream_mutation() {
    let sink = InMemorySink::new();
    let service = TrackingLayer::new(sink.clone()).layer(service_fn(
        |mut req: Request<Body>| async move {
            // Downstream rewrites the request it now owns.
            *req.method_mut() = Method::DELETE;
            *req.uri_mut() = "/rewritten".parse().unwrap();
            Ok::<_, Infallible>(Response::new(Body::empty()))
        },
    ));

    service
        .oneshot(request(Method::GET, "/orders/42"))
        .await
        .unwrap();

    let records = sink.requests();
    assert_eq!(records[0].name, "GET /orders/42");
    assert_eq!(records[0].method, "GET");
}

#[tokio::test]
async fn enrichment_pairs_merge_with_last_write_winning() {
    let sink = InMemorySink::new();
    let config = TrackingConfig::new().with_enricher(|parts| {
        vec![
            ("tenant".to_string(), "first".to_string()),
            ("path".to_string(), parts.uri.path().to_string()),
            ("tenant".to_string(), "second".to_string()),
        ]
    });
    let service =
        TrackingLayer::with_config(sink.clone(), config).layer(downstream(StatusCode::OK));

    service.oneshot(request(Method::GET, "/a")).await.unwrap();

    let record = &sink.requests()[0];
    assert_eq!(record.properties.len(), 2);
    assert_eq!(record.properties["tenant"], "second");
    assert_eq!(record.properties["path"], "/a");
}

#[tokio::test]
async fn correlation_layer_feeds_the_tracking_record() {
    let sink = InMemorySink::new();
    let app = Router::new()
        .route("/orders/{id}", get(|| async { "order" }))
        .layer(TrackingLayer::new(sink.clone()))
        .layer(CorrelationIdLayer::new());

    // Upstream-provided ID is reused and echoed back.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/orders/42")
                .header("x-request-id", "upstream-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "upstream-123"
    );

    let records = sink.requests();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id.as_str(), "upstream-123");
    assert_eq!(records[0].name, "GET /orders/42");

    // Without an inbound header a fresh ID is minted and still echoed.
    let response = app
        .oneshot(request(Method::GET, "/orders/7"))
        .await
        .unwrap();
    let echoed = response
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(!echoed.is_empty());
    assert_eq!(sink.requests()[1].id.as_str(), echoed);
}

#[tokio::test]
async fn invalid_inbound_correlation_id_is_replaced() {
    let sink = InMemorySink::new();
    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .layer(TrackingLayer::new(sink.clone()))
        .layer(CorrelationIdLayer::new());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/")
                .header("x-request-id", "not valid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let echoed = response
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap();
    assert_ne!(echoed, "not valid");
    assert_eq!(sink.requests()[0].id.as_str(), echoed);
}

/// Sink whose start refuses every operation.
#[derive(Debug, Clone, Default)]
struct RefusingSink;

impl TelemetrySink for RefusingSink {
    fn start_operation(&self, _: RequestTelemetry) -> Result<OperationHandle, SinkError> {
        Err(SinkError::Unavailable("ingestion endpoint down".to_string()))
    }

    fn stop_operation(&self, _: OperationHandle) -> Result<(), SinkError> {
        Ok(())
    }

    fn track_exception(
        &self,
        _: request_tracking::ExceptionTelemetry,
    ) -> Result<(), SinkError> {
        Ok(())
    }
}

#[tokio::test]
async fn sink_failure_never_fails_the_request() {
    let service = TrackingLayer::new(RefusingSink).layer(downstream(StatusCode::OK));

    let response = service
        .oneshot(request(Method::GET, "/orders/42"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn concurrent_exchanges_track_independently() {
    let sink = InMemorySink::new();
    let service = TrackingLayer::new(sink.clone()).layer(downstream(StatusCode::OK));

    let calls = (0..8).map(|i| {
        let service = service.clone();
        async move {
            service
                .oneshot(request(Method::GET, &format!("/orders/{i}")))
                .await
                .unwrap()
        }
    });
    futures_util::future::join_all(calls).await;

    assert_eq!(sink.requests().len(), 8);
    assert_eq!(sink.open_operations(), 0);
    for record in sink.requests() {
        assert!(record.success);
        assert!(record.duration > Duration::ZERO);
    }
}
