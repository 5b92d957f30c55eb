//! End-to-end dispatch through the bound router.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::body::Body;
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde::Serialize;
use serde_json::{Value, json};
use tower::ServiceExt;

use routekit::app;
use routekit::config::Config;
use routekit::container::ServiceContainer;
use routekit::error::{BindError, DeclarationError, HandlerError, HttpError};
use routekit::logger::{LogBuffer, Logger, LoggerFactory, MemorySink};
use routekit::routes::auth::{Authenticator, BearerTokenAuthenticator};
use routekit::routes::registrar::Registrar;
use routekit::routes::{ApiRequest, RouteSpec, RouteTable, Service};
use routekit::store::{Article, InMemoryArticleStore, Tag};
use routekit::trace_context::{self, TRACE_ID_HEADER, TRACE_ID_LEN};

#[derive(Serialize)]
struct Hello {
    hello: &'static str,
}

struct Probe {
    logger: Logger,
    calls: AtomicUsize,
}

impl Probe {
    fn new(factory: &LoggerFactory) -> Self {
        Self {
            logger: factory.create_logger("Probe"),
            calls: AtomicUsize::new(0),
        }
    }

    async fn hello(self: Arc<Self>, _request: ApiRequest) -> Result<Hello, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.logger.debug("starting");
        self.logger.info("said hello");
        Ok(Hello { hello: "world" })
    }

    async fn missing(self: Arc<Self>, _request: ApiRequest) -> Result<Hello, HandlerError> {
        self.logger.debug("looking");
        self.logger.info("lookup started");
        Err(HttpError::not_found("not found").into())
    }

    async fn broken(self: Arc<Self>, _request: ApiRequest) -> Result<Hello, HandlerError> {
        Err(HandlerError::internal("database unavailable"))
    }

    async fn panics(self: Arc<Self>, _request: ApiRequest) -> Result<Hello, HandlerError> {
        self.logger.debug("about to fail");
        panic!("handler blew up");
    }

    async fn guarded(self: Arc<Self>, _request: ApiRequest) -> Result<Hello, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Hello { hello: "guarded" })
    }

    async fn echo(self: Arc<Self>, request: ApiRequest) -> Result<Value, HandlerError> {
        let id = request.param("id")?.to_string();
        let trace = trace_context::current_trace_id();
        tokio::task::yield_now().await;
        self.logger.info(format!("echo {id}"));
        Ok(json!({ "id": id, "trace": trace }))
    }
}

impl Service for Probe {
    fn declare(routes: &mut RouteTable<Self>) -> Result<(), DeclarationError> {
        routes
            .module("probe")
            .get("/", "hello", RouteSpec::new(), Self::hello)?
            .get("/missing", "missing", RouteSpec::new(), Self::missing)?
            .get("/broken", "broken", RouteSpec::new(), Self::broken)?
            .get("/panic", "panics", RouteSpec::new(), Self::panics)?
            .post("/guarded", "guarded", RouteSpec::new().auth(), Self::guarded)?
            .get("/echo/{id}", "echo", RouteSpec::new(), Self::echo)?;
        Ok(())
    }
}

struct Harness {
    router: Router,
    sink: Arc<MemorySink>,
    buffer: Arc<LogBuffer>,
    probe: Arc<Probe>,
}

fn harness(authenticator: Option<Arc<dyn Authenticator>>) -> Harness {
    let buffer = Arc::new(LogBuffer::default());
    let sink = Arc::new(MemorySink::new());
    let factory = LoggerFactory::new(buffer.clone(), sink.clone());

    let probe = Arc::new(Probe::new(&factory));
    let mut container = ServiceContainer::new();
    container.register(probe.clone());

    let mut registrar =
        Registrar::new(Arc::new(container), factory).with_authenticator(authenticator);
    registrar.mount::<Probe>().unwrap();

    Harness {
        router: registrar.into_router(),
        sink,
        buffer,
        probe,
    }
}

async fn send(router: &Router, method: &str, uri: &str) -> (StatusCode, String, Value) {
    send_request(
        router,
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

async fn send_request(router: &Router, request: Request<Body>) -> (StatusCode, String, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let trace = response
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, trace, body)
}

#[tokio::test]
async fn test_success_returns_value_and_dumps_info_only() {
    let h = harness(None);

    let (status, trace, body) = send(&h.router, "GET", "/probe/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "hello": "world" }));
    assert_eq!(trace.len(), TRACE_ID_LEN);

    let lines = h.sink.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("INFO"));
    assert!(lines[0].contains("said hello"));
    assert!(lines[0].contains(&format!("traceId={trace}")));
    assert!(h.buffer.is_empty());
}

#[tokio::test]
async fn test_route_answers_without_trailing_slash() {
    let h = harness(None);
    let (status, _, body) = send(&h.router, "GET", "/probe").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hello"], "world");
}

#[tokio::test]
async fn test_http_error_keeps_status_and_dumps_everything() {
    let h = harness(None);

    let (status, _, body) = send(&h.router, "GET", "/probe/missing").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "not found" }));

    let lines = h.sink.lines();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("DEBUG") && lines[0].contains("looking"));
    assert!(lines[1].contains("INFO") && lines[1].contains("lookup started"));
    assert!(lines[2].contains("ERROR") && lines[2].contains("not found"));
    assert!(h.buffer.is_empty());
}

#[tokio::test]
async fn test_internal_error_is_500_with_message() {
    let h = harness(None);

    let (status, _, body) = send(&h.router, "GET", "/probe/broken").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "detail": "database unavailable" }));
    assert!(h.sink.lines().iter().any(|l| l.contains("ERROR")));
}

#[tokio::test]
async fn test_panic_is_reported_as_unknown_error() {
    let h = harness(None);

    let (status, _, body) = send(&h.router, "GET", "/probe/panic").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "detail": "Unknown error." }));
    let lines = h.sink.lines();
    assert!(lines.iter().any(|l| l.contains("about to fail")));
    assert!(h.buffer.is_empty());

    let (status, _, _) = send(&h.router, "GET", "/probe/").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_rejected_auth_skips_operation() {
    let h = harness(Some(Arc::new(BearerTokenAuthenticator::new("secret"))));

    let (status, trace, body) = send(&h.router, "POST", "/probe/guarded").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["detail"].is_string());
    assert_eq!(trace.len(), TRACE_ID_LEN);
    assert_eq!(h.probe.calls.load(Ordering::SeqCst), 0);
    assert!(h.sink.lines().iter().any(|l| l.contains("Authentication failed")));

    let request = Request::builder()
        .method("POST")
        .uri("/probe/guarded")
        .header("authorization", "Bearer secret")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send_request(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hello"], "guarded");
    assert_eq!(h.probe.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ungated_routes_ignore_authenticator() {
    let h = harness(Some(Arc::new(BearerTokenAuthenticator::new("secret"))));
    let (status, _, _) = send(&h.router, "GET", "/probe/").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_no_authenticator_leaves_gated_route_open() {
    let h = harness(None);
    let (status, _, body) = send(&h.router, "POST", "/probe/guarded").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hello"], "guarded");
}

#[tokio::test]
async fn test_wrong_method_is_not_dispatched() {
    let h = harness(None);
    let (status, _, _) = send(&h.router, "DELETE", "/probe/").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(h.probe.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_requests_keep_their_own_trace() {
    let h = harness(None);

    let requests = (0..20).map(|i| {
        let router = h.router.clone();
        async move { send(&router, "GET", &format!("/probe/echo/{i}")).await }
    });
    let responses = futures::future::join_all(requests).await;

    let mut traces = HashSet::new();
    for (i, (status, header, body)) in responses.into_iter().enumerate() {
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], i.to_string());
        assert_eq!(body["trace"], header.as_str());
        traces.insert(header);
    }
    assert_eq!(traces.len(), 20);

    let lines = h.sink.lines();
    assert_eq!(lines.len(), 20);
    assert!(h.buffer.is_empty());
}

#[test]
fn test_mounting_twice_fails() {
    let factory = LoggerFactory::new(Arc::new(LogBuffer::default()), Arc::new(MemorySink::new()));
    let mut container = ServiceContainer::new();
    container.register(Arc::new(Probe::new(&factory)));
    let mut registrar = Registrar::new(Arc::new(container), factory);

    registrar.mount::<Probe>().unwrap();
    let err = registrar.mount::<Probe>().err();
    assert_eq!(
        err,
        Some(BindError::DuplicateRoute {
            module: "probe".to_string(),
            operation_id: "hello".to_string(),
        })
    );
}

#[tokio::test]
async fn test_bundled_application_serves_articles_and_hello() {
    let store = InMemoryArticleStore::with_articles([
        Article::new("author1", "title1", "content1", vec![Tag::JavaScript]),
        Article::new("author2", "title2", "content2", vec![Tag::Nutrition, Tag::Exercise]),
    ])
    .await
    .unwrap();
    let sink = Arc::new(MemorySink::new());
    let config = Config {
        auth_token: Some("secret".to_string()),
        ..Config::default()
    };
    let application = app::build(&config, Arc::new(store), sink.clone()).unwrap();

    let (status, _, _) = send(&application.router, "GET", "/hello/").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/hello/")
        .header("authorization", "Bearer secret")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send_request(&application.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "hello": "world" }));
    assert!(sink.lines().iter().any(|l| l.contains("Hello World")));

    let request = Request::builder()
        .uri("/articles/?tags=Exercise")
        .header("authorization", "Bearer secret")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send_request(&application.router, request).await;
    assert_eq!(status, StatusCode::OK);
    let articles = body["articles"].as_array().unwrap();
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0]["author"], "author2");

    let request = Request::builder()
        .uri("/articles/?tags=Cooking")
        .header("authorization", "Bearer secret")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send_request(&application.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(application.buffer.is_empty());
}

struct HelloArticles;

impl HelloArticles {
    async fn hello(self: Arc<Self>, _request: ApiRequest) -> Result<Value, HandlerError> {
        Ok(json!({ "hello": "world" }))
    }
}

impl Service for HelloArticles {
    fn declare(routes: &mut RouteTable<Self>) -> Result<(), DeclarationError> {
        routes
            .module("articles")
            .get("/", "hello", RouteSpec::new(), Self::hello)?;
        Ok(())
    }
}

#[tokio::test]
async fn test_module_root_route_is_served_under_module_url() {
    let factory = LoggerFactory::new(Arc::new(LogBuffer::default()), Arc::new(MemorySink::new()));
    let mut container = ServiceContainer::new();
    container.register(Arc::new(HelloArticles));
    let mut registrar = Registrar::new(Arc::new(container), factory);
    registrar.mount::<HelloArticles>().unwrap();
    let router = registrar.into_router();

    let (status, _, body) = send(&router, "GET", "/articles/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "hello": "world" }));
}
