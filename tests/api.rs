use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::http::{Method, StatusCode};
use actix_web::{test, web, App};
use chrono::Duration;
use serde_json::{json, Value};

use binderq::config::SessionConfig;
use binderq::server::configure;
use async_trait::async_trait;
use binderq::{
    BackoffStrategy, BrokerError, JobBroker, JobCounts, JobId, JobOptions, JobRecord, JobStatus,
    MemoryBroker, QueueRegistry, SessionKeys,
};

const SECRET: &str = "test-secret";

struct Harness {
    broker: Arc<MemoryBroker>,
    keys: SessionKeys,
}

impl Harness {
    fn new() -> Self {
        Self {
            broker: Arc::new(MemoryBroker::new()),
            keys: SessionKeys::new(&SessionConfig::new(SECRET)),
        }
    }

    fn app(
        &self,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        self.app_with(self.broker.clone())
    }

    fn app_with(
        &self,
        broker: Arc<dyn JobBroker>,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(web::Data::new(QueueRegistry::new(broker)))
            .app_data(web::Data::new(self.keys.clone()))
            .configure(configure)
    }

    fn cookie(&self) -> Cookie<'static> {
        let token = self
            .keys
            .issue("user-42", "cook@example.com", Duration::hours(1))
            .unwrap();
        Cookie::new("session", token)
    }
}

/// Broker whose connection is gone: every call fails like a refused socket.
struct UnreachableBroker;

fn refused() -> BrokerError {
    redis::RedisError::from((redis::ErrorKind::IoError, "connection refused")).into()
}

#[async_trait]
impl JobBroker for UnreachableBroker {
    async fn add(&self, _: &str, _: &str, _: Value, _: JobOptions) -> Result<JobId, BrokerError> {
        Err(refused())
    }

    async fn get(&self, _: &str, _: &str) -> Result<Option<JobRecord>, BrokerError> {
        Err(refused())
    }

    async fn list(
        &self,
        _: &str,
        _: JobStatus,
        _: usize,
        _: usize,
    ) -> Result<Vec<JobRecord>, BrokerError> {
        Err(refused())
    }

    async fn counts(&self, _: &str) -> Result<JobCounts, BrokerError> {
        Err(refused())
    }

    async fn retry(&self, _: &str, _: &str) -> Result<(), BrokerError> {
        Err(refused())
    }

    async fn retry_all(&self, _: &str, _: JobStatus) -> Result<u64, BrokerError> {
        Err(refused())
    }

    async fn promote(&self, _: &str, _: &str) -> Result<(), BrokerError> {
        Err(refused())
    }

    async fn remove(&self, _: &str, _: &str) -> Result<(), BrokerError> {
        Err(refused())
    }

    async fn clean(&self, _: &str, _: JobStatus) -> Result<u64, BrokerError> {
        Err(refused())
    }

    async fn pause(&self, _: &str) -> Result<(), BrokerError> {
        Err(refused())
    }

    async fn resume(&self, _: &str) -> Result<(), BrokerError> {
        Err(refused())
    }

    async fn is_paused(&self, _: &str) -> Result<bool, BrokerError> {
        Err(refused())
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        Err(refused())
    }
}

fn request(method: Method, uri: &str) -> test::TestRequest {
    test::TestRequest::default().method(method).uri(uri)
}

#[actix_web::test]
async fn unauthenticated_requests_are_rejected_everywhere() {
    let harness = Harness::new();
    let app = test::init_service(harness.app()).await;

    let cases = [
        (Method::POST, "/api/jobs/trending"),
        (Method::POST, "/api/jobs/recommendations"),
        (Method::POST, "/api/jobs/import"),
        (Method::POST, "/api/jobs/unknown"),
        (Method::GET, "/api/admin/queues"),
        (Method::GET, "/api/admin/queues/"),
        (Method::GET, "/api/admin/queues/api/queues"),
        (Method::GET, "/api/admin/queues/api/queues/trending/jobs"),
        (Method::POST, "/api/admin/queues/api/queues/trending/add"),
        (Method::PUT, "/api/admin/queues/api/queues/trending/pause"),
        (Method::PUT, "/api/admin/queues/api/queues/import/retry/failed"),
        (Method::GET, "/api/admin/queues/static/anything"),
    ];

    for (method, uri) in cases {
        let req = request(method.clone(), uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Unauthorized" }), "{method} {uri}");
    }
    assert_eq!(harness.broker.counts("trending").await.unwrap().total(), 0);
}

#[actix_web::test]
async fn invalid_cookie_is_rejected() {
    let harness = Harness::new();
    let app = test::init_service(harness.app()).await;

    let forged = SessionKeys::new(&SessionConfig::new("someone-else"))
        .issue("user-42", "cook@example.com", Duration::hours(1))
        .unwrap();
    let req = test::TestRequest::post()
        .uri("/api/jobs/trending")
        .cookie(Cookie::new("session", forged))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn trending_enqueue_returns_job_id_with_retry_policy() {
    let harness = Harness::new();
    let app = test::init_service(harness.app()).await;

    let req = test::TestRequest::post()
        .uri("/api/jobs/trending")
        .cookie(harness.cookie())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["success"], json!(true));
    let job_id = body["jobId"].as_str().unwrap();
    assert!(!job_id.is_empty());

    let job = harness.broker.get("trending", job_id).await.unwrap().unwrap();
    assert_eq!(job.name, "calculate-trending");
    assert_eq!(job.status, JobStatus::Waiting);
    assert_eq!(job.opts.attempts, 3);
    assert_eq!(job.opts.backoff.strategy, BackoffStrategy::Exponential);
    assert_eq!(job.opts.backoff.delay_ms, 60_000);
    assert_eq!(job.data["requestedBy"], "user-42");
}

#[actix_web::test]
async fn recommendations_default_to_session_user() {
    let harness = Harness::new();
    let app = test::init_service(harness.app()).await;

    let req = test::TestRequest::post()
        .uri("/api/jobs/recommendations")
        .cookie(harness.cookie())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let job_id = body["jobId"].as_str().unwrap();

    let job = harness.broker.get("recommendations", job_id).await.unwrap().unwrap();
    assert_eq!(job.data["userId"], "user-42");
    assert_eq!(job.opts, JobOptions::default());
}

#[actix_web::test]
async fn import_validates_url() {
    let harness = Harness::new();
    let app = test::init_service(harness.app()).await;

    let req = test::TestRequest::post()
        .uri("/api/jobs/import")
        .cookie(harness.cookie())
        .set_json(json!({ "url": "ftp://example.com/pie" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/jobs/import")
        .cookie(harness.cookie())
        .set_json(json!({ "url": "https://example.com/pie", "binderId": "b1" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let job = harness
        .broker
        .get("import", body["jobId"].as_str().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.data, json!({ "userId": "user-42", "url": "https://example.com/pie", "binderId": "b1" }));
}

#[actix_web::test]
async fn board_overview_renders_html() {
    let harness = Harness::new();
    let app = test::init_service(harness.app()).await;

    let req = test::TestRequest::get()
        .uri("/api/admin/queues")
        .cookie(harness.cookie())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    let html = std::str::from_utf8(&body).unwrap();
    assert!(html.contains("Binder Queues"));
    assert!(html.contains("cook@example.com"));
}

#[actix_web::test]
async fn board_add_keeps_body_unmodified() {
    let harness = Harness::new();
    let app = test::init_service(harness.app()).await;

    let data = json!({ "recipes": [1, 2, 3], "nested": { "flag": true, "note": "ünïcode" } });
    let req = test::TestRequest::post()
        .uri("/api/admin/queues/api/queues/recommendations/add")
        .cookie(harness.cookie())
        .set_json(json!({ "name": "rebuild", "data": data.clone() }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let job_id = body["jobId"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri(&format!("/api/admin/queues/api/queues/recommendations/jobs/{job_id}"))
        .cookie(harness.cookie())
        .to_request();
    let job: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(job["data"], data);
    assert_eq!(job["name"], "rebuild");
    assert_eq!(job["opts"]["attempts"], 3);
}

#[actix_web::test]
async fn board_lists_and_paginates_jobs() {
    let harness = Harness::new();
    for n in 0..12 {
        harness
            .broker
            .add("trending", "calculate-trending", json!({ "n": n }), JobOptions::default())
            .await
            .unwrap();
    }
    let app = test::init_service(harness.app()).await;

    let req = test::TestRequest::get()
        .uri("/api/admin/queues/api/queues/trending/jobs?status=waiting&page=2&limit=5")
        .cookie(harness.cookie())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["pagination"]["total"], 12);
    assert_eq!(body["pagination"]["totalPages"], 3);
    let ns: Vec<i64> = body["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["data"]["n"].as_i64().unwrap())
        .collect();
    assert_eq!(ns, vec![5, 6, 7, 8, 9]);

    let req = test::TestRequest::get()
        .uri("/api/admin/queues/api/queues")
        .cookie(harness.cookie())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["queues"][1]["name"], "trending");
    assert_eq!(body["queues"][1]["counts"]["waiting"], 12);
}

#[actix_web::test]
async fn board_retries_failed_jobs() {
    let harness = Harness::new();
    let id = harness
        .broker
        .add("import", "import-recipe", json!({}), JobOptions::default())
        .await
        .unwrap();
    harness.broker.mark_active("import", id.as_str()).unwrap();
    harness.broker.mark_failed("import", id.as_str(), "parse error").unwrap();
    let app = test::init_service(harness.app()).await;

    let uri = format!("/api/admin/queues/api/queues/import/jobs/{id}/retry");
    let req = test::TestRequest::put().uri(&uri).cookie(harness.cookie()).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "retried");
    let job = harness.broker.get("import", id.as_str()).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Waiting);

    // A second retry finds the job waiting, not failed.
    let req = test::TestRequest::put().uri(&uri).cookie(harness.cookie()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn board_pause_resume_and_clean() {
    let harness = Harness::new();
    let app = test::init_service(harness.app()).await;

    let req = test::TestRequest::put()
        .uri("/api/admin/queues/api/queues/trending/pause")
        .cookie(harness.cookie())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert!(harness.broker.is_paused("trending").await.unwrap());

    let req = test::TestRequest::put()
        .uri("/api/admin/queues/api/queues/trending/resume")
        .cookie(harness.cookie())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert!(!harness.broker.is_paused("trending").await.unwrap());

    harness
        .broker
        .add("trending", "t", json!({}), JobOptions::default().with_delay(10_000))
        .await
        .unwrap();
    let req = test::TestRequest::put()
        .uri("/api/admin/queues/api/queues/trending/clean/delayed")
        .cookie(harness.cookie())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["count"], 1);
}

#[actix_web::test]
async fn board_reports_unknown_queues_and_statuses() {
    let harness = Harness::new();
    let app = test::init_service(harness.app()).await;

    let req = test::TestRequest::get()
        .uri("/api/admin/queues/api/queues/emails/jobs")
        .cookie(harness.cookie())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::put()
        .uri("/api/admin/queues/api/queues/import/retry/waiting")
        .cookie(harness.cookie())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/admin/queues/api/queues/import/jobs?status=bogus")
        .cookie(harness.cookie())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn board_exports_csv() {
    let harness = Harness::new();
    let id = harness
        .broker
        .add("import", "import-recipe", json!({ "url": "https://example.com" }), JobOptions::default())
        .await
        .unwrap();
    harness.broker.mark_active("import", id.as_str()).unwrap();
    harness.broker.mark_failed("import", id.as_str(), "timeout").unwrap();
    let app = test::init_service(harness.app()).await;

    let req = test::TestRequest::get()
        .uri("/api/admin/queues/api/queues/import/export?status=failed")
        .cookie(harness.cookie())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("content-type").unwrap(), "text/csv");
    let body = test::read_body(resp).await;
    let csv = std::str::from_utf8(&body).unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("id,queue,name,status"));
    let row = lines.next().unwrap();
    assert!(row.contains("import-recipe") && row.contains("failed") && row.contains("timeout"));
}

#[actix_web::test]
async fn health_is_public() {
    let harness = Harness::new();
    let app = test::init_service(harness.app()).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn health_reports_unreachable_broker() {
    let harness = Harness::new();
    let app = test::init_service(harness.app_with(Arc::new(UnreachableBroker))).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "status": "degraded", "broker": "down" }));
}

#[actix_web::test]
async fn enqueue_failures_return_generic_error() {
    let harness = Harness::new();
    let app = test::init_service(harness.app_with(Arc::new(UnreachableBroker))).await;

    let cases = [
        ("/api/jobs/trending", json!({})),
        ("/api/jobs/recommendations", json!({})),
        ("/api/jobs/import", json!({ "url": "https://example.com/pie" })),
        ("/api/admin/queues/api/queues/trending/add", json!({ "name": "rebuild" })),
    ];
    for (uri, payload) in cases {
        let req = test::TestRequest::post()
            .uri(uri)
            .cookie(harness.cookie())
            .set_json(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Failed to enqueue job" }), "{uri}");
    }
}

#[actix_web::test]
async fn board_rejects_out_of_range_delay() {
    let harness = Harness::new();
    let app = test::init_service(harness.app()).await;

    for delay in [json!(i64::MAX), json!(u64::MAX)] {
        let req = test::TestRequest::post()
            .uri("/api/admin/queues/api/queues/import/add")
            .cookie(harness.cookie())
            .set_json(json!({
                "name": "import-recipe",
                "data": {},
                "opts": {
                    "attempts": 3,
                    "backoff": { "type": "exponential", "delay": 60000 },
                    "delayMs": delay
                }
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "delay {delay}");
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("out of range"), "delay {delay}");
    }
    assert_eq!(harness.broker.counts("import").await.unwrap().total(), 0);
}
