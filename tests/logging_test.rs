//! Log output of the service and the logging interceptor.

mod support;

use api_service::{ApiService, LoggingInterceptor, RequestOptions, TransportResponse, WaitOptions};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use support::ScriptedTransport;
use tracing_test::traced_test;

#[tokio::test]
#[traced_test]
async fn logging_interceptor_logs_each_stage() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .reply(TransportResponse::json(200, &json!({})))
            .reply(TransportResponse::json(503, &json!({}))),
    );
    let service = ApiService::with_defaults(transport, RequestOptions::new());
    service.add_interceptor(LoggingInterceptor);

    service.get("/ok", (), RequestOptions::new()).await.unwrap();
    service.get("/down", (), RequestOptions::new()).await.unwrap_err();

    assert!(logs_contain("sending request"));
    assert!(logs_contain("response received"));
    assert!(logs_contain("request error"));
    assert!(logs_contain("HTTP 503"));
}

#[tokio::test]
#[traced_test]
async fn cache_hits_are_traced() {
    let service = ApiService::with_defaults(Arc::new(ScriptedTransport::new()), RequestOptions::new());
    let options = RequestOptions::new().cache_for("1m");
    service.get("/a", (), options.clone()).await.unwrap();
    service.get("/a", (), options).await.unwrap();
    assert!(logs_contain("cache hit"));
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn job_timeout_is_logged_as_warning() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .reply(TransportResponse::json(202, &json!({"job_id": "j1"})))
            .reply(TransportResponse::json(200, &json!({"completed_at": null}))),
    );
    let service = ApiService::with_defaults(transport, RequestOptions::new());
    let job = service
        .submit_job("/exports", &json!({}), RequestOptions::new())
        .await
        .unwrap()
        .job
        .expect("job waiter");

    job.wait(
        WaitOptions::new()
            .recheck_interval(Duration::from_secs(1))
            .timeout(Duration::from_secs(3)),
    )
    .await
    .unwrap();

    assert!(logs_contain("WARN"));
    assert!(logs_contain("Stopped checking API job status after 3000 milliseconds"));
}
