//! Job submission and status polling.

mod support;

use api_service::{ApiService, JobOutcome, RequestOptions, TransportResponse, WaitOptions};
use reqwest::Method;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use support::ScriptedTransport;

fn accepted(job_id: serde_json::Value) -> TransportResponse {
    TransportResponse::json(202, &json!({ "job_id": job_id }))
}

fn status(completed_at: serde_json::Value) -> TransportResponse {
    TransportResponse::json(200, &json!({ "completed_at": completed_at }))
}

#[tokio::test(start_paused = true)]
async fn waits_until_the_job_reports_completion() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .reply(accepted(json!("abc")))
            .reply(status(json!(null)))
            .reply(status(json!("2020-01-01 10:00:00"))),
    );
    let service = ApiService::with_defaults(transport.clone(), RequestOptions::new());

    let submission = service
        .submit_job("/reports", &json!({"year": 2020}), RequestOptions::new())
        .await
        .expect("submitted");
    assert_eq!(submission.response.status(), 202);
    let job = submission.job.expect("job waiter");
    assert_eq!(job.job_id(), "abc");

    let completions = Arc::new(AtomicUsize::new(0));
    let seen = completions.clone();
    let outcome = job
        .wait(WaitOptions::new().on_complete(move |resp| {
            assert_eq!(resp.status(), 200);
            seen.fetch_add(1, Ordering::SeqCst);
        }))
        .await
        .unwrap();

    assert!(matches!(outcome, JobOutcome::Completed(_)));
    assert_eq!(completions.load(Ordering::SeqCst), 1);

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(requests[0].headers.get("submit-as-job"), Some("1"));
    assert_eq!(requests[0].body, Some(json!({"year": 2020})));
    assert_eq!(requests[1].method, Method::GET);
    assert_eq!(requests[1].url, "/api/v2/api_jobs/abc?uuid=abc");
}

#[tokio::test]
async fn no_waiter_unless_accepted() {
    let transport = Arc::new(ScriptedTransport::new().reply(TransportResponse::json(200, &json!({"job_id": "x"}))));
    let service = ApiService::with_defaults(transport, RequestOptions::new());
    let submission = service
        .submit_job("/reports", &(), RequestOptions::new())
        .await
        .unwrap();
    assert!(submission.job.is_none());
}

#[tokio::test(start_paused = true)]
async fn never_polls_after_stop_waiting() {
    let transport = Arc::new(ScriptedTransport::new().reply(accepted(json!(9))).reply(status(json!(null))));
    let service = ApiService::with_defaults(transport.clone(), RequestOptions::new());
    let job = service
        .submit_job("/reports", &(), RequestOptions::new())
        .await
        .unwrap()
        .job
        .expect("job waiter");
    assert_eq!(job.job_id(), "9");

    let waiting = job.wait(WaitOptions::new().recheck_interval(Duration::from_secs(5)));
    tokio::time::sleep(Duration::from_secs(12)).await;
    let polls = transport.calls() - 1;
    assert_eq!(polls, 2);

    job.stop_waiting();
    assert!(matches!(waiting.await.unwrap(), JobOutcome::Stopped));
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.calls() - 1, polls);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_the_timeout() {
    let transport = Arc::new(ScriptedTransport::new().reply(accepted(json!("slow"))).reply(status(json!(null))));
    let service = ApiService::with_defaults(transport.clone(), RequestOptions::new());
    let job = service
        .submit_job("/reports", &(), RequestOptions::new())
        .await
        .unwrap()
        .job
        .expect("job waiter");

    let timed_out = Arc::new(AtomicUsize::new(0));
    let seen = timed_out.clone();
    let outcome = job
        .wait(
            WaitOptions::new()
                .recheck_interval(Duration::from_secs(5))
                .timeout(Duration::from_secs(20))
                .on_timeout(move || {
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, JobOutcome::TimedOut));
    assert_eq!(timed_out.load(Ordering::SeqCst), 1);
    assert_eq!(transport.calls() - 1, 3);
}
