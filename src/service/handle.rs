use crate::cancel::CancelHandle;
use crate::envelope::{ApiError, ApiResponse};
use crate::error::FetchError;
use crate::request::ApiRequest;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tracing::Instrument;
use uuid::Uuid;

pub type ResponseResult = Result<ApiResponse, ApiError>;

type PanicPayload = Arc<Mutex<Option<Box<dyn Any + Send>>>>;

// Marks the handle settled when the task ends, including by panic.
struct SettledGuard(Arc<AtomicBool>);

impl Drop for SettledGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[derive(Clone)]
enum Settled {
    Done(ResponseResult),
    Panicked(PanicPayload),
}

/// The pending result of a request.
///
/// Clones share one underlying result, which is how cached and coalesced
/// requests hand the same response to every caller. Awaiting resolves to the
/// response or the error envelope; [`abort`](Self::abort) cancels the request
/// if it is still in flight.
#[derive(Clone)]
pub struct ResponseHandle {
    id: Uuid,
    future: Shared<BoxFuture<'static, Settled>>,
    cancel: CancelHandle,
    settled: Arc<AtomicBool>,
}

impl ResponseHandle {
    /// Spawn `work` on the runtime and return a handle to its result.
    pub(crate) fn spawn<F>(request: Arc<ApiRequest>, work: F) -> Self
    where
        F: Future<Output = ResponseResult> + Send + 'static,
    {
        let settled = Arc::new(AtomicBool::new(false));
        let guard = SettledGuard(settled.clone());
        let task = tokio::spawn(
            async move {
                let _guard = guard;
                work.await
            }
            .in_current_span(),
        );

        let id = request.id();
        let cancel = request.cancel_handle().clone();
        let future = async move {
            match task.await {
                Ok(result) => Settled::Done(result),
                Err(err) if err.is_panic() => {
                    Settled::Panicked(Arc::new(Mutex::new(Some(err.into_panic()))))
                }
                Err(_) => Settled::Done(Err(ApiError::new(
                    FetchError::Aborted,
                    ApiResponse::without_response(request),
                ))),
            }
        }
        .boxed()
        .shared();

        Self {
            id,
            future,
            cancel,
            settled,
        }
    }

    /// A handle that is already settled with `result`.
    pub fn ready(request: &ApiRequest, result: ResponseResult) -> Self {
        Self {
            id: request.id(),
            future: futures::future::ready(Settled::Done(result)).boxed().shared(),
            cancel: request.cancel_handle().clone(),
            settled: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Id of the request behind this handle.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// True if both handles wait on the same request.
    pub fn is_same(&self, other: &ResponseHandle) -> bool {
        self.id == other.id
    }

    /// True once the request and its interceptors have finished.
    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }

    /// Cancel the request if it is still in flight. Never fails; returns
    /// whether a cancellation signal was sent.
    pub fn abort(&self) -> bool {
        self.cancel.abort()
    }
}

impl Future for ResponseHandle {
    type Output = ResponseResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.future.poll_unpin(cx) {
            Poll::Ready(Settled::Done(result)) => Poll::Ready(result),
            Poll::Ready(Settled::Panicked(payload)) => {
                let payload = payload
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                match payload {
                    Some(payload) => std::panic::resume_unwind(payload),
                    None => panic!("request task panicked"),
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl fmt::Debug for ResponseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseHandle")
            .field("id", &self.id)
            .field("settled", &self.is_settled())
            .finish()
    }
}
