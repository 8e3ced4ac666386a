use crate::{error::Error, queue::FlushTrigger, response::CallResult, result::Result, value::ParamMap};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::oneshot;

type OutcomeSender = oneshot::Sender<Result<CallResult>>;

/// A queued call waiting for its batch to be sent and answered.
pub struct CallRecord {
    method: String,
    params: ParamMap,
    line: String,
    enqueued_at: u64,
    sender: OutcomeSender,
}

impl CallRecord {
    /// Creates the record of an already validated and encoded call, along with the handle
    /// its caller awaits.
    pub(crate) fn new(method: String, params: ParamMap, line: String, enqueued_at: u64) -> (Self, CallHandle) {
        let (sender, receiver) = oneshot::channel();
        let handle = CallHandle::new(receiver);
        (Self { method, params, line, enqueued_at, sender }, handle)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    /// Encoded wire line of the call.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Unix timestamp (ms) the call entered the queue at.
    pub fn enqueued_at(&self) -> u64 {
        self.enqueued_at
    }

    /// True as long as the call was not settled and its handle is still alive.
    pub fn is_pending(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Settles the call. Consumes the record so a call can only be settled once.
    pub(crate) fn settle(self, outcome: Result<CallResult>) {
        // every handle clone may already be gone, nobody is left to notify then
        let _ = self.sender.send(outcome);
    }
}

impl fmt::Debug for CallRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallRecord")
            .field("method", &self.method)
            .field("line", &self.line)
            .field("enqueued_at", &self.enqueued_at)
            .finish()
    }
}

/// The eventual outcome of a call.
///
/// Handles are cheap to clone and every clone resolves to the same outcome. Calls served
/// from the response cache return a clone of the handle of the call that populated it.
///
/// Polling a handle whose call is still queued sends its batch right away.
#[derive(Clone)]
pub struct CallHandle {
    inner: Shared<BoxFuture<'static, Result<CallResult>>>,
    flush: Option<FlushTrigger>,
}

impl CallHandle {
    fn new(receiver: oneshot::Receiver<Result<CallResult>>) -> Self {
        let outcome = async move { receiver.await.unwrap_or(Err(Error::Dropped)) };
        Self { inner: outcome.boxed().shared(), flush: None }
    }

    pub(crate) fn with_flush_trigger(mut self, trigger: FlushTrigger) -> Self {
        self.flush = Some(trigger);
        self
    }

    /// Tells whether both handles share one outcome.
    pub fn ptr_eq(&self, other: &CallHandle) -> bool {
        Shared::ptr_eq(&self.inner, &other.inner)
    }

    /// The outcome, if it was already polled to completion through any clone.
    pub fn peek(&self) -> Option<&Result<CallResult>> {
        self.inner.peek()
    }
}

impl Future for CallHandle {
    type Output = Result<CallResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(trigger) = self.flush.take() {
            trigger.fire();
        }
        Pin::new(&mut self.inner).poll(cx)
    }
}

impl fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallHandle").field("settled", &self.peek().is_some()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;
    use serde_json::json;

    #[tokio::test]
    async fn test_settle_reaches_every_clone() {
        let (record, handle) = CallRecord::new("m".to_string(), params! {}, "method=m".to_string(), 7);
        let twin = handle.clone();
        assert!(record.is_pending());
        assert!(handle.ptr_eq(&twin));

        record.settle(Ok(CallResult::new(Some("ok"), json!(1))));
        assert_eq!(handle.await.unwrap().result, json!(1));
        assert_eq!(twin.peek().cloned().unwrap().unwrap().result, json!(1));
        assert_eq!(twin.await.unwrap().result, json!(1));
    }

    #[tokio::test]
    async fn test_dropped_record() {
        let (record, handle) = CallRecord::new("m".to_string(), params! {}, "method=m".to_string(), 0);
        drop(record);
        assert_eq!(handle.await, Err(Error::Dropped));
    }

    #[test]
    fn test_dropped_handle_is_not_pending() {
        let (record, handle) = CallRecord::new("m".to_string(), params! {}, "method=m".to_string(), 0);
        drop(handle);
        assert!(!record.is_pending());
        record.settle(Ok(CallResult::missing()));
    }
}
