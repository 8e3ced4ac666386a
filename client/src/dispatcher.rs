use crate::{
    clock::DynClock,
    config::Config,
    encoder::{encode_batch, encode_query},
    error::{Error, TransportError},
    events::EventHub,
    record::CallRecord,
    response::{CallResult, parse_response},
    transport::{DynTransport, ExchangeRequest},
};
use batchwire_core::{debug, time::elapsed_millis, trace};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Sends batches through the transport and settles their calls from the response.
#[derive(Debug)]
pub(crate) struct Dispatcher {
    config: Arc<Config>,
    transport: DynTransport,
    events: Arc<EventHub>,
    clock: DynClock,
    runtime: Handle,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>, transport: DynTransport, events: Arc<EventHub>, clock: DynClock, runtime: Handle) -> Self {
        Self { config, transport, events, clock, runtime }
    }

    /// Hands a batch over to a new exchange task. The batch is already detached from the queue.
    pub fn flush(self: &Arc<Self>, batch: Vec<CallRecord>) {
        if batch.is_empty() {
            return;
        }
        trace!("[Dispatcher] flushing a batch of {} call(s)", batch.len());
        let dispatcher = self.clone();
        self.runtime.spawn(async move { dispatcher.send(batch).await });
    }

    pub fn request(&self, batch: &[CallRecord]) -> ExchangeRequest {
        let url = match encode_query(&self.config.query) {
            query if query.is_empty() => self.config.endpoint.clone(),
            query => format!("{}?{}", self.config.endpoint, query),
        };
        ExchangeRequest {
            url,
            body: encode_batch(batch.iter().map(CallRecord::line)),
            client_id: self.config.client_id.clone(),
            secret: self.config.secret.clone(),
            headers: self.config.headers.clone(),
            timeout: self.config.timeout(),
        }
    }

    /// Performs the exchange of `batch` and settles every call of it.
    pub async fn send(&self, batch: Vec<CallRecord>) {
        let request = self.request(&batch);
        let timeout = request.timeout;
        let response = match tokio::time::timeout(timeout, self.transport.exchange(request)).await {
            Ok(response) => response,
            Err(_) => Err(TransportError::Timeout(timeout)),
        };
        match response {
            Ok(body) => match parse_response(&body) {
                Ok(results) => self.demux(batch, results),
                Err(err) => self.reject_all(batch, err),
            },
            Err(err) => self.reject_all(batch, Error::Transport(err)),
        }
    }

    /// Settles call `i` of `batch` with entry `i` of `results`. Calls without an entry are
    /// settled as successes with a null result.
    pub fn demux(&self, batch: Vec<CallRecord>, results: Vec<CallResult>) {
        if results.len() != batch.len() {
            debug!("[Dispatcher] {} result(s) for a batch of {} call(s)", results.len(), batch.len());
        }
        let oldest = batch.iter().map(CallRecord::enqueued_at).min();
        let mut results = results.into_iter();
        for record in batch {
            let result = results.next().unwrap_or_else(CallResult::missing);
            self.events.notify(&record, &result);
            if result.is_ok() {
                record.settle(Ok(result));
            } else {
                record.settle(Err(Error::Application(result)));
            }
        }
        if let Some(oldest) = oldest {
            trace!("[Dispatcher] batch settled, oldest call waited {} ms", elapsed_millis(oldest, self.clock.now()));
        }
    }

    fn reject_all(&self, batch: Vec<CallRecord>, err: Error) {
        debug!("[Dispatcher] rejecting a batch of {} call(s): {}", batch.len(), err);
        for record in batch {
            record.settle(Err(err.clone()));
        }
    }
}
