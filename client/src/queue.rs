use crate::{
    clock::DynClock,
    config::Config,
    dispatcher::Dispatcher,
    encoder::encode_call,
    error::Error,
    record::{CallHandle, CallRecord},
    result::Result,
    value::ParamMap,
};
use batchwire_core::trace;
use parking_lot::Mutex;
use std::{
    mem,
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::{
    runtime::{Handle, RuntimeFlavor},
    task::JoinHandle,
};

/// Fallback flush delay on a multi-thread runtime, for batches none of whose handles get polled.
const UNPOLLED_FLUSH_DELAY: Duration = Duration::from_millis(20);

/// When the deferred flush of a batch happens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Deferral {
    /// Once the batch window elapsed. Polling a handle does not cut the window short.
    Window(Duration),
    /// At the first poll of a queued handle, else at the next scheduling tick.
    EndOfTick,
    /// At the first poll of a queued handle, else after a grace delay. Another worker may run
    /// a spawned task while the caller is still issuing calls.
    Grace(Duration),
}

impl Deferral {
    fn new(window: Duration, flavor: RuntimeFlavor) -> Self {
        match flavor {
            _ if !window.is_zero() => Deferral::Window(window),
            RuntimeFlavor::CurrentThread => Deferral::EndOfTick,
            _ => Deferral::Grace(UNPOLLED_FLUSH_DELAY),
        }
    }

    fn flushes_on_poll(&self) -> bool {
        !matches!(self, Deferral::Window(_))
    }
}

/// The deferred flush currently scheduled. A flush task only acts if its ticket is still
/// the scheduled one, so at most one scheduled flush is ever effective.
struct ScheduledFlush {
    ticket: u64,
    task: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct QueueState {
    records: Vec<CallRecord>,
    scheduled: Option<ScheduledFlush>,
    next_ticket: u64,
}

impl QueueState {
    /// Cancels the scheduled flush and detaches the queued records without settling them.
    fn reset(&mut self) -> Vec<CallRecord> {
        if let Some(ScheduledFlush { task: Some(task), .. }) = self.scheduled.take() {
            task.abort();
        }
        mem::take(&mut self.records)
    }
}

/// A validated call along with its wire line.
pub(crate) struct PreparedCall {
    method: String,
    params: ParamMap,
    line: String,
}

impl PreparedCall {
    pub fn line(&self) -> &str {
        &self.line
    }
}

/// Flushes the batch a handle was queued in when its caller starts awaiting it.
#[derive(Clone)]
pub(crate) struct FlushTrigger {
    queue: Weak<BatchQueue>,
    ticket: u64,
}

impl FlushTrigger {
    pub fn fire(&self) {
        if let Some(queue) = self.queue.upgrade() {
            queue.flush_polled(self.ticket);
        }
    }
}

enum Admission {
    /// The queue reached its maximum size, the batch leaves now.
    Flush(Vec<CallRecord>),
    /// First call of a new batch, a deferred flush must be spawned for this ticket.
    Schedule(u64),
    /// A flush is already scheduled for this ticket, the call rides along.
    Joined(u64),
}

/// Ordered calls waiting for their batch to be sent.
pub(crate) struct BatchQueue {
    config: Arc<Config>,
    dispatcher: Arc<Dispatcher>,
    clock: DynClock,
    runtime: Handle,
    deferral: Deferral,
    state: Mutex<QueueState>,
}

impl BatchQueue {
    pub fn new(config: Arc<Config>, dispatcher: Arc<Dispatcher>, clock: DynClock, runtime: Handle) -> Self {
        let deferral = Deferral::new(config.batch_window(), runtime.runtime_flavor());
        Self { config, dispatcher, clock, runtime, deferral, state: Mutex::new(QueueState::default()) }
    }

    /// Validates and encodes a call, then appends it to the queue.
    ///
    /// Returns as soon as the call is queued. The batch is flushed right away once the queue
    /// reaches `max-queue-size`. Otherwise, without a batch window, it leaves when the caller
    /// first polls one of its handles, or at the next scheduling opportunity.
    pub fn enqueue(self: &Arc<Self>, method: &str, params: &ParamMap) -> Result<CallHandle> {
        let call = self.prepare(method, params)?;
        Ok(self.submit(call))
    }

    /// Validates, merges and encodes a call. Nothing is queued if the call is invalid.
    pub fn prepare(&self, method: &str, params: &ParamMap) -> Result<PreparedCall> {
        validate_method(method)?;
        let params = self.config.merge_params(params);
        let line = encode_call(method, &params)?;
        Ok(PreparedCall { method: method.to_string(), params, line })
    }

    /// Appends a prepared call and applies the flush policy.
    pub fn submit(self: &Arc<Self>, call: PreparedCall) -> CallHandle {
        let (record, handle) = CallRecord::new(call.method, call.params, call.line, self.clock.now());
        let ticket = match self.admit(record) {
            Admission::Flush(batch) => {
                trace!("[BatchQueue] max queue size reached, flushing {} call(s) now", batch.len());
                self.dispatcher.flush(batch);
                None
            }
            Admission::Schedule(ticket) => {
                self.schedule(ticket);
                Some(ticket)
            }
            Admission::Joined(ticket) => Some(ticket),
        };
        match ticket.filter(|_| self.deferral.flushes_on_poll()) {
            Some(ticket) => handle.with_flush_trigger(FlushTrigger { queue: Arc::downgrade(self), ticket }),
            None => handle,
        }
    }

    fn admit(&self, record: CallRecord) -> Admission {
        let mut state = self.state.lock();
        state.records.push(record);
        if self.config.max_queue_size.is_some_and(|max| state.records.len() >= max) {
            return Admission::Flush(state.reset());
        }
        if let Some(scheduled) = state.scheduled.as_ref() {
            return Admission::Joined(scheduled.ticket);
        }
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.scheduled = Some(ScheduledFlush { ticket, task: None });
        Admission::Schedule(ticket)
    }

    fn schedule(self: &Arc<Self>, ticket: u64) {
        let queue = self.clone();
        let deferral = self.deferral;
        let task = self.runtime.spawn(async move {
            match deferral {
                Deferral::EndOfTick => tokio::task::yield_now().await,
                Deferral::Window(delay) | Deferral::Grace(delay) => tokio::time::sleep(delay).await,
            }
            queue.flush_scheduled(ticket);
        });
        let mut state = self.state.lock();
        // a stale ticket means the batch already left and the task has nothing left to cancel
        if let Some(scheduled) = state.scheduled.as_mut().filter(|x| x.ticket == ticket) {
            scheduled.task = Some(task);
        }
    }

    fn flush_scheduled(&self, ticket: u64) {
        let batch = {
            let mut state = self.state.lock();
            if state.scheduled.as_ref().map(|x| x.ticket) != Some(ticket) {
                return;
            }
            // the running task is this one, it must not abort itself
            state.scheduled = None;
            mem::take(&mut state.records)
        };
        trace!("[BatchQueue] scheduled flush #{} of {} call(s)", ticket, batch.len());
        self.dispatcher.flush(batch);
    }

    /// Flushes the batch of `ticket` on behalf of a polled handle, if it is still queued.
    fn flush_polled(&self, ticket: u64) {
        let batch = {
            let mut state = self.state.lock();
            if state.scheduled.as_ref().map(|x| x.ticket) != Some(ticket) {
                return;
            }
            state.reset()
        };
        trace!("[BatchQueue] handle polled, flushing batch #{} of {} call(s)", ticket, batch.len());
        self.dispatcher.flush(batch);
    }

    /// Sends the queued calls now, cancelling the scheduled flush.
    pub fn flush(&self) {
        let batch = self.reset_queue();
        self.dispatcher.flush(batch);
    }

    /// Empties the queue and cancels the scheduled flush, leaving the detached calls unsettled.
    pub fn reset_queue(&self) -> Vec<CallRecord> {
        self.state.lock().reset()
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn has_scheduled_flush(&self) -> bool {
        self.state.lock().scheduled.is_some()
    }
}

/// A method is a non-empty identifier without whitespace or control characters.
fn validate_method(method: &str) -> Result<()> {
    if method.is_empty() || method.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::InvalidMethod(method.to_string()));
    }
    Ok(())
}
