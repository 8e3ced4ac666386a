use crate::{
    cache::{CachePolicy, ResponseCache},
    clock::{DynClock, SystemClock},
    config::Config,
    dispatcher::Dispatcher,
    error::Error,
    events::{EventHub, ListenerId},
    queue::BatchQueue,
    record::{CallHandle, CallRecord},
    response::CallResult,
    result::Result,
    transport::DynTransport,
    value::ParamMap,
};
use batchwire_core::debug;
use std::{fmt, sync::Arc};
use tokio::runtime::Handle;

/// Coalesces calls into batched exchanges.
///
/// Calls issued within the same scheduling tick (or batch window) travel in one exchange
/// and are settled in order from the response. Cloning a client yields another handle to
/// the same queue, cache and subscribers.
///
/// ```no_run
/// # use batchwire_client::{Client, Config, DynTransport, params};
/// # async fn run(transport: DynTransport) -> batchwire_client::Result<()> {
/// let client = Client::new(Config::new("https://api.example.com/batch"), transport)?;
/// let user = client.call("users.get", params! { "id" => 1 })?;
/// let photos = client.call("photos.list", params! { "owner" => 1 })?;
/// let (user, photos) = futures::join!(user, photos);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    config: Arc<Config>,
    queue: Arc<BatchQueue>,
    cache: Arc<ResponseCache>,
    events: Arc<EventHub>,
}

impl Client {
    /// Builds a client on the current tokio runtime.
    pub fn new(config: Config, transport: DynTransport) -> Result<Self> {
        Self::with_clock(config, transport, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, transport: DynTransport, clock: DynClock) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let config = Arc::new(config);
        let events = Arc::new(EventHub::new());
        let dispatcher = Arc::new(Dispatcher::new(config.clone(), transport, events.clone(), clock.clone(), runtime.clone()));
        let queue = Arc::new(BatchQueue::new(config.clone(), dispatcher, clock.clone(), runtime));
        let cache = Arc::new(ResponseCache::new(clock));
        debug!("[Client] batching calls to {}", config.endpoint);
        Ok(Self { config, queue, cache, events })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Queues a call and returns its handle without waiting.
    ///
    /// Fails immediately, before anything is queued, on an invalid method name or a
    /// parameter the wire format cannot carry.
    pub fn call(&self, method: &str, params: ParamMap) -> Result<CallHandle> {
        self.queue.enqueue(method, &params)
    }

    /// Like [`Client::call`], but identical calls made while the cached outcome is live
    /// share it instead of being sent again.
    pub fn call_cached(&self, method: &str, params: ParamMap, policy: CachePolicy) -> Result<CallHandle> {
        let call = self.queue.prepare(method, &params)?;
        let signature = ResponseCache::signature(method, call.line());
        self.cache.lookup_or_create(signature, policy, || Ok(self.queue.submit(call)))
    }

    /// Subscribes `callback` to results whose `stat` equals `tag`.
    pub fn on<F>(&self, tag: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(&CallRecord, &CallResult) + Send + Sync + 'static,
    {
        self.events.on(tag, callback)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    /// Sends the pending calls now instead of waiting for the scheduled flush.
    pub fn flush(&self) {
        self.queue.flush();
    }

    /// Number of calls waiting for their batch to leave.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn has_scheduled_flush(&self) -> bool {
        self.queue.has_scheduled_flush()
    }

    /// Maintenance hook dropping expired cache entries, for hosts to call at their own pace.
    /// Expired entries are never served whether or not this runs.
    pub fn purge_expired_cache(&self) -> usize {
        self.cache.purge_expired()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").field("endpoint", &self.config.endpoint).field("pending", &self.pending()).finish()
    }
}
