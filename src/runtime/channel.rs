use std::sync::{Arc, PoisonError, RwLock};

use tokio::{runtime::Handle, sync::broadcast};

use crate::{
    ActchainError, Result, ShareLock,
    common::{BroadcastQueue, Shutdown},
    events::{Event, Log, Message},
};

macro_rules! dispatch_event {
    ($handles:expr, $(&$item:ident), +) => {
        let handlers = $handles.read().unwrap_or_else(PoisonError::into_inner).clone();
        for handle in handlers.iter() {
            (handle)($(&$item),+);
        }
    };
}

const EVENT_QUEUE_SIZE: usize = 2048;
const LOG_QUEUE_SIZE: usize = 4096;

pub type ActivationEventHandle = Arc<dyn Fn(&Event<Message>) + Send + Sync>;
pub type ActivationLogHandle = Arc<dyn Fn(&Event<Log>) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// use the glob pattern to match the chain id
    /// eg. orders-*
    pub chain: String,

    /// use the glob pattern to match the action id
    /// eg. fetch*
    pub action: String,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            chain: "*".to_string(),
            action: "*".to_string(),
        }
    }
}

impl ChannelOptions {
    pub fn new(
        chain: &str,
        action: &str,
    ) -> Self {
        Self {
            chain: chain.to_string(),
            action: action.to_string(),
        }
    }

    pub fn with_chain(chain: &str) -> Self {
        Self::new(chain, "*")
    }

    pub fn with_action(action: &str) -> Self {
        Self::new("*", action)
    }
}

/// Fan-out point for activation events and logs.
///
/// Producers push into the broadcast queues; `listen` spawns the task that
/// dispatches every item to the registered handlers.
pub struct Channel {
    event_queue: Arc<BroadcastQueue<Event<Message>>>,
    log_queue: Arc<BroadcastQueue<Event<Log>>>,

    events: ShareLock<Vec<ActivationEventHandle>>,
    logs: ShareLock<Vec<ActivationLogHandle>>,

    shutdown: Arc<Shutdown>,
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel {
    pub fn new() -> Self {
        Self {
            event_queue: BroadcastQueue::new(EVENT_QUEUE_SIZE),
            log_queue: BroadcastQueue::new(LOG_QUEUE_SIZE),
            events: Arc::new(RwLock::new(Vec::new())),
            logs: Arc::new(RwLock::new(Vec::new())),
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub(crate) fn send_event(
        &self,
        message: Message,
    ) {
        self.event_queue.send(Event::new(&message));
    }

    pub(crate) fn send_log(
        &self,
        log: Log,
    ) {
        self.log_queue.send(Event::new(&log));
    }

    /// Raw receiver over every event, bypassing the handler registry.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event<Message>> {
        self.event_queue.subscribe()
    }

    pub fn subscribe_logs(&self) -> broadcast::Receiver<Event<Log>> {
        self.log_queue.subscribe()
    }

    pub(crate) fn listen(
        &self,
        runtime: &Handle,
    ) {
        let mut event_queue = self.event_queue.subscribe();
        let mut log_queue = self.log_queue.subscribe();
        let events = self.events.clone();
        let logs = self.logs.clone();

        let shutdown = self.shutdown.clone();
        runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Ok(e) = event_queue.recv() => {
                        dispatch_event!(events, &e);
                    }
                    Ok(log) = log_queue.recv() => {
                        dispatch_event!(logs, &log);
                    }
                }
            }
        });
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}

/// Filtered subscription onto a [`Channel`].
#[derive(Clone)]
pub struct ChannelEvent {
    channel: Arc<Channel>,

    glob: (globset::GlobMatcher, globset::GlobMatcher),
}

impl ChannelEvent {
    pub fn channel(
        channel: Arc<Channel>,
        options: ChannelOptions,
    ) -> Result<Self> {
        let compile = |pattern: &str| {
            globset::Glob::new(pattern)
                .map(|g| g.compile_matcher())
                .map_err(|e| ActchainError::Config(format!("invalid channel pattern '{}': {}", pattern, e)))
        };

        Ok(Self {
            glob: (compile(&options.chain)?, compile(&options.action)?),
            channel,
        })
    }

    /// Called with the activation id once an activation succeeds.
    pub fn on_complete(
        &self,
        f: impl Fn(&str) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.push_event(Arc::new(move |e| {
            if e.event.is_complete() && is_match(&glob, &e.chain_id, &e.action_id) {
                f(&e.aid);
            }
        }));
    }

    pub fn on_error(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.push_event(Arc::new(move |e| {
            if e.event.is_error() && is_match(&glob, &e.chain_id, &e.action_id) {
                f(e);
            }
        }));
    }

    pub fn on_event(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.push_event(Arc::new(move |e| {
            if is_match(&glob, &e.chain_id, &e.action_id) {
                f(e);
            }
        }));
    }

    pub fn on_log(
        &self,
        f: impl Fn(&Event<Log>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.logs.write().unwrap_or_else(PoisonError::into_inner).push(Arc::new(move |e| {
            if is_match(&glob, &e.chain_id, &e.action_id) {
                f(e);
            }
        }));
    }

    fn push_event(
        &self,
        handle: ActivationEventHandle,
    ) {
        self.channel.events.write().unwrap_or_else(PoisonError::into_inner).push(handle);
    }
}

// activation-level events carry no action id and always pass the action pattern
fn is_match(
    glob: &(globset::GlobMatcher, globset::GlobMatcher),
    chain_id: &str,
    action_id: &str,
) -> bool {
    let (pat_chain, pat_action) = glob;
    pat_chain.is_match(chain_id) && (action_id.is_empty() || pat_action.is_match(action_id))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::sync::mpsc;

    use super::{Channel, ChannelEvent, ChannelOptions};
    use crate::events::{ActivationEvent, Log, Message};

    fn message(
        chain_id: &str,
        event: ActivationEvent,
    ) -> Message {
        Message {
            aid: "a1".to_string(),
            chain_id: chain_id.to_string(),
            action_id: String::new(),
            event,
        }
    }

    #[tokio::test]
    async fn test_dispatch_filters_by_chain() {
        let channel = Arc::new(Channel::new());
        channel.listen(&tokio::runtime::Handle::current());

        let (tx, mut rx) = mpsc::unbounded_channel();
        ChannelEvent::channel(channel.clone(), ChannelOptions::with_chain("orders-*")).unwrap().on_event(move |e| {
            let _ = tx.send(e.event.clone());
        });

        channel.send_event(message("billing", ActivationEvent::Started));
        channel.send_event(message("orders-1", ActivationEvent::Succeeded));

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(got, Some(ActivationEvent::Succeeded));
        channel.shutdown();
    }

    #[tokio::test]
    async fn test_on_complete_and_logs() {
        let channel = Arc::new(Channel::new());
        channel.listen(&tokio::runtime::Handle::current());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscriber = ChannelEvent::channel(channel.clone(), ChannelOptions::default()).unwrap();
        let done = tx.clone();
        subscriber.on_complete(move |aid| {
            let _ = done.send(format!("done:{}", aid));
        });
        subscriber.on_log(move |l| {
            let _ = tx.send(format!("log:{}", l.content));
        });

        channel.send_log(Log {
            aid: "a1".to_string(),
            chain_id: "c".to_string(),
            action_id: "llm".to_string(),
            content: "hello".to_string(),
            timestamp: 0,
        });
        channel.send_event(message("c", ActivationEvent::Failed("boom".to_string())));
        channel.send_event(message("c", ActivationEvent::Succeeded));

        let mut got = Vec::new();
        for _ in 0..2 {
            got.push(tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap());
        }
        got.sort();
        assert_eq!(got, vec!["done:a1".to_string(), "log:hello".to_string()]);
        channel.shutdown();
    }

    #[test]
    fn test_invalid_pattern() {
        let channel = Arc::new(Channel::new());
        assert!(ChannelEvent::channel(channel, ChannelOptions::with_chain("[")).is_err());
    }
}
