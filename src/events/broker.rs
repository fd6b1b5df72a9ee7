//! Fan-out hub between producers and connected sessions.
//!
//! A single [`Dispatcher`] task owns the registry of delivery queues. Every
//! structural change and every broadcast reaches it as a message, so the
//! registry is never shared and needs no lock. Delivery to a queue is a
//! `try_send`: a full queue loses that event and nothing else is affected.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::event::{Event, EventType, Payload};
use crate::shared::types::{ClientId, Inbox, Queue};

pub const DEFAULT_INTAKE_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Events buffered between producers and the dispatcher. Producers wait
    /// when it is full.
    pub intake_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            intake_capacity: DEFAULT_INTAKE_CAPACITY,
        }
    }
}

#[derive(Debug)]
enum Command {
    Register { id: ClientId, queue: Queue },
    Unregister(ClientId),
    ClientCount(oneshot::Sender<usize>),
    Shutdown,
}

/// Cheap handle to a running dispatcher. Clone it into every producer and
/// every session.
#[derive(Debug, Clone)]
pub struct Broker {
    control: mpsc::UnboundedSender<Command>,
    intake: mpsc::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

impl Broker {
    /// Builds a broker and the dispatcher that must be driven for it to do
    /// anything. See [`Broker::start`] for the common case.
    pub fn new(config: &BrokerConfig) -> (Broker, Dispatcher) {
        let (control, commands) = mpsc::unbounded_channel();
        let (intake, events) = mpsc::channel(config.intake_capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let broker = Broker {
            control,
            intake,
            dropped: dropped.clone(),
        };
        let dispatcher = Dispatcher {
            commands,
            events,
            clients: HashMap::new(),
            dropped,
        };
        (broker, dispatcher)
    }

    /// Spawns the dispatcher on the current runtime.
    pub fn start(config: &BrokerConfig) -> (Broker, JoinHandle<()>) {
        let (broker, dispatcher) = Broker::new(config);
        (broker, tokio::spawn(dispatcher.run()))
    }

    fn command(&self, command: Command) {
        // fails only once the dispatcher has stopped, and a stopped
        // dispatcher has already closed every queue
        if self.control.send(command).is_err() {
            trace!("broker stopped, command discarded");
        }
    }

    pub fn register(&self, id: ClientId, queue: Queue) {
        self.command(Command::Register { id, queue });
    }

    /// Removes the queue and closes it. Unknown ids are ignored.
    pub fn unregister(&self, id: ClientId) {
        self.command(Command::Unregister(id));
    }

    /// Creates a bounded delivery queue under a fresh id and registers it.
    /// The returned subscription unregisters itself when dropped.
    pub fn subscribe(&self, capacity: usize) -> Subscription {
        let id = Uuid::new_v4().as_u128();
        let (queue, inbox) = mpsc::channel(capacity.max(1));
        self.register(id, queue);
        Subscription {
            id,
            inbox,
            broker: self.clone(),
        }
    }

    pub async fn emit<P: Payload + 'static>(&self, kind: EventType, payload: P) {
        self.broadcast(Event::new(kind, payload)).await
    }

    /// Waits only for room in the intake buffer, never for any client.
    pub async fn broadcast(&self, event: Event) {
        let kind = event.kind();
        if self.intake.send(event).await.is_err() {
            debug!(%kind, "broker stopped, event discarded");
        }
    }

    /// Number of registered queues, as seen after every command this handle
    /// sent earlier. Zero once the broker has stopped.
    pub async fn client_count(&self) -> usize {
        let (reply, answer) = oneshot::channel();
        self.command(Command::ClientCount(reply));
        answer.await.unwrap_or(0)
    }

    /// Events lost to full client queues since the broker started.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stops the dispatcher. Every registered queue is closed, which ends the
    /// sessions reading from them.
    pub fn shutdown(&self) {
        self.command(Command::Shutdown);
    }
}

pub struct Dispatcher {
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::Receiver<Event>,
    clients: HashMap<ClientId, Queue>,
    dropped: Arc<AtomicU64>,
}

impl Dispatcher {
    pub async fn run(mut self) {
        debug!("broker dispatcher started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.apply(command),
                },
                event = self.events.recv() => match event {
                    Some(event) => self.fan_out(&event),
                    None => break,
                },
            }
        }
        info!(clients = self.clients.len(), "broker stopped, closing all client queues");
        self.clients.clear();
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Register { id, queue } => {
                if self.clients.contains_key(&id) {
                    warn!(client_id = %id, "client already registered, keeping existing queue");
                } else {
                    self.clients.insert(id, queue);
                    debug!(client_id = %id, clients = self.clients.len(), "client registered");
                }
            }
            Command::Unregister(id) => {
                // dropping the sender is what closes the queue
                if self.clients.remove(&id).is_some() {
                    debug!(client_id = %id, clients = self.clients.len(), "client unregistered");
                }
            }
            Command::ClientCount(reply) => {
                let _ = reply.send(self.clients.len());
            }
            Command::Shutdown => {}
        }
    }

    fn fan_out(&mut self, event: &Event) {
        let mut gone = Vec::new();
        for (id, queue) in &self.clients {
            match queue.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    trace!(client_id = %id, kind = %event.kind(), "client queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => gone.push(*id),
            }
        }
        // sessions that went away before their unregister arrived
        for id in gone {
            self.clients.remove(&id);
            debug!(client_id = %id, "pruned closed client queue");
        }
    }
}

/// A registered delivery queue, owned by exactly one session.
#[derive(Debug)]
pub struct Subscription {
    id: ClientId,
    inbox: Inbox,
    broker: Broker,
}

impl Subscription {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Next event, or `None` once the broker closed this queue.
    pub async fn recv(&mut self) -> Option<Event> {
        self.inbox.recv().await
    }

    #[cfg(test)]
    pub fn try_recv(&mut self) -> Result<Event, mpsc::error::TryRecvError> {
        self.inbox.try_recv()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broker.unregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::time::timeout;

    fn start() -> (Broker, JoinHandle<()>) {
        Broker::start(&BrokerConfig::default())
    }

    async fn next(subscription: &mut Subscription) -> Option<Event> {
        timeout(Duration::from_secs(1), subscription.recv())
            .await
            .expect("timed out waiting for an event")
    }

    fn data(event: &Event) -> serde_json::Value {
        serde_json::from_str(event.payload().to_json().unwrap().get()).unwrap()
    }

    #[tokio::test]
    async fn every_client_gets_one_copy() {
        let (broker, _task) = start();
        let mut clients: Vec<_> = (0..5).map(|_| broker.subscribe(10)).collect();
        assert_eq!(broker.client_count().await, 5);

        broker.emit(EventType::StepCreated, json!({"id": "s1"})).await;

        for client in clients.iter_mut() {
            let event = next(client).await.unwrap();
            assert_eq!(event.kind(), EventType::StepCreated);
            assert_eq!(data(&event), json!({"id": "s1"}));
        }
        // wait for a second event so a duplicate would have shown up first
        broker.emit(EventType::StepUpdated, json!({"id": "s1"})).await;
        for client in clients.iter_mut() {
            assert_eq!(next(client).await.unwrap().kind(), EventType::StepUpdated);
        }
    }

    #[tokio::test]
    async fn full_queue_drops_only_for_that_client() {
        let (broker, _task) = start();
        let mut slow = broker.subscribe(1);
        let mut probe = broker.subscribe(10);
        assert_eq!(broker.client_count().await, 2);

        timeout(Duration::from_secs(1), async {
            for n in 0..3 {
                broker.emit(EventType::PlanUpdated, json!({ "n": n })).await;
            }
        })
        .await
        .expect("emit blocked on a slow client");

        for n in 0..3 {
            assert_eq!(data(&next(&mut probe).await.unwrap()), json!({ "n": n }));
        }
        assert_eq!(data(&slow.try_recv().unwrap()), json!({"n": 0}));
        assert!(matches!(slow.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(broker.dropped_events(), 2);
    }

    #[tokio::test]
    async fn order_is_preserved_per_client() {
        let (broker, _task) = start();
        let mut client = broker.subscribe(64);
        broker.client_count().await;

        for n in 0..50 {
            broker.emit(EventType::StepUpdated, json!({ "n": n })).await;
        }
        for n in 0..50 {
            assert_eq!(data(&next(&mut client).await.unwrap()), json!({ "n": n }));
        }
    }

    #[tokio::test]
    async fn unregistered_client_observes_closure() {
        let (broker, _task) = start();
        let mut a = broker.subscribe(10);
        let mut b = broker.subscribe(10);
        broker.client_count().await;

        broker.emit(EventType::PlanCreated, json!({"id": "x"})).await;
        assert_eq!(next(&mut a).await.unwrap().kind(), EventType::PlanCreated);
        assert_eq!(next(&mut b).await.unwrap().kind(), EventType::PlanCreated);

        broker.unregister(a.id());
        assert_eq!(broker.client_count().await, 1);
        broker.emit(EventType::PlanDeleted, json!({"id": "y"})).await;

        assert_eq!(next(&mut b).await.unwrap().kind(), EventType::PlanDeleted);
        assert!(next(&mut a).await.is_none());
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let (broker, _task) = start();
        let client = broker.subscribe(10);
        let id = client.id();

        broker.unregister(id);
        broker.unregister(id);
        broker.unregister(12345);
        assert_eq!(broker.client_count().await, 0);

        // drop sends a third unregister for the same id
        drop(client);
        assert_eq!(broker.client_count().await, 0);
    }

    #[tokio::test]
    async fn duplicate_register_keeps_one_entry() {
        let (broker, _task) = start();
        let (first, mut first_inbox) = mpsc::channel(4);
        let (second, mut second_inbox) = mpsc::channel(4);
        broker.register(7, first);
        broker.register(7, second);
        assert_eq!(broker.client_count().await, 1);

        broker.emit(EventType::StepDeleted, json!({"id": "s9"})).await;
        assert!(first_inbox.recv().await.is_some());
        // the rejected queue was dropped by the dispatcher
        assert!(second_inbox.recv().await.is_none());
    }

    #[tokio::test]
    async fn interleaved_register_and_unregister_leaves_no_stale_entries() {
        let (broker, _task) = start();
        let mut kept = Vec::new();
        for round in 0..20 {
            let subscription = broker.subscribe(2);
            if round % 3 == 0 {
                kept.push(subscription);
            } else {
                broker.unregister(subscription.id());
                // drop repeats the unregister
            }
        }
        let expected = kept.len();
        assert_eq!(broker.client_count().await, expected);

        kept.truncate(2);
        assert_eq!(broker.client_count().await, 2);
    }

    #[tokio::test]
    async fn concurrent_producers_and_subscribers() {
        let (broker, _task) = start();
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let broker = broker.clone();
            tasks.push(tokio::spawn(async move {
                for n in 0..25 {
                    let subscription = broker.subscribe(4);
                    broker.emit(EventType::StepUpdated, json!({ "n": n })).await;
                    drop(subscription);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(broker.client_count().await, 0);
    }

    #[tokio::test]
    async fn shutdown_closes_every_queue() {
        let (broker, task) = start();
        let mut a = broker.subscribe(10);
        let mut b = broker.subscribe(10);
        broker.client_count().await;

        broker.shutdown();
        task.await.unwrap();

        assert!(next(&mut a).await.is_none());
        assert!(next(&mut b).await.is_none());
        assert_eq!(broker.client_count().await, 0);
        // producers are not disturbed by a stopped broker
        broker.emit(EventType::PlanCreated, json!({})).await;
    }

    #[tokio::test]
    async fn brokers_are_independent() {
        let (first, _first_task) = start();
        let (second, _second_task) = start();
        let mut on_first = first.subscribe(10);
        let mut on_second = second.subscribe(10);
        first.client_count().await;
        second.client_count().await;

        first.emit(EventType::PlanCreated, json!({"broker": 1})).await;
        second.emit(EventType::PlanCreated, json!({"broker": 2})).await;

        assert_eq!(data(&next(&mut on_first).await.unwrap()), json!({"broker": 1}));
        assert_eq!(data(&next(&mut on_second).await.unwrap()), json!({"broker": 2}));
        assert!(on_first.try_recv().is_err());
    }
}
