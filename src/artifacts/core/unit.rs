use crate::artifacts::core::link::{Lifeline, Monitor, lifeline};
use crate::artifacts::core::protocol::{Envelope, Reply, Request};
use crate::errors::UnitError;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u64);

impl UnitId {
    fn next() -> Self {
        UnitId(NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<unit.{}>", self.0)
    }
}

/// Acknowledgment tag returned by the identity handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Repository,
    WorkingTree,
    HashStream,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitKind::Repository => "repository",
            UnitKind::WorkingTree => "working tree",
            UnitKind::HashStream => "hash stream",
        };
        write!(f, "{name}")
    }
}

/// Address of a running (or terminated) unit
///
/// Cheap to clone. Two refs are equal when they address the same unit.
#[derive(Clone)]
pub struct UnitRef {
    id: UnitId,
    kind: UnitKind,
    mailbox: mpsc::UnboundedSender<Envelope>,
    monitor: Monitor,
}

impl UnitRef {
    pub fn id(&self) -> UnitId {
        self.id
    }

    /// Kind the unit was spawned as
    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Whether this is a live unit of the given kind
    ///
    /// Answers from the ref alone, so a unit may ask it about any other unit
    /// (including one that is itself waiting on the asker) without a round trip.
    pub fn is_live(&self, kind: UnitKind) -> bool {
        self.kind == kind && self.is_alive()
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn is_alive(&self) -> bool {
        self.monitor.is_alive()
    }

    pub async fn terminated(&self) {
        self.monitor.terminated().await
    }

    /// Send a request and suspend until the unit replies
    pub async fn ask(&self, request: Request) -> Result<Reply, UnitError> {
        let (reply_to, reply) = oneshot::channel();
        self.mailbox
            .send(Envelope { request, reply_to })
            .map_err(|_| UnitError::Terminated)?;

        reply.await.map_err(|_| UnitError::Terminated)
    }

    /// Identity handshake; `None` when nothing answers
    pub async fn identify(&self) -> Option<UnitKind> {
        match self.ask(Request::Identify).await {
            Ok(Reply::Identity(kind)) => Some(kind),
            _ => None,
        }
    }

    /// Ask the unit to terminate
    ///
    /// Returns `false` when the unit was already gone.
    pub async fn stop(&self) -> Result<bool, UnitError> {
        match self.ask(Request::Stop).await {
            Ok(Reply::Stopped) => Ok(true),
            Ok(other) => Err(other.into_error()),
            Err(UnitError::Terminated) => Ok(false),
            Err(error) => Err(error),
        }
    }
}

impl PartialEq for UnitRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for UnitRef {}

impl Hash for UnitRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl fmt::Debug for UnitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitRef")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl fmt::Display for UnitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Private state and request handling of one kind of unit
pub(crate) trait Behavior: Send + 'static {
    const KIND: UnitKind;

    fn handle(&mut self, request: Request) -> impl Future<Output = Reply> + Send;
}

/// Reply for a request outside of the unit's protocol
pub(crate) fn reject(kind: UnitKind, id: UnitId, request: &Request) -> Reply {
    warn!(unit = %id, %kind, request = request.name(), "unexpected request");

    Reply::Error(UnitError::UnexpectedRequest {
        kind,
        request: request.name(),
    })
}

/// Spawn a unit on the current tokio runtime
///
/// With an `owner`, the unit terminates as soon as the owner does. Termination is
/// only observed between requests; a request being handled runs to completion.
pub(crate) fn spawn<B, F>(init: F, owner: Option<Monitor>) -> UnitRef
where
    B: Behavior,
    F: FnOnce(UnitId) -> B,
{
    let id = UnitId::next();
    let (mailbox, inbox) = mpsc::unbounded_channel();
    let (lifeline, monitor) = lifeline();

    tokio::spawn(run(init(id), id, inbox, lifeline, owner));

    UnitRef {
        id,
        kind: B::KIND,
        mailbox,
        monitor,
    }
}

async fn run<B: Behavior>(
    mut behavior: B,
    id: UnitId,
    mut inbox: mpsc::UnboundedReceiver<Envelope>,
    lifeline: Lifeline,
    owner: Option<Monitor>,
) {
    debug!(unit = %id, kind = %B::KIND, "unit started");

    let owner_terminated = async {
        match owner {
            Some(owner) => owner.terminated().await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(owner_terminated);

    let stop_request = loop {
        let envelope = tokio::select! {
            biased;
            _ = &mut owner_terminated => {
                debug!(unit = %id, kind = %B::KIND, "owner terminated");
                break None;
            }
            envelope = inbox.recv() => match envelope {
                Some(envelope) => envelope,
                None => break None,
            },
        };

        match envelope.request {
            Request::Identify => envelope.reply(Reply::Identity(B::KIND)),
            Request::Stop => break Some(envelope),
            _ => {
                let Envelope { request, reply_to } = envelope;
                let reply = behavior.handle(request).await;
                let _ = reply_to.send(reply);
            }
        }
    };

    // state and lifeline go first: once a stop is acknowledged the unit must
    // already read as dead and hold no resources
    drop(behavior);
    drop(inbox);
    drop(lifeline);
    debug!(unit = %id, kind = %B::KIND, "unit terminated");

    if let Some(envelope) = stop_request {
        envelope.reply(Reply::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    /// Panics on any request it is asked to handle
    struct Fragile;

    impl Behavior for Fragile {
        const KIND: UnitKind = UnitKind::Repository;

        async fn handle(&mut self, request: Request) -> Reply {
            panic!("fragile unit cannot handle {}", request.name());
        }
    }

    struct Quiet(UnitId);

    impl Behavior for Quiet {
        const KIND: UnitKind = UnitKind::WorkingTree;

        async fn handle(&mut self, request: Request) -> Reply {
            reject(Self::KIND, self.0, &request)
        }
    }

    #[tokio::test]
    async fn failing_owner_takes_linked_units_down() {
        let owner = spawn(|_| Fragile, None);
        let child = spawn(Quiet, Some(owner.monitor().clone()));
        assert!(child.is_live(UnitKind::WorkingTree));

        let result = owner.ask(Request::Remaining).await;
        assert!(matches!(result, Err(UnitError::Terminated)));

        tokio::time::timeout(Duration::from_secs(1), child.terminated())
            .await
            .expect("linked unit outlived its owner");
        assert!(!owner.is_alive());
        assert!(!child.is_alive());
    }

    #[tokio::test]
    async fn child_termination_leaves_owner_running() -> Result<(), UnitError> {
        let owner = spawn(Quiet, None);
        let child = spawn(Quiet, Some(owner.monitor().clone()));

        assert!(child.stop().await?);
        child.terminated().await;

        assert_eq!(owner.identify().await, Some(UnitKind::WorkingTree));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn acknowledged_stop_reads_as_dead() -> Result<(), UnitError> {
        for _ in 0..500 {
            let owner = spawn(Quiet, None);
            let child = spawn(Quiet, Some(owner.monitor().clone()));

            assert!(child.stop().await?);
            assert!(!child.is_live(UnitKind::WorkingTree));
            assert!(owner.is_alive());
        }
        Ok(())
    }

    #[tokio::test]
    async fn requests_are_answered_in_arrival_order() {
        let unit = spawn(Quiet, None);

        let replies = [
            Request::Identify,
            Request::ListFiles,
            Request::Stop,
            Request::Identify,
        ]
        .map(|request| {
            let (reply_to, reply) = oneshot::channel();
            unit.mailbox
                .send(Envelope { request, reply_to })
                .expect("unit is running");
            reply
        });
        let [first, second, stop, late] = replies;

        assert!(matches!(first.await, Ok(Reply::Identity(UnitKind::WorkingTree))));
        assert!(matches!(
            second.await,
            Ok(Reply::Error(UnitError::UnexpectedRequest { request: "list-files", .. }))
        ));
        assert!(matches!(stop.await, Ok(Reply::Stopped)));
        // queued behind the stop request, so it is dropped unanswered
        assert!(late.await.is_err());
    }

    #[test]
    fn unit_refs_compare_by_identity() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        let _guard = runtime.enter();

        let a = spawn(Quiet, None);
        let b = spawn(Quiet, None);

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.to_string(), format!("{}", a.id()));
    }
}
