//! Termination links between units
//!
//! Every unit task owns a [`Lifeline`]. The lifeline is never written to; it only
//! matters that it is dropped when the task ends, whatever the reason (stop request,
//! closed mailbox, owner termination or a panic unwinding the task). Any number of
//! [`Monitor`]s observe that drop.

use tokio::sync::watch;

/// Held by a running unit task for as long as the unit is alive
#[derive(Debug)]
pub(crate) struct Lifeline(#[allow(dead_code)] watch::Sender<()>);

/// Observes the termination of exactly one unit
#[derive(Debug, Clone)]
pub struct Monitor(watch::Receiver<()>);

pub(crate) fn lifeline() -> (Lifeline, Monitor) {
    let (sender, receiver) = watch::channel(());
    (Lifeline(sender), Monitor(receiver))
}

impl Monitor {
    pub fn is_alive(&self) -> bool {
        self.0.has_changed().is_ok()
    }

    /// Resolves once the monitored unit has terminated
    pub async fn terminated(&self) {
        let mut receiver = self.0.clone();
        // the lifeline never sends, so this only returns once its sender is gone
        while receiver.changed().await.is_ok() {}
    }
}
