//! # Shutdown coordination: wait until every awaited listener has reported.
//!
//! The coordinator keeps the set of listeners it is waiting for, keyed by name,
//! and a count of those that have not reported yet.
//!
//! ```text
//! start: awaited = initial registry names, outstanding = len
//!
//! loop (biased):
//!   admissions.recv() ─► name ─► vacant?  insert, outstanding += 1
//!   status.recv()     ─► report
//!        ├─ unknown listener   ─► StatusIgnored("unknown_listener")
//!        ├─ already reported   ─► StatusIgnored("already_reported")
//!        └─ first report       ─► outstanding -= 1, StatusReceived
//!                                  └─ outstanding == 0 ─► AllListenersExited, Ok(())
//!   status closed ─► Err(StatusClosed { outstanding })
//! ```
//!
//! ## Rules
//! - `outstanding` never goes below zero: each awaited listener decrements once.
//! - Reports may arrive in any order.
//! - Admissions are drained before reports, and the notification loop admits a
//!   listener before starting it, so a report is never seen ahead of its admission.
//! - With nothing awaited the coordinator keeps waiting for the first admission.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::WatchError;
use crate::events::{Bus, Event, EventKind};
use crate::listener::StatusReport;

pub(crate) struct ShutdownCoordinator {
    /// Awaited listener → has it reported?
    awaited: HashMap<Arc<str>, bool>,
    outstanding: usize,
    admissions: mpsc::UnboundedReceiver<Arc<str>>,
    admissions_open: bool,
    bus: Bus,
}

impl ShutdownCoordinator {
    pub(crate) fn new(
        initial: impl IntoIterator<Item = Arc<str>>,
        admissions: mpsc::UnboundedReceiver<Arc<str>>,
        bus: Bus,
    ) -> Self {
        let mut coordinator = Self {
            awaited: HashMap::new(),
            outstanding: 0,
            admissions,
            admissions_open: true,
            bus,
        };
        for name in initial {
            coordinator.admit(name);
        }
        coordinator
    }

    /// Number of awaited listeners that have not reported yet.
    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding
    }

    fn admit(&mut self, name: Arc<str>) {
        if let Entry::Vacant(slot) = self.awaited.entry(name) {
            slot.insert(false);
            self.outstanding += 1;
        }
    }

    /// Applies one report; returns true when it brought the count to zero.
    fn record(&mut self, report: StatusReport) -> bool {
        let ignored = match self.awaited.get_mut(&report.listener) {
            None => Some("unknown_listener"),
            Some(true) => Some("already_reported"),
            Some(reported) => {
                *reported = true;
                None
            }
        };

        if let Some(reason) = ignored {
            self.bus.publish(
                Event::new(EventKind::StatusIgnored)
                    .with_app(report.listener)
                    .with_status(report.code)
                    .with_reason(reason),
            );
            return false;
        }

        self.outstanding -= 1;
        self.bus.publish(
            Event::new(EventKind::StatusReceived)
                .with_app(report.listener)
                .with_status(report.code)
                .with_outstanding(self.outstanding),
        );
        self.outstanding == 0
    }

    /// Consumes reports from `status` until every awaited listener reported once.
    pub(crate) async fn wait(
        mut self,
        status: &mut mpsc::Receiver<StatusReport>,
    ) -> Result<(), WatchError> {
        loop {
            tokio::select! {
                biased;
                name = self.admissions.recv(), if self.admissions_open => match name {
                    Some(name) => self.admit(name),
                    None => self.admissions_open = false,
                },
                report = status.recv() => match report {
                    Some(report) => {
                        if self.record(report) {
                            self.bus.publish(Event::new(EventKind::AllListenersExited));
                            return Ok(());
                        }
                    }
                    None => {
                        return Err(WatchError::StatusClosed {
                            outstanding: self.outstanding(),
                        });
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::drain;
    use std::time::Duration;
    use tokio::time::timeout;

    fn names(list: &[&str]) -> Vec<Arc<str>> {
        list.iter().map(|n| Arc::from(*n)).collect()
    }

    #[tokio::test]
    async fn test_reports_in_any_order_finish_once() {
        let bus = Bus::new(64);
        let mut events = bus.subscribe();
        let (_admit, admissions) = mpsc::unbounded_channel();
        let coordinator = ShutdownCoordinator::new(names(&["a", "b", "c"]), admissions, bus);
        assert_eq!(coordinator.outstanding(), 3);

        let (tx, mut rx) = mpsc::channel(8);
        for (name, code) in [("c", 0), ("a", 1), ("a", 0), ("ghost", 0), ("b", 2)] {
            tx.send(StatusReport::new(name, code)).await.unwrap();
        }

        timeout(Duration::from_secs(1), coordinator.wait(&mut rx))
            .await
            .unwrap()
            .unwrap();

        let seen = drain(&mut events);
        let received: Vec<usize> = seen
            .iter()
            .filter(|e| e.kind == EventKind::StatusReceived)
            .filter_map(|e| e.outstanding)
            .collect();
        assert_eq!(received, vec![2, 1, 0]);
        let ignored: Vec<&str> = seen
            .iter()
            .filter(|e| e.kind == EventKind::StatusIgnored)
            .filter_map(|e| e.reason.as_deref())
            .collect();
        assert_eq!(ignored, vec!["already_reported", "unknown_listener"]);
        assert_eq!(seen.last().map(|e| e.kind), Some(EventKind::AllListenersExited));
    }

    #[tokio::test]
    async fn test_empty_set_waits_for_first_admission() {
        let bus = Bus::new(16);
        let (admit, admissions) = mpsc::unbounded_channel();
        let coordinator = ShutdownCoordinator::new(Vec::new(), admissions, bus);
        let (tx, mut rx) = mpsc::channel(8);

        tx.send(StatusReport::new("early", 0)).await.unwrap();
        let waiter = tokio::spawn(async move { coordinator.wait(&mut rx).await });

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        admit.send(Arc::from("app1")).unwrap();
        tx.send(StatusReport::new("app1", 0)).await.unwrap();

        let res = timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn test_admission_is_seen_before_its_report() {
        let bus = Bus::new(16);
        let (admit, admissions) = mpsc::unbounded_channel();
        let coordinator = ShutdownCoordinator::new(names(&["a"]), admissions, bus);
        let (tx, mut rx) = mpsc::channel(8);

        // Both already queued: "b" must count even though "a" reports first.
        admit.send(Arc::from("b")).unwrap();
        tx.send(StatusReport::new("a", 0)).await.unwrap();
        drop(tx);

        let err = timeout(Duration::from_secs(1), coordinator.wait(&mut rx))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, WatchError::StatusClosed { outstanding: 1 }));
    }

    #[tokio::test]
    async fn test_readmission_does_not_double_count() {
        let bus = Bus::new(16);
        let (admit, admissions) = mpsc::unbounded_channel();
        let coordinator = ShutdownCoordinator::new(names(&["a"]), admissions, bus);
        admit.send(Arc::from("a")).unwrap();
        drop(admit);

        let (tx, mut rx) = mpsc::channel(8);
        tx.send(StatusReport::new("a", 0)).await.unwrap();

        timeout(Duration::from_secs(1), coordinator.wait(&mut rx))
            .await
            .unwrap()
            .unwrap();
    }
}
