//! Worker thread owning the best evaluation seen so far.
//!
//! Every read-modify-write of the incumbent happens on the worker, so concurrent offers never
//! race. Callers talk to it through [`BestRunTracker`], which shuts the worker down on drop.

use std::io;
use std::sync::mpsc;
use std::thread;

use ecotune_core::telemetry::HallOfFame;
use tracing::{debug, error, warn};

#[derive(Debug)]
enum TrackerCommand {
    Offer {
        fitness: f64,
        quality: f64,
        hall_of_fame: Option<HallOfFame>,
    },
    Snapshot(mpsc::Sender<TrackerSnapshot>),
    Shutdown,
}

/// Point-in-time copy of the tracker's state.
#[derive(Debug, Clone)]
pub struct TrackerSnapshot {
    /// Lowest fitness offered so far; `f64::INFINITY` before the first offer.
    pub best_fitness: f64,
    pub best_hall_of_fame: Option<HallOfFame>,
    /// Quality of the most recent offer, best or not.
    pub last_quality: f64,
    pub offers: u64,
}

impl Default for TrackerSnapshot {
    fn default() -> Self {
        Self {
            best_fitness: f64::INFINITY,
            best_hall_of_fame: None,
            last_quality: 0.0,
            offers: 0,
        }
    }
}

impl TrackerSnapshot {
    fn apply(&mut self, fitness: f64, quality: f64, hall_of_fame: Option<HallOfFame>) {
        self.offers += 1;
        self.last_quality = quality;
        if fitness < self.best_fitness {
            debug!(fitness, previous = self.best_fitness, "new best evaluation");
            self.best_fitness = fitness;
            self.best_hall_of_fame = hall_of_fame;
        }
    }
}

pub struct BestRunTracker {
    tx: mpsc::Sender<TrackerCommand>,
    handle: Option<thread::JoinHandle<()>>,
}

impl BestRunTracker {
    /// Spawn the worker thread.
    pub fn spawn() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel::<TrackerCommand>();
        let handle = thread::Builder::new()
            .name("ecotune-best-run".into())
            .spawn(move || {
                let mut state = TrackerSnapshot::default();
                while let Ok(command) = rx.recv() {
                    match command {
                        TrackerCommand::Offer {
                            fitness,
                            quality,
                            hall_of_fame,
                        } => state.apply(fitness, quality, hall_of_fame),
                        TrackerCommand::Snapshot(reply) => {
                            let _ = reply.send(state.clone());
                        }
                        TrackerCommand::Shutdown => break,
                    }
                }
            })?;
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// Submit an evaluation; it replaces the incumbent only when strictly better.
    pub fn offer(&self, fitness: f64, quality: f64, hall_of_fame: Option<HallOfFame>) {
        if self
            .tx
            .send(TrackerCommand::Offer {
                fitness,
                quality,
                hall_of_fame,
            })
            .is_err()
        {
            warn!(fitness, "best-run tracker channel closed; offer dropped");
        }
    }

    /// Current state, or `None` if the worker is gone.
    #[must_use]
    pub fn snapshot(&self) -> Option<TrackerSnapshot> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx.send(TrackerCommand::Snapshot(reply_tx)).ok()?;
        reply_rx.recv().ok()
    }
}

impl std::fmt::Debug for BestRunTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BestRunTracker")
            .field("running", &self.handle.is_some())
            .finish()
    }
}

impl Drop for BestRunTracker {
    fn drop(&mut self) {
        let _ = self.tx.send(TrackerCommand::Shutdown);
        if let Some(handle) = self.handle.take()
            && let Err(err) = handle.join()
        {
            error!(?err, "best-run tracker thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let tracker = BestRunTracker::spawn().expect("spawn tracker");
        let snapshot = tracker.snapshot().expect("snapshot");
        assert!(snapshot.best_fitness.is_infinite());
        assert!(snapshot.best_hall_of_fame.is_none());
        assert_eq!(snapshot.offers, 0);
    }

    #[test]
    fn keeps_strictly_better_offers_only() {
        let tracker = BestRunTracker::spawn().expect("spawn tracker");
        tracker.offer(-100.0, 0.5, Some(HallOfFame::new(4, 1)));
        tracker.offer(-50.0, 0.9, None);
        tracker.offer(-100.0, 0.1, None);

        let snapshot = tracker.snapshot().expect("snapshot");
        assert_eq!(snapshot.best_fitness, -100.0);
        assert!(snapshot.best_hall_of_fame.is_some(), "equal offer must not replace");
        assert_eq!(snapshot.last_quality, 0.1);
        assert_eq!(snapshot.offers, 3);

        tracker.offer(-200.0, 0.7, None);
        let snapshot = tracker.snapshot().expect("snapshot");
        assert_eq!(snapshot.best_fitness, -200.0);
        assert!(snapshot.best_hall_of_fame.is_none());
    }

    #[test]
    fn concurrent_offers_settle_on_minimum() {
        let tracker = BestRunTracker::spawn().expect("spawn tracker");
        thread::scope(|scope| {
            for worker in 0..4 {
                let tracker = &tracker;
                scope.spawn(move || {
                    for i in 0..25 {
                        tracker.offer(-f64::from(worker * 25 + i), 0.0, None);
                    }
                });
            }
        });
        let snapshot = tracker.snapshot().expect("snapshot");
        assert_eq!(snapshot.best_fitness, -99.0);
        assert_eq!(snapshot.offers, 100);
    }
}
