use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{CarryoverSummary, ControlAck, ControlSignal, EpochPhase, WorldSnapshot};
use sim::EpochController;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// The epoch controller shared between the tick task and HTTP handlers.
///
/// Every mutation runs to completion under the write lock, so readers only
/// ever see the world between ticks.
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<RwLock<EpochController>>,
}

impl SharedEngine {
    pub fn new(controller: EpochController) -> Self {
        Self {
            inner: Arc::new(RwLock::new(controller)),
        }
    }

    pub async fn snapshot(&self) -> WorldSnapshot {
        self.inner.read().await.snapshot()
    }

    pub async fn carryover(&self) -> CarryoverSummary {
        self.inner.read().await.carryover_summary()
    }

    pub async fn phase(&self) -> EpochPhase {
        self.inner.read().await.phase()
    }

    /// Run one tick, or one intermission step between epochs.
    ///
    /// A tick can end an epoch and write to the carryover store, so it runs
    /// on the blocking pool while holding the write lock.
    pub async fn step(&self, rng: &mut StdRng) -> EpochPhase {
        let mut controller = self.inner.clone().write_owned().await;
        let mut tick_rng = StdRng::seed_from_u64(rng.gen());
        let stepped = tokio::task::spawn_blocking(move || controller.step(&mut tick_rng)).await;
        match stepped {
            Ok(phase) => phase,
            Err(err) => {
                tracing::error!(error = %err, "Engine step panicked");
                self.phase().await
            }
        }
    }

    /// Apply a control signal and report the resulting state
    pub async fn signal(&self, signal: ControlSignal) -> ControlAck {
        let mut controller = self.inner.write().await;
        let accepted = match signal {
            ControlSignal::Advance => controller.advance(&mut rand::thread_rng()),
            ControlSignal::Restart => {
                controller.restart(&mut rand::thread_rng());
                true
            }
        };
        tracing::info!(?signal, accepted, "Control signal handled");

        ControlAck {
            signal,
            accepted,
            epoch: controller.epoch(),
            phase: controller.phase(),
        }
    }
}

/// Drive the engine forever at a fixed period. Late ticks are skipped rather
/// than bunched up.
pub fn spawn_tick_loop(engine: SharedEngine, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last_phase = engine.phase().await;
        loop {
            interval.tick().await;
            let phase = engine.step(&mut rng).await;
            if phase != last_phase {
                tracing::debug!(?phase, "Phase changed");
                last_phase = phase;
            }
        }
    })
}
