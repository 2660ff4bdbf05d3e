pub mod arena;
pub mod carryover;
pub mod config;
pub mod epoch;
pub mod interaction;
pub mod lifeform;
pub mod movement;
pub mod perception;

pub use arena::{Arena, Footprint, Position, Quarter};
pub use carryover::{CarryoverState, CarryoverStore, MemoryStore, RecordError};
pub use config::SimConfig;
pub use epoch::EpochController;
pub use lifeform::{LifeForm, Plant, Target};

use rand::Rng;
use shared::{EpochPhase, Lineage};

/// How a headless epoch run ended
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    pub epoch: u32,
    pub ticks: u64,
    pub phase: EpochPhase,
    pub survivors: usize,
}

impl EpochSummary {
    pub fn winner(&self) -> Option<Lineage> {
        match self.phase {
            EpochPhase::Concluded(lineage) => Some(lineage),
            _ => None,
        }
    }
}

/// Run the current epoch to its end without any intermission.
///
/// Starts the epoch if it is still seeding, then ticks until it concludes,
/// goes extinct, or `max_ticks` have passed.
pub fn run_epoch<R: Rng>(
    controller: &mut EpochController,
    max_ticks: u64,
    rng: &mut R,
) -> EpochSummary {
    if controller.phase() == EpochPhase::Seeding {
        controller.advance(rng);
    }

    while controller.phase() == EpochPhase::Running && controller.tick() < max_ticks {
        controller.run_tick(rng);
    }

    EpochSummary {
        epoch: controller.epoch(),
        ticks: controller.tick(),
        phase: controller.phase(),
        survivors: controller.life_forms().len(),
    }
}
