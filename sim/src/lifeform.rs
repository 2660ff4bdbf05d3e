use crate::arena::{Arena, Footprint, Position};
use crate::config::SimConfig;
use rand::Rng;
use shared::{Attributes, Lineage, TraitLayout};
use std::f64::consts::TAU;
use uuid::Uuid;

/// Energy a life form needs before it may reproduce, before storage bonuses
pub const REPRODUCTION_BASE_THRESHOLD: f64 = 200.0;

/// Extra reproduction threshold per energy storage marker
pub const REPRODUCTION_THRESHOLD_PER_STORAGE: f64 = 10.0;

/// What a life form is currently heading for.
///
/// Only the id is held; the engine re-checks that the entity still exists
/// (plant not eaten, life form alive) every tick before acting on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Plant(Uuid),
    LifeForm(Uuid),
}

/// A stationary food source
#[derive(Debug, Clone)]
pub struct Plant {
    pub id: Uuid,
    pub position: Position,
    pub energy: f64,
}

impl Plant {
    pub fn new(position: Position, energy: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            energy,
        }
    }

    /// Place a plant, anywhere in the arena unless a position is given
    pub fn spawn<R: Rng>(
        arena: &Arena,
        position: Option<Position>,
        config: &SimConfig,
        rng: &mut R,
    ) -> Self {
        let position = position.unwrap_or_else(|| arena.random_position(rng));
        Self::new(position, config.plant_energy)
    }

    pub fn footprint(&self) -> Footprint {
        Footprint::plant()
    }
}

#[derive(Debug, Clone)]
pub struct LifeForm {
    pub id: Uuid,
    pub lineage: Lineage,
    layout: TraitLayout,
    attributes: Attributes,
    footprint: Footprint,
    pub position: Position,
    /// Direction of travel while wandering, in radians
    pub heading: f64,
    pub energy: f64,
    pub alive: bool,
    pub target: Option<Target>,
    /// Ticks left before this life form may reproduce again
    pub reproduction_cooldown: u32,
}

impl LifeForm {
    pub fn new(
        lineage: Lineage,
        layout: TraitLayout,
        position: Position,
        energy: f64,
        heading: f64,
    ) -> Self {
        let attributes = layout.derive_attributes();
        let footprint = Footprint::from_layout(&layout);
        Self {
            id: Uuid::new_v4(),
            lineage,
            layout,
            attributes,
            footprint,
            position,
            heading,
            energy,
            alive: true,
            target: None,
            reproduction_cooldown: 0,
        }
    }

    /// Create a life form with a random heading and the configured starting
    /// energy. Without a layout the lineage's canonical body is used, without
    /// a position it lands anywhere in the arena.
    pub fn spawn<R: Rng>(
        lineage: Lineage,
        layout: Option<TraitLayout>,
        position: Option<Position>,
        arena: &Arena,
        config: &SimConfig,
        rng: &mut R,
    ) -> Self {
        let layout = layout.unwrap_or_else(|| TraitLayout::canonical(lineage));
        let position = position.unwrap_or_else(|| arena.random_position(rng));
        let heading = rng.gen_range(0.0..TAU);
        Self::new(lineage, layout, position, config.initial_energy, heading)
    }

    pub fn layout(&self) -> &TraitLayout {
        &self.layout
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn footprint(&self) -> Footprint {
        self.footprint
    }

    /// Distance covered per tick
    pub fn speed(&self) -> f64 {
        1.0 + f64::from(self.attributes.speed) * 0.5
    }

    pub fn vision_radius(&self) -> f64 {
        100.0 + f64::from(self.attributes.vision_range) * 10.0
    }

    /// Energy burned every tick; more metabolism markers burn less
    pub fn metabolic_drain(&self) -> f64 {
        let steps = ((5.0 - f64::from(self.attributes.metabolism_rate)) / 2.5).round();
        (0.05 * steps).max(0.0)
    }

    /// Burn this tick's energy. Returns true if that killed the life form.
    pub fn metabolize(&mut self) -> bool {
        let drain = self.metabolic_drain();
        self.lose_energy(drain)
    }

    /// Subtract energy, dying at zero. Returns true only on the killing blow.
    pub fn lose_energy(&mut self, amount: f64) -> bool {
        if !self.alive {
            return false;
        }
        self.energy -= amount;
        if self.energy <= 0.0 {
            self.energy = 0.0;
            self.alive = false;
            self.target = None;
            return true;
        }
        false
    }

    /// Add energy up to `max_energy`
    pub fn gain_energy(&mut self, amount: f64, max_energy: f64) {
        self.energy = (self.energy + amount).min(max_energy);
    }

    pub fn tick_cooldown(&mut self) {
        self.reproduction_cooldown = self.reproduction_cooldown.saturating_sub(1);
    }

    pub fn reproduction_threshold(&self) -> f64 {
        REPRODUCTION_BASE_THRESHOLD
            + f64::from(self.attributes.energy_storage) * REPRODUCTION_THRESHOLD_PER_STORAGE
    }

    /// Whether this life form may start reproducing, given how many of its
    /// lineage are currently alive
    pub fn can_reproduce(&self, lineage_count: usize, per_lineage_cap: usize) -> bool {
        self.alive
            && self.energy >= self.reproduction_threshold()
            && self.reproduction_cooldown == 0
            && lineage_count < per_lineage_cap
    }

    /// A child with a copy of this body, at this position, with a fresh
    /// heading and no cooldown
    pub fn offspring<R: Rng>(&self, energy: f64, max_energy: f64, rng: &mut R) -> LifeForm {
        let heading = rng.gen_range(0.0..TAU);
        LifeForm::new(
            self.lineage,
            self.layout.clone(),
            self.position,
            energy.min(max_energy),
            heading,
        )
    }
}
