use crate::{AttributeKind, Attributes, Lineage, TraitLayout};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Mean marker count per attribute kind across a group of life forms
pub type MeanAttributes = BTreeMap<AttributeKind, f64>;

/// Where an epoch currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "winner", rename_all = "snake_case")]
pub enum EpochPhase {
    /// Population placed, waiting for a start signal or the intermission to lapse
    Seeding,
    Running,
    /// Exactly one lineage survived
    Concluded(Lineage),
    /// Every life form died in the same tick; no winner was recorded
    Extinct,
}

/// Read-only view of a plant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantView {
    pub id: Uuid,
    pub x: f64,
    pub y: f64,
    pub energy: f64,
}

/// Read-only view of a life form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifeFormView {
    pub id: Uuid,
    pub lineage: Lineage,
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub energy: f64,
    pub alive: bool,
    pub layout: TraitLayout,
    pub attributes: Attributes,
}

/// Winner of the current epoch with its population-averaged attributes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinnerView {
    pub lineage: Lineage,
    pub survivors: usize,
    pub mean_attributes: MeanAttributes,
}

/// Total and average energy of one lineage's live members
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyMetrics {
    pub population: usize,
    pub total: f64,
    pub average: f64,
}

/// What the engine knows about carried-over winners
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarryoverSummary {
    pub last_winner: Option<Lineage>,
    pub consecutive_wins: u32,
    pub retained_lineage: Option<Lineage>,
    pub retained_attributes: Option<Attributes>,
}

/// Everything a presentation layer needs to draw one tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub protocol_version: u32,
    pub epoch: u32,
    pub tick: u64,
    pub phase: EpochPhase,
    pub arena_width: f64,
    pub arena_height: f64,
    pub plants: Vec<PlantView>,
    pub life_forms: Vec<LifeFormView>,
    pub winner: Option<WinnerView>,
    pub carryover: CarryoverSummary,
    pub energy: BTreeMap<Lineage, EnergyMetrics>,
}

/// Control signals accepted at the input boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlSignal {
    /// Start a seeded epoch, or reseed after a concluded one
    Advance,
    /// Abandon the current epoch and reseed immediately
    Restart,
}

/// Reply to a control signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlAck {
    pub signal: ControlSignal,
    pub accepted: bool,
    pub epoch: u32,
    pub phase: EpochPhase,
}
