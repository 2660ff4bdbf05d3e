use shared::Lineage;

/// Tuning knobs for one simulation.
///
/// Override individual fields with struct update syntax:
/// `SimConfig { per_lineage_cap: 20, ..Default::default() }`.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub arena_width: f64,
    pub arena_height: f64,
    /// Fraction of each divider that stays open, centered on the divider
    pub gap_ratio: f64,

    pub initial_plants: usize,
    pub max_plants: usize,
    pub plant_energy: f64,
    /// Ticks between plant respawns
    pub plant_respawn_interval: u64,

    pub life_forms_per_lineage: usize,
    pub per_lineage_cap: usize,
    pub initial_energy: f64,
    pub max_energy: f64,
    /// Ticks a parent waits before it may reproduce again
    pub reproduction_cooldown: u32,

    pub grouping_radius: f64,
    pub cohesion_weight: f64,
    pub wander_turn_chance: f64,
    pub wander_turn_max: f64,

    /// Ticks spent in Seeding or after a conclusion before `step` moves on
    pub intermission_ticks: u64,
    /// Lineage that receives a stored winner's layout on the very first epoch
    pub default_carryover_lineage: Lineage,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            arena_width: 1800.0,
            arena_height: 860.0,
            gap_ratio: 0.4,
            initial_plants: 200,
            max_plants: 200,
            plant_energy: 25.0,
            plant_respawn_interval: 15,
            life_forms_per_lineage: 10,
            per_lineage_cap: 50,
            initial_energy: 200.0,
            max_energy: 500.0,
            reproduction_cooldown: 300,
            grouping_radius: 100.0,
            cohesion_weight: 0.05,
            wander_turn_chance: 0.1,
            wander_turn_max: 0.5,
            intermission_ticks: 600,
            default_carryover_lineage: Lineage::A,
        }
    }
}
