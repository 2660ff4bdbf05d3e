use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Half-extent of the grid random layouts are drawn from (cells span -2..=2).
pub const LAYOUT_GRID_RADIUS: i8 = 2;

/// Number of cells a random layout aims for.
pub const RANDOM_LAYOUT_CELLS: usize = 16;

/// No attribute kind may occupy more cells than this in a random layout.
pub const MAX_CELLS_PER_KIND: u32 = 5;

/// The nine attributes a marker can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    AttackPower,
    Defense,
    Speed,
    EnergyStorage,
    VisionRange,
    ReproductionRate,
    MetabolismRate,
    Stealth,
    Intelligence,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 9] = [
        AttributeKind::AttackPower,
        AttributeKind::Defense,
        AttributeKind::Speed,
        AttributeKind::EnergyStorage,
        AttributeKind::VisionRange,
        AttributeKind::ReproductionRate,
        AttributeKind::MetabolismRate,
        AttributeKind::Stealth,
        AttributeKind::Intelligence,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AttributeKind::AttackPower => "attack_power",
            AttributeKind::Defense => "defense",
            AttributeKind::Speed => "speed",
            AttributeKind::EnergyStorage => "energy_storage",
            AttributeKind::VisionRange => "vision_range",
            AttributeKind::ReproductionRate => "reproduction_rate",
            AttributeKind::MetabolismRate => "metabolism_rate",
            AttributeKind::Stealth => "stealth",
            AttributeKind::Intelligence => "intelligence",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Marker counts per attribute kind.
///
/// Only ever produced by [`TraitLayout::derive_attributes`] in the engine, so a
/// life form's attributes cannot drift away from its layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub attack_power: u32,
    pub defense: u32,
    pub speed: u32,
    pub energy_storage: u32,
    pub vision_range: u32,
    pub reproduction_rate: u32,
    pub metabolism_rate: u32,
    pub stealth: u32,
    pub intelligence: u32,
}

impl Attributes {
    pub fn get(&self, kind: AttributeKind) -> u32 {
        match kind {
            AttributeKind::AttackPower => self.attack_power,
            AttributeKind::Defense => self.defense,
            AttributeKind::Speed => self.speed,
            AttributeKind::EnergyStorage => self.energy_storage,
            AttributeKind::VisionRange => self.vision_range,
            AttributeKind::ReproductionRate => self.reproduction_rate,
            AttributeKind::MetabolismRate => self.metabolism_rate,
            AttributeKind::Stealth => self.stealth,
            AttributeKind::Intelligence => self.intelligence,
        }
    }

    fn slot_mut(&mut self, kind: AttributeKind) -> &mut u32 {
        match kind {
            AttributeKind::AttackPower => &mut self.attack_power,
            AttributeKind::Defense => &mut self.defense,
            AttributeKind::Speed => &mut self.speed,
            AttributeKind::EnergyStorage => &mut self.energy_storage,
            AttributeKind::VisionRange => &mut self.vision_range,
            AttributeKind::ReproductionRate => &mut self.reproduction_rate,
            AttributeKind::MetabolismRate => &mut self.metabolism_rate,
            AttributeKind::Stealth => &mut self.stealth,
            AttributeKind::Intelligence => &mut self.intelligence,
        }
    }

    /// Sum of all counts, equal to the marker count of the source layout
    pub fn total(&self) -> u32 {
        AttributeKind::ALL.iter().map(|&kind| self.get(kind)).sum()
    }

    /// Combined attack and defense, used when weighing up a fight
    pub fn combat_power(&self) -> u32 {
        self.attack_power + self.defense
    }

    /// Iterate `(kind, count)` pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (AttributeKind, u32)> + '_ {
        AttributeKind::ALL.iter().map(move |&kind| (kind, self.get(kind)))
    }
}

/// A single attribute marker placed on the layout grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub x: i8,
    pub y: i8,
    pub kind: AttributeKind,
}

impl Marker {
    pub fn new(x: i8, y: i8, kind: AttributeKind) -> Self {
        Self { x, y, kind }
    }
}

/// Why a layout cannot be used for a life form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("layout has no markers")]
    Empty,

    #[error("layout places two markers on cell ({x}, {y})")]
    DuplicateCell { x: i8, y: i8 },
}

/// Ordered set of attribute markers defining a life form's body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraitLayout {
    markers: Vec<Marker>,
}

impl TraitLayout {
    pub fn new(markers: Vec<Marker>) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Count the markers of each kind
    pub fn derive_attributes(&self) -> Attributes {
        let mut attributes = Attributes::default();
        for marker in &self.markers {
            *attributes.slot_mut(marker.kind) += 1;
        }
        attributes
    }

    /// Inclusive cell bounds as `(min_x, max_x, min_y, max_y)`.
    /// An empty layout is treated as the single origin cell.
    pub fn cell_bounds(&self) -> (i8, i8, i8, i8) {
        if self.markers.is_empty() {
            return (0, 0, 0, 0);
        }
        let mut bounds = (i8::MAX, i8::MIN, i8::MAX, i8::MIN);
        for marker in &self.markers {
            bounds.0 = bounds.0.min(marker.x);
            bounds.1 = bounds.1.max(marker.x);
            bounds.2 = bounds.2.min(marker.y);
            bounds.3 = bounds.3.max(marker.y);
        }
        bounds
    }

    /// Reject layouts that could not have come out of the engine
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.markers.is_empty() {
            return Err(LayoutError::Empty);
        }
        let mut seen = HashSet::with_capacity(self.markers.len());
        for marker in &self.markers {
            if !seen.insert((marker.x, marker.y)) {
                return Err(LayoutError::DuplicateCell {
                    x: marker.x,
                    y: marker.y,
                });
            }
        }
        Ok(())
    }

    /// The hand-designed body of each lineage
    pub fn canonical(lineage: Lineage) -> Self {
        use AttributeKind::*;

        let kinds: [AttributeKind; 10] = match lineage {
            Lineage::A => [
                Speed,
                VisionRange,
                Speed,
                VisionRange,
                Speed,
                Speed,
                Speed,
                Speed,
                Speed,
                Intelligence,
            ],
            Lineage::B => [
                AttackPower,
                Defense,
                AttackPower,
                Defense,
                AttackPower,
                Defense,
                Defense,
                Defense,
                Defense,
                Intelligence,
            ],
            Lineage::C => [
                Speed,
                AttackPower,
                Defense,
                VisionRange,
                EnergyStorage,
                MetabolismRate,
                ReproductionRate,
                Stealth,
                Intelligence,
                Intelligence,
            ],
            Lineage::D => [
                EnergyStorage,
                ReproductionRate,
                EnergyStorage,
                ReproductionRate,
                EnergyStorage,
                EnergyStorage,
                EnergyStorage,
                EnergyStorage,
                EnergyStorage,
                Intelligence,
            ],
        };

        // Every canonical body shares the same ten cells
        const CELLS: [(i8, i8); 10] = [
            (0, -1),
            (-1, 0),
            (0, 0),
            (1, 0),
            (0, 1),
            (-1, -1),
            (1, -1),
            (-1, 1),
            (1, 1),
            (0, -2),
        ];

        let markers = CELLS
            .iter()
            .zip(kinds)
            .map(|(&(x, y), kind)| Marker::new(x, y, kind))
            .collect();
        Self { markers }
    }

    /// Generate a left-right mirror symmetric layout on the 5x5 grid.
    ///
    /// Stops short of [`RANDOM_LAYOUT_CELLS`] only if every kind has hit
    /// [`MAX_CELLS_PER_KIND`].
    pub fn random_symmetric<R: Rng>(rng: &mut R) -> Self {
        let mut markers: Vec<Marker> = Vec::with_capacity(RANDOM_LAYOUT_CELLS);
        let mut occupied: HashSet<(i8, i8)> = HashSet::new();
        let mut counts = Attributes::default();

        while markers.len() < RANDOM_LAYOUT_CELLS {
            let x = rng.gen_range(-LAYOUT_GRID_RADIUS..=LAYOUT_GRID_RADIUS);
            let y = rng.gen_range(-LAYOUT_GRID_RADIUS..=LAYOUT_GRID_RADIUS);
            if occupied.contains(&(x, y)) {
                continue;
            }

            let available: Vec<AttributeKind> = AttributeKind::ALL
                .iter()
                .copied()
                .filter(|&kind| counts.get(kind) < MAX_CELLS_PER_KIND)
                .collect();
            let Some(&kind) = available.choose(rng) else {
                break;
            };

            markers.push(Marker::new(x, y, kind));
            occupied.insert((x, y));
            *counts.slot_mut(kind) += 1;

            if x == 0 && y == 0 {
                continue;
            }
            let mirror = (-x, y);
            if !occupied.contains(&mirror)
                && markers.len() < RANDOM_LAYOUT_CELLS
                && (-LAYOUT_GRID_RADIUS..=LAYOUT_GRID_RADIUS).contains(&mirror.0)
                && counts.get(kind) < MAX_CELLS_PER_KIND
            {
                markers.push(Marker::new(mirror.0, mirror.1, kind));
                occupied.insert(mirror);
                *counts.slot_mut(kind) += 1;
            }
        }

        Self { markers }
    }
}

/// The fixed set of competing strains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Lineage {
    A,
    B,
    C,
    D,
}

impl Lineage {
    pub const ALL: [Lineage; 4] = [Lineage::A, Lineage::B, Lineage::C, Lineage::D];
}

impl fmt::Display for Lineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Lineage::A => "A",
            Lineage::B => "B",
            Lineage::C => "C",
            Lineage::D => "D",
        };
        f.write_str(tag)
    }
}

/// The winning body of a concluded epoch, as handed to the carryover store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub lineage: Lineage,
    pub layout: TraitLayout,
    pub attributes: Attributes,
}

impl EpochRecord {
    pub fn new(lineage: Lineage, layout: TraitLayout) -> Self {
        let attributes = layout.derive_attributes();
        Self {
            lineage,
            layout,
            attributes,
        }
    }
}
