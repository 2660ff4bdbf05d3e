use crate::arena::{Arena, Footprint, Position};
use crate::lifeform::{LifeForm, Plant, Target};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{Attributes, Lineage};
use uuid::Uuid;

/// Per-marker change in detection chance for stealth (down) and intelligence (up)
const DETECTION_STEP: f64 = 0.05;

/// A life form as it stood at the start of the tick.
///
/// Position and body come from here; liveness must still be checked against
/// the live entity because it can die part way through a tick.
#[derive(Debug, Clone)]
pub struct Sighting {
    pub id: Uuid,
    pub lineage: Lineage,
    pub position: Position,
    pub footprint: Footprint,
    pub attributes: Attributes,
}

impl From<&LifeForm> for Sighting {
    fn from(lf: &LifeForm) -> Self {
        Self {
            id: lf.id,
            lineage: lf.lineage,
            position: lf.position,
            footprint: lf.footprint(),
            attributes: *lf.attributes(),
        }
    }
}

/// Chance that a seeker with the given intelligence notices a target with the
/// given stealth
pub fn detection_chance(seeker: &Attributes, target: &Attributes) -> f64 {
    let chance = 1.0 - f64::from(target.stealth) * DETECTION_STEP
        + f64::from(seeker.intelligence) * DETECTION_STEP;
    chance.clamp(0.0, 1.0)
}

/// Pick something to head for.
///
/// Candidates are plants and live life forms of other lineages that are
/// within vision range and share the seeker's quarter. Plants are always
/// noticed; life forms only with [`detection_chance`]. Intelligent seekers
/// take the nearest candidate (first seen wins ties), others pick at random.
pub fn find_target<R, F>(
    seeker: &LifeForm,
    arena: &Arena,
    plants: &[Plant],
    others: &[Sighting],
    is_alive: F,
    rng: &mut R,
) -> Option<Target>
where
    R: Rng,
    F: Fn(Uuid) -> bool,
{
    let vision = seeker.vision_radius();
    let quarter = arena.quarter_of(seeker.position);
    let mut candidates: Vec<(Target, Position)> = Vec::new();

    for plant in plants {
        if seeker.position.distance_to(plant.position) <= vision
            && arena.quarter_of(plant.position) == quarter
        {
            candidates.push((Target::Plant(plant.id), plant.position));
        }
    }

    for other in others {
        if other.id == seeker.id || other.lineage == seeker.lineage || !is_alive(other.id) {
            continue;
        }
        if seeker.position.distance_to(other.position) > vision
            || arena.quarter_of(other.position) != quarter
        {
            continue;
        }
        let chance = detection_chance(seeker.attributes(), &other.attributes);
        if rng.gen::<f64>() < chance {
            candidates.push((Target::LifeForm(other.id), other.position));
        }
    }

    if seeker.attributes().intelligence > 0 {
        let mut nearest: Option<(Target, f64)> = None;
        for (target, position) in candidates {
            let dist = seeker.position.distance_to(position);
            match nearest {
                Some((_, best)) if dist >= best => {}
                _ => nearest = Some((target, dist)),
            }
        }
        nearest.map(|(target, _)| target)
    } else {
        candidates.choose(rng).map(|(target, _)| *target)
    }
}
