use crate::arena::Position;
use crate::config::SimConfig;
use crate::lifeform::LifeForm;
use crate::perception::Sighting;
use rand::Rng;
use uuid::Uuid;

/// Mean position of live lineage mates within `radius` of `me`
pub fn group_centroid<F>(
    me: &LifeForm,
    others: &[Sighting],
    is_alive: F,
    radius: f64,
) -> Option<Position>
where
    F: Fn(Uuid) -> bool,
{
    let mut sum = Position::default();
    let mut count = 0usize;

    for other in others {
        if other.id == me.id || other.lineage != me.lineage || !is_alive(other.id) {
            continue;
        }
        if me.position.distance_to(other.position) <= radius {
            sum.x += other.position.x;
            sum.y += other.position.y;
            count += 1;
        }
    }

    if count == 0 {
        return None;
    }
    let n = count as f64;
    Some(Position::new(sum.x / n, sum.y / n))
}

/// Displacement for one tick of seeking: full speed towards the target, plus
/// a small pull towards the group. The sum is not renormalised, so the pull
/// bends the path without ever overriding it.
pub fn seek_step(
    me: &LifeForm,
    target: Position,
    centroid: Option<Position>,
    cohesion_weight: f64,
) -> (f64, f64) {
    let (ux, uy) = me.position.unit_towards(target);
    let speed = me.speed();
    let mut dx = ux * speed;
    let mut dy = uy * speed;

    if let Some(center) = centroid {
        if me.position.distance_to(center) > 0.0 {
            let (gx, gy) = me.position.unit_towards(center);
            dx += gx * cohesion_weight;
            dy += gy * cohesion_weight;
        }
    }
    (dx, dy)
}

pub fn seek(me: &mut LifeForm, target: Position, centroid: Option<Position>, cohesion_weight: f64) {
    let (dx, dy) = seek_step(me, target, centroid, cohesion_weight);
    me.position.x += dx;
    me.position.y += dy;
}

/// Drift along the heading, occasionally turning a little
pub fn wander<R: Rng>(me: &mut LifeForm, config: &SimConfig, rng: &mut R) {
    if rng.gen::<f64>() < config.wander_turn_chance {
        me.heading += rng.gen_range(-config.wander_turn_max..=config.wander_turn_max);
    }
    let speed = me.speed();
    me.position.x += me.heading.cos() * speed;
    me.position.y += me.heading.sin() * speed;
}

/// Take one step straight away from a threat
pub fn flee(me: &mut LifeForm, threat: Position) {
    let (ux, uy) = me.position.unit_towards(threat);
    let speed = me.speed();
    me.position.x -= ux * speed;
    me.position.y -= uy * speed;
}
