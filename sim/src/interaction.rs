use crate::config::SimConfig;
use crate::lifeform::LifeForm;
use rand::Rng;
use shared::Attributes;

/// Highest bonus an attack can roll on top of attack power
pub const MAX_ATTACK_ROLL: u32 = 5;

/// Decide whether to stand and fight.
///
/// Any intelligence at all means comparing attack plus defense; without it
/// the choice is a coin flip.
pub fn should_fight<R: Rng>(me: &Attributes, other: &Attributes, rng: &mut R) -> bool {
    if me.intelligence > 0 {
        me.combat_power() >= other.combat_power()
    } else {
        rng.gen_bool(0.5)
    }
}

pub fn roll_attack<R: Rng>(rng: &mut R) -> u32 {
    rng.gen_range(0..=MAX_ATTACK_ROLL)
}

/// Damage each side takes from one exchange
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FightOutcome {
    pub damage_to_self: f64,
    pub damage_to_other: f64,
}

/// Both attacks are worked out from the attributes as they stood before the
/// exchange, so the order of the two sides does not matter.
pub fn resolve_fight(
    me: &Attributes,
    other: &Attributes,
    my_roll: u32,
    other_roll: u32,
) -> FightOutcome {
    let my_attack = me.attack_power + my_roll;
    let other_attack = other.attack_power + other_roll;
    FightOutcome {
        damage_to_self: f64::from(other_attack.saturating_sub(me.defense)),
        damage_to_other: f64::from(my_attack.saturating_sub(other.defense)),
    }
}

/// Outcome of a fight applied to two life forms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FightReport {
    pub outcome: FightOutcome,
    pub self_died: bool,
    pub other_died: bool,
}

/// Roll both attacks and apply the damage to both sides at once
pub fn fight<R: Rng>(me: &mut LifeForm, other: &mut LifeForm, rng: &mut R) -> FightReport {
    let my_roll = roll_attack(rng);
    let other_roll = roll_attack(rng);
    let outcome = resolve_fight(me.attributes(), other.attributes(), my_roll, other_roll);

    let self_died = me.lose_energy(outcome.damage_to_self);
    let other_died = other.lose_energy(outcome.damage_to_other);
    FightReport {
        outcome,
        self_died,
        other_died,
    }
}

/// How a mating pair splits its energy given the room left in the lineage
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Litter {
    /// One child per parent, each carrying that parent's contribution
    Twins { contribution: f64 },
    /// A single child carrying both contributions
    Single { contribution: f64 },
}

impl Litter {
    pub fn contribution(&self) -> f64 {
        match *self {
            Litter::Twins { contribution } | Litter::Single { contribution } => contribution,
        }
    }
}

pub fn plan_litter(
    self_energy: f64,
    partner_energy: f64,
    remaining_capacity: usize,
) -> Option<Litter> {
    let poorer = self_energy.min(partner_energy);
    match remaining_capacity {
        0 => None,
        1 => Some(Litter::Single {
            contribution: poorer / 4.0,
        }),
        _ => Some(Litter::Twins {
            contribution: poorer / 3.0,
        }),
    }
}

/// Mate two life forms, charging both parents and starting their cooldowns.
///
/// Twins are born one at each parent's position with that parent's body; a
/// single child takes `me`'s body and position. Returns the newborns.
pub fn reproduce<R: Rng>(
    me: &mut LifeForm,
    partner: &mut LifeForm,
    remaining_capacity: usize,
    config: &SimConfig,
    rng: &mut R,
) -> Vec<LifeForm> {
    let Some(litter) = plan_litter(me.energy, partner.energy, remaining_capacity) else {
        return Vec::new();
    };
    let contribution = litter.contribution();
    me.energy -= contribution;
    partner.energy -= contribution;
    me.reproduction_cooldown = config.reproduction_cooldown;
    partner.reproduction_cooldown = config.reproduction_cooldown;

    match litter {
        Litter::Twins { contribution } => vec![
            me.offspring(contribution, config.max_energy, rng),
            partner.offspring(contribution, config.max_energy, rng),
        ],
        Litter::Single { contribution } => {
            vec![me.offspring(contribution * 2.0, config.max_energy, rng)]
        }
    }
}
