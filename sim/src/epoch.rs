use crate::arena::{Arena, Footprint, Position, Quarter};
use crate::carryover::{CarryoverStore, RecordError};
use crate::config::SimConfig;
use crate::interaction;
use crate::lifeform::{LifeForm, Plant, Target};
use crate::movement;
use crate::perception::{self, Sighting};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{
    AttributeKind, CarryoverSummary, EnergyMetrics, EpochPhase, EpochRecord, LifeFormView, Lineage,
    MeanAttributes, PlantView, TraitLayout, WinnerView, WorldSnapshot, PROTOCOL_VERSION,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

/// Owns every entity of the running epoch plus the carryover state that
/// survives between epochs.
pub struct EpochController {
    config: SimConfig,
    arena: Arena,
    store: Box<dyn CarryoverStore>,
    plants: Vec<Plant>,
    life_forms: Vec<LifeForm>,
    phase: EpochPhase,
    epoch: u32,
    tick: u64,
    /// Ticks spent waiting in Seeding, Concluded or Extinct
    idle_ticks: u64,
    /// Lineage and body carried into the next seeding
    retained: Option<(Lineage, TraitLayout)>,
    last_winner: Option<Lineage>,
    consecutive_wins: u32,
    winner: Option<WinnerView>,
}

impl EpochController {
    /// Read the newest stored winner and seed the first epoch.
    ///
    /// A stored winner's body goes to `config.default_carryover_lineage`. An
    /// unreadable store is logged and treated as having no winner.
    pub fn new<R: Rng>(config: SimConfig, store: Box<dyn CarryoverStore>, rng: &mut R) -> Self {
        let carried = match store.latest() {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(error = %err, "Ignoring unreadable carryover record");
                None
            }
        };

        let mut controller = Self::empty(config, store);
        if let Some(state) = carried {
            tracing::info!(
                "Carrying over lineage {} winner ({} consecutive wins) as lineage {}",
                state.record.lineage,
                state.consecutive_wins,
                controller.config.default_carryover_lineage
            );
            controller.retained = Some((
                controller.config.default_carryover_lineage,
                state.record.layout,
            ));
            controller.last_winner = Some(state.record.lineage);
            controller.consecutive_wins = state.consecutive_wins;
        }
        controller.seed(rng);
        controller
    }

    /// Start a running epoch from hand-placed entities. Dead life forms are dropped.
    pub fn from_population(
        config: SimConfig,
        store: Box<dyn CarryoverStore>,
        plants: Vec<Plant>,
        life_forms: Vec<LifeForm>,
    ) -> Self {
        let mut controller = Self::empty(config, store);
        controller.plants = plants;
        controller.life_forms = life_forms.into_iter().filter(|lf| lf.alive).collect();
        controller.phase = EpochPhase::Running;
        controller
    }

    fn empty(config: SimConfig, store: Box<dyn CarryoverStore>) -> Self {
        let arena = Arena::new(config.arena_width, config.arena_height, config.gap_ratio);
        Self {
            config,
            arena,
            store,
            plants: Vec::new(),
            life_forms: Vec::new(),
            phase: EpochPhase::Seeding,
            epoch: 0,
            tick: 0,
            idle_ticks: 0,
            retained: None,
            last_winner: None,
            consecutive_wins: 0,
            winner: None,
        }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn phase(&self) -> EpochPhase {
        self.phase
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn plants(&self) -> &[Plant] {
        &self.plants
    }

    pub fn life_forms(&self) -> &[LifeForm] {
        &self.life_forms
    }

    pub fn winner(&self) -> Option<&WinnerView> {
        self.winner.as_ref()
    }

    pub fn last_winner(&self) -> Option<Lineage> {
        self.last_winner
    }

    pub fn consecutive_wins(&self) -> u32 {
        self.consecutive_wins
    }

    pub fn retained_lineage(&self) -> Option<Lineage> {
        self.retained.as_ref().map(|(lineage, _)| *lineage)
    }

    /// Newest record in the carryover store
    pub fn stored_winner(&self) -> Result<Option<EpochRecord>, RecordError> {
        Ok(self.store.latest()?.map(|state| state.record))
    }

    pub fn live_count(&self, lineage: Lineage) -> usize {
        self.life_forms
            .iter()
            .filter(|lf| lf.alive && lf.lineage == lineage)
            .count()
    }

    /// Place plants and one group per lineage in its home quarter.
    ///
    /// The retained lineage reuses the carried-over body; every other lineage
    /// gets a fresh random one shared by all its members.
    fn seed<R: Rng>(&mut self, rng: &mut R) {
        self.plants = (0..self.config.initial_plants)
            .map(|_| Plant::spawn(&self.arena, None, &self.config, rng))
            .collect();

        self.life_forms.clear();
        for lineage in Lineage::ALL {
            let layout = match &self.retained {
                Some((kept, layout)) if *kept == lineage => layout.clone(),
                _ => TraitLayout::random_symmetric(rng),
            };
            let home = Quarter::home_of(lineage);
            for _ in 0..self.config.life_forms_per_lineage {
                let position = self.arena.random_position_in(home, rng);
                self.life_forms.push(LifeForm::spawn(
                    lineage,
                    Some(layout.clone()),
                    Some(position),
                    &self.arena,
                    &self.config,
                    rng,
                ));
            }
        }

        self.phase = EpochPhase::Seeding;
        self.tick = 0;
        self.idle_ticks = 0;
        self.winner = None;

        tracing::info!(
            "Seeded epoch {} with {} life forms and {} plants (retained lineage: {:?})",
            self.epoch,
            self.life_forms.len(),
            self.plants.len(),
            self.retained_lineage()
        );
    }

    /// Move on from a waiting phase: start a seeded epoch, or reseed after a
    /// finished one. Returns false while an epoch is running.
    pub fn advance<R: Rng>(&mut self, rng: &mut R) -> bool {
        match self.phase {
            EpochPhase::Seeding => {
                self.phase = EpochPhase::Running;
                self.idle_ticks = 0;
                tracing::info!("Epoch {} started", self.epoch);
                true
            }
            EpochPhase::Running => false,
            EpochPhase::Concluded(_) | EpochPhase::Extinct => {
                self.next_epoch(rng);
                true
            }
        }
    }

    /// Abandon whatever is happening and seed the next epoch
    pub fn restart<R: Rng>(&mut self, rng: &mut R) {
        self.next_epoch(rng);
    }

    fn next_epoch<R: Rng>(&mut self, rng: &mut R) {
        self.epoch += 1;
        self.seed(rng);
    }

    /// Drive the controller by one step: runs a tick while running, otherwise
    /// counts down the intermission and advances once it has elapsed.
    pub fn step<R: Rng>(&mut self, rng: &mut R) -> EpochPhase {
        match self.phase {
            EpochPhase::Running => self.run_tick(rng),
            EpochPhase::Seeding | EpochPhase::Concluded(_) | EpochPhase::Extinct => {
                self.idle_ticks += 1;
                if self.idle_ticks >= self.config.intermission_ticks {
                    self.advance(rng);
                }
            }
        }
        self.phase
    }

    /// Advance the running epoch by one tick. Does nothing in other phases.
    pub fn run_tick<R: Rng>(&mut self, rng: &mut R) {
        if self.phase != EpochPhase::Running {
            return;
        }
        self.tick += 1;

        // Cooldowns all tick before anyone's turn, so both parents of a
        // litter leave the tick with the same cooldown
        for lf in &mut self.life_forms {
            lf.tick_cooldown();
        }

        // Every life form present now is alive; the snapshot shares its indices
        let snapshot: Vec<Sighting> = self.life_forms.iter().map(Sighting::from).collect();
        let index: HashMap<Uuid, usize> = self
            .life_forms
            .iter()
            .enumerate()
            .map(|(i, lf)| (lf.id, i))
            .collect();
        let mut live_counts: HashMap<Lineage, usize> = HashMap::new();
        for lf in &self.life_forms {
            *live_counts.entry(lf.lineage).or_insert(0) += 1;
        }

        let mut newborns = Vec::new();
        let mut pass = TickPass {
            snapshot: &snapshot,
            index: &index,
            live_counts: &mut live_counts,
            newborns: &mut newborns,
        };
        for idx in 0..snapshot.len() {
            self.update_life_form(idx, &mut pass, rng);
        }

        self.life_forms.retain(|lf| lf.alive);
        self.life_forms.extend(newborns);

        let interval = self.config.plant_respawn_interval;
        if interval > 0 && self.tick % interval == 0 && self.plants.len() < self.config.max_plants {
            let plant = Plant::spawn(&self.arena, None, &self.config, rng);
            self.plants.push(plant);
        }

        self.check_termination();
    }

    /// One life form's turn: metabolism, reproduction, targeting, then
    /// movement or interaction, then boundaries. Cooldowns were already
    /// ticked for the whole roster.
    fn update_life_form<R: Rng>(&mut self, idx: usize, pass: &mut TickPass<'_>, rng: &mut R) {
        let me = &mut self.life_forms[idx];
        if !me.alive {
            return;
        }
        if me.metabolize() {
            pass.record_death(me.lineage);
            return;
        }

        self.try_reproduce(idx, pass, rng);
        self.acquire_target(idx, pass, rng);

        let target = self.life_forms[idx].target;
        match target {
            Some(Target::Plant(plant_id)) => self.pursue_plant(idx, plant_id, pass),
            Some(Target::LifeForm(other_id)) => self.pursue_life_form(idx, other_id, pass, rng),
            None => movement::wander(&mut self.life_forms[idx], &self.config, rng),
        }

        let me = &mut self.life_forms[idx];
        let footprint = me.footprint();
        self.arena.enforce_boundaries(&mut me.position, &mut me.heading, footprint);
    }

    fn is_alive(&self, index: &HashMap<Uuid, usize>, id: Uuid) -> bool {
        index.get(&id).is_some_and(|&j| self.life_forms[j].alive)
    }

    fn try_reproduce<R: Rng>(&mut self, idx: usize, pass: &mut TickPass<'_>, rng: &mut R) {
        let me = &self.life_forms[idx];
        let count = pass.live_count(me.lineage);
        let cap = self.config.per_lineage_cap;
        if !me.can_reproduce(count, cap) {
            return;
        }

        let footprint = me.footprint();
        let mates: Vec<usize> = pass
            .snapshot
            .iter()
            .enumerate()
            .filter(|(j, s)| {
                *j != idx
                    && s.lineage == me.lineage
                    && self.life_forms[*j].alive
                    && footprint.overlaps(me.position, &s.footprint, s.position)
            })
            .map(|(j, _)| j)
            .collect();

        let Some(&mate) = mates.choose(rng) else {
            return;
        };
        if self.life_forms[mate].reproduction_cooldown != 0 {
            return;
        }

        let lineage = me.lineage;
        let remaining = cap.saturating_sub(count);
        let (me, partner) = pair_mut(&mut self.life_forms, idx, mate);
        let born = interaction::reproduce(me, partner, remaining, &self.config, rng);
        if !born.is_empty() {
            tracing::debug!("Lineage {} produced {} offspring", lineage, born.len());
        }
        *pass.live_counts.entry(lineage).or_insert(0) += born.len();
        pass.newborns.extend(born);
    }

    /// Keep a still-valid target, otherwise look for a new one
    fn acquire_target<R: Rng>(&mut self, idx: usize, pass: &TickPass<'_>, rng: &mut R) {
        let valid = match self.life_forms[idx].target {
            None => false,
            Some(Target::Plant(id)) => self.plants.iter().any(|p| p.id == id),
            Some(Target::LifeForm(id)) => self.is_alive(pass.index, id),
        };
        if valid {
            return;
        }

        let target = perception::find_target(
            &self.life_forms[idx],
            &self.arena,
            &self.plants,
            pass.snapshot,
            |id| self.is_alive(pass.index, id),
            rng,
        );
        self.life_forms[idx].target = target;
    }

    fn centroid_for(&self, idx: usize, pass: &TickPass<'_>) -> Option<Position> {
        movement::group_centroid(
            &self.life_forms[idx],
            pass.snapshot,
            |id| self.is_alive(pass.index, id),
            self.config.grouping_radius,
        )
    }

    fn pursue_plant(&mut self, idx: usize, plant_id: Uuid, pass: &TickPass<'_>) {
        let Some(plant_at) = self.plants.iter().position(|p| p.id == plant_id) else {
            self.life_forms[idx].target = None;
            return;
        };
        let plant_position = self.plants[plant_at].position;
        let centroid = self.centroid_for(idx, pass);

        let me = &mut self.life_forms[idx];
        movement::seek(me, plant_position, centroid, self.config.cohesion_weight);
        if me
            .footprint()
            .overlaps(me.position, &Footprint::plant(), plant_position)
        {
            let plant = self.plants.swap_remove(plant_at);
            me.gain_energy(plant.energy, self.config.max_energy);
            me.target = None;
        }
    }

    fn pursue_life_form<R: Rng>(
        &mut self,
        idx: usize,
        other_id: Uuid,
        pass: &mut TickPass<'_>,
        rng: &mut R,
    ) {
        let Some(&other) = pass.index.get(&other_id) else {
            self.life_forms[idx].target = None;
            return;
        };
        let snapshot = pass.snapshot;
        let seen = &snapshot[other];
        let centroid = self.centroid_for(idx, pass);

        let me = &mut self.life_forms[idx];
        movement::seek(me, seen.position, centroid, self.config.cohesion_weight);
        if !me
            .footprint()
            .overlaps(me.position, &seen.footprint, seen.position)
        {
            return;
        }

        let lineage = me.lineage;
        if seen.lineage == lineage || !self.life_forms[other].alive {
            self.life_forms[idx].target = None;
            return;
        }

        let me = &self.life_forms[idx];
        if interaction::should_fight(me.attributes(), &seen.attributes, rng) {
            let (me, foe) = pair_mut(&mut self.life_forms, idx, other);
            let report = interaction::fight(me, foe, rng);
            tracing::debug!(
                "Lineage {} fought lineage {}: took {}, dealt {}",
                me.lineage,
                foe.lineage,
                report.outcome.damage_to_self,
                report.outcome.damage_to_other
            );
            if report.self_died {
                pass.record_death(me.lineage);
            }
            if report.other_died {
                pass.record_death(foe.lineage);
            }
        } else {
            movement::flee(&mut self.life_forms[idx], seen.position);
        }
    }

    fn check_termination(&mut self) {
        if self.life_forms.is_empty() {
            self.phase = EpochPhase::Extinct;
            self.idle_ticks = 0;
            tracing::info!(
                "Epoch {} ended after {} ticks with every lineage extinct",
                self.epoch,
                self.tick
            );
            return;
        }

        let lineages: BTreeSet<Lineage> = self.life_forms.iter().map(|lf| lf.lineage).collect();
        if lineages.len() == 1 {
            if let Some(&winner) = lineages.iter().next() {
                self.conclude(winner);
            }
        }
    }

    /// Record the sole surviving lineage and make it the retained one
    fn conclude(&mut self, lineage: Lineage) {
        let survivors: Vec<&LifeForm> = self
            .life_forms
            .iter()
            .filter(|lf| lf.lineage == lineage)
            .collect();
        let Some(first) = survivors.first() else {
            return;
        };
        let mean_attributes = mean_attributes(&survivors);
        let record = EpochRecord::new(lineage, first.layout().clone());
        let survivor_count = survivors.len();

        if let Err(err) = self.store.append(&record) {
            tracing::warn!(error = %err, "Failed to persist winning lineage {}", lineage);
        }

        if self.last_winner == Some(lineage) {
            self.consecutive_wins += 1;
        } else {
            self.consecutive_wins = 1;
            self.last_winner = Some(lineage);
        }

        self.retained = Some((lineage, record.layout));
        self.winner = Some(WinnerView {
            lineage,
            survivors: survivor_count,
            mean_attributes,
        });
        self.phase = EpochPhase::Concluded(lineage);
        self.idle_ticks = 0;

        tracing::info!(
            "Epoch {} won by lineage {} after {} ticks ({} survivors, {} consecutive wins)",
            self.epoch,
            lineage,
            self.tick,
            survivor_count,
            self.consecutive_wins
        );
    }

    /// Total and average energy of each lineage's live members
    pub fn energy_metrics(&self) -> BTreeMap<Lineage, EnergyMetrics> {
        Lineage::ALL
            .iter()
            .map(|&lineage| {
                let (population, total) = self
                    .life_forms
                    .iter()
                    .filter(|lf| lf.alive && lf.lineage == lineage)
                    .fold((0usize, 0.0), |(n, sum), lf| (n + 1, sum + lf.energy));
                let average = if population > 0 {
                    total / population as f64
                } else {
                    0.0
                };
                (
                    lineage,
                    EnergyMetrics {
                        population,
                        total,
                        average,
                    },
                )
            })
            .collect()
    }

    /// Read-only copy of everything a presentation layer shows
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            protocol_version: PROTOCOL_VERSION,
            epoch: self.epoch,
            tick: self.tick,
            phase: self.phase,
            arena_width: self.arena.width,
            arena_height: self.arena.height,
            plants: self
                .plants
                .iter()
                .map(|p| PlantView {
                    id: p.id,
                    x: p.position.x,
                    y: p.position.y,
                    energy: p.energy,
                })
                .collect(),
            life_forms: self
                .life_forms
                .iter()
                .map(|lf| LifeFormView {
                    id: lf.id,
                    lineage: lf.lineage,
                    x: lf.position.x,
                    y: lf.position.y,
                    heading: lf.heading,
                    energy: lf.energy,
                    alive: lf.alive,
                    layout: lf.layout().clone(),
                    attributes: *lf.attributes(),
                })
                .collect(),
            winner: self.winner.clone(),
            carryover: self.carryover_summary(),
            energy: self.energy_metrics(),
        }
    }

    pub fn carryover_summary(&self) -> CarryoverSummary {
        CarryoverSummary {
            last_winner: self.last_winner,
            consecutive_wins: self.consecutive_wins,
            retained_lineage: self.retained_lineage(),
            retained_attributes: self
                .retained
                .as_ref()
                .map(|(_, layout)| layout.derive_attributes()),
        }
    }
}

/// Bookkeeping shared by every life form's turn within one tick
struct TickPass<'a> {
    snapshot: &'a [Sighting],
    index: &'a HashMap<Uuid, usize>,
    /// Live members per lineage, including offspring born this tick
    live_counts: &'a mut HashMap<Lineage, usize>,
    newborns: &'a mut Vec<LifeForm>,
}

impl TickPass<'_> {
    fn live_count(&self, lineage: Lineage) -> usize {
        self.live_counts.get(&lineage).copied().unwrap_or(0)
    }

    fn record_death(&mut self, lineage: Lineage) {
        if let Some(count) = self.live_counts.get_mut(&lineage) {
            *count = count.saturating_sub(1);
        }
    }
}

fn mean_attributes(group: &[&LifeForm]) -> MeanAttributes {
    let n = group.len().max(1) as f64;
    AttributeKind::ALL
        .iter()
        .map(|&kind| {
            let sum: u32 = group.iter().map(|lf| lf.attributes().get(kind)).sum();
            (kind, f64::from(sum) / n)
        })
        .collect()
}

/// Mutable references to two distinct elements
fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carryover::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::Marker;

    fn layout_of(kinds: &[(AttributeKind, usize)]) -> TraitLayout {
        let mut markers = Vec::new();
        let mut cell = 0i8;
        for &(kind, count) in kinds {
            for _ in 0..count {
                markers.push(Marker::new(cell % 5 - 2, cell / 5 - 2, kind));
                cell += 1;
            }
        }
        TraitLayout::new(markers)
    }

    fn place(
        lineage: Lineage,
        kinds: &[(AttributeKind, usize)],
        x: f64,
        y: f64,
        energy: f64,
    ) -> LifeForm {
        LifeForm::new(lineage, layout_of(kinds), Position::new(x, y), energy, 0.0)
    }

    fn running(plants: Vec<Plant>, life_forms: Vec<LifeForm>) -> EpochController {
        let store = Box::new(MemoryStore::new());
        EpochController::from_population(SimConfig::default(), store, plants, life_forms)
    }

    fn find(controller: &EpochController, id: Uuid) -> &LifeForm {
        controller.life_forms().iter().find(|lf| lf.id == id).unwrap()
    }

    struct BrokenStore;

    impl CarryoverStore for BrokenStore {
        fn latest(&self) -> Result<Option<crate::carryover::CarryoverState>, RecordError> {
            Err(RecordError::Malformed {
                line: 1,
                reason: "not json".to_string(),
            })
        }

        fn append(&mut self, _record: &EpochRecord) -> Result<(), RecordError> {
            Err(RecordError::Io(std::io::Error::other("disk full")))
        }
    }

    #[test]
    fn test_seeding_places_lineages_in_home_quarters() {
        let mut rng = StdRng::seed_from_u64(1);
        let store = Box::new(MemoryStore::new());
        let controller = EpochController::new(SimConfig::default(), store, &mut rng);

        assert_eq!(controller.phase(), EpochPhase::Seeding);
        assert_eq!(controller.epoch(), 0);
        assert_eq!(controller.plants().len(), 200);
        assert_eq!(controller.life_forms().len(), 40);
        assert_eq!(controller.retained_lineage(), None);

        for lineage in Lineage::ALL {
            let members: Vec<&LifeForm> = controller
                .life_forms()
                .iter()
                .filter(|lf| lf.lineage == lineage)
                .collect();
            assert_eq!(members.len(), 10);
            for lf in &members {
                assert_eq!(controller.arena().quarter_of(lf.position), Quarter::home_of(lineage));
                assert_eq!(lf.layout(), members[0].layout());
                assert_eq!(lf.energy, 200.0);
            }
        }
    }

    #[test]
    fn test_first_epoch_carries_record_to_default_lineage() {
        let mut rng = StdRng::seed_from_u64(2);
        let stored = TraitLayout::canonical(Lineage::B);
        let store = MemoryStore::with_records(vec![
            EpochRecord::new(Lineage::C, TraitLayout::canonical(Lineage::C)),
            EpochRecord::new(Lineage::C, stored.clone()),
        ]);

        let controller = EpochController::new(SimConfig::default(), Box::new(store), &mut rng);

        assert_eq!(controller.retained_lineage(), Some(Lineage::A));
        assert_eq!(controller.last_winner(), Some(Lineage::C));
        assert_eq!(controller.consecutive_wins(), 2);
        for lf in controller.life_forms().iter().filter(|lf| lf.lineage == Lineage::A) {
            assert_eq!(lf.layout(), &stored);
        }
    }

    #[test]
    fn test_unreadable_store_fails_open() {
        let mut rng = StdRng::seed_from_u64(3);
        let store = Box::new(BrokenStore);
        let controller = EpochController::new(SimConfig::default(), store, &mut rng);

        assert_eq!(controller.retained_lineage(), None);
        assert_eq!(controller.last_winner(), None);
        assert_eq!(controller.life_forms().len(), 40);
    }

    #[test]
    fn test_sole_lineage_concludes_same_tick() {
        let mut rng = StdRng::seed_from_u64(4);
        let population = vec![
            place(Lineage::A, &[(AttributeKind::Speed, 2)], 100.0, 100.0, 200.0),
            place(Lineage::A, &[(AttributeKind::Speed, 2)], 300.0, 100.0, 200.0),
            // Starves during its first metabolism step
            place(Lineage::B, &[(AttributeKind::Defense, 1)], 1500.0, 100.0, 0.05),
        ];
        let mut controller = EpochController::from_population(
            SimConfig::default(),
            Box::new(MemoryStore::new()),
            Vec::new(),
            population,
        );

        controller.run_tick(&mut rng);

        assert_eq!(controller.phase(), EpochPhase::Concluded(Lineage::A));
        assert_eq!(controller.last_winner(), Some(Lineage::A));
        assert_eq!(controller.consecutive_wins(), 1);
        assert_eq!(controller.retained_lineage(), Some(Lineage::A));

        let winner = controller.winner().unwrap();
        assert_eq!(winner.survivors, 2);
        assert_eq!(winner.mean_attributes[&AttributeKind::Speed], 2.0);

        let stored = controller.stored_winner().unwrap().unwrap();
        assert_eq!(stored.lineage, Lineage::A);
        assert_eq!(stored.attributes.speed, 2);
    }

    #[test]
    fn test_repeat_winner_counts_consecutive_wins() {
        let mut rng = StdRng::seed_from_u64(5);
        let store = MemoryStore::with_records(vec![EpochRecord::new(
            Lineage::A,
            TraitLayout::canonical(Lineage::A),
        )]);
        let mut controller = EpochController::new(SimConfig::default(), Box::new(store), &mut rng);
        assert_eq!(controller.consecutive_wins(), 1);

        // Leave only lineage A alive
        controller.life_forms.retain(|lf| lf.lineage == Lineage::A);
        controller.advance(&mut rng);
        controller.run_tick(&mut rng);

        assert_eq!(controller.phase(), EpochPhase::Concluded(Lineage::A));
        assert_eq!(controller.consecutive_wins(), 2);
    }

    #[test]
    fn test_total_extinction_records_nothing() {
        let mut rng = StdRng::seed_from_u64(6);
        let population = vec![
            place(Lineage::A, &[(AttributeKind::Speed, 1)], 100.0, 100.0, 0.05),
            place(Lineage::C, &[(AttributeKind::Speed, 1)], 100.0, 700.0, 0.05),
        ];
        let mut controller = EpochController::from_population(
            SimConfig::default(),
            Box::new(MemoryStore::new()),
            Vec::new(),
            population,
        );

        controller.run_tick(&mut rng);

        assert_eq!(controller.phase(), EpochPhase::Extinct);
        assert!(controller.life_forms().is_empty());
        assert!(controller.winner().is_none());
        assert!(controller.stored_winner().unwrap().is_none());
        assert_eq!(controller.consecutive_wins(), 0);

        assert!(controller.advance(&mut rng));
        assert_eq!(controller.epoch(), 1);
        assert_eq!(controller.phase(), EpochPhase::Seeding);
        assert_eq!(controller.life_forms().len(), 40);
    }

    #[test]
    fn test_failed_append_still_concludes() {
        let mut rng = StdRng::seed_from_u64(7);
        let loner = place(Lineage::D, &[(AttributeKind::Stealth, 1)], 1500.0, 700.0, 200.0);
        let store = Box::new(BrokenStore);
        let mut controller =
            EpochController::from_population(SimConfig::default(), store, Vec::new(), vec![loner]);

        controller.run_tick(&mut rng);

        assert_eq!(controller.phase(), EpochPhase::Concluded(Lineage::D));
        assert_eq!(controller.retained_lineage(), Some(Lineage::D));
    }

    #[test]
    fn test_next_epoch_retains_winner_layout() {
        let mut rng = StdRng::seed_from_u64(8);
        let winning = layout_of(&[(AttributeKind::Intelligence, 3), (AttributeKind::Stealth, 2)]);
        let population = vec![LifeForm::new(
            Lineage::C,
            winning.clone(),
            Position::new(100.0, 700.0),
            200.0,
            0.0,
        )];
        let mut controller = EpochController::from_population(
            SimConfig::default(),
            Box::new(MemoryStore::new()),
            Vec::new(),
            population,
        );
        controller.run_tick(&mut rng);
        assert_eq!(controller.phase(), EpochPhase::Concluded(Lineage::C));

        assert!(controller.advance(&mut rng));

        assert_eq!(controller.epoch(), 1);
        assert!(controller.winner().is_none());
        for lf in controller.life_forms().iter().filter(|lf| lf.lineage == Lineage::C) {
            assert_eq!(lf.layout(), &winning);
        }
    }

    #[test]
    fn test_reproduction_at_last_free_slot() {
        let mut rng = StdRng::seed_from_u64(9);
        let config = SimConfig {
            per_lineage_cap: 3,
            ..Default::default()
        };
        // Five metabolism markers: no drain, so energy stays at exactly 200
        let body = [
            (AttributeKind::MetabolismRate, 5),
            (AttributeKind::ReproductionRate, 1),
        ];
        let population = vec![
            place(Lineage::A, &body, 100.0, 100.0, 200.0),
            place(Lineage::A, &body, 103.0, 100.0, 200.0),
            place(Lineage::B, &body, 1500.0, 100.0, 200.0),
        ];
        let parents = [population[0].id, population[1].id];
        let store = Box::new(MemoryStore::new());
        let mut controller =
            EpochController::from_population(config, store, Vec::new(), population);

        controller.run_tick(&mut rng);

        assert_eq!(controller.live_count(Lineage::A), 3);
        let first = find(&controller, parents[0]);
        let second = find(&controller, parents[1]);
        assert_eq!(first.energy, 150.0);
        assert_eq!(second.energy, 150.0);
        // The partner's own turn comes later in the tick and leaves its cooldown alone
        assert_eq!(first.reproduction_cooldown, 300);
        assert_eq!(second.reproduction_cooldown, 300);

        let child = controller
            .life_forms()
            .iter()
            .find(|lf| !parents.contains(&lf.id) && lf.lineage == Lineage::A)
            .unwrap();
        assert_eq!(child.energy, 100.0);
        assert_eq!(child.reproduction_cooldown, 0);
    }

    #[test]
    fn test_eating_a_plant() {
        let mut rng = StdRng::seed_from_u64(10);
        let plant = Plant::new(Position::new(101.0, 100.0), 25.0);
        let population = vec![
            place(Lineage::A, &[(AttributeKind::Intelligence, 1)], 100.0, 100.0, 200.0),
            place(Lineage::D, &[(AttributeKind::Intelligence, 1)], 1500.0, 700.0, 200.0),
        ];
        let eater = population[0].id;
        let mut controller = running(vec![plant], population);

        controller.run_tick(&mut rng);

        assert!(controller.plants().is_empty());
        let lf = find(&controller, eater);
        assert!((lf.energy - 224.9).abs() < 1e-9);
        assert!(lf.target.is_none());
    }

    #[test]
    fn test_outmatched_attacker_flees_and_keeps_target() {
        let mut rng = StdRng::seed_from_u64(15);
        let attacker = place(Lineage::A, &[(AttributeKind::Intelligence, 1)], 100.0, 100.0, 200.0);
        let foe = place(
            Lineage::B,
            &[(AttributeKind::AttackPower, 3), (AttributeKind::Defense, 3)],
            104.0,
            100.0,
            200.0,
        );
        let (attacker_id, foe_id) = (attacker.id, foe.id);
        let mut controller = running(Vec::new(), vec![attacker, foe]);

        controller.run_tick(&mut rng);

        let attacker = find(&controller, attacker_id);
        assert!(attacker.alive);
        // One step towards the foe, then one step straight back
        assert_eq!(attacker.position, Position::new(100.0, 100.0));
        assert_eq!(attacker.target, Some(Target::LifeForm(foe_id)));
        assert_eq!(controller.phase(), EpochPhase::Running);
    }

    #[test]
    fn test_killing_blow_removes_victim_and_clears_stale_targets() {
        let mut rng = StdRng::seed_from_u64(16);
        let hunter = place(
            Lineage::A,
            &[(AttributeKind::AttackPower, 5), (AttributeKind::Intelligence, 1)],
            100.0,
            100.0,
            200.0,
        );
        let victim = place(Lineage::B, &[(AttributeKind::Speed, 1)], 104.0, 100.0, 1.0);
        // Was chasing the victim last tick; the hunter gets there first this tick
        let mut latecomer = place(Lineage::A, &[(AttributeKind::Speed, 1)], 100.0, 300.0, 200.0);
        latecomer.target = Some(Target::LifeForm(victim.id));
        let survivor = place(Lineage::B, &[(AttributeKind::Speed, 1)], 1500.0, 100.0, 200.0);
        let (hunter_id, victim_id, latecomer_id) = (hunter.id, victim.id, latecomer.id);
        let mut controller = running(Vec::new(), vec![hunter, victim, latecomer, survivor]);

        controller.run_tick(&mut rng);

        assert!(controller.life_forms().iter().all(|lf| lf.id != victim_id));
        assert_eq!(controller.live_count(Lineage::A), 2);
        assert_eq!(controller.live_count(Lineage::B), 1);
        assert_eq!(controller.phase(), EpochPhase::Running);
        assert!(find(&controller, hunter_id).energy > 190.0);
        assert_eq!(find(&controller, latecomer_id).target, None);
    }

    #[test]
    fn test_killing_the_last_rival_concludes() {
        let mut rng = StdRng::seed_from_u64(17);
        let hunter = place(
            Lineage::C,
            &[(AttributeKind::AttackPower, 5), (AttributeKind::Intelligence, 1)],
            100.0,
            700.0,
            200.0,
        );
        let victim = place(Lineage::D, &[(AttributeKind::Speed, 1)], 104.0, 700.0, 1.0);
        let mut controller = running(Vec::new(), vec![hunter, victim]);

        controller.run_tick(&mut rng);

        assert_eq!(controller.phase(), EpochPhase::Concluded(Lineage::C));
        assert_eq!(controller.winner().unwrap().survivors, 1);
    }

    #[test]
    fn test_second_seeker_loses_eaten_plant() {
        let mut rng = StdRng::seed_from_u64(18);
        let plant = Plant::new(Position::new(101.0, 100.0), 25.0);
        let smart = [(AttributeKind::Intelligence, 1)];
        let first = place(Lineage::A, &smart, 100.0, 100.0, 200.0);
        let mut second = place(Lineage::A, &smart, 100.0, 160.0, 200.0);
        second.target = Some(Target::Plant(plant.id));
        let rival = place(Lineage::D, &[(AttributeKind::Speed, 1)], 1500.0, 700.0, 200.0);
        let (first_id, second_id) = (first.id, second.id);
        let mut controller = running(vec![plant], vec![first, second, rival]);

        controller.run_tick(&mut rng);

        assert!(controller.plants().is_empty());
        assert!((find(&controller, first_id).energy - 224.9).abs() < 1e-9);
        let second = find(&controller, second_id);
        assert_eq!(second.target, None);
        assert!((second.energy - 199.9).abs() < 1e-9);
    }

    #[test]
    fn test_same_lineage_target_is_dropped_on_contact() {
        let mut rng = StdRng::seed_from_u64(19);
        let mut seeker = place(Lineage::B, &[(AttributeKind::Speed, 1)], 1000.0, 100.0, 200.0);
        let friend = place(Lineage::B, &[(AttributeKind::Speed, 1)], 1003.0, 100.0, 200.0);
        seeker.target = Some(Target::LifeForm(friend.id));
        let rival = place(Lineage::C, &[(AttributeKind::Speed, 1)], 100.0, 700.0, 200.0);
        let (seeker_id, friend_id) = (seeker.id, friend.id);
        let mut controller = running(Vec::new(), vec![seeker, friend, rival]);

        controller.run_tick(&mut rng);

        assert_eq!(find(&controller, seeker_id).target, None);
        assert_eq!(find(&controller, friend_id).energy, find(&controller, seeker_id).energy);
    }

    #[test]
    fn test_plants_respawn_on_interval() {
        let mut rng = StdRng::seed_from_u64(11);
        let config = SimConfig {
            plant_respawn_interval: 5,
            max_plants: 1,
            ..Default::default()
        };
        let population = vec![
            place(Lineage::A, &[(AttributeKind::MetabolismRate, 5)], 100.0, 100.0, 200.0),
            place(Lineage::D, &[(AttributeKind::MetabolismRate, 5)], 1500.0, 700.0, 200.0),
        ];
        let store = Box::new(MemoryStore::new());
        let mut controller =
            EpochController::from_population(config, store, Vec::new(), population);

        for _ in 0..4 {
            controller.run_tick(&mut rng);
        }
        assert_eq!(controller.plants().len(), 0);
        controller.run_tick(&mut rng);
        assert_eq!(controller.plants().len(), 1);
        assert_eq!(controller.tick(), 5);
    }

    #[test]
    fn test_step_waits_out_intermission() {
        let mut rng = StdRng::seed_from_u64(12);
        let config = SimConfig {
            intermission_ticks: 3,
            ..Default::default()
        };
        let mut controller = EpochController::new(config, Box::new(MemoryStore::new()), &mut rng);

        assert_eq!(controller.step(&mut rng), EpochPhase::Seeding);
        assert_eq!(controller.step(&mut rng), EpochPhase::Seeding);
        assert_eq!(controller.step(&mut rng), EpochPhase::Running);
        assert_eq!(controller.tick(), 0);

        controller.step(&mut rng);
        assert_eq!(controller.tick(), 1);
    }

    #[test]
    fn test_invariants_hold_over_many_ticks() {
        let mut rng = StdRng::seed_from_u64(13);
        let config = SimConfig {
            arena_width: 300.0,
            arena_height: 200.0,
            initial_plants: 60,
            max_plants: 60,
            plant_respawn_interval: 2,
            initial_energy: 450.0,
            per_lineage_cap: 14,
            reproduction_cooldown: 20,
            ..Default::default()
        };
        let mut controller = EpochController::new(config, Box::new(MemoryStore::new()), &mut rng);
        controller.advance(&mut rng);

        for _ in 0..1500 {
            if controller.phase() != EpochPhase::Running {
                break;
            }
            controller.run_tick(&mut rng);

            for lf in controller.life_forms() {
                assert!(lf.alive);
                assert!(lf.energy >= 0.0 && lf.energy <= 500.0, "energy {}", lf.energy);
                assert_eq!(*lf.attributes(), lf.layout().derive_attributes());
                assert!(lf.position.x >= 0.0 && lf.position.x <= 300.0);
                assert!(lf.position.y >= 0.0 && lf.position.y <= 200.0);
            }
            for lineage in Lineage::ALL {
                assert!(controller.live_count(lineage) <= 14);
            }
        }
    }

    #[test]
    fn test_snapshot_mirrors_state() {
        let mut rng = StdRng::seed_from_u64(14);
        let store = Box::new(MemoryStore::new());
        let controller = EpochController::new(SimConfig::default(), store, &mut rng);
        let snapshot = controller.snapshot();

        assert_eq!(snapshot.protocol_version, PROTOCOL_VERSION);
        assert_eq!(snapshot.phase, EpochPhase::Seeding);
        assert_eq!(snapshot.plants.len(), 200);
        assert_eq!(snapshot.life_forms.len(), 40);
        assert!(snapshot.winner.is_none());
        assert_eq!(snapshot.energy[&Lineage::B].population, 10);
        assert_eq!(snapshot.energy[&Lineage::B].total, 2000.0);
        assert_eq!(snapshot.energy[&Lineage::B].average, 200.0);
    }
}
