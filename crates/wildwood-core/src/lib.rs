//! Deterministic core of the Wildwood ecosystem simulation.
//!
//! The crate models a closed habitat of five animal species and a regrowing
//! vegetation layer. Animals age, hunger, hunt, graze, seek mates, and die;
//! everything advances through discrete [`World::tick`] calls driven by a
//! caller-supplied timestep. A single seeded [`SmallRng`] owns every random
//! draw, so two worlds built from the same [`WorldConfig`] replay the same
//! history tick for tick.
//!
//! Entities live in [`slotmap`] arenas. Handles ([`AnimalId`],
//! [`VegetationId`]) are generational, so a handle to an eaten rabbit held in
//! another animal's [`Target`] simply stops resolving instead of aliasing a
//! recycled slot.

use std::collections::VecDeque;
use std::f32::consts::TAU;

use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use thiserror::Error;
use tracing::{debug, info};

new_key_type! {
    /// Stable generational handle for an animal.
    pub struct AnimalId;
}

new_key_type! {
    /// Stable generational handle for a vegetation patch.
    pub struct VegetationId;
}

/// Health ceiling shared by every animal.
pub const MAX_HEALTH: f32 = 100.0;
/// Nominal hunger scale for display layers. Accumulation is unclamped.
pub const MAX_HUNGER: f32 = 100.0;
/// Lower bound accepted by [`World::set_speed`].
pub const MIN_SPEED_MULTIPLIER: f32 = 0.5;
/// Upper bound accepted by [`World::set_speed`].
pub const MAX_SPEED_MULTIPLIER: f32 = 5.0;

const TRAIL_CAPACITY: usize = 10;
const JUVENILE_FRACTION: f32 = 0.3;
const ELDER_FRACTION: f32 = 0.7;
const REPRODUCTION_MIN_HEALTH: f32 = 50.0;
const REPRODUCTION_MAX_HUNGER: f32 = 60.0;
const ELDER_REPRODUCTION_CHANCE: f64 = 0.3;
const MATE_SEEK_CHANCE: f64 = 0.3;
const EAT_RANGE_PAD: f32 = 5.0;
const PREY_HUNGER_RELIEF: f32 = 40.0;
const PREY_HEAL: f32 = 20.0;
const MEAL_HEAL_FACTOR: f32 = 0.5;

/// Errors surfaced while constructing or reconfiguring a world.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Configuration failed validation before the world was built.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Plain 2D vector used for positions and velocities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn magnitude(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction. The zero vector normalizes to zero.
    #[must_use]
    pub fn normalize(self) -> Self {
        let magnitude = self.magnitude();
        if magnitude == 0.0 {
            Self::ZERO
        } else {
            Self::new(self.x / magnitude, self.y / magnitude)
        }
    }

    #[must_use]
    pub fn scale(self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).magnitude()
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

// ---------------------------------------------------------------------------
// Species catalog
// ---------------------------------------------------------------------------

/// The five animal species of the habitat, in catalog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeciesKind {
    Rabbit,
    Deer,
    Fox,
    Wolf,
    Bear,
}

impl SpeciesKind {
    pub const ALL: [Self; 5] = [
        Self::Rabbit,
        Self::Deer,
        Self::Fox,
        Self::Wolf,
        Self::Bear,
    ];

    /// Immutable catalog entry for this species.
    #[must_use]
    pub fn profile(self) -> &'static Species {
        &CATALOG[self as usize]
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        self.profile().name
    }

    /// Case-insensitive lookup by catalog name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "rabbit" => Some(Self::Rabbit),
            "deer" => Some(Self::Deer),
            "fox" => Some(Self::Fox),
            "wolf" => Some(Self::Wolf),
            "bear" => Some(Self::Bear),
            _ => None,
        }
    }
}

/// What a species is allowed to eat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Diet {
    pub vegetation: bool,
    pub animals: bool,
}

/// Static per-species parameters. Baselines feed trait sampling; the
/// `prey` list is the whitelist consulted before any predation attempt.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Species {
    pub kind: SpeciesKind,
    pub name: &'static str,
    pub glyph: &'static str,
    pub color: [f32; 3],
    pub base_speed: f32,
    pub base_size: f32,
    pub base_vision: f32,
    pub base_reproduction_rate: f32,
    pub lifespan: f32,
    pub reproduction_age: f32,
    pub diet: Diet,
    pub prey: &'static [SpeciesKind],
    pub trophic_level: u8,
}

impl Species {
    /// Full catalog in [`SpeciesKind`] order.
    #[must_use]
    pub fn catalog() -> &'static [Species] {
        &CATALOG
    }

    /// Whether this species may kill and eat `other`.
    #[must_use]
    pub fn can_eat(&self, other: SpeciesKind) -> bool {
        self.prey.contains(&other)
    }
}

static CATALOG: [Species; 5] = [
    Species {
        kind: SpeciesKind::Rabbit,
        name: "rabbit",
        glyph: "\u{1F430}",
        color: [0.824, 0.412, 0.118],
        base_speed: 60.0,
        base_size: 8.0,
        base_vision: 100.0,
        base_reproduction_rate: 1.5,
        lifespan: 80.0,
        reproduction_age: 15.0,
        diet: Diet { vegetation: true, animals: false },
        prey: &[],
        trophic_level: 1,
    },
    Species {
        kind: SpeciesKind::Deer,
        name: "deer",
        glyph: "\u{1F98C}",
        color: [0.545, 0.271, 0.075],
        base_speed: 50.0,
        base_size: 14.0,
        base_vision: 150.0,
        base_reproduction_rate: 0.8,
        lifespan: 120.0,
        reproduction_age: 25.0,
        diet: Diet { vegetation: true, animals: false },
        prey: &[],
        trophic_level: 1,
    },
    Species {
        kind: SpeciesKind::Fox,
        name: "fox",
        glyph: "\u{1F98A}",
        color: [1.0, 0.388, 0.278],
        base_speed: 70.0,
        base_size: 10.0,
        base_vision: 120.0,
        base_reproduction_rate: 1.0,
        lifespan: 100.0,
        reproduction_age: 20.0,
        diet: Diet { vegetation: false, animals: true },
        prey: &[SpeciesKind::Rabbit],
        trophic_level: 2,
    },
    Species {
        kind: SpeciesKind::Wolf,
        name: "wolf",
        glyph: "\u{1F43A}",
        color: [0.439, 0.502, 0.565],
        base_speed: 65.0,
        base_size: 13.0,
        base_vision: 140.0,
        base_reproduction_rate: 0.7,
        lifespan: 110.0,
        reproduction_age: 25.0,
        diet: Diet { vegetation: false, animals: true },
        prey: &[SpeciesKind::Rabbit, SpeciesKind::Deer],
        trophic_level: 2,
    },
    Species {
        kind: SpeciesKind::Bear,
        name: "bear",
        glyph: "\u{1F43B}",
        color: [0.396, 0.263, 0.129],
        base_speed: 55.0,
        base_size: 18.0,
        base_vision: 130.0,
        base_reproduction_rate: 0.5,
        lifespan: 140.0,
        reproduction_age: 30.0,
        diet: Diet { vegetation: false, animals: true },
        prey: &[
            SpeciesKind::Rabbit,
            SpeciesKind::Deer,
            SpeciesKind::Fox,
            SpeciesKind::Wolf,
        ],
        trophic_level: 3,
    },
];

// ---------------------------------------------------------------------------
// Vegetation
// ---------------------------------------------------------------------------

/// A stationary vegetation patch. Size is derived from energy and never
/// stored, so the two cannot drift apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vegetation {
    position: Vec2,
    energy: f32,
}

impl Vegetation {
    /// Energy ceiling for a single patch.
    pub const MAX_ENERGY: f32 = 50.0;
    /// Energy regrown per unit of simulated time.
    pub const GROWTH_RATE: f32 = 0.05;

    /// Patch with an explicit energy level, clamped to `[0, MAX_ENERGY]`.
    #[must_use]
    pub fn new(position: Vec2, energy: f32) -> Self {
        Self {
            position,
            energy: energy.clamp(0.0, Self::MAX_ENERGY),
        }
    }

    /// Fresh patch with randomized starting energy in `[20, 50)`.
    #[must_use]
    pub fn sprout(position: Vec2, rng: &mut SmallRng) -> Self {
        let energy = rng.random_range(20.0..Self::MAX_ENERGY);
        Self { position, energy }
    }

    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    #[must_use]
    pub const fn energy(&self) -> f32 {
        self.energy
    }

    /// Render radius derived from the current energy level.
    #[must_use]
    pub fn size(&self) -> f32 {
        3.0 + self.energy / Self::MAX_ENERGY * 3.0
    }

    /// Regrow energy, saturating at [`Self::MAX_ENERGY`].
    pub fn grow(&mut self, dt: f32) {
        if self.energy < Self::MAX_ENERGY {
            self.energy = (self.energy + Self::GROWTH_RATE * dt).min(Self::MAX_ENERGY);
        }
    }

    /// Remove up to `amount` energy and return how much was actually taken.
    pub fn consume(&mut self, amount: f32) -> f32 {
        let taken = self.energy.min(amount);
        self.energy -= taken;
        taken
    }

    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.energy <= 0.0
    }
}

// ---------------------------------------------------------------------------
// Animals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

/// Coarse behavioral state, mostly of interest to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Behavior {
    #[default]
    Wandering,
    Hunting,
    Eating,
    SeekingMate,
}

/// Tagged handle to whatever an animal is currently pursuing. Dangling
/// handles are harmless: lookups against the arenas just return `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Target {
    #[default]
    None,
    Animal(AnimalId),
    Vegetation(VegetationId),
}

/// Heritable per-individual traits, sampled around the species baseline at
/// birth and blended from the parents on reproduction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraitBundle {
    pub speed: f32,
    pub size: f32,
    pub vision: f32,
    pub reproduction_rate: f32,
}

impl TraitBundle {
    /// Founder traits: each component is the species baseline scaled by an
    /// independent uniform factor.
    #[must_use]
    pub fn sampled(species: &Species, rng: &mut SmallRng) -> Self {
        Self {
            speed: species.base_speed * (0.8 + rng.random::<f32>() * 0.4),
            size: species.base_size * (0.9 + rng.random::<f32>() * 0.2),
            vision: species.base_vision * (0.85 + rng.random::<f32>() * 0.3),
            reproduction_rate: species.base_reproduction_rate * (0.9 + rng.random::<f32>() * 0.2),
        }
    }

    /// Child traits: the parental average with an independent symmetric
    /// mutation of up to `mutation_rate / 2` applied per component.
    #[must_use]
    pub fn blended(a: &Self, b: &Self, mutation_rate: f32, rng: &mut SmallRng) -> Self {
        let mut mutate =
            |value: f32| value * (1.0 + (rng.random::<f32>() - 0.5) * mutation_rate);
        Self {
            speed: mutate((a.speed + b.speed) / 2.0),
            size: mutate((a.size + b.size) / 2.0),
            vision: mutate((a.vision + b.vision) / 2.0),
            reproduction_rate: mutate((a.reproduction_rate + b.reproduction_rate) / 2.0),
        }
    }
}

/// Life stage thresholds as a fraction of species lifespan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifeStage {
    Juvenile,
    Adult,
    Elder,
}

impl LifeStage {
    #[must_use]
    pub fn of(age: f32, lifespan: f32) -> Self {
        let ratio = age / lifespan;
        if ratio < JUVENILE_FRACTION {
            Self::Juvenile
        } else if ratio < ELDER_FRACTION {
            Self::Adult
        } else {
            Self::Elder
        }
    }

    /// Juveniles burn hunger faster; elders slower.
    #[must_use]
    pub const fn hunger_multiplier(self) -> f32 {
        match self {
            Self::Juvenile => 1.5,
            Self::Adult => 1.0,
            Self::Elder => 0.7,
        }
    }

    /// Elders lose health at double rate; juveniles at half.
    #[must_use]
    pub const fn decay_multiplier(self) -> f32 {
        match self {
            Self::Juvenile => 0.5,
            Self::Adult => 1.0,
            Self::Elder => 2.0,
        }
    }
}

/// Read-only view of the world handed to an animal while it decides and
/// moves. `observer` is the animal being updated, excluded from searches.
pub struct Surroundings<'a> {
    pub config: &'a WorldConfig,
    pub animals: &'a SlotMap<AnimalId, Animal>,
    pub vegetation: &'a SlotMap<VegetationId, Vegetation>,
    pub observer: AnimalId,
}

/// A single animal. Most state is public; the world owns the update
/// schedule and is the only mutator during a tick.
#[derive(Debug, Clone)]
pub struct Animal {
    pub kind: SpeciesKind,
    pub position: Vec2,
    pub velocity: Vec2,
    pub gender: Gender,
    pub traits: TraitBundle,
    /// Body size. Tracks `traits.size`, including after inheritance.
    pub size: f32,
    pub health: f32,
    pub age: f32,
    pub hunger: f32,
    pub reproduction_cooldown: f32,
    /// Age at which reproduction unlocks, copied from the species profile.
    pub reproduction_ready: f32,
    /// Heading in radians, derived from velocity after each move.
    pub facing: f32,
    pub behavior: Behavior,
    pub target: Target,
    trail: VecDeque<Vec2>,
}

impl Animal {
    /// Founder animal with freshly sampled traits.
    #[must_use]
    pub fn new(kind: SpeciesKind, position: Vec2, rng: &mut SmallRng) -> Self {
        let species = kind.profile();
        let traits = TraitBundle::sampled(species, rng);
        Self {
            kind,
            position,
            velocity: Vec2::ZERO,
            gender: if rng.random_bool(0.5) {
                Gender::Male
            } else {
                Gender::Female
            },
            size: traits.size,
            traits,
            health: MAX_HEALTH,
            age: 0.0,
            hunger: 0.0,
            reproduction_cooldown: 0.0,
            reproduction_ready: species.reproduction_age,
            facing: rng.random_range(0.0..TAU),
            behavior: Behavior::Wandering,
            target: Target::None,
            trail: VecDeque::with_capacity(TRAIL_CAPACITY + 1),
        }
    }

    #[must_use]
    pub fn species(&self) -> &'static Species {
        self.kind.profile()
    }

    #[must_use]
    pub fn life_stage(&self) -> LifeStage {
        LifeStage::of(self.age, self.species().lifespan)
    }

    /// Recent positions, oldest first. Cleared whenever the animal wraps.
    pub fn trail(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.trail.iter().copied()
    }

    /// Death is driven entirely by health; old age kills through the elder
    /// decay multiplier rather than a hard cutoff.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }

    /// Raise health by `amount`, saturating at [`MAX_HEALTH`].
    pub fn heal(&mut self, amount: f32) {
        self.health = (self.health + amount).min(MAX_HEALTH);
    }

    /// Replace sampled traits with an inherited bundle blended from the
    /// parents, keeping body size in sync.
    pub fn inherit_traits(
        &mut self,
        parent_a: &TraitBundle,
        parent_b: &TraitBundle,
        mutation_rate: f32,
        rng: &mut SmallRng,
    ) {
        self.traits = TraitBundle::blended(parent_a, parent_b, mutation_rate, rng);
        self.size = self.traits.size;
    }

    /// Whether the animal may take part in reproduction right now. Elders
    /// only pass the check with a random 30% chance, which consumes a draw.
    #[must_use]
    pub fn can_reproduce(&self, rng: &mut SmallRng) -> bool {
        if self.age <= self.reproduction_ready
            || self.reproduction_cooldown > 0.0
            || self.health < REPRODUCTION_MIN_HEALTH
            || self.hunger > REPRODUCTION_MAX_HUNGER
        {
            return false;
        }
        if self.age / self.species().lifespan > ELDER_FRACTION {
            return rng.random_bool(ELDER_REPRODUCTION_CHANCE);
        }
        true
    }

    /// Advance one timestep: metabolism, health decay, decision, movement,
    /// toroidal wrap. Eating and reproduction are resolved by the world
    /// afterwards, where both parties can be mutated together.
    pub fn update(&mut self, view: &Surroundings<'_>, rng: &mut SmallRng, dt: f32) {
        let config = view.config;
        self.age += dt;
        let stage = self.life_stage();
        self.hunger += config.hunger_rate * dt * stage.hunger_multiplier();
        self.reproduction_cooldown = (self.reproduction_cooldown - dt).max(0.0);

        // Bigger bodies decay slower; starvation stacks on top.
        self.health -= config.base_health_decay / (self.traits.size / 10.0)
            * stage.decay_multiplier()
            * dt;
        if self.hunger > config.starvation_threshold {
            self.health -= config.starvation_decay * dt;
        }

        // A meal in progress suspends decision making until the world
        // resolves it, so the bite sequence is not interrupted.
        if self.behavior != Behavior::Eating {
            self.decide(view, rng);
        }

        self.position = self.position + self.velocity.scale(dt);
        let mut wrapped = false;
        if self.position.x < 0.0 {
            self.position.x = config.world_width;
            wrapped = true;
        } else if self.position.x > config.world_width {
            self.position.x = 0.0;
            wrapped = true;
        }
        if self.position.y < 0.0 {
            self.position.y = config.world_height;
            wrapped = true;
        } else if self.position.y > config.world_height {
            self.position.y = 0.0;
            wrapped = true;
        }
        if wrapped {
            // A trail across the wrap seam would draw a line over the whole
            // world, so it restarts on the far side.
            self.trail.clear();
        }
        self.trail.push_back(self.position);
        if self.trail.len() > TRAIL_CAPACITY {
            self.trail.pop_front();
        }
        self.facing = self.velocity.y.atan2(self.velocity.x);
    }

    fn decide(&mut self, view: &Surroundings<'_>, rng: &mut SmallRng) {
        if self.hunger > view.config.hunt_hunger_threshold {
            let target = self.find_food(view);
            self.target = target;
            match target {
                Target::Animal(id) => {
                    self.behavior = Behavior::Hunting;
                    if let Some(prey) = view.animals.get(id) {
                        self.move_towards(prey.position);
                    }
                }
                Target::Vegetation(id) => {
                    self.behavior = Behavior::Hunting;
                    if let Some(patch) = view.vegetation.get(id) {
                        self.move_towards(patch.position());
                    }
                }
                Target::None => {
                    self.behavior = Behavior::Wandering;
                    self.wander(rng, view.config.wander_chance);
                }
            }
        } else if self.can_reproduce(rng) && rng.random_bool(MATE_SEEK_CHANCE) {
            match self.find_mate(view, rng) {
                Some(mate) => {
                    self.target = Target::Animal(mate);
                    self.behavior = Behavior::SeekingMate;
                    if let Some(partner) = view.animals.get(mate) {
                        self.move_towards(partner.position);
                    }
                }
                None => {
                    self.target = Target::None;
                    self.behavior = Behavior::Wandering;
                    self.wander(rng, view.config.wander_chance);
                }
            }
        } else {
            self.target = Target::None;
            self.behavior = Behavior::Wandering;
            self.wander(rng, view.config.wander_chance);
        }
    }

    /// Nearest edible entity within vision. Ties keep the first candidate
    /// seen; vegetation is scanned before animals.
    #[must_use]
    pub fn find_food(&self, view: &Surroundings<'_>) -> Target {
        let species = self.species();
        let mut best = Target::None;
        let mut best_distance = self.traits.vision;
        if species.diet.vegetation {
            for (id, patch) in view.vegetation.iter() {
                let distance = self.position.distance(patch.position());
                if distance < best_distance {
                    best_distance = distance;
                    best = Target::Vegetation(id);
                }
            }
        }
        if species.diet.animals {
            for (id, other) in view.animals.iter() {
                if id == view.observer || !species.can_eat(other.kind) {
                    continue;
                }
                let distance = self.position.distance(other.position);
                if distance < best_distance {
                    best_distance = distance;
                    best = Target::Animal(id);
                }
            }
        }
        best
    }

    /// Nearest reproduction-ready opposite-gender conspecific within vision.
    /// Candidate readiness is checked before distance, so elder candidates
    /// consume a random draw even when they turn out to be too far away.
    #[must_use]
    pub fn find_mate(&self, view: &Surroundings<'_>, rng: &mut SmallRng) -> Option<AnimalId> {
        let mut best = None;
        let mut best_distance = self.traits.vision;
        for (id, other) in view.animals.iter() {
            if id == view.observer || other.kind != self.kind || other.gender == self.gender {
                continue;
            }
            if !other.can_reproduce(rng) {
                continue;
            }
            let distance = self.position.distance(other.position);
            if distance < best_distance {
                best_distance = distance;
                best = Some(id);
            }
        }
        best
    }

    fn move_towards(&mut self, destination: Vec2) {
        self.velocity = (destination - self.position)
            .normalize()
            .scale(self.traits.speed);
    }

    fn wander(&mut self, rng: &mut SmallRng, chance: f32) {
        if rng.random_bool(f64::from(chance)) {
            let heading = rng.random_range(0.0..TAU);
            self.velocity = Vec2::new(heading.cos(), heading.sin()).scale(self.traits.speed * 0.5);
        }
    }

    /// Reach within which the animal can feed.
    #[must_use]
    pub fn eat_reach(&self) -> f32 {
        self.size + EAT_RANGE_PAD
    }

    /// Bite the patch if it is within reach. Returns `true` when the patch
    /// is depleted and should be removed from the world.
    pub fn try_eat_vegetation(&mut self, patch: &mut Vegetation, bite: f32) -> bool {
        if self.position.distance(patch.position()) >= self.eat_reach() {
            return false;
        }
        self.behavior = Behavior::Eating;
        let consumed = patch.consume(bite);
        self.hunger = (self.hunger - consumed).max(0.0);
        self.heal(consumed * MEAL_HEAL_FACTOR);
        patch.is_depleted()
    }

    /// Kill the prey if it is within reach. Returns `true` on a kill; the
    /// caller removes the carcass. Prey validity is checked by the world.
    pub fn try_eat_prey(&mut self, prey: &mut Animal) -> bool {
        if self.position.distance(prey.position) >= self.eat_reach() {
            return false;
        }
        self.behavior = Behavior::Eating;
        prey.health = 0.0;
        self.hunger = (self.hunger - PREY_HUNGER_RELIEF).max(0.0);
        self.heal(PREY_HEAL);
        true
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Initial per-species population placed by [`World::new`] and
/// [`World::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stocking {
    pub rabbits: u32,
    pub deer: u32,
    pub foxes: u32,
    pub wolves: u32,
    pub bears: u32,
}

impl Default for Stocking {
    fn default() -> Self {
        Self {
            rabbits: 20,
            deer: 12,
            foxes: 8,
            wolves: 6,
            bears: 4,
        }
    }
}

impl Stocking {
    /// Empty stocking, handy for hand-built scenarios.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            rabbits: 0,
            deer: 0,
            foxes: 0,
            wolves: 0,
            bears: 0,
        }
    }

    #[must_use]
    pub const fn count(&self, kind: SpeciesKind) -> u32 {
        match kind {
            SpeciesKind::Rabbit => self.rabbits,
            SpeciesKind::Deer => self.deer,
            SpeciesKind::Fox => self.foxes,
            SpeciesKind::Wolf => self.wolves,
            SpeciesKind::Bear => self.bears,
        }
    }
}

/// Tunable world parameters. `Default` reproduces the reference habitat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub world_width: f32,
    pub world_height: f32,
    /// Seed for the world RNG. `None` draws entropy from the OS.
    pub rng_seed: Option<u64>,
    pub stocking: Stocking,
    pub initial_vegetation: usize,
    pub vegetation_cap: usize,
    /// Per-tick chance of a new patch sprouting while below the cap.
    pub vegetation_spawn_chance: f32,
    /// Energy removed from a patch by one bite.
    pub vegetation_bite: f32,
    /// Base hunger accumulation per unit time, before life-stage scaling.
    pub hunger_rate: f32,
    /// Hunger above which an animal looks for food instead of mates.
    pub hunt_hunger_threshold: f32,
    /// Hunger above which starvation damage applies.
    pub starvation_threshold: f32,
    pub starvation_decay: f32,
    pub base_health_decay: f32,
    /// Per-decision chance of picking a new wander heading.
    pub wander_chance: f32,
    /// Per-tick chance that an eligible animal attempts reproduction.
    pub mate_attempt_chance: f32,
    /// Maximum distance between partners for reproduction to go ahead.
    pub mate_radius: f32,
    /// Spread of the per-trait mutation applied to offspring.
    pub mutation_rate: f32,
    /// Bounded length of the tick summary history.
    pub history_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            world_width: 800.0,
            world_height: 600.0,
            rng_seed: None,
            stocking: Stocking::default(),
            initial_vegetation: 150,
            vegetation_cap: 200,
            vegetation_spawn_chance: 0.05,
            vegetation_bite: 30.0,
            hunger_rate: 0.5,
            hunt_hunger_threshold: 50.0,
            starvation_threshold: 80.0,
            starvation_decay: 2.0,
            base_health_decay: 0.3,
            wander_chance: 0.02,
            mate_attempt_chance: 0.001,
            mate_radius: 20.0,
            mutation_rate: 0.1,
            history_capacity: 256,
        }
    }
}

impl WorldConfig {
    /// Validate invariants that the simulation depends on.
    pub fn validate(&self) -> Result<(), WorldError> {
        if !(self.world_width > 0.0 && self.world_width.is_finite()) {
            return Err(WorldError::InvalidConfig("world_width must be positive"));
        }
        if !(self.world_height > 0.0 && self.world_height.is_finite()) {
            return Err(WorldError::InvalidConfig("world_height must be positive"));
        }
        for (value, label) in [
            (self.vegetation_spawn_chance, "vegetation_spawn_chance must be within [0, 1]"),
            (self.wander_chance, "wander_chance must be within [0, 1]"),
            (self.mate_attempt_chance, "mate_attempt_chance must be within [0, 1]"),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(WorldError::InvalidConfig(label));
            }
        }
        if self.vegetation_bite <= 0.0 {
            return Err(WorldError::InvalidConfig("vegetation_bite must be positive"));
        }
        if self.mate_radius <= 0.0 {
            return Err(WorldError::InvalidConfig("mate_radius must be positive"));
        }
        if self.hunger_rate < 0.0
            || self.starvation_decay < 0.0
            || self.base_health_decay < 0.0
        {
            return Err(WorldError::InvalidConfig("decay rates must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(WorldError::InvalidConfig("mutation_rate must be within [0, 1]"));
        }
        if self.history_capacity == 0 {
            return Err(WorldError::InvalidConfig("history_capacity must be positive"));
        }
        Ok(())
    }

    /// RNG seeded from the configured seed, or OS entropy when unset.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::seed_from_u64(rand::random()),
        }
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Monotonic tick counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tick(pub u64);

impl Tick {
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Aggregate counters recorded at the end of every tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickSummary {
    pub tick: Tick,
    pub time: f32,
    pub animal_count: usize,
    pub vegetation_count: usize,
    pub births: usize,
    pub deaths: usize,
    pub average_health: f32,
}

/// Per-species census row returned by [`World::statistics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesTally {
    pub kind: SpeciesKind,
    pub name: &'static str,
    pub glyph: &'static str,
    pub color: [f32; 3],
    pub total: usize,
    pub males: usize,
    pub females: usize,
}

/// Observer copy of an animal, safe to hand across threads or serialize.
#[derive(Debug, Clone, Serialize)]
pub struct AnimalSnapshot {
    pub id: AnimalId,
    pub species: SpeciesKind,
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: f32,
    pub color: [f32; 3],
    pub health: f32,
    pub hunger: f32,
    pub age: f32,
    pub gender: Gender,
    pub behavior: Behavior,
    pub facing: f32,
    pub trail: Vec<Vec2>,
}

/// Observer copy of a vegetation patch.
#[derive(Debug, Clone, Serialize)]
pub struct VegetationSnapshot {
    pub id: VegetationId,
    pub position: Vec2,
    pub energy: f32,
    pub max_energy: f32,
    pub size: f32,
}

/// Which species are stocked on the next reset. Toggling never culls an
/// existing population mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnabledSpecies([bool; 5]);

impl Default for EnabledSpecies {
    fn default() -> Self {
        Self([true; 5])
    }
}

impl EnabledSpecies {
    pub fn set(&mut self, kind: SpeciesKind, enabled: bool) {
        self.0[kind as usize] = enabled;
    }

    #[must_use]
    pub const fn is_enabled(&self, kind: SpeciesKind) -> bool {
        self.0[kind as usize]
    }
}

/// External control surface consumed by [`apply_control_command`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ControlCommand {
    Pause,
    Resume,
    /// Clamped to `[MIN_SPEED_MULTIPLIER, MAX_SPEED_MULTIPLIER]`.
    SetSpeed(f32),
    Reset,
    /// Takes effect at the next reset.
    ToggleSpecies { kind: SpeciesKind, enabled: bool },
}

/// Route a control command to the matching world operation.
pub fn apply_control_command(world: &mut World, command: ControlCommand) {
    match command {
        ControlCommand::Pause => world.pause(),
        ControlCommand::Resume => world.resume(),
        ControlCommand::SetSpeed(multiplier) => world.set_speed(multiplier),
        ControlCommand::Reset => world.reset(),
        ControlCommand::ToggleSpecies { kind, enabled } => world.toggle_species(kind, enabled),
    }
}

/// The habitat: both entity arenas, the clock, the RNG, and the tick loop.
/// All mutation funnels through [`World::tick`] and the control surface, so
/// a world advanced single-threaded from a fixed seed is fully reproducible.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    rng: SmallRng,
    animals: SlotMap<AnimalId, Animal>,
    vegetation: SlotMap<VegetationId, Vegetation>,
    clock: f32,
    ticks: Tick,
    speed: f32,
    paused: bool,
    enabled: EnabledSpecies,
    history: VecDeque<TickSummary>,
}

impl World {
    /// Build and populate a world from a validated configuration.
    pub fn new(config: WorldConfig) -> Result<Self, WorldError> {
        config.validate()?;
        let rng = config.seeded_rng();
        let history_capacity = config.history_capacity;
        let mut world = Self {
            config,
            rng,
            animals: SlotMap::with_key(),
            vegetation: SlotMap::with_key(),
            clock: 0.0,
            ticks: Tick::zero(),
            speed: 1.0,
            paused: false,
            enabled: EnabledSpecies::default(),
            history: VecDeque::with_capacity(history_capacity),
        };
        world.populate();
        Ok(world)
    }

    fn random_position(&mut self) -> Vec2 {
        let width = self.config.world_width;
        let height = self.config.world_height;
        Vec2::new(
            self.rng.random_range(0.0..width),
            self.rng.random_range(0.0..height),
        )
    }

    fn populate(&mut self) {
        for _ in 0..self.config.initial_vegetation {
            let position = self.random_position();
            let patch = Vegetation::sprout(position, &mut self.rng);
            self.vegetation.insert(patch);
        }
        for species in Species::catalog() {
            if !self.enabled.is_enabled(species.kind) {
                continue;
            }
            for _ in 0..self.config.stocking.count(species.kind) {
                let position = self.random_position();
                let animal = Animal::new(species.kind, position, &mut self.rng);
                self.animals.insert(animal);
            }
        }
        debug!(
            animals = self.animals.len(),
            vegetation = self.vegetation.len(),
            "populated world"
        );
    }

    /// Advance the simulation by `dt`, scaled by the speed multiplier.
    /// A paused world ignores the call entirely.
    pub fn tick(&mut self, dt: f32) {
        if self.paused {
            return;
        }
        let dt = dt * self.speed;
        self.clock += dt;
        self.ticks = self.ticks.next();

        let mut births = 0usize;
        let mut deaths = 0usize;

        // Sweep a snapshot of handles in reverse so animals spawned or
        // removed mid-sweep never disturb the traversal. Later entries see
        // the already-updated state of earlier ones.
        let handles: Vec<AnimalId> = self.animals.keys().collect();
        for id in handles.into_iter().rev() {
            let Some(mut animal) = self.animals.get(id).cloned() else {
                continue;
            };
            {
                let view = Surroundings {
                    config: &self.config,
                    animals: &self.animals,
                    vegetation: &self.vegetation,
                    observer: id,
                };
                animal.update(&view, &mut self.rng, dt);
            }
            self.animals[id] = animal;

            deaths += self.resolve_feeding(id);
            births += self.resolve_reproduction(id);

            if self.animals.get(id).is_some_and(Animal::is_dead) {
                self.animals.remove(id);
                deaths += 1;
            }
        }

        for patch in self.vegetation.values_mut() {
            patch.grow(dt);
        }
        if self.vegetation.len() < self.config.vegetation_cap
            && self
                .rng
                .random_bool(f64::from(self.config.vegetation_spawn_chance))
        {
            let position = self.random_position();
            let patch = Vegetation::sprout(position, &mut self.rng);
            self.vegetation.insert(patch);
        }

        self.record_summary(births, deaths);
    }

    /// Resolve an eating attempt against the animal's retained target.
    /// Returns the number of animals removed by predation.
    fn resolve_feeding(&mut self, id: AnimalId) -> usize {
        let (target, hunger, kind) = match self.animals.get(id) {
            Some(animal) => (animal.target, animal.hunger, animal.kind),
            None => return 0,
        };
        if hunger <= self.config.hunt_hunger_threshold {
            return 0;
        }
        match target {
            Target::None => 0,
            Target::Vegetation(patch_id) => {
                let bite = self.config.vegetation_bite;
                if let (Some(animal), Some(patch)) =
                    (self.animals.get_mut(id), self.vegetation.get_mut(patch_id))
                {
                    if animal.try_eat_vegetation(patch, bite) {
                        self.vegetation.remove(patch_id);
                        self.settle_after_meal(id);
                    }
                } else {
                    // Another grazer finished the patch first. Without this
                    // the eater stays in Eating forever, since Eating skips
                    // the decision step.
                    self.settle_after_meal(id);
                }
                0
            }
            Target::Animal(prey_id) => {
                // Mate targets share the Animal arm; the diet whitelist is
                // what keeps them off the menu.
                let valid = self
                    .animals
                    .get(prey_id)
                    .is_some_and(|prey| kind.profile().can_eat(prey.kind));
                if valid
                    && let Some([eater, prey]) = self.animals.get_disjoint_mut([id, prey_id])
                    && eater.try_eat_prey(prey)
                {
                    self.animals.remove(prey_id);
                    self.settle_after_meal(id);
                    return 1;
                }
                0
            }
        }
    }

    fn settle_after_meal(&mut self, id: AnimalId) {
        if let Some(animal) = self.animals.get_mut(id) {
            animal.behavior = Behavior::Wandering;
            animal.target = Target::None;
        }
    }

    /// Roll the per-tick reproduction gate and, when it passes, pair the
    /// animal with the nearest ready mate in radius. Returns births.
    fn resolve_reproduction(&mut self, id: AnimalId) -> usize {
        let eligible = match self.animals.get(id) {
            Some(animal) => animal.can_reproduce(&mut self.rng),
            None => return 0,
        };
        if !eligible
            || !self
                .rng
                .random_bool(f64::from(self.config.mate_attempt_chance))
        {
            return 0;
        }
        let mate = {
            let view = Surroundings {
                config: &self.config,
                animals: &self.animals,
                vegetation: &self.vegetation,
                observer: id,
            };
            self.animals[id].find_mate(&view, &mut self.rng)
        };
        let Some(mate_id) = mate else {
            return 0;
        };
        let near = match (self.animals.get(id), self.animals.get(mate_id)) {
            (Some(animal), Some(partner)) => {
                animal.position.distance(partner.position) < self.config.mate_radius
            }
            _ => return 0,
        };
        if !near {
            return 0;
        }
        // Both partners must still pass the readiness check at the moment
        // of mating; either side can have been disqualified mid-tick.
        let ready = {
            let (Some(animal), Some(partner)) =
                (self.animals.get(id), self.animals.get(mate_id))
            else {
                return 0;
            };
            animal.can_reproduce(&mut self.rng) && partner.can_reproduce(&mut self.rng)
        };
        if !ready {
            return 0;
        }
        let Some([animal, partner]) = self.animals.get_disjoint_mut([id, mate_id]) else {
            return 0;
        };
        animal.reproduction_cooldown = 100.0 / animal.traits.reproduction_rate;
        partner.reproduction_cooldown = 100.0 / partner.traits.reproduction_rate;
        let midpoint = (animal.position + partner.position).scale(0.5);
        let kind = animal.kind;
        let (traits_a, traits_b) = (animal.traits, partner.traits);

        let mut child = Animal::new(kind, midpoint, &mut self.rng);
        child.inherit_traits(&traits_a, &traits_b, self.config.mutation_rate, &mut self.rng);
        self.animals.insert(child);
        1
    }

    fn record_summary(&mut self, births: usize, deaths: usize) {
        let animal_count = self.animals.len();
        let average_health = if animal_count > 0 {
            self.animals.values().map(|animal| animal.health).sum::<f32>() / animal_count as f32
        } else {
            0.0
        };
        let summary = TickSummary {
            tick: self.ticks,
            time: self.clock,
            animal_count,
            vegetation_count: self.vegetation.len(),
            births,
            deaths,
            average_health,
        };
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);
    }

    // -- control surface ----------------------------------------------------

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Set the speed multiplier, clamped to the supported range.
    pub fn set_speed(&mut self, multiplier: f32) {
        self.speed = multiplier.clamp(MIN_SPEED_MULTIPLIER, MAX_SPEED_MULTIPLIER);
    }

    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.speed
    }

    /// Enable or disable a species for future resets.
    pub fn toggle_species(&mut self, kind: SpeciesKind, enabled: bool) {
        self.enabled.set(kind, enabled);
    }

    #[must_use]
    pub const fn species_enabled(&self, kind: SpeciesKind) -> bool {
        self.enabled.is_enabled(kind)
    }

    /// Discard all entities and history, zero the clock, and restock from
    /// the configuration. Speed, pause state, and toggles persist.
    pub fn reset(&mut self) {
        self.animals.clear();
        self.vegetation.clear();
        self.clock = 0.0;
        self.ticks = Tick::zero();
        self.history.clear();
        self.populate();
        info!(
            animals = self.animals.len(),
            vegetation = self.vegetation.len(),
            "world reset"
        );
    }

    // -- accessors ----------------------------------------------------------

    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    #[must_use]
    pub const fn time(&self) -> f32 {
        self.clock
    }

    #[must_use]
    pub const fn ticks(&self) -> Tick {
        self.ticks
    }

    #[must_use]
    pub fn animal_count(&self) -> usize {
        self.animals.len()
    }

    #[must_use]
    pub fn vegetation_count(&self) -> usize {
        self.vegetation.len()
    }

    #[must_use]
    pub fn animal(&self, id: AnimalId) -> Option<&Animal> {
        self.animals.get(id)
    }

    pub fn animal_mut(&mut self, id: AnimalId) -> Option<&mut Animal> {
        self.animals.get_mut(id)
    }

    #[must_use]
    pub fn vegetation(&self, id: VegetationId) -> Option<&Vegetation> {
        self.vegetation.get(id)
    }

    pub fn vegetation_mut(&mut self, id: VegetationId) -> Option<&mut Vegetation> {
        self.vegetation.get_mut(id)
    }

    pub fn animal_ids(&self) -> impl Iterator<Item = AnimalId> + '_ {
        self.animals.keys()
    }

    pub fn vegetation_ids(&self) -> impl Iterator<Item = VegetationId> + '_ {
        self.vegetation.keys()
    }

    /// Bounded history of tick summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> + '_ {
        self.history.iter()
    }

    /// Spawn a founder animal of `kind` at `position` using the world RNG.
    pub fn spawn_animal(&mut self, kind: SpeciesKind, position: Vec2) -> AnimalId {
        let animal = Animal::new(kind, position, &mut self.rng);
        self.animals.insert(animal)
    }

    /// Insert a prepared vegetation patch.
    pub fn spawn_vegetation(&mut self, patch: Vegetation) -> VegetationId {
        self.vegetation.insert(patch)
    }

    /// Census of the living population, one row per catalog species.
    #[must_use]
    pub fn statistics(&self) -> Vec<SpeciesTally> {
        Species::catalog()
            .iter()
            .map(|species| {
                let mut tally = SpeciesTally {
                    kind: species.kind,
                    name: species.name,
                    glyph: species.glyph,
                    color: species.color,
                    total: 0,
                    males: 0,
                    females: 0,
                };
                for animal in self.animals.values() {
                    if animal.kind == species.kind {
                        tally.total += 1;
                        match animal.gender {
                            Gender::Male => tally.males += 1,
                            Gender::Female => tally.females += 1,
                        }
                    }
                }
                tally
            })
            .collect()
    }

    #[must_use]
    pub fn animal_snapshots(&self) -> Vec<AnimalSnapshot> {
        self.animals
            .iter()
            .map(|(id, animal)| AnimalSnapshot {
                id,
                species: animal.kind,
                position: animal.position,
                velocity: animal.velocity,
                size: animal.size,
                color: animal.species().color,
                health: animal.health,
                hunger: animal.hunger,
                age: animal.age,
                gender: animal.gender,
                behavior: animal.behavior,
                facing: animal.facing,
                trail: animal.trail.iter().copied().collect(),
            })
            .collect()
    }

    #[must_use]
    pub fn vegetation_snapshots(&self) -> Vec<VegetationSnapshot> {
        self.vegetation
            .iter()
            .map(|(id, patch)| VegetationSnapshot {
                id,
                position: patch.position(),
                energy: patch.energy(),
                max_energy: Vegetation::MAX_ENERGY,
                size: patch.size(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_rng() -> SmallRng {
        SmallRng::seed_from_u64(0x5EED)
    }

    fn empty_config() -> WorldConfig {
        WorldConfig {
            rng_seed: Some(7),
            stocking: Stocking::none(),
            initial_vegetation: 0,
            vegetation_spawn_chance: 0.0,
            ..WorldConfig::default()
        }
    }

    fn sample_animal(kind: SpeciesKind) -> Animal {
        let mut rng = test_rng();
        Animal::new(kind, Vec2::new(100.0, 100.0), &mut rng)
    }

    #[test]
    fn normalizing_zero_vector_yields_zero() {
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
        let unit = Vec2::new(3.0, 4.0).normalize();
        assert!((unit.x - 0.6).abs() < 1e-6);
        assert!((unit.y - 0.8).abs() < 1e-6);
    }

    #[test]
    fn vector_distance_is_euclidean() {
        assert_eq!(Vec2::new(0.0, 0.0).distance(Vec2::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn catalog_order_matches_kind_discriminants() {
        for (index, species) in Species::catalog().iter().enumerate() {
            assert_eq!(species.kind as usize, index);
            assert_eq!(species.kind.profile().name, species.name);
        }
        let levels: Vec<u8> = Species::catalog()
            .iter()
            .map(|species| species.trophic_level)
            .collect();
        assert_eq!(levels, [1, 1, 2, 2, 3]);
    }

    #[test]
    fn diet_whitelist_governs_predation() {
        assert!(!SpeciesKind::Rabbit.profile().can_eat(SpeciesKind::Deer));
        assert!(SpeciesKind::Fox.profile().can_eat(SpeciesKind::Rabbit));
        assert!(!SpeciesKind::Fox.profile().can_eat(SpeciesKind::Deer));
        assert!(SpeciesKind::Bear.profile().can_eat(SpeciesKind::Wolf));
        assert!(!SpeciesKind::Bear.profile().can_eat(SpeciesKind::Bear));
    }

    #[test]
    fn vegetation_growth_saturates_at_max_energy() {
        let mut patch = Vegetation::new(Vec2::ZERO, 49.9);
        patch.grow(10.0);
        assert_eq!(patch.energy(), Vegetation::MAX_ENERGY);
        assert_eq!(patch.size(), 6.0);
    }

    #[test]
    fn consuming_depleted_patch_takes_only_remainder() {
        let mut patch = Vegetation::new(Vec2::ZERO, 12.0);
        let taken = patch.consume(30.0);
        assert_eq!(taken, 12.0);
        assert!(patch.is_depleted());
        assert_eq!(patch.size(), 3.0);
    }

    #[test]
    fn partial_bite_leaves_patch_alive() {
        let mut patch = Vegetation::new(Vec2::ZERO, Vegetation::MAX_ENERGY);
        let taken = patch.consume(30.0);
        assert_eq!(taken, 30.0);
        assert!(!patch.is_depleted());
        assert!((patch.size() - 4.2).abs() < 1e-6);
    }

    #[test]
    fn sampled_traits_stay_within_species_bands() {
        let mut rng = test_rng();
        let species = SpeciesKind::Rabbit.profile();
        for _ in 0..200 {
            let traits = TraitBundle::sampled(species, &mut rng);
            assert!(traits.speed >= species.base_speed * 0.8);
            assert!(traits.speed < species.base_speed * 1.2);
            assert!(traits.size >= species.base_size * 0.9);
            assert!(traits.size < species.base_size * 1.1);
            assert!(traits.vision >= species.base_vision * 0.85);
            assert!(traits.vision < species.base_vision * 1.15);
            assert!(traits.reproduction_rate >= species.base_reproduction_rate * 0.9);
            assert!(traits.reproduction_rate < species.base_reproduction_rate * 1.1);
        }
    }

    #[test]
    fn blended_traits_stay_within_five_percent_of_parental_average() {
        let mut rng = test_rng();
        let species = SpeciesKind::Wolf.profile();
        let mother = TraitBundle::sampled(species, &mut rng);
        let father = TraitBundle::sampled(species, &mut rng);
        for _ in 0..200 {
            let child = TraitBundle::blended(&mother, &father, 0.1, &mut rng);
            let checks = [
                (child.speed, (mother.speed + father.speed) / 2.0),
                (child.size, (mother.size + father.size) / 2.0),
                (child.vision, (mother.vision + father.vision) / 2.0),
                (
                    child.reproduction_rate,
                    (mother.reproduction_rate + father.reproduction_rate) / 2.0,
                ),
            ];
            for (value, average) in checks {
                assert!(value >= average * 0.95 - 1e-4);
                assert!(value <= average * 1.05 + 1e-4);
            }
        }
    }

    #[test]
    fn inheritance_keeps_body_size_in_sync() {
        let mut rng = test_rng();
        let mut child = sample_animal(SpeciesKind::Deer);
        let mother = child.traits;
        let father = TraitBundle::sampled(SpeciesKind::Deer.profile(), &mut rng);
        child.inherit_traits(&mother, &father, 0.1, &mut rng);
        assert_eq!(child.size, child.traits.size);
    }

    #[test]
    fn reproduction_locked_at_exact_minimum_age() {
        let mut rng = test_rng();
        let mut animal = sample_animal(SpeciesKind::Rabbit);
        animal.age = animal.reproduction_ready;
        assert!(!animal.can_reproduce(&mut rng));
        animal.age = animal.reproduction_ready + 0.01;
        assert!(animal.can_reproduce(&mut rng));
    }

    #[test]
    fn reproduction_gates_on_cooldown_health_and_hunger() {
        let mut rng = test_rng();
        let mut animal = sample_animal(SpeciesKind::Rabbit);
        animal.age = animal.reproduction_ready + 1.0;
        assert!(animal.can_reproduce(&mut rng));

        animal.reproduction_cooldown = 5.0;
        assert!(!animal.can_reproduce(&mut rng));
        animal.reproduction_cooldown = 0.0;

        animal.health = REPRODUCTION_MIN_HEALTH - 0.1;
        assert!(!animal.can_reproduce(&mut rng));
        animal.health = MAX_HEALTH;

        animal.hunger = REPRODUCTION_MAX_HUNGER + 0.1;
        assert!(!animal.can_reproduce(&mut rng));
    }

    #[test]
    fn elder_reproduction_is_probabilistic() {
        let mut rng = test_rng();
        let mut animal = sample_animal(SpeciesKind::Rabbit);
        animal.age = animal.species().lifespan * 0.9;
        let passes = (0..1000)
            .filter(|_| animal.can_reproduce(&mut rng))
            .count();
        assert!(passes > 200 && passes < 400, "elder pass rate {passes}/1000");
    }

    #[test]
    fn life_stage_multipliers_follow_age_ratio() {
        assert_eq!(LifeStage::of(10.0, 100.0), LifeStage::Juvenile);
        assert_eq!(LifeStage::of(50.0, 100.0), LifeStage::Adult);
        assert_eq!(LifeStage::of(90.0, 100.0), LifeStage::Elder);
        assert_eq!(LifeStage::Juvenile.hunger_multiplier(), 1.5);
        assert_eq!(LifeStage::Elder.hunger_multiplier(), 0.7);
        assert_eq!(LifeStage::Juvenile.decay_multiplier(), 0.5);
        assert_eq!(LifeStage::Elder.decay_multiplier(), 2.0);
    }

    #[test]
    fn healing_saturates_at_max_health() {
        let mut animal = sample_animal(SpeciesKind::Fox);
        animal.health = 95.0;
        animal.heal(20.0);
        assert_eq!(animal.health, MAX_HEALTH);
    }

    #[test]
    fn hunger_accumulates_past_display_scale() {
        let mut world = World::new(empty_config()).expect("world");
        let id = world.spawn_animal(SpeciesKind::Rabbit, Vec2::new(50.0, 50.0));
        world.animal_mut(id).expect("animal").hunger = 150.0;
        world.tick(1.0);
        let hunger = world.animal(id).expect("animal").hunger;
        assert!(hunger > 150.0, "hunger {hunger} should keep growing");
    }

    #[test]
    fn wrapping_resets_trail_to_far_edge() {
        let mut world = World::new(empty_config()).expect("world");
        let id = world.spawn_animal(SpeciesKind::Rabbit, Vec2::new(795.0, 10.0));
        {
            let animal = world.animal_mut(id).expect("animal");
            animal.velocity = Vec2::new(100.0, 0.0);
            animal.behavior = Behavior::Eating;
        }
        world.tick(0.1);
        let animal = world.animal(id).expect("animal");
        assert_eq!(animal.position.x, 0.0);
        assert_eq!(animal.trail().count(), 1);
    }

    #[test]
    fn grazing_reduces_hunger_and_patch_energy() {
        let mut world = World::new(empty_config()).expect("world");
        let patch_id = world.spawn_vegetation(Vegetation::new(Vec2::new(200.0, 200.0), 40.0));
        let id = world.spawn_animal(SpeciesKind::Rabbit, Vec2::new(200.0, 203.0));
        world.animal_mut(id).expect("animal").hunger = 60.0;
        world.tick(0.05);
        let animal = world.animal(id).expect("animal");
        assert!(animal.hunger < 60.0);
        let patch = world.vegetation(patch_id).expect("patch");
        assert!(patch.energy() < 40.0);
    }

    #[test]
    fn depleting_bite_removes_patch_and_ends_meal() {
        let mut world = World::new(empty_config()).expect("world");
        let patch_id = world.spawn_vegetation(Vegetation::new(Vec2::new(200.0, 200.0), 25.0));
        let id = world.spawn_animal(SpeciesKind::Rabbit, Vec2::new(200.0, 201.0));
        world.animal_mut(id).expect("animal").hunger = 60.0;
        world.tick(0.05);
        assert!(world.vegetation(patch_id).is_none());
        let animal = world.animal(id).expect("animal");
        assert_eq!(animal.behavior, Behavior::Wandering);
        assert_eq!(animal.target, Target::None);
        assert!((animal.hunger - 35.0).abs() < 0.5);
    }

    #[test]
    fn default_world_stocks_catalog_counts() {
        let config = WorldConfig {
            rng_seed: Some(11),
            ..WorldConfig::default()
        };
        let world = World::new(config).expect("world");
        assert_eq!(world.animal_count(), 50);
        assert_eq!(world.vegetation_count(), 150);
        assert_eq!(world.time(), 0.0);
        assert_eq!(world.ticks(), Tick::zero());
    }

    #[test]
    fn species_toggle_applies_only_on_reset() {
        let config = WorldConfig {
            rng_seed: Some(3),
            ..WorldConfig::default()
        };
        let mut world = World::new(config).expect("world");
        apply_control_command(
            &mut world,
            ControlCommand::ToggleSpecies {
                kind: SpeciesKind::Bear,
                enabled: false,
            },
        );
        let bears = |world: &World| {
            world
                .statistics()
                .into_iter()
                .find(|tally| tally.kind == SpeciesKind::Bear)
                .map(|tally| tally.total)
                .unwrap_or(0)
        };
        assert_eq!(bears(&world), 4);
        apply_control_command(&mut world, ControlCommand::Reset);
        assert_eq!(bears(&world), 0);
        assert_eq!(world.animal_count(), 46);
    }

    #[test]
    fn speed_multiplier_is_clamped() {
        let mut world = World::new(empty_config()).expect("world");
        world.set_speed(0.1);
        assert_eq!(world.speed(), MIN_SPEED_MULTIPLIER);
        world.set_speed(9.0);
        assert_eq!(world.speed(), MAX_SPEED_MULTIPLIER);
    }

    #[test]
    fn paused_world_ignores_ticks() {
        let mut world = World::new(empty_config()).expect("world");
        apply_control_command(&mut world, ControlCommand::Pause);
        assert!(world.is_paused());
        world.tick(1.0);
        assert_eq!(world.time(), 0.0);
        assert_eq!(world.ticks(), Tick::zero());
        apply_control_command(&mut world, ControlCommand::Resume);
        world.tick(1.0);
        assert_eq!(world.ticks(), Tick(1));
    }

    #[test]
    fn statistics_split_population_by_gender() {
        let config = WorldConfig {
            rng_seed: Some(17),
            ..WorldConfig::default()
        };
        let world = World::new(config).expect("world");
        for tally in world.statistics() {
            assert_eq!(tally.total, tally.males + tally.females);
            assert_eq!(
                tally.total,
                world.config().stocking.count(tally.kind) as usize
            );
        }
    }

    #[test]
    fn reset_zeroes_clock_and_restocks() {
        let config = WorldConfig {
            rng_seed: Some(23),
            ..WorldConfig::default()
        };
        let mut world = World::new(config).expect("world");
        for _ in 0..10 {
            world.tick(0.1);
        }
        assert!(world.time() > 0.0);
        world.reset();
        assert_eq!(world.time(), 0.0);
        assert_eq!(world.ticks(), Tick::zero());
        assert_eq!(world.animal_count(), 50);
        assert_eq!(world.vegetation_count(), 150);
        assert_eq!(world.history().count(), 0);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let bad_width = WorldConfig {
            world_width: 0.0,
            ..WorldConfig::default()
        };
        assert!(matches!(
            bad_width.validate(),
            Err(WorldError::InvalidConfig(_))
        ));
        let bad_chance = WorldConfig {
            vegetation_spawn_chance: 1.5,
            ..WorldConfig::default()
        };
        assert!(bad_chance.validate().is_err());
        let bad_history = WorldConfig {
            history_capacity: 0,
            ..WorldConfig::default()
        };
        assert!(bad_history.validate().is_err());
        assert!(WorldConfig::default().validate().is_ok());
    }

    #[test]
    fn history_is_bounded_by_capacity() {
        let config = WorldConfig {
            history_capacity: 8,
            ..empty_config()
        };
        let mut world = World::new(config).expect("world");
        for _ in 0..20 {
            world.tick(0.1);
        }
        assert_eq!(world.history().count(), 8);
        let first = world.history().next().expect("summary");
        assert_eq!(first.tick, Tick(13));
    }

    #[test]
    fn seeded_runs_are_deterministic() {
        let config = WorldConfig {
            rng_seed: Some(42),
            ..WorldConfig::default()
        };
        let mut a = World::new(config.clone()).expect("world a");
        let mut b = World::new(config).expect("world b");
        for _ in 0..60 {
            a.tick(0.016);
            b.tick(0.016);
        }
        let history_a: Vec<_> = a.history().cloned().collect();
        let history_b: Vec<_> = b.history().cloned().collect();
        assert_eq!(history_a, history_b);
        assert_eq!(a.statistics(), b.statistics());
    }
}
