//! The live world snapshot owned by the coordinator.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::character::{Character, Faction, Position, Rank};
use crate::clock::SimTime;
use crate::combat::{CombatPhase, CombatSession, Stance, Weapon};
use crate::constants::{DEFAULT_MAX_STAMINA, MAX_RNG_DRAWS, SEVERITY_MAX, SEVERITY_MIN};
use crate::dialogue::DialogueCursor;
use crate::error::SnapshotError;
use crate::injury::Vitals;
use crate::reputation::ReputationLedger;
use crate::rng::RngState;
use crate::schedule::ScheduleBook;

/// Id the player is known by in witness lists and attacker fields.
pub const PLAYER_ID: &str = "player";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub vitals: Vitals,
    #[serde(default = "PlayerState::default_stamina")]
    pub stamina: f32,
    #[serde(default = "PlayerState::default_stamina")]
    pub max_stamina: f32,
    #[serde(default)]
    pub stance: Stance,
    #[serde(default)]
    pub weapon: Weapon,
    #[serde(default)]
    pub rank: Rank,
    #[serde(default)]
    pub combat: CombatPhase,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            position: Position::default(),
            vitals: Vitals::default(),
            stamina: Self::default_stamina(),
            max_stamina: Self::default_stamina(),
            stance: Stance::default(),
            weapon: Weapon::default(),
            rank: Rank::default(),
            combat: CombatPhase::Idle,
        }
    }
}

impl PlayerState {
    const fn default_stamina() -> f32 {
        DEFAULT_MAX_STAMINA
    }

    #[must_use]
    pub fn stamina_fraction(&self) -> f32 {
        if self.max_stamina <= 0.0 {
            return 0.0;
        }
        (self.stamina / self.max_stamina).clamp(0.0, 1.0)
    }

    /// Spend stamina, never dropping below zero.
    pub fn spend_stamina(&mut self, amount: f32) {
        self.stamina = (self.stamina - amount.max(0.0)).max(0.0);
    }
}

/// Everything that changes while the world runs. Content that never changes
/// (dialogue trees, the action catalog) is held beside it, not in it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldState {
    pub time: SimTime,
    /// Fraction of a simulated minute not yet applied to the clock.
    #[serde(default)]
    pub minute_carry: f64,
    #[serde(default)]
    pub days_elapsed: u64,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub schedules: ScheduleBook,
    /// Location id -> where characters stand while there.
    #[serde(default)]
    pub locations: BTreeMap<String, Position>,
    #[serde(default)]
    pub reputation: ReputationLedger,
    #[serde(default)]
    pub player: PlayerState,
    #[serde(default)]
    pub combat: Option<CombatSession>,
    #[serde(default)]
    pub dialogue: Option<DialogueCursor>,
    #[serde(default)]
    pub active_events: BTreeSet<String>,
    #[serde(default)]
    pub completed_events: BTreeSet<String>,
    #[serde(default)]
    pub rng: RngState,
}

impl WorldState {
    #[must_use]
    pub fn character(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|character| character.id == id)
    }

    pub fn character_mut(&mut self, id: &str) -> Option<&mut Character> {
        self.characters.iter_mut().find(|character| character.id == id)
    }

    /// Living characters within `radius` of `origin`, with their factions.
    #[must_use]
    pub fn witnesses_near(&self, origin: &Position, radius: f32) -> Vec<(String, Faction)> {
        self.characters
            .iter()
            .filter(|character| character.is_alive())
            .filter(|character| character.position.distance(origin) <= radius)
            .map(|character| (character.id.clone(), character.faction))
            .collect()
    }

    /// Check every invariant a loaded snapshot must satisfy.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::OutOfRange`] naming the first field that violates its range.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if !self.time.is_normalized() {
            return Err(SnapshotError::out_of_range("time", self.time));
        }
        if !(0.0..1.0).contains(&self.minute_carry) {
            return Err(SnapshotError::out_of_range("minute_carry", self.minute_carry));
        }
        if self.rng.draws > MAX_RNG_DRAWS {
            return Err(SnapshotError::out_of_range("rng.draws", self.rng.draws));
        }

        let mut ids = HashSet::new();
        for character in &self.characters {
            if !ids.insert(character.id.as_str()) {
                return Err(SnapshotError::out_of_range("characters.id", &character.id));
            }
            let field = format!("characters.{}", character.id);
            validate_vitals(&field, &character.vitals)?;
            if character.is_alive() == (character.combat == CombatPhase::Dead) {
                return Err(SnapshotError::out_of_range(
                    format!("{field}.combat"),
                    character.combat,
                ));
            }
            if let Some((other, _)) = character
                .relationships
                .iter()
                .find(|(_, relationship)| !relationship.is_within_bounds())
            {
                return Err(SnapshotError::out_of_range(
                    format!("{field}.relationships"),
                    other,
                ));
            }
        }

        validate_vitals("player", &self.player.vitals)?;
        if !(0.0..=self.player.max_stamina).contains(&self.player.stamina) {
            return Err(SnapshotError::out_of_range("player.stamina", self.player.stamina));
        }
        if self.player.weapon.ammo > self.player.weapon.max_ammo {
            return Err(SnapshotError::out_of_range(
                "player.weapon.ammo",
                self.player.weapon.ammo,
            ));
        }

        if !self.reputation.is_within_bounds() {
            return Err(SnapshotError::out_of_range("reputation", "value outside its range"));
        }
        self.schedules
            .validate()
            .map_err(|err| SnapshotError::out_of_range("schedules", err))?;

        if let Some(session) = &self.combat {
            if let Some(enemy) = session.enemies.iter().find(|id| !ids.contains(id.as_str())) {
                return Err(SnapshotError::out_of_range("combat.enemies", enemy));
            }
            if !session.timer_secs.is_finite() || session.timer_secs < 0.0 {
                return Err(SnapshotError::out_of_range("combat.timer_secs", session.timer_secs));
            }
        }
        if let Some(cursor) = &self.dialogue {
            if !ids.contains(cursor.character_id.as_str()) {
                return Err(SnapshotError::out_of_range(
                    "dialogue.character_id",
                    &cursor.character_id,
                ));
            }
        }
        Ok(())
    }
}

fn validate_vitals(field: &str, vitals: &Vitals) -> Result<(), SnapshotError> {
    if !vitals.max_health.is_finite() || vitals.max_health <= 0.0 {
        return Err(SnapshotError::out_of_range(
            format!("{field}.max_health"),
            vitals.max_health,
        ));
    }
    if !(0.0..=vitals.max_health).contains(&vitals.health) {
        return Err(SnapshotError::out_of_range(format!("{field}.health"), vitals.health));
    }
    if vitals.alive == (vitals.health <= 0.0) {
        return Err(SnapshotError::out_of_range(format!("{field}.alive"), vitals.alive));
    }
    for (index, injury) in vitals.injuries.iter().enumerate() {
        if !(SEVERITY_MIN..=SEVERITY_MAX).contains(&injury.severity) {
            return Err(SnapshotError::out_of_range(
                format!("{field}.injuries[{index}].severity"),
                injury.severity,
            ));
        }
        let bleed_ok = injury.bleed_rate.is_finite() && injury.bleed_rate >= 0.0;
        if !bleed_ok || (injury.treated && injury.bleed_rate != 0.0) {
            return Err(SnapshotError::out_of_range(
                format!("{field}.injuries[{index}].bleed_rate"),
                injury.bleed_rate,
            ));
        }
        if !injury.inflicted_at.is_normalized() {
            return Err(SnapshotError::out_of_range(
                format!("{field}.injuries[{index}].inflicted_at"),
                injury.inflicted_at,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::Relationship;
    use crate::injury::{BodyPart, Injury, InjuryKind};

    fn world() -> WorldState {
        WorldState {
            characters: vec![
                Character::new("npc_sara", "Sara Williams", Faction::Community)
                    .with_position(Position::new(10.0, 0.0, 0.0)),
                Character::new("npc_marks", "Isaiah Marks", Faction::Legion)
                    .with_position(Position::new(50.0, 0.0, 0.0)),
            ],
            ..WorldState::default()
        }
    }

    #[test]
    fn default_world_is_valid() {
        assert!(world().validate().is_ok());
    }

    #[test]
    fn witnesses_are_living_and_nearby() {
        let mut world = world();
        let near = world.witnesses_near(&Position::default(), 30.0);
        assert_eq!(near, vec![("npc_sara".to_string(), Faction::Community)]);

        let sara = world.character_mut("npc_sara").unwrap();
        sara.vitals.health = 0.0;
        sara.vitals.alive = false;
        sara.combat = CombatPhase::Dead;
        assert!(world.witnesses_near(&Position::default(), 30.0).is_empty());
        assert!(world.validate().is_ok());
    }

    #[test]
    fn rejects_treated_wound_that_bleeds() {
        let mut world = world();
        let mut injury = Injury::from_damage(
            40.0,
            BodyPart::Torso,
            InjuryKind::Gunshot,
            SimTime::default(),
            &crate::injury::BleedTable::default(),
        );
        injury.treated = true;
        world.player.vitals.injuries.push(injury);
        let err = world.validate().unwrap_err();
        assert!(err.to_string().contains("player.injuries[0].bleed_rate"));
    }

    #[test]
    fn rejects_bad_ranges() {
        let mut bad_time = world();
        bad_time.time.day = 31;
        assert!(bad_time.validate().is_err());

        let mut bad_trust = world();
        bad_trust.characters[0].relationships.insert(
            "npc_marks".into(),
            Relationship {
                trust: 300,
                ..Relationship::default()
            },
        );
        assert!(bad_trust.validate().is_err());

        let mut duplicate = world();
        duplicate.characters.push(duplicate.characters[0].clone());
        assert!(duplicate.validate().is_err());

        let mut zombie = world();
        zombie.characters[1].vitals.health = 0.0;
        assert!(zombie.validate().is_err());

        let mut ghost_enemy = world();
        ghost_enemy.combat = Some(CombatSession::new(
            crate::combat::EnemyList::from_vec(vec!["npc_nobody".into()]),
            30.0,
        ));
        assert!(ghost_enemy.validate().is_err());
    }

    #[test]
    fn stamina_fraction_handles_zero_max() {
        let mut player = PlayerState::default();
        player.spend_stamina(40.0);
        assert!((player.stamina_fraction() - 0.6).abs() < f32::EPSILON);
        player.max_stamina = 0.0;
        assert!(player.stamina_fraction().abs() < f32::EPSILON);
    }
}
