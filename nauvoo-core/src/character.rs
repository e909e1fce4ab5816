//! Characters populating the world and their relationships with one another.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::clock::SimTime;
use crate::combat::CombatPhase;
use crate::constants::{
    FEAR_MAX, FEAR_MIN, INTIMACY_MAX, INTIMACY_MIN, RESPECT_MAX, RESPECT_MIN, TRUST_MAX,
    TRUST_MIN,
};
use crate::injury::Vitals;
use crate::schedule::Activity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    /// Civilian townsfolk; their standing is the community track.
    #[default]
    Community,
    Legion,
    Outsider,
    Neutral,
}

impl Faction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Community => "community",
            Self::Legion => "legion",
            Self::Outsider => "outsider",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    #[default]
    Recruit,
    Legionnaire,
    SeniorLegionnaire,
    Sergeant,
    Captain,
    Commander,
}

/// World coordinate, used only for distance and witness checks.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn distance(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// How one character regards another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub trust: i32,
    #[serde(default)]
    pub fear: i32,
    #[serde(default)]
    pub respect: i32,
    #[serde(default)]
    pub intimacy: i32,
    #[serde(default)]
    pub last_interaction: Option<SimTime>,
}

impl Relationship {
    /// Pull every axis back into its range.
    pub fn clamp(&mut self) {
        self.trust = self.trust.clamp(TRUST_MIN, TRUST_MAX);
        self.fear = self.fear.clamp(FEAR_MIN, FEAR_MAX);
        self.respect = self.respect.clamp(RESPECT_MIN, RESPECT_MAX);
        self.intimacy = self.intimacy.clamp(INTIMACY_MIN, INTIMACY_MAX);
    }

    #[must_use]
    pub fn is_within_bounds(&self) -> bool {
        let mut clamped = *self;
        clamped.clamp();
        clamped == *self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    #[serde(default = "default_age")]
    pub age: u16,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub faction: Faction,
    #[serde(default)]
    pub rank: Rank,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub vitals: Vitals,
    /// Other character id -> relationship.
    #[serde(default)]
    pub relationships: BTreeMap<String, Relationship>,
    #[serde(default)]
    pub combat: CombatPhase,
    /// Activity resolved on the most recent schedule pass.
    #[serde(default)]
    pub current_activity: Option<Activity>,
}

const fn default_age() -> u16 {
    25
}

impl Character {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, faction: Faction) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            age: default_age(),
            occupation: String::new(),
            faction,
            rank: Rank::default(),
            position: Position::default(),
            vitals: Vitals::default(),
            relationships: BTreeMap::new(),
            combat: CombatPhase::Idle,
            current_activity: None,
        }
    }

    #[must_use]
    pub fn with_rank(mut self, rank: Rank) -> Self {
        self.rank = rank;
        self
    }

    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub fn with_occupation(mut self, occupation: impl Into<String>) -> Self {
        self.occupation = occupation.into();
        self
    }

    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.vitals.alive
    }

    #[must_use]
    pub const fn in_combat(&self) -> bool {
        matches!(self.combat, CombatPhase::InCombat)
    }

    /// Current location according to the last schedule pass.
    #[must_use]
    pub fn location_id(&self) -> Option<&str> {
        self.current_activity
            .as_ref()
            .map(|activity| activity.location_id.as_str())
    }

    /// Relationship toward `other`, created on first touch.
    pub fn relationship_mut(&mut self, other: &str) -> &mut Relationship {
        self.relationships.entry(other.to_string()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationship_clamps_each_axis() {
        let mut rel = Relationship {
            trust: 140,
            fear: -4,
            respect: -130,
            intimacy: 101,
            last_interaction: None,
        };
        assert!(!rel.is_within_bounds());
        rel.clamp();
        assert_eq!((rel.trust, rel.fear, rel.respect, rel.intimacy), (100, 0, -100, 100));
        assert!(rel.is_within_bounds());
    }

    #[test]
    fn builder_sets_profile() {
        let captain = Character::new("npc_captain", "Captain Marks", Faction::Legion)
            .with_rank(Rank::Captain)
            .with_position(Position::new(3.0, 4.0, 0.0))
            .with_occupation("officer");
        assert!(captain.is_alive());
        assert!(!captain.in_combat());
        assert_eq!(captain.rank, Rank::Captain);
        assert!((captain.position.distance(&Position::default()) - 5.0).abs() < f32::EPSILON);
        assert!(captain.location_id().is_none());
    }

    #[test]
    fn character_json_fills_defaults() {
        let json = r#"{ "id": "npc_thomas", "name": "Thomas Brown" }"#;
        let character: Character = serde_json::from_str(json).unwrap();
        assert_eq!(character.faction, Faction::Community);
        assert_eq!(character.age, 25);
        assert!((character.vitals.health - 100.0).abs() < f32::EPSILON);
        assert!(character.vitals.alive);
    }
}
