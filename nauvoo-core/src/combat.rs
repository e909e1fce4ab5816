//! Combatant state machine, weapons and shot resolution.
//!
//! Nothing here draws randomness itself: [`resolve_shot`] takes pre-drawn
//! [`ShotRolls`] so the coordinator controls the stream and its draw count.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::constants::{
    BASE_ACCURACY, FATIGUE_EXHAUSTED_BELOW, FATIGUE_EXHAUSTED_FACTOR, FATIGUE_TIRED_BELOW,
    FATIGUE_TIRED_FACTOR, STANCE_BEHIND_COVER, STANCE_CROUCHING, STANCE_MOVING, STANCE_PRONE,
    STANCE_STANDING,
};
use crate::error::{SimError, SimResult};
use crate::injury::{BodyPart, InjuryKind, Vitals};

/// Per-combatant phase. `Dead` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatPhase {
    #[default]
    Idle,
    InCombat,
    Retreating,
    Dead,
}

impl CombatPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::InCombat => "in_combat",
            Self::Retreating => "retreating",
            Self::Dead => "dead",
        }
    }
}

impl fmt::Display for CombatPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    #[default]
    Standing,
    Crouching,
    Prone,
    Moving,
    BehindCover,
}

impl Stance {
    #[must_use]
    pub const fn accuracy_factor(self) -> f32 {
        match self {
            Self::Standing => STANCE_STANDING,
            Self::Crouching => STANCE_CROUCHING,
            Self::Prone => STANCE_PRONE,
            Self::Moving => STANCE_MOVING,
            Self::BehindCover => STANCE_BEHIND_COVER,
        }
    }
}

#[must_use]
pub fn fatigue_factor(stamina_fraction: f32) -> f32 {
    if stamina_fraction < FATIGUE_EXHAUSTED_BELOW {
        FATIGUE_EXHAUSTED_FACTOR
    } else if stamina_fraction < FATIGUE_TIRED_BELOW {
        FATIGUE_TIRED_FACTOR
    } else {
        1.0
    }
}

/// Shooter accuracy for a stance and remaining stamina, in `[0, 1]`.
#[must_use]
pub fn calculate_accuracy(stance: Stance, stamina_fraction: f32) -> f32 {
    let stamina = if stamina_fraction.is_finite() {
        stamina_fraction
    } else {
        0.0
    };
    (BASE_ACCURACY * stance.accuracy_factor() * fatigue_factor(stamina)).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    Musket,
    Pistol,
    Saber,
    Knife,
    Bayonet,
    Club,
    Fist,
}

impl WeaponKind {
    #[must_use]
    pub const fn is_firearm(self) -> bool {
        matches!(self, Self::Musket | Self::Pistol)
    }

    /// Wound type this weapon leaves.
    #[must_use]
    pub const fn injury_kind(self) -> InjuryKind {
        match self {
            Self::Musket | Self::Pistol => InjuryKind::Gunshot,
            Self::Saber | Self::Knife | Self::Bayonet => InjuryKind::Laceration,
            Self::Club | Self::Fist => InjuryKind::Bruise,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub kind: WeaponKind,
    pub name: String,
    pub accuracy: f32,
    pub damage: f32,
    pub stamina_cost: f32,
    #[serde(default)]
    pub ammo: u32,
    #[serde(default)]
    pub max_ammo: u32,
    #[serde(default)]
    pub misfire_chance: f32,
    /// Seconds a full reload takes.
    #[serde(default)]
    pub reload_secs: f32,
    /// Seconds left on a reload in progress.
    #[serde(default)]
    pub reload_remaining: Option<f32>,
}

impl Default for Weapon {
    fn default() -> Self {
        Self::musket()
    }
}

impl Weapon {
    /// Standard-issue Legion musket.
    #[must_use]
    pub fn musket() -> Self {
        Self {
            kind: WeaponKind::Musket,
            name: "Musket".to_string(),
            accuracy: 0.7,
            damage: 40.0,
            stamina_cost: 15.0,
            ammo: 6,
            max_ammo: 6,
            misfire_chance: 0.05,
            reload_secs: 45.0,
            reload_remaining: None,
        }
    }

    #[must_use]
    pub fn saber() -> Self {
        Self {
            kind: WeaponKind::Saber,
            name: "Saber".to_string(),
            accuracy: 0.8,
            damage: 30.0,
            stamina_cost: 10.0,
            ammo: 0,
            max_ammo: 0,
            misfire_chance: 0.0,
            reload_secs: 0.0,
            reload_remaining: None,
        }
    }

    #[must_use]
    pub const fn is_reloading(&self) -> bool {
        self.reload_remaining.is_some()
    }

    /// Reason the weapon cannot fire right now, if any.
    #[must_use]
    pub fn fire_blocker(&self) -> Option<&'static str> {
        if self.is_reloading() {
            Some("weapon is reloading")
        } else if self.kind.is_firearm() && self.ammo == 0 {
            Some("weapon is out of ammunition")
        } else {
            None
        }
    }

    /// Begin a timed reload.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidState`] for melee weapons, a reload already in progress, or a
    /// full magazine.
    pub fn start_reload(&mut self) -> SimResult<()> {
        if !self.kind.is_firearm() {
            return Err(SimError::invalid_state("melee weapons do not reload"));
        }
        if self.is_reloading() {
            return Err(SimError::invalid_state("reload already in progress"));
        }
        if self.ammo >= self.max_ammo {
            return Err(SimError::invalid_state("weapon is fully loaded"));
        }
        self.reload_remaining = Some(self.reload_secs.max(0.0));
        Ok(())
    }

    /// Advance a reload by `dt` seconds; returns true when it completed on this call.
    pub fn tick_reload(&mut self, dt: f32) -> bool {
        let Some(remaining) = self.reload_remaining else {
            return false;
        };
        let left = remaining - dt;
        if left <= 0.0 {
            self.reload_remaining = None;
            self.ammo = self.max_ammo;
            true
        } else {
            self.reload_remaining = Some(left);
            false
        }
    }
}

/// Enemy list for one engagement; skirmishes rarely involve more than a few.
pub type EnemyList = SmallVec<[String; 4]>;

/// An active engagement between the player and one or more characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatSession {
    pub enemies: EnemyList,
    /// Seconds left before the engagement is forced to end.
    pub timer_secs: f32,
    #[serde(default)]
    pub elapsed_secs: f32,
}

impl CombatSession {
    #[must_use]
    pub fn new(enemies: EnemyList, timeout_secs: f32) -> Self {
        Self {
            enemies,
            timer_secs: timeout_secs,
            elapsed_secs: 0.0,
        }
    }

    #[must_use]
    pub fn involves(&self, character_id: &str) -> bool {
        self.enemies.iter().any(|enemy| enemy == character_id)
    }

    /// Count the timer down; returns true once it has run out.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.elapsed_secs += dt;
        self.timer_secs = (self.timer_secs - dt).max(0.0);
        self.timer_secs <= 0.0
    }
}

/// Why an engagement ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatEndReason {
    Timeout,
    NoEnemies,
    Ended,
    PlayerDied,
}

impl CombatEndReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::NoEnemies => "no_enemies",
            Self::Ended => "ended",
            Self::PlayerDied => "player_died",
        }
    }
}

/// Whether an in-combat fighter below `threshold` of max health should fall back.
#[must_use]
pub fn should_retreat(phase: CombatPhase, vitals: &Vitals, threshold: f32) -> bool {
    phase == CombatPhase::InCombat && vitals.alive && vitals.health_fraction() < threshold
}

/// Uniform draws consumed by one shot, each in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotRolls {
    pub misfire: f32,
    pub hit: f32,
    pub body_part: f32,
}

/// Hit location weights in [`BodyPart::ALL`] order; the torso is the largest target.
const BODY_PART_WEIGHTS: [f32; 6] = [0.1, 0.4, 0.15, 0.15, 0.1, 0.1];

#[must_use]
pub fn pick_body_part(roll: f32) -> BodyPart {
    let mut acc = 0.0;
    for (part, weight) in BodyPart::ALL.iter().zip(BODY_PART_WEIGHTS) {
        acc += weight;
        if roll < acc {
            return *part;
        }
    }
    BodyPart::Torso
}

/// Outcome of a shot before damage is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ShotResolution {
    Misfire,
    Miss { chance: f32 },
    Hit { body_part: BodyPart, damage: f32, chance: f32 },
}

/// Decide a shot from pre-drawn rolls: misfire first, then hit against
/// weapon accuracy scaled by the shooter's stance and fatigue.
#[must_use]
pub fn resolve_shot(
    weapon: &Weapon,
    stance: Stance,
    stamina_fraction: f32,
    rolls: ShotRolls,
) -> ShotResolution {
    if weapon.kind.is_firearm() && rolls.misfire < weapon.misfire_chance {
        return ShotResolution::Misfire;
    }
    let chance = (weapon.accuracy * calculate_accuracy(stance, stamina_fraction)).clamp(0.0, 1.0);
    if rolls.hit < chance {
        ShotResolution::Hit {
            body_part: pick_body_part(rolls.body_part),
            damage: weapon.damage,
            chance,
        }
    } else {
        ShotResolution::Miss { chance }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn accuracy_combines_stance_and_fatigue() {
        assert!((calculate_accuracy(Stance::Standing, 1.0) - 0.49).abs() < EPS);
        assert!((calculate_accuracy(Stance::Prone, 0.6) - 0.665).abs() < EPS);
        assert!((calculate_accuracy(Stance::Crouching, 0.3) - 0.7 * 0.85 * 0.7).abs() < EPS);
        assert!((calculate_accuracy(Stance::Moving, 0.1) - 0.7 * 0.4 * 0.5).abs() < EPS);
        assert!((calculate_accuracy(Stance::BehindCover, f32::NAN) - 0.7 * 0.8 * 0.5).abs() < EPS);
    }

    #[test]
    fn accuracy_stays_in_unit_range() {
        for stance in [
            Stance::Standing,
            Stance::Crouching,
            Stance::Prone,
            Stance::Moving,
            Stance::BehindCover,
        ] {
            for step in 0..=20 {
                let accuracy = calculate_accuracy(stance, step as f32 / 10.0 - 0.5);
                assert!((0.0..=1.0).contains(&accuracy));
            }
        }
    }

    #[test]
    fn weapons_map_to_wound_types() {
        assert_eq!(WeaponKind::Musket.injury_kind(), InjuryKind::Gunshot);
        assert_eq!(WeaponKind::Bayonet.injury_kind(), InjuryKind::Laceration);
        assert_eq!(WeaponKind::Club.injury_kind(), InjuryKind::Bruise);
    }

    #[test]
    fn reload_cycle_refills_magazine() {
        let mut musket = Weapon::musket();
        assert!(musket.start_reload().is_err(), "full magazine");
        musket.ammo = 0;
        assert_eq!(musket.fire_blocker(), Some("weapon is out of ammunition"));
        musket.start_reload().unwrap();
        assert!(musket.start_reload().is_err(), "already reloading");
        assert_eq!(musket.fire_blocker(), Some("weapon is reloading"));
        assert!(!musket.tick_reload(30.0));
        assert!(musket.tick_reload(15.0));
        assert_eq!(musket.ammo, 6);
        assert!(musket.fire_blocker().is_none());
        assert!(Weapon::saber().start_reload().is_err());
    }

    #[test]
    fn shot_resolution_orders_misfire_before_hit() {
        let musket = Weapon::musket();
        let misfire = resolve_shot(
            &musket,
            Stance::Prone,
            1.0,
            ShotRolls {
                misfire: 0.01,
                hit: 0.0,
                body_part: 0.0,
            },
        );
        assert_eq!(misfire, ShotResolution::Misfire);

        let hit = resolve_shot(
            &musket,
            Stance::Prone,
            1.0,
            ShotRolls {
                misfire: 0.5,
                hit: 0.1,
                body_part: 0.3,
            },
        );
        assert!(matches!(
            hit,
            ShotResolution::Hit {
                body_part: BodyPart::Torso,
                ..
            }
        ));

        let miss = resolve_shot(
            &musket,
            Stance::Moving,
            0.1,
            ShotRolls {
                misfire: 0.5,
                hit: 0.5,
                body_part: 0.3,
            },
        );
        assert!(matches!(miss, ShotResolution::Miss { .. }));
    }

    #[test]
    fn body_part_weights_cover_unit_interval() {
        assert_eq!(pick_body_part(0.0), BodyPart::Head);
        assert_eq!(pick_body_part(0.49), BodyPart::Torso);
        assert_eq!(pick_body_part(0.99), BodyPart::RightLeg);
        assert_eq!(pick_body_part(1.0), BodyPart::Torso);
    }

    #[test]
    fn retreat_threshold_uses_max_health() {
        let mut vitals = Vitals::default();
        vitals.health = 29.0;
        assert!(should_retreat(CombatPhase::InCombat, &vitals, 0.3));
        assert!(!should_retreat(CombatPhase::Idle, &vitals, 0.3));
        vitals.health = 30.0;
        assert!(!should_retreat(CombatPhase::InCombat, &vitals, 0.3));
    }

    #[test]
    fn session_timer_runs_out() {
        let mut session = CombatSession::new(EnemyList::from_vec(vec!["npc_a".into()]), 30.0);
        assert!(session.involves("npc_a"));
        assert!(!session.tick(20.0));
        assert!(session.tick(15.0));
        assert!(session.timer_secs.abs() < EPS);
    }
}
