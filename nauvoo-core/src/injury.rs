//! Wounds, bleeding and the death transition.
//!
//! Every function here is a pure transformation of the [`Vitals`] it is handed;
//! the coordinator decides what a death means for the rest of the world.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clock::SimTime;
use crate::constants::{
    BLEED_GUNSHOT, BLEED_INTERNAL, BLEED_LACERATION, DAMAGE_PER_SEVERITY, DEFAULT_MAX_HEALTH,
    SEVERITY_MAX, SEVERITY_MIN,
};
use crate::error::{IndexKind, SimError, SimResult};
use crate::numbers::{truncate_f32_to_u32, u8_to_f32};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPart {
    Head,
    Torso,
    LeftArm,
    RightArm,
    LeftLeg,
    RightLeg,
}

impl BodyPart {
    pub const ALL: [Self; 6] = [
        Self::Head,
        Self::Torso,
        Self::LeftArm,
        Self::RightArm,
        Self::LeftLeg,
        Self::RightLeg,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::Torso => "torso",
            Self::LeftArm => "left_arm",
            Self::RightArm => "right_arm",
            Self::LeftLeg => "left_leg",
            Self::RightLeg => "right_leg",
        }
    }
}

impl fmt::Display for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjuryKind {
    Laceration,
    Bruise,
    Fracture,
    Gunshot,
    InternalBleeding,
}

/// Bleed factors per injury kind, in HP per second per severity point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BleedTable {
    #[serde(default = "BleedTable::default_laceration")]
    pub laceration: f32,
    #[serde(default)]
    pub bruise: f32,
    #[serde(default)]
    pub fracture: f32,
    #[serde(default = "BleedTable::default_gunshot")]
    pub gunshot: f32,
    #[serde(default = "BleedTable::default_internal")]
    pub internal_bleeding: f32,
}

impl Default for BleedTable {
    fn default() -> Self {
        Self {
            laceration: Self::default_laceration(),
            bruise: 0.0,
            fracture: 0.0,
            gunshot: Self::default_gunshot(),
            internal_bleeding: Self::default_internal(),
        }
    }
}

impl BleedTable {
    const fn default_laceration() -> f32 {
        BLEED_LACERATION
    }

    const fn default_gunshot() -> f32 {
        BLEED_GUNSHOT
    }

    const fn default_internal() -> f32 {
        BLEED_INTERNAL
    }

    #[must_use]
    pub const fn factor(&self, kind: InjuryKind) -> f32 {
        match kind {
            InjuryKind::Laceration => self.laceration,
            InjuryKind::Bruise => self.bruise,
            InjuryKind::Fracture => self.fracture,
            InjuryKind::Gunshot => self.gunshot,
            InjuryKind::InternalBleeding => self.internal_bleeding,
        }
    }

    #[must_use]
    pub fn bleed_rate(&self, kind: InjuryKind, severity: u8) -> f32 {
        self.factor(kind) * u8_to_f32(severity)
    }
}

/// A recorded wound. Kept for history even after treatment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Injury {
    pub body_part: BodyPart,
    pub kind: InjuryKind,
    pub severity: u8,
    /// HP lost per second while untreated.
    pub bleed_rate: f32,
    #[serde(default)]
    pub treated: bool,
    #[serde(default)]
    pub infection_risk: bool,
    pub inflicted_at: SimTime,
    #[serde(default)]
    pub attacker_id: Option<String>,
}

impl Injury {
    /// Create an untreated injury, deriving severity and bleed rate from the damage dealt.
    #[must_use]
    pub fn from_damage(
        amount: f32,
        body_part: BodyPart,
        kind: InjuryKind,
        inflicted_at: SimTime,
        table: &BleedTable,
    ) -> Self {
        let severity = severity_for_damage(amount);
        Self {
            body_part,
            kind,
            severity,
            bleed_rate: table.bleed_rate(kind, severity),
            treated: false,
            infection_risk: false,
            inflicted_at,
            attacker_id: None,
        }
    }

    #[must_use]
    pub const fn is_bleeding(&self) -> bool {
        !self.treated && self.bleed_rate > 0.0
    }
}

/// Severity is damage / 10 truncated, kept within `1..=10`.
#[must_use]
pub fn severity_for_damage(amount: f32) -> u8 {
    let raw = truncate_f32_to_u32(amount / DAMAGE_PER_SEVERITY);
    u8::try_from(raw)
        .unwrap_or(SEVERITY_MAX)
        .clamp(SEVERITY_MIN, SEVERITY_MAX)
}

/// Health and wound state shared by the player and every character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub health: f32,
    pub max_health: f32,
    #[serde(default)]
    pub injuries: Vec<Injury>,
    #[serde(default = "default_alive")]
    pub alive: bool,
}

const fn default_alive() -> bool {
    true
}

impl Default for Vitals {
    fn default() -> Self {
        Self::with_max_health(DEFAULT_MAX_HEALTH)
    }
}

impl Vitals {
    #[must_use]
    pub const fn with_max_health(max_health: f32) -> Self {
        Self {
            health: max_health,
            max_health,
            injuries: Vec::new(),
            alive: true,
        }
    }

    #[must_use]
    pub fn health_fraction(&self) -> f32 {
        if self.max_health <= 0.0 {
            return 0.0;
        }
        (self.health / self.max_health).clamp(0.0, 1.0)
    }

    /// Sum of bleed rates over untreated injuries.
    #[must_use]
    pub fn total_bleed(&self) -> f32 {
        self.injuries
            .iter()
            .filter(|injury| !injury.treated)
            .map(|injury| injury.bleed_rate)
            .sum()
    }

    fn settle_death(&mut self) -> bool {
        if self.alive && self.health <= 0.0 {
            self.health = 0.0;
            self.alive = false;
            return true;
        }
        false
    }
}

/// Outcome of a single damage application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageReport {
    pub injury_index: usize,
    pub severity: u8,
    pub bleed_rate: f32,
    pub health_after: f32,
    /// True only on the call that moved the target from alive to dead.
    pub killed: bool,
}

/// Subtract `amount` from health (floored at 0) and record the wound.
///
/// # Errors
///
/// Returns [`SimError::InvalidState`] when the target is already dead or the amount is
/// negative or not finite.
pub fn apply_damage(
    vitals: &mut Vitals,
    amount: f32,
    body_part: BodyPart,
    kind: InjuryKind,
    attacker_id: Option<&str>,
    now: SimTime,
    table: &BleedTable,
) -> SimResult<DamageReport> {
    if !vitals.alive {
        return Err(SimError::invalid_state("cannot damage a dead target"));
    }
    if !amount.is_finite() || amount < 0.0 {
        return Err(SimError::invalid_state(format!(
            "damage must be a non-negative number (got {amount})"
        )));
    }

    let mut injury = Injury::from_damage(amount, body_part, kind, now, table);
    injury.attacker_id = attacker_id.map(str::to_string);
    let report_severity = injury.severity;
    let report_bleed = injury.bleed_rate;

    vitals.health = (vitals.health - amount).max(0.0);
    vitals.injuries.push(injury);
    let killed = vitals.settle_death();

    Ok(DamageReport {
        injury_index: vitals.injuries.len() - 1,
        severity: report_severity,
        bleed_rate: report_bleed,
        health_after: vitals.health,
        killed,
    })
}

/// Result of one bleed step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BleedOutcome {
    pub health_lost: f32,
    pub newly_infected: usize,
    pub died: bool,
}

/// Apply `dt` seconds of bleeding from untreated wounds and flag wounds left untreated for
/// longer than `infection_window` minutes.
pub fn update_health(
    vitals: &mut Vitals,
    dt: f32,
    now: SimTime,
    infection_window: u32,
) -> BleedOutcome {
    let mut outcome = BleedOutcome::default();
    if !vitals.alive || !dt.is_finite() || dt <= 0.0 {
        return outcome;
    }

    for injury in vitals.injuries.iter_mut().filter(|injury| !injury.treated) {
        if !injury.infection_risk
            && now.minutes_since(&injury.inflicted_at) > u64::from(infection_window)
        {
            injury.infection_risk = true;
            outcome.newly_infected += 1;
        }
    }

    let loss = vitals.total_bleed() * dt;
    if loss > 0.0 {
        let before = vitals.health;
        vitals.health = (vitals.health - loss).max(0.0);
        outcome.health_lost = before - vitals.health;
    }
    outcome.died = vitals.settle_death();
    outcome
}

/// Mark an injury treated, stopping its bleed. Treating twice is harmless.
///
/// # Errors
///
/// Returns [`SimError::InvalidIndex`] when `index` is outside the injury list.
pub fn treat_injury(vitals: &mut Vitals, index: usize) -> SimResult<()> {
    let len = vitals.injuries.len();
    let injury = vitals
        .injuries
        .get_mut(index)
        .ok_or(SimError::invalid_index(IndexKind::Injury, index, len))?;
    injury.treated = true;
    injury.bleed_rate = 0.0;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::INFECTION_WINDOW_MINUTES;

    fn now() -> SimTime {
        SimTime::default()
    }

    #[test]
    fn severity_truncates_and_clamps() {
        assert_eq!(severity_for_damage(40.0), 4);
        assert_eq!(severity_for_damage(49.9), 4);
        assert_eq!(severity_for_damage(5.0), 1);
        assert_eq!(severity_for_damage(0.0), 1);
        assert_eq!(severity_for_damage(250.0), 10);
    }

    #[test]
    fn bleed_table_scales_by_severity() {
        let table = BleedTable::default();
        assert!((table.bleed_rate(InjuryKind::Gunshot, 4) - 8.0).abs() < f32::EPSILON);
        assert!((table.bleed_rate(InjuryKind::Laceration, 4) - 2.0).abs() < f32::EPSILON);
        assert!((table.bleed_rate(InjuryKind::InternalBleeding, 2) - 3.0).abs() < f32::EPSILON);
        assert!(table.bleed_rate(InjuryKind::Bruise, 9).abs() < f32::EPSILON);
        assert!(table.bleed_rate(InjuryKind::Fracture, 9).abs() < f32::EPSILON);
    }

    #[test]
    fn damage_records_injury_and_floors_health() {
        let mut vitals = Vitals::default();
        let report = apply_damage(
            &mut vitals,
            40.0,
            BodyPart::Torso,
            InjuryKind::Gunshot,
            Some("player"),
            now(),
            &BleedTable::default(),
        )
        .unwrap();
        assert_eq!(report.severity, 4);
        assert!((vitals.health - 60.0).abs() < f32::EPSILON);
        assert_eq!(vitals.injuries.len(), 1);
        assert_eq!(vitals.injuries[0].attacker_id.as_deref(), Some("player"));
        assert!(!report.killed);

        let report = apply_damage(
            &mut vitals,
            500.0,
            BodyPart::Head,
            InjuryKind::Gunshot,
            None,
            now(),
            &BleedTable::default(),
        )
        .unwrap();
        assert!(report.killed);
        assert!(vitals.health.abs() < f32::EPSILON);
        assert!(!vitals.alive);

        let err = apply_damage(
            &mut vitals,
            1.0,
            BodyPart::Head,
            InjuryKind::Bruise,
            None,
            now(),
            &BleedTable::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SimError::InvalidState { .. }));
    }

    #[test]
    fn health_fraction_is_bounded() {
        let mut vitals = Vitals::with_max_health(80.0);
        vitals.health = 20.0;
        assert!((vitals.health_fraction() - 0.25).abs() < f32::EPSILON);
        vitals.health = 0.0;
        assert!(vitals.health_fraction().abs() < f32::EPSILON);
        assert!(Vitals::with_max_health(0.0).health_fraction().abs() < f32::EPSILON);
    }

    #[test]
    fn negative_damage_is_rejected() {
        let mut vitals = Vitals::default();
        let err = apply_damage(
            &mut vitals,
            -5.0,
            BodyPart::Torso,
            InjuryKind::Bruise,
            None,
            now(),
            &BleedTable::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SimError::InvalidState { .. }));
        assert!(vitals.injuries.is_empty());
    }

    #[test]
    fn bleeding_then_treatment_stops_loss() {
        let table = BleedTable::default();
        let mut vitals = Vitals::default();
        vitals
            .injuries
            .push(Injury::from_damage(40.0, BodyPart::Torso, InjuryKind::Gunshot, now(), &table));

        let outcome = update_health(&mut vitals, 5.0, now(), INFECTION_WINDOW_MINUTES);
        assert!((vitals.health - 60.0).abs() < 1e-4);
        assert!((outcome.health_lost - 40.0).abs() < 1e-4);

        treat_injury(&mut vitals, 0).unwrap();
        assert!(vitals.injuries[0].bleed_rate.abs() < f32::EPSILON);
        update_health(&mut vitals, 100.0, now(), INFECTION_WINDOW_MINUTES);
        assert!((vitals.health - 60.0).abs() < 1e-4);
    }

    #[test]
    fn bleeding_out_kills_once() {
        let table = BleedTable::default();
        let mut vitals = Vitals::default();
        vitals.injuries.push(Injury::from_damage(
            100.0,
            BodyPart::Torso,
            InjuryKind::Gunshot,
            now(),
            &table,
        ));
        let first = update_health(&mut vitals, 10.0, now(), INFECTION_WINDOW_MINUTES);
        assert!(first.died);
        assert!(!vitals.alive);
        let second = update_health(&mut vitals, 10.0, now(), INFECTION_WINDOW_MINUTES);
        assert!(!second.died);
        assert!(vitals.health.abs() < f32::EPSILON);
    }

    #[test]
    fn stale_wounds_raise_infection_risk() {
        let table = BleedTable::default();
        let mut vitals = Vitals::default();
        let inflicted = SimTime::new(1841, 5, 15, 360);
        vitals.injuries.push(Injury::from_damage(
            10.0,
            BodyPart::LeftArm,
            InjuryKind::Bruise,
            inflicted,
            &table,
        ));
        let window = INFECTION_WINDOW_MINUTES;
        let early = update_health(&mut vitals, 1.0, SimTime::new(1841, 5, 15, 400), window);
        assert_eq!(early.newly_infected, 0);
        let late = update_health(&mut vitals, 1.0, SimTime::new(1841, 5, 15, 500), window);
        assert_eq!(late.newly_infected, 1);
        assert!(vitals.injuries[0].infection_risk);
    }

    #[test]
    fn treating_out_of_range_reports_index() {
        let mut vitals = Vitals::default();
        let err = treat_injury(&mut vitals, 3).unwrap_err();
        assert_eq!(err, SimError::invalid_index(IndexKind::Injury, 3, 0));
    }
}
