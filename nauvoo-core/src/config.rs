//! Simulation tuning loaded alongside content.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::SimTime;
use crate::constants::{
    COMBAT_TIMEOUT_SECS, DEFAULT_TIME_SCALE, INFECTION_WINDOW_MINUTES, RETREAT_HEALTH_FRACTION,
    WITNESS_RADIUS,
};
use crate::injury::BleedTable;
use crate::reputation::DecayRates;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: f32,
        max: f32,
        value: f32,
    },
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: f32 },
    #[error("start time {0} is not a valid calendar date")]
    StartTime(SimTime),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Simulated minutes per real second.
    #[serde(default = "SimConfig::default_time_scale")]
    pub time_scale: f32,
    #[serde(default)]
    pub start: SimTime,
    #[serde(default)]
    pub decay: DecayRates,
    #[serde(default)]
    pub bleed: BleedTable,
    /// Fraction of max health under which an in-combat character retreats.
    #[serde(default = "SimConfig::default_retreat_threshold")]
    pub retreat_threshold: f32,
    #[serde(default = "SimConfig::default_combat_timeout")]
    pub combat_timeout_secs: f32,
    #[serde(default = "SimConfig::default_witness_radius")]
    pub witness_radius: f32,
    #[serde(default = "SimConfig::default_infection_window")]
    pub infection_window_minutes: u32,
    #[serde(default = "SimConfig::default_autosave")]
    pub autosave: bool,
    /// Seed for the combat stream of a new world.
    #[serde(default)]
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            time_scale: Self::default_time_scale(),
            start: SimTime::default(),
            decay: DecayRates::default(),
            bleed: BleedTable::default(),
            retreat_threshold: Self::default_retreat_threshold(),
            combat_timeout_secs: Self::default_combat_timeout(),
            witness_radius: Self::default_witness_radius(),
            infection_window_minutes: Self::default_infection_window(),
            autosave: Self::default_autosave(),
            seed: 0,
        }
    }
}

impl SimConfig {
    const fn default_time_scale() -> f32 {
        DEFAULT_TIME_SCALE
    }

    const fn default_retreat_threshold() -> f32 {
        RETREAT_HEALTH_FRACTION
    }

    const fn default_combat_timeout() -> f32 {
        COMBAT_TIMEOUT_SECS
    }

    const fn default_witness_radius() -> f32 {
        WITNESS_RADIUS
    }

    const fn default_infection_window() -> u32 {
        INFECTION_WINDOW_MINUTES
    }

    const fn default_autosave() -> bool {
        true
    }

    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed or the result fails [`SimConfig::validate`].
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate configuration bounds.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates its documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        range("time_scale", self.time_scale, 0.0, 1_440.0)?;
        range("retreat_threshold", self.retreat_threshold, 0.0, 1.0)?;
        range("combat_timeout_secs", self.combat_timeout_secs, 1.0, 3_600.0)?;
        non_negative("witness_radius", self.witness_radius)?;
        non_negative("bleed.laceration", self.bleed.laceration)?;
        non_negative("bleed.bruise", self.bleed.bruise)?;
        non_negative("bleed.fracture", self.bleed.fracture)?;
        non_negative("bleed.gunshot", self.bleed.gunshot)?;
        non_negative("bleed.internal_bleeding", self.bleed.internal_bleeding)?;
        for (field, rate) in [
            ("decay.legion", self.decay.legion),
            ("decay.community", self.decay.community),
            ("decay.outsider", self.decay.outsider),
        ] {
            if rate < 0 {
                return Err(ConfigError::Negative {
                    field,
                    value: f32::from(i16::try_from(rate).unwrap_or(i16::MIN)),
                });
            }
        }
        if !self.start.is_normalized() {
            return Err(ConfigError::StartTime(self.start));
        }
        Ok(())
    }
}

fn range(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if !(min..=max).contains(&value) {
        return Err(ConfigError::RangeViolation {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Negative { field, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = SimConfig::default();
        assert!(cfg.validate().is_ok());
        assert!((cfg.time_scale - 1.2).abs() < f32::EPSILON);
        assert_eq!(cfg.start, SimTime::new(1841, 5, 15, 360));
    }

    #[test]
    fn empty_json_uses_defaults() {
        let cfg = SimConfig::from_json("{}").unwrap();
        assert_eq!(cfg, SimConfig::default());
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let cfg = SimConfig {
            retreat_threshold: 1.5,
            ..SimConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::RangeViolation { field, .. }) if field == "retreat_threshold"
        ));

        let mut cfg = SimConfig::default();
        cfg.decay.legion = -3;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Negative { field, .. }) if field == "decay.legion"
        ));

        let cfg = SimConfig {
            start: SimTime::new(1841, 13, 1, 0),
            ..SimConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::StartTime(_))));
        assert!(matches!(
            SimConfig::from_json("{ \"time_scale\": \"fast\" }"),
            Err(ConfigError::Parse(_))
        ));
    }
}
