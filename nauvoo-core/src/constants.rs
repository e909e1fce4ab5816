//! Centralized balance and tuning constants for the Nauvoo world engine.
//!
//! Calendar shape, reputation bounds and combat factors live here so the
//! deterministic math can only change through reviewed code, not content.

// Logging keys -------------------------------------------------------------
pub(crate) const LOG_DAY_ROLLOVER: &str = "log.clock.day-rollover";
pub(crate) const LOG_ACTIVITY_CHANGED: &str = "log.schedule.activity-changed";
pub(crate) const LOG_OVERRIDE_SET: &str = "log.schedule.override-set";
pub(crate) const LOG_OVERRIDE_CLEARED: &str = "log.schedule.override-cleared";
pub(crate) const LOG_ACTION_RECORDED: &str = "log.reputation.action";
pub(crate) const LOG_DAILY_DECAY: &str = "log.reputation.decay";
pub(crate) const LOG_COMBAT_STARTED: &str = "log.combat.started";
pub(crate) const LOG_COMBAT_ENDED: &str = "log.combat.ended";
pub(crate) const LOG_COMBAT_TIMEOUT: &str = "log.combat.timeout";
pub(crate) const LOG_RETREAT: &str = "log.combat.retreat";
pub(crate) const LOG_SHOT_HIT: &str = "log.combat.hit";
pub(crate) const LOG_SHOT_MISS: &str = "log.combat.miss";
pub(crate) const LOG_SHOT_MISFIRE: &str = "log.combat.misfire";
pub(crate) const LOG_RELOADED: &str = "log.combat.reloaded";
pub(crate) const LOG_CHARACTER_DIED: &str = "log.injury.death";
pub(crate) const LOG_PLAYER_DIED: &str = "log.injury.player-death";
pub(crate) const LOG_INFECTION_RISK: &str = "log.injury.infection-risk";
pub(crate) const LOG_EVENT_TRIGGERED: &str = "log.event.triggered";
pub(crate) const LOG_EVENT_COMPLETED: &str = "log.event.completed";
pub(crate) const LOG_AUTOSAVE: &str = "log.persistence.autosave";

// Calendar -----------------------------------------------------------------
pub const MINUTES_PER_HOUR: u32 = 60;
pub const MINUTES_PER_DAY: u32 = 1_440;
pub const DAYS_PER_MONTH: u8 = 30;
pub const MONTHS_PER_YEAR: u8 = 12;
pub(crate) const START_YEAR: i32 = 1841;
pub(crate) const START_MONTH: u8 = 5;
pub(crate) const START_DAY: u8 = 15;
pub(crate) const START_MINUTE: u32 = 360;
/// Simulated minutes per real second.
pub(crate) const DEFAULT_TIME_SCALE: f32 = 1.2;

// Reputation ---------------------------------------------------------------
pub const REPUTATION_MIN: i32 = -100;
pub const REPUTATION_MAX: i32 = 100;
pub const INTEGRITY_MIN: i32 = -50;
pub const INTEGRITY_MAX: i32 = 50;
pub const TRUST_MIN: i32 = -100;
pub const TRUST_MAX: i32 = 100;
pub const FEAR_MIN: i32 = 0;
pub const FEAR_MAX: i32 = 100;
pub const RESPECT_MIN: i32 = -100;
pub const RESPECT_MAX: i32 = 100;
pub const INTIMACY_MIN: i32 = 0;
pub const INTIMACY_MAX: i32 = 100;
pub(crate) const LEGION_DECAY_PER_DAY: i32 = 10;
pub(crate) const COMMUNITY_DECAY_PER_DAY: i32 = 5;
pub(crate) const OUTSIDER_DECAY_PER_DAY: i32 = 3;
pub(crate) const MEMORY_RELEVANCE_MIN: u8 = 1;
pub(crate) const MEMORY_RELEVANCE_MAX: u8 = 10;
/// Faction swing at or beyond which a witness will gossip about an action.
pub(crate) const GOSSIP_DELTA_THRESHOLD: i32 = 20;
/// Legacy content marker meaning "no requirement" on a dialogue option.
pub const NO_REQUIREMENT_SENTINEL: i32 = -999;

// Ending thresholds --------------------------------------------------------
pub(crate) const ENDING_RESPECTED_MIN: i32 = 60;
pub(crate) const ENDING_OUTCAST_MAX: i32 = -30;
pub(crate) const ENDING_SIDE_STRONG: i32 = 40;
pub(crate) const ENDING_SIDE_WEAK: i32 = -40;

// Injury -------------------------------------------------------------------
pub(crate) const SEVERITY_MIN: u8 = 1;
pub(crate) const SEVERITY_MAX: u8 = 10;
pub(crate) const DAMAGE_PER_SEVERITY: f32 = 10.0;
pub(crate) const BLEED_LACERATION: f32 = 0.5;
pub(crate) const BLEED_GUNSHOT: f32 = 2.0;
pub(crate) const BLEED_INTERNAL: f32 = 1.5;
pub(crate) const INFECTION_WINDOW_MINUTES: u32 = 60;
pub(crate) const DEFAULT_MAX_HEALTH: f32 = 100.0;

// Combat -------------------------------------------------------------------
pub(crate) const BASE_ACCURACY: f32 = 0.7;
pub(crate) const STANCE_STANDING: f32 = 0.7;
pub(crate) const STANCE_CROUCHING: f32 = 0.85;
pub(crate) const STANCE_PRONE: f32 = 0.95;
pub(crate) const STANCE_MOVING: f32 = 0.4;
pub(crate) const STANCE_BEHIND_COVER: f32 = 0.8;
pub(crate) const FATIGUE_EXHAUSTED_BELOW: f32 = 0.2;
pub(crate) const FATIGUE_TIRED_BELOW: f32 = 0.5;
pub(crate) const FATIGUE_EXHAUSTED_FACTOR: f32 = 0.5;
pub(crate) const FATIGUE_TIRED_FACTOR: f32 = 0.7;
pub(crate) const RETREAT_HEALTH_FRACTION: f32 = 0.3;
pub(crate) const COMBAT_TIMEOUT_SECS: f32 = 30.0;
pub(crate) const DEFAULT_MAX_STAMINA: f32 = 100.0;
pub(crate) const WITNESS_RADIUS: f32 = 30.0;

// Persistence --------------------------------------------------------------
pub const SAVE_FORMAT_VERSION: u32 = 1;
/// Upper bound on combat draws a save may claim; restoring replays every one.
pub const MAX_RNG_DRAWS: u64 = 10_000_000;
pub(crate) const AUTOSAVE_SLOT: &str = "autosave";
pub(crate) const SAVE_CHECKSUM_SEED: u64 = 0x4E41_5556_4F4F_0001;
