//! Faction reputation, per-character standing and the player's action history.
//!
//! Every mutation clamps immediately. Decay is driven by the coordinator once per
//! simulated day rollover, never per tick.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use crate::character::{Faction, Position};
use crate::clock::SimTime;
use crate::constants::{
    COMMUNITY_DECAY_PER_DAY, ENDING_OUTCAST_MAX, ENDING_RESPECTED_MIN, ENDING_SIDE_STRONG,
    ENDING_SIDE_WEAK, FEAR_MAX, FEAR_MIN, GOSSIP_DELTA_THRESHOLD, INTEGRITY_MAX, INTEGRITY_MIN,
    LEGION_DECAY_PER_DAY, MEMORY_RELEVANCE_MAX, MEMORY_RELEVANCE_MIN, OUTSIDER_DECAY_PER_DAY,
    REPUTATION_MAX, REPUTATION_MIN, RESPECT_MAX, RESPECT_MIN, TRUST_MAX, TRUST_MIN,
};
use crate::error::{EntityKind, SimError, SimResult};

const DEFAULT_ACTION_DATA: &str = include_str!("../assets/data/actions.json");

/// Witness list for a single action; most actions are seen by a handful of people.
pub type WitnessList = SmallVec<[String; 4]>;

/// Deltas applied when the player performs an action.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionDelta {
    #[serde(default)]
    pub legion: i32,
    #[serde(default)]
    pub community: i32,
    #[serde(default)]
    pub outsider: i32,
    #[serde(default)]
    pub integrity: i32,
    /// Trust change applied to every witness.
    #[serde(default)]
    pub witness_trust: i32,
    #[serde(default)]
    pub description: Option<String>,
}

impl ActionDelta {
    #[must_use]
    pub const fn toward(&self, faction: Faction) -> i32 {
        match faction {
            Faction::Legion => self.legion,
            Faction::Community => self.community,
            Faction::Outsider => self.outsider,
            Faction::Neutral => 0,
        }
    }
}

/// Immutable action id -> delta table, loaded once and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionCatalog {
    #[serde(default)]
    pub actions: BTreeMap<String, ActionDelta>,
}

impl ActionCatalog {
    #[must_use]
    pub fn load_from_static() -> Self {
        serde_json::from_str(DEFAULT_ACTION_DATA).unwrap_or_default()
    }

    #[must_use]
    pub fn default_catalog() -> &'static Self {
        static CATALOG: OnceLock<ActionCatalog> = OnceLock::new();
        CATALOG.get_or_init(Self::load_from_static)
    }

    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into an action catalog.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn get(&self, action_id: &str) -> Option<&ActionDelta> {
        self.actions.get(action_id)
    }

    pub fn insert(&mut self, action_id: impl Into<String>, delta: ActionDelta) {
        self.actions.insert(action_id.into(), delta);
    }
}

/// Display tier for a reputation value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationTier {
    Exemplary,
    WellRegarded,
    Favorable,
    Neutral,
    Unfavorable,
    Distrusted,
    Despised,
}

impl ReputationTier {
    #[must_use]
    pub const fn from_value(value: i32) -> Self {
        match value {
            80.. => Self::Exemplary,
            50.. => Self::WellRegarded,
            20.. => Self::Favorable,
            0.. => Self::Neutral,
            -20.. => Self::Unfavorable,
            -50.. => Self::Distrusted,
            _ => Self::Despised,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Exemplary => "Exemplary",
            Self::WellRegarded => "Well-Regarded",
            Self::Favorable => "Favorable",
            Self::Neutral => "Neutral",
            Self::Unfavorable => "Unfavorable",
            Self::Distrusted => "Distrusted",
            Self::Despised => "Despised",
        }
    }
}

impl fmt::Display for ReputationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal narrative classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndingBranch {
    RespectedOnBothSides,
    OutcastAndBlamed,
    EnforcerPath,
    TraitorPath,
    CaughtInTheMiddle,
}

impl EndingBranch {
    /// Classify a (legion, community) pair. Checks run in a fixed priority order, so every
    /// pair maps to exactly one branch.
    #[must_use]
    pub const fn classify(legion: i32, community: i32) -> Self {
        if legion >= ENDING_RESPECTED_MIN && community >= ENDING_RESPECTED_MIN {
            Self::RespectedOnBothSides
        } else if legion <= ENDING_OUTCAST_MAX && community <= ENDING_OUTCAST_MAX {
            Self::OutcastAndBlamed
        } else if legion >= ENDING_SIDE_STRONG && community <= ENDING_SIDE_WEAK {
            Self::EnforcerPath
        } else if legion <= ENDING_SIDE_WEAK && community >= ENDING_SIDE_STRONG {
            Self::TraitorPath
        } else {
            Self::CaughtInTheMiddle
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RespectedOnBothSides => "respected_on_both_sides",
            Self::OutcastAndBlamed => "outcast_and_blamed",
            Self::EnforcerPath => "enforcer_path",
            Self::TraitorPath => "traitor_path",
            Self::CaughtInTheMiddle => "caught_in_the_middle",
        }
    }
}

impl fmt::Display for EndingBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalResponse {
    Grateful,
    Angry,
    Fearful,
    Indifferent,
}

/// An action as it was recorded in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAction {
    pub action_id: String,
    pub timestamp: SimTime,
    #[serde(default)]
    pub location: Position,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub witnesses: WitnessList,
}

/// How a witness remembers an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMemory {
    pub action: PlayerAction,
    pub response: EmotionalResponse,
    #[serde(default)]
    pub will_gossip: bool,
    /// 1-10, how much the witness cares.
    pub relevance: u8,
}

impl ActionMemory {
    /// Build the memory a witness of `faction` keeps of `action`.
    #[must_use]
    pub fn for_witness(action: PlayerAction, delta: &ActionDelta, faction: Faction) -> Self {
        let swing = delta.toward(faction);
        let response = match swing {
            s if s > 0 => EmotionalResponse::Grateful,
            s if s < 0 && delta.legion > 0 && faction != Faction::Legion => {
                EmotionalResponse::Fearful
            }
            s if s < 0 => EmotionalResponse::Angry,
            _ => EmotionalResponse::Indifferent,
        };
        let relevance = u8::try_from((swing.unsigned_abs() / 5).min(u32::from(MEMORY_RELEVANCE_MAX)))
            .unwrap_or(MEMORY_RELEVANCE_MAX)
            .max(MEMORY_RELEVANCE_MIN);
        Self {
            action,
            response,
            will_gossip: swing.abs() >= GOSSIP_DELTA_THRESHOLD,
            relevance,
        }
    }
}

/// The player's standing with one character.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CharacterStanding {
    #[serde(default)]
    pub trust: i32,
    #[serde(default)]
    pub fear: i32,
    #[serde(default)]
    pub respect: i32,
    #[serde(default)]
    pub memories: Vec<ActionMemory>,
}

impl CharacterStanding {
    fn clamp(&mut self) {
        self.trust = self.trust.clamp(TRUST_MIN, TRUST_MAX);
        self.fear = self.fear.clamp(FEAR_MIN, FEAR_MAX);
        self.respect = self.respect.clamp(RESPECT_MIN, RESPECT_MAX);
    }
}

/// Faction values at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationSnapshot {
    pub legion: i32,
    pub community: i32,
    pub outsider: i32,
    pub integrity: i32,
    pub ending: EndingBranch,
}

/// Daily decay rates per faction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecayRates {
    #[serde(default = "DecayRates::default_legion")]
    pub legion: i32,
    #[serde(default = "DecayRates::default_community")]
    pub community: i32,
    #[serde(default = "DecayRates::default_outsider")]
    pub outsider: i32,
}

impl Default for DecayRates {
    fn default() -> Self {
        Self {
            legion: Self::default_legion(),
            community: Self::default_community(),
            outsider: Self::default_outsider(),
        }
    }
}

impl DecayRates {
    const fn default_legion() -> i32 {
        LEGION_DECAY_PER_DAY
    }

    const fn default_community() -> i32 {
        COMMUNITY_DECAY_PER_DAY
    }

    const fn default_outsider() -> i32 {
        OUTSIDER_DECAY_PER_DAY
    }
}

/// What [`ReputationLedger::record_action`] changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub action_id: String,
    pub legion: i32,
    pub community: i32,
    pub outsider: i32,
    pub witnesses: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReputationLedger {
    legion: i32,
    community: i32,
    outsider: i32,
    integrity: i32,
    #[serde(default)]
    standings: BTreeMap<String, CharacterStanding>,
    #[serde(default)]
    history: Vec<PlayerAction>,
}

/// Context for recording an action: when, where, and who saw it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionContext<'a> {
    pub timestamp: SimTime,
    pub location: Position,
    /// Witness id with the witness's faction.
    pub witnesses: &'a [(String, Faction)],
}

impl ReputationLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore every value to its starting point.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub const fn legion(&self) -> i32 {
        self.legion
    }

    #[must_use]
    pub const fn community(&self) -> i32 {
        self.community
    }

    #[must_use]
    pub const fn outsider(&self) -> i32 {
        self.outsider
    }

    #[must_use]
    pub const fn integrity(&self) -> i32 {
        self.integrity
    }

    #[must_use]
    pub const fn faction(&self, faction: Faction) -> Option<i32> {
        match faction {
            Faction::Legion => Some(self.legion),
            Faction::Community => Some(self.community),
            Faction::Outsider => Some(self.outsider),
            Faction::Neutral => None,
        }
    }

    #[must_use]
    pub fn history(&self) -> &[PlayerAction] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    #[must_use]
    pub fn standing(&self, character_id: &str) -> Option<&CharacterStanding> {
        self.standings.get(character_id)
    }

    pub fn standings(&self) -> impl Iterator<Item = (&String, &CharacterStanding)> {
        self.standings.iter()
    }

    /// Trust toward the player; 0 for characters never touched.
    #[must_use]
    pub fn trust(&self, character_id: &str) -> i32 {
        self.standings
            .get(character_id)
            .map_or(0, |standing| standing.trust)
    }

    #[must_use]
    pub fn snapshot(&self) -> ReputationSnapshot {
        ReputationSnapshot {
            legion: self.legion,
            community: self.community,
            outsider: self.outsider,
            integrity: self.integrity,
            ending: self.determine_ending_branch(),
        }
    }

    /// Add raw faction deltas, clamping each track.
    pub fn apply_faction_deltas(&mut self, legion: i32, community: i32, outsider: i32) {
        self.legion = clamp_reputation(self.legion.saturating_add(legion));
        self.community = clamp_reputation(self.community.saturating_add(community));
        self.outsider = clamp_reputation(self.outsider.saturating_add(outsider));
    }

    pub fn modify_integrity(&mut self, delta: i32) {
        self.integrity = self
            .integrity
            .saturating_add(delta)
            .clamp(INTEGRITY_MIN, INTEGRITY_MAX);
    }

    /// Look up `action_id`, apply its deltas and append it to the history.
    ///
    /// Witnesses each receive a memory of the action and the action's witness trust delta.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NotFound`] for an id missing from the catalog; nothing changes.
    pub fn record_action(
        &mut self,
        catalog: &ActionCatalog,
        action_id: &str,
        ctx: &ActionContext<'_>,
    ) -> SimResult<ActionOutcome> {
        let delta = catalog
            .get(action_id)
            .ok_or_else(|| SimError::not_found(EntityKind::Action, action_id))?;

        self.apply_faction_deltas(delta.legion, delta.community, delta.outsider);
        self.modify_integrity(delta.integrity);

        let action = PlayerAction {
            action_id: action_id.to_string(),
            timestamp: ctx.timestamp,
            location: ctx.location,
            description: delta.description.clone().unwrap_or_default(),
            witnesses: ctx.witnesses.iter().map(|(id, _)| id.clone()).collect(),
        };

        for (witness_id, faction) in ctx.witnesses {
            let memory = ActionMemory::for_witness(action.clone(), delta, *faction);
            let standing = self.standings.entry(witness_id.clone()).or_default();
            standing.memories.push(memory);
            standing.trust = standing.trust.saturating_add(delta.witness_trust);
            standing.clamp();
        }

        self.history.push(action);

        Ok(ActionOutcome {
            action_id: action_id.to_string(),
            legion: self.legion,
            community: self.community,
            outsider: self.outsider,
            witnesses: ctx.witnesses.len(),
        })
    }

    /// Adjust a character's trust, creating their standing on first touch. Returns the new trust.
    pub fn modify_trust(&mut self, character_id: &str, delta: i32) -> i32 {
        let standing = self.standings.entry(character_id.to_string()).or_default();
        standing.trust = standing.trust.saturating_add(delta);
        standing.clamp();
        standing.trust
    }

    pub fn modify_fear(&mut self, character_id: &str, delta: i32) -> i32 {
        let standing = self.standings.entry(character_id.to_string()).or_default();
        standing.fear = standing.fear.saturating_add(delta);
        standing.clamp();
        standing.fear
    }

    pub fn modify_respect(&mut self, character_id: &str, delta: i32) -> i32 {
        let standing = self.standings.entry(character_id.to_string()).or_default();
        standing.respect = standing.respect.saturating_add(delta);
        standing.clamp();
        standing.respect
    }

    pub fn add_memory(&mut self, character_id: &str, memory: ActionMemory) {
        self.standings
            .entry(character_id.to_string())
            .or_default()
            .memories
            .push(memory);
    }

    /// One day's decay. Values only ever go down, and never below the floor.
    pub fn apply_daily_decay(&mut self, rates: &DecayRates) {
        self.legion = decay(self.legion, rates.legion);
        self.community = decay(self.community, rates.community);
        self.outsider = decay(self.outsider, rates.outsider);
    }

    #[must_use]
    pub const fn determine_ending_branch(&self) -> EndingBranch {
        EndingBranch::classify(self.legion, self.community)
    }

    /// Whether every stored value honors its range.
    #[must_use]
    pub fn is_within_bounds(&self) -> bool {
        let in_rep = |v: i32| (REPUTATION_MIN..=REPUTATION_MAX).contains(&v);
        in_rep(self.legion)
            && in_rep(self.community)
            && in_rep(self.outsider)
            && (INTEGRITY_MIN..=INTEGRITY_MAX).contains(&self.integrity)
            && self.standings.values().all(|standing| {
                let mut clamped = standing.clone();
                clamped.clamp();
                clamped == *standing
            })
    }

    /// Overwrite the faction tracks directly, clamped. Used by scripted setups.
    pub fn set_factions(&mut self, legion: i32, community: i32, outsider: i32) {
        self.legion = clamp_reputation(legion);
        self.community = clamp_reputation(community);
        self.outsider = clamp_reputation(outsider);
    }
}

const fn clamp_reputation(value: i32) -> i32 {
    if value < REPUTATION_MIN {
        REPUTATION_MIN
    } else if value > REPUTATION_MAX {
        REPUTATION_MAX
    } else {
        value
    }
}

fn decay(value: i32, rate: i32) -> i32 {
    let lowered = value.saturating_sub(rate.max(0));
    lowered.max(REPUTATION_MIN).min(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ActionContext<'static> {
        ActionContext::default()
    }

    #[test]
    fn static_catalog_carries_known_actions() {
        let catalog = ActionCatalog::load_from_static();
        let help = catalog.get("help_with_task").unwrap();
        assert_eq!((help.legion, help.community, help.outsider), (0, 30, 0));
        let drill = catalog.get("attend_drill").unwrap();
        assert_eq!(drill.legion, 20);
        assert!(catalog.get("refuse_order").is_some());
    }

    #[test]
    fn help_with_task_raises_community_only() {
        let mut ledger = ReputationLedger::new();
        ledger
            .record_action(ActionCatalog::default_catalog(), "help_with_task", &ctx())
            .unwrap();
        assert_eq!(ledger.community(), 30);
        assert_eq!(ledger.legion(), 0);
        assert_eq!(ledger.outsider(), 0);
        assert_eq!(ledger.history().len(), 1);
    }

    #[test]
    fn repeated_drill_clamps_at_max() {
        let mut ledger = ReputationLedger::new();
        for _ in 0..5 {
            ledger
                .record_action(ActionCatalog::default_catalog(), "attend_drill", &ctx())
                .unwrap();
        }
        assert_eq!(ledger.legion(), 100);
        ledger
            .record_action(ActionCatalog::default_catalog(), "attend_drill", &ctx())
            .unwrap();
        assert_eq!(ledger.legion(), 100);
    }

    #[test]
    fn unknown_action_is_reported_without_mutation() {
        let mut ledger = ReputationLedger::new();
        let err = ledger
            .record_action(ActionCatalog::default_catalog(), "dance_badly", &ctx())
            .unwrap_err();
        assert_eq!(err, SimError::not_found(EntityKind::Action, "dance_badly"));
        assert_eq!(ledger, ReputationLedger::new());
    }

    #[test]
    fn witnesses_remember_and_shift_trust() {
        let mut catalog = ActionCatalog::default();
        catalog.insert(
            "enforce_curfew_harshly",
            ActionDelta {
                legion: 25,
                community: -30,
                outsider: -20,
                integrity: -5,
                witness_trust: -10,
                description: Some("Broke up a gathering after curfew".into()),
            },
        );
        let witnesses = vec![
            ("npc_sara".to_string(), Faction::Community),
            ("npc_captain".to_string(), Faction::Legion),
        ];
        let mut ledger = ReputationLedger::new();
        let outcome = ledger
            .record_action(
                &catalog,
                "enforce_curfew_harshly",
                &ActionContext {
                    timestamp: SimTime::default(),
                    location: Position::default(),
                    witnesses: &witnesses,
                },
            )
            .unwrap();
        assert_eq!(outcome.witnesses, 2);
        assert_eq!(ledger.integrity(), -5);
        assert_eq!(ledger.trust("npc_sara"), -10);

        let sara = ledger.standing("npc_sara").unwrap();
        assert_eq!(sara.memories[0].response, EmotionalResponse::Fearful);
        assert!(sara.memories[0].will_gossip);
        assert_eq!(sara.memories[0].relevance, 6);
        let captain = ledger.standing("npc_captain").unwrap();
        assert_eq!(captain.memories[0].response, EmotionalResponse::Grateful);
        assert_eq!(ledger.history()[0].witnesses.len(), 2);
    }

    #[test]
    fn trust_is_lazy_and_clamped() {
        let mut ledger = ReputationLedger::new();
        assert_eq!(ledger.trust("npc_elder"), 0);
        assert!(ledger.standing("npc_elder").is_none());
        assert_eq!(ledger.modify_trust("npc_elder", 70), 70);
        assert_eq!(ledger.modify_trust("npc_elder", 70), 100);
        assert_eq!(ledger.modify_trust("npc_elder", -500), -100);
        assert_eq!(ledger.modify_fear("npc_elder", -5), 0);
    }

    #[test]
    fn respect_clamps_both_ways() {
        let mut ledger = ReputationLedger::new();
        assert_eq!(ledger.modify_respect("npc_elder", 60), 60);
        assert_eq!(ledger.modify_respect("npc_elder", 60), RESPECT_MAX);
        assert_eq!(ledger.modify_respect("npc_elder", i32::MIN), RESPECT_MIN);
        assert_eq!(ledger.standing("npc_elder").unwrap().respect, -100);
        assert_eq!(ledger.trust("npc_elder"), 0);
    }

    #[test]
    fn memories_create_standing_and_append() {
        let mut ledger = ReputationLedger::new();
        let memory = |action_id: &str, response: EmotionalResponse| ActionMemory {
            action: PlayerAction {
                action_id: action_id.to_string(),
                timestamp: SimTime::default(),
                location: Position::default(),
                description: String::new(),
                witnesses: WitnessList::new(),
            },
            response,
            will_gossip: false,
            relevance: 3,
        };
        assert!(ledger.standing("npc_widow").is_none());
        ledger.add_memory("npc_widow", memory("help_with_task", EmotionalResponse::Grateful));
        ledger.add_memory("npc_widow", memory("refuse_order", EmotionalResponse::Angry));

        let widow = ledger.standing("npc_widow").unwrap();
        assert_eq!(widow.memories.len(), 2);
        assert_eq!(widow.memories[0].action.action_id, "help_with_task");
        assert_eq!(widow.memories[1].response, EmotionalResponse::Angry);
        assert_eq!((widow.trust, widow.fear, widow.respect), (0, 0, 0));
        assert!(ledger.history().is_empty());
    }

    #[test]
    fn clearing_history_keeps_factions_and_standings() {
        let mut ledger = ReputationLedger::new();
        for action in ["help_with_task", "attend_drill"] {
            ledger
                .record_action(ActionCatalog::default_catalog(), action, &ctx())
                .unwrap();
        }
        ledger.modify_trust("npc_elder", 15);
        assert_eq!(ledger.history().len(), 2);

        ledger.clear_history();
        assert!(ledger.history().is_empty());
        assert_eq!((ledger.legion(), ledger.community()), (20, 30));
        assert_eq!(ledger.trust("npc_elder"), 15);
    }

    #[test]
    fn decay_only_lowers_and_floors() {
        let rates = DecayRates::default();
        let mut ledger = ReputationLedger::new();
        ledger.set_factions(50, -98, 2);
        ledger.apply_daily_decay(&rates);
        assert_eq!(ledger.legion(), 40);
        assert_eq!(ledger.community(), -100);
        assert_eq!(ledger.outsider(), -1);

        ledger.set_factions(-100, -100, -100);
        ledger.apply_daily_decay(&rates);
        assert_eq!((ledger.legion(), ledger.community(), ledger.outsider()), (-100, -100, -100));
    }

    #[test]
    fn ending_branches_follow_priority() {
        assert_eq!(EndingBranch::classify(65, 70), EndingBranch::RespectedOnBothSides);
        assert_eq!(EndingBranch::classify(-40, 45), EndingBranch::TraitorPath);
        assert_eq!(EndingBranch::classify(45, -40), EndingBranch::EnforcerPath);
        assert_eq!(EndingBranch::classify(-30, -30), EndingBranch::OutcastAndBlamed);
        assert_eq!(EndingBranch::classify(0, 0), EndingBranch::CaughtInTheMiddle);
        // Outcast wins over traitor/enforcer when both tracks are low.
        assert_eq!(EndingBranch::classify(-100, -40), EndingBranch::OutcastAndBlamed);
    }

    #[test]
    fn ending_is_total_over_the_grid() {
        for legion in REPUTATION_MIN..=REPUTATION_MAX {
            for community in REPUTATION_MIN..=REPUTATION_MAX {
                let branch = EndingBranch::classify(legion, community);
                assert!(!branch.as_str().is_empty());
            }
        }
    }

    #[test]
    fn tiers_match_thresholds() {
        assert_eq!(ReputationTier::from_value(80), ReputationTier::Exemplary);
        assert_eq!(ReputationTier::from_value(79), ReputationTier::WellRegarded);
        assert_eq!(ReputationTier::from_value(20), ReputationTier::Favorable);
        assert_eq!(ReputationTier::from_value(0), ReputationTier::Neutral);
        assert_eq!(ReputationTier::from_value(-1), ReputationTier::Unfavorable);
        assert_eq!(ReputationTier::from_value(-21), ReputationTier::Distrusted);
        assert_eq!(ReputationTier::from_value(-51), ReputationTier::Despised);
        assert_eq!(ReputationTier::from_value(55).to_string(), "Well-Regarded");
    }

    #[test]
    fn reset_restores_initial_values() {
        let mut ledger = ReputationLedger::new();
        ledger.set_factions(10, 20, 30);
        ledger.modify_trust("npc_sara", 5);
        ledger.reset();
        assert_eq!(ledger, ReputationLedger::new());
    }
}
