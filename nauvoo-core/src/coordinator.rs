//! The world coordinator: owns the live [`WorldState`] and drives every subsystem.
//!
//! One tick runs, in order: clock advance, one decay per day rollover, schedule
//! resolution for the living, then combat and injury updates. Every entry point
//! either succeeds or returns a [`SimError`] with the world unchanged.
use serde::{Deserialize, Serialize};

use crate::character::{Character, Faction, Position};
use crate::clock::{Season, SimTime};
use crate::combat::{
    CombatEndReason, CombatPhase, CombatSession, EnemyList, ShotResolution, ShotRolls, Stance,
    resolve_shot, should_retreat,
};
use crate::config::SimConfig;
use crate::constants::{
    LOG_ACTION_RECORDED, LOG_ACTIVITY_CHANGED, LOG_AUTOSAVE, LOG_CHARACTER_DIED,
    LOG_COMBAT_ENDED, LOG_COMBAT_STARTED, LOG_COMBAT_TIMEOUT, LOG_DAILY_DECAY, LOG_DAY_ROLLOVER,
    LOG_EVENT_COMPLETED, LOG_EVENT_TRIGGERED, LOG_INFECTION_RISK, LOG_OVERRIDE_CLEARED,
    LOG_OVERRIDE_SET, LOG_PLAYER_DIED, LOG_RELOADED, LOG_RETREAT, LOG_SHOT_HIT, LOG_SHOT_MISFIRE,
    LOG_SHOT_MISS,
};
use crate::content::ContentBundle;
use crate::dialogue::{
    self, DialogueLibrary, DialogueOption, DialogueView, DialogueWorld, NodeEffect,
};
use crate::error::{ContentError, EntityKind, SimError, SimResult, SnapshotError};
use crate::injury::{self, BodyPart, DamageReport, InjuryKind, Vitals};
use crate::numbers::split_whole_minutes;
use crate::reputation::{
    ActionCatalog, ActionContext, ActionOutcome, EndingBranch, ReputationLedger,
    ReputationSnapshot,
};
use crate::rng::{CombatRng, RngState};
use crate::schedule::{self, Activity, EventOverride};
use crate::world::{PLAYER_ID, PlayerState, WorldState};

/// Something that happened during a tick or an entry point call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorldEvent {
    DayRollover {
        date: SimTime,
    },
    DailyDecay {
        legion: i32,
        community: i32,
        outsider: i32,
    },
    ActivityChanged {
        character_id: String,
        location_id: Option<String>,
    },
    OverrideSet {
        character_id: String,
        event_id: String,
    },
    OverrideCleared {
        character_id: String,
    },
    ActionRecorded {
        action_id: String,
        witnesses: usize,
    },
    CombatStarted {
        enemies: Vec<String>,
    },
    CombatEnded {
        reason: CombatEndReason,
    },
    Retreat {
        character_id: String,
    },
    ShotHit {
        target_id: String,
        body_part: BodyPart,
        damage: f32,
    },
    ShotMiss {
        target_id: String,
    },
    ShotMisfire,
    Reloaded,
    CharacterDied {
        character_id: String,
        killer_id: Option<String>,
    },
    PlayerDied,
    InfectionRisk {
        entity_id: String,
        wounds: usize,
    },
    EventTriggered {
        event_id: String,
    },
    EventCompleted {
        event_id: String,
    },
    AutosaveDue,
}

impl WorldEvent {
    /// Stable log key for the event.
    #[must_use]
    pub const fn log_key(&self) -> &'static str {
        match self {
            Self::DayRollover { .. } => LOG_DAY_ROLLOVER,
            Self::DailyDecay { .. } => LOG_DAILY_DECAY,
            Self::ActivityChanged { .. } => LOG_ACTIVITY_CHANGED,
            Self::OverrideSet { .. } => LOG_OVERRIDE_SET,
            Self::OverrideCleared { .. } => LOG_OVERRIDE_CLEARED,
            Self::ActionRecorded { .. } => LOG_ACTION_RECORDED,
            Self::CombatStarted { .. } => LOG_COMBAT_STARTED,
            Self::CombatEnded {
                reason: CombatEndReason::Timeout,
            } => LOG_COMBAT_TIMEOUT,
            Self::CombatEnded { .. } => LOG_COMBAT_ENDED,
            Self::Retreat { .. } => LOG_RETREAT,
            Self::ShotHit { .. } => LOG_SHOT_HIT,
            Self::ShotMiss { .. } => LOG_SHOT_MISS,
            Self::ShotMisfire => LOG_SHOT_MISFIRE,
            Self::Reloaded => LOG_RELOADED,
            Self::CharacterDied { .. } => LOG_CHARACTER_DIED,
            Self::PlayerDied => LOG_PLAYER_DIED,
            Self::InfectionRisk { .. } => LOG_INFECTION_RISK,
            Self::EventTriggered { .. } => LOG_EVENT_TRIGGERED,
            Self::EventCompleted { .. } => LOG_EVENT_COMPLETED,
            Self::AutosaveDue => LOG_AUTOSAVE,
        }
    }
}

/// Everything a tick changed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TickReport {
    pub minutes_advanced: u32,
    pub day_rollovers: u32,
    /// True when an open dialogue held the world still.
    pub paused: bool,
    pub events: Vec<WorldEvent>,
}

impl TickReport {
    #[must_use]
    pub fn log_keys(&self) -> Vec<&'static str> {
        self.events.iter().map(WorldEvent::log_key).collect()
    }
}

/// Result of one shot at a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotReport {
    pub target_id: String,
    pub resolution: ShotResolution,
    pub damage: Option<DamageReport>,
}

/// Combat at a glance for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatStatus {
    pub player_phase: CombatPhase,
    pub stance: Stance,
    pub accuracy: f32,
    pub ammo: u32,
    pub max_ammo: u32,
    pub reloading: bool,
    pub timer_secs: Option<f32>,
    /// Enemy id with its phase.
    pub enemies: Vec<(String, CombatPhase)>,
}

/// Action recorded when the player kills someone of a faction.
#[must_use]
pub const fn kill_action_for(faction: Faction) -> &'static str {
    match faction {
        Faction::Legion => "kill_legion_soldier",
        Faction::Community => "kill_civilian",
        Faction::Outsider => "kill_outsider",
        Faction::Neutral => "kill_stranger",
    }
}

#[derive(Debug, Clone)]
pub struct WorldCoordinator {
    state: WorldState,
    config: SimConfig,
    dialogues: DialogueLibrary,
    actions: ActionCatalog,
    rng: CombatRng,
    pending: Vec<WorldEvent>,
}

impl WorldCoordinator {
    /// Build a fresh world from validated content, placing everyone on their schedule.
    ///
    /// # Errors
    ///
    /// Returns a [`ContentError`] if the content or config is invalid.
    pub fn new(content: ContentBundle, config: SimConfig) -> Result<Self, ContentError> {
        config
            .validate()
            .map_err(|err| ContentError::Config(err.to_string()))?;
        content.validate()?;
        let dialogues = content.dialogue_library()?;
        let schedules = content.schedule_book();
        let rng = CombatRng::from_world_seed(config.seed);
        let state = WorldState {
            time: config.start,
            characters: content.characters,
            schedules,
            locations: content.locations,
            rng: rng.state(),
            ..WorldState::default()
        };
        let mut coordinator = Self {
            state,
            config,
            dialogues,
            actions: content.actions,
            rng,
            pending: Vec::new(),
        };
        coordinator.resolve_schedules();
        coordinator.pending.clear();
        Ok(coordinator)
    }

    /// Resume a saved world. Content supplies the immutable dialogue trees and action catalog.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if the snapshot violates an invariant or references
    /// dialogue content that no longer exists.
    pub fn from_snapshot(
        state: WorldState,
        content: &ContentBundle,
        config: SimConfig,
    ) -> Result<Self, SnapshotError> {
        state.validate()?;
        let dialogues = content
            .dialogue_library()
            .map_err(|err| SnapshotError::out_of_range("content.dialogues", err))?;
        if let Some(cursor) = &state.dialogue {
            let known = dialogues
                .tree(&cursor.tree_id)
                .is_some_and(|tree| tree.node(&cursor.node_id).is_some());
            if !known {
                return Err(SnapshotError::out_of_range(
                    "dialogue",
                    format!("{}/{}", cursor.tree_id, cursor.node_id),
                ));
            }
        }
        let rng = CombatRng::restore(state.rng);
        Ok(Self {
            state,
            config,
            dialogues,
            actions: content.actions.clone(),
            rng,
            pending: Vec::new(),
        })
    }

    /// Copy of the live world suitable for persisting.
    #[must_use]
    pub fn snapshot(&self) -> WorldState {
        let mut state = self.state.clone();
        state.rng = self.rng.state();
        state
    }

    #[must_use]
    pub const fn state(&self) -> &WorldState {
        &self.state
    }

    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    #[must_use]
    pub const fn dialogues(&self) -> &DialogueLibrary {
        &self.dialogues
    }

    #[must_use]
    pub const fn actions(&self) -> &ActionCatalog {
        &self.actions
    }

    #[must_use]
    pub const fn rng_state(&self) -> RngState {
        self.rng.state()
    }

    /// Take events produced by entry points since the last tick.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.pending)
    }

    fn emit(&mut self, event: WorldEvent) {
        log::debug!("{}: {:?}", event.log_key(), event);
        self.pending.push(event);
    }

    // Simulation step -------------------------------------------------------

    /// Advance the world by `delta_seconds` of real time.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidState`] for a non-positive or non-finite delta, or one whose
    /// scaled length overflows the clock.
    pub fn tick(&mut self, delta_seconds: f32) -> SimResult<TickReport> {
        if !delta_seconds.is_finite() || delta_seconds <= 0.0 {
            return Err(SimError::invalid_state(format!(
                "tick delta must be positive (got {delta_seconds})"
            )));
        }
        if self.state.dialogue.is_some() {
            return Ok(TickReport {
                paused: true,
                events: self.drain_events(),
                ..TickReport::default()
            });
        }

        let scaled =
            f64::from(delta_seconds) * f64::from(self.config.time_scale) + self.state.minute_carry;
        if !scaled.is_finite() || scaled >= f64::from(u32::MAX) {
            return Err(SimError::invalid_state(format!(
                "tick of {delta_seconds}s spans too many game minutes"
            )));
        }
        let (minutes, carry) = split_whole_minutes(scaled);
        self.state.minute_carry = carry;

        let day_rollovers = self.advance_clock(minutes);
        self.resolve_schedules();
        self.update_combat_and_injuries(delta_seconds);

        Ok(TickReport {
            minutes_advanced: minutes,
            day_rollovers,
            paused: false,
            events: self.drain_events(),
        })
    }

    /// Skip simulated time without a real-time step: no bleeding or combat timers run.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidState`] for zero or negative minutes or while a dialogue or
    /// combat is in progress.
    pub fn advance_time(&mut self, minutes: i64) -> SimResult<TickReport> {
        let minutes = u32::try_from(minutes)
            .ok()
            .filter(|m| *m > 0)
            .ok_or_else(|| {
                SimError::invalid_state(format!("cannot advance time by {minutes} minutes"))
            })?;
        if self.state.dialogue.is_some() {
            return Err(SimError::invalid_state("time cannot pass during a dialogue"));
        }
        if self.state.combat.is_some() {
            return Err(SimError::invalid_state("time cannot be skipped during combat"));
        }
        let day_rollovers = self.advance_clock(minutes);
        self.resolve_schedules();
        Ok(TickReport {
            minutes_advanced: minutes,
            day_rollovers,
            paused: false,
            events: self.drain_events(),
        })
    }

    fn advance_clock(&mut self, minutes: u32) -> u32 {
        let rollovers = self.state.time.advance(minutes);
        for _ in 0..rollovers {
            self.state.reputation.apply_daily_decay(&self.config.decay);
            let rep = &self.state.reputation;
            let decay = WorldEvent::DailyDecay {
                legion: rep.legion(),
                community: rep.community(),
                outsider: rep.outsider(),
            };
            self.emit(decay);
        }
        if rollovers > 0 {
            self.state.days_elapsed = self.state.days_elapsed.saturating_add(u64::from(rollovers));
            log::info!("{LOG_DAY_ROLLOVER}: {} ({rollovers} rollover(s))", self.state.time);
            self.emit(WorldEvent::DayRollover {
                date: self.state.time,
            });
            if self.config.autosave {
                self.emit(WorldEvent::AutosaveDue);
            }
        }
        rollovers
    }

    fn resolve_schedules(&mut self) {
        let changes = schedule::update_all(
            &self.state.schedules,
            &self.state.time,
            &mut self.state.characters,
        );
        for change in changes {
            let location_id = change.current.map(|activity| activity.location_id);
            if let Some(position) = location_id
                .as_ref()
                .and_then(|location| self.state.locations.get(location))
                .copied()
                && let Some(character) = self.state.character_mut(&change.character_id)
            {
                character.position = position;
            }
            self.emit(WorldEvent::ActivityChanged {
                character_id: change.character_id,
                location_id,
            });
        }
    }

    fn update_combat_and_injuries(&mut self, dt: f32) {
        let now = self.state.time;
        let threshold = self.config.retreat_threshold;
        let window = self.config.infection_window_minutes;

        // Retreat is judged on health before this tick's bleeding.
        let mut retreating = Vec::new();
        for character in &mut self.state.characters {
            if should_retreat(character.combat, &character.vitals, threshold) {
                character.combat = CombatPhase::Retreating;
                retreating.push(character.id.clone());
            }
        }
        for character_id in retreating {
            self.emit(WorldEvent::Retreat { character_id });
        }

        if self.state.player.weapon.tick_reload(dt) {
            self.emit(WorldEvent::Reloaded);
        }

        let mut deaths = Vec::new();
        let mut infections = Vec::new();
        for character in self.state.characters.iter_mut().filter(|c| c.is_alive()) {
            let outcome = injury::update_health(&mut character.vitals, dt, now, window);
            if outcome.newly_infected > 0 {
                infections.push((character.id.clone(), outcome.newly_infected));
            }
            if outcome.died {
                deaths.push((character.id.clone(), last_attacker(&character.vitals)));
            }
        }
        let player_outcome = injury::update_health(&mut self.state.player.vitals, dt, now, window);
        if player_outcome.newly_infected > 0 {
            infections.push((PLAYER_ID.to_string(), player_outcome.newly_infected));
        }

        for (entity_id, wounds) in infections {
            log::warn!("{LOG_INFECTION_RISK}: {entity_id} has {wounds} festering wound(s)");
            self.emit(WorldEvent::InfectionRisk { entity_id, wounds });
        }
        for (character_id, killer) in deaths {
            self.settle_character_death(&character_id, killer.as_deref());
        }
        if player_outcome.died {
            self.settle_player_death();
        }

        self.update_combat_session(dt);
    }

    fn update_combat_session(&mut self, dt: f32) {
        let Some(session) = self.state.combat.as_mut() else {
            return;
        };
        let timed_out = session.tick(dt);
        let enemies = session.enemies.clone();
        let any_fighting = enemies.iter().any(|id| {
            self.state
                .character(id)
                .is_some_and(|character| character.combat == CombatPhase::InCombat)
        });
        if !any_fighting {
            self.close_combat(CombatEndReason::NoEnemies);
        } else if timed_out {
            self.close_combat(CombatEndReason::Timeout);
        }
    }

    // Death -----------------------------------------------------------------

    fn settle_character_death(&mut self, character_id: &str, killer_id: Option<&str>) {
        let Some(character) = self.state.character_mut(character_id) else {
            return;
        };
        character.combat = CombatPhase::Dead;
        character.current_activity = None;
        let faction = character.faction;
        let position = character.position;
        log::info!("{LOG_CHARACTER_DIED}: {character_id} (killer: {killer_id:?})");

        if killer_id == Some(PLAYER_ID) {
            let action_id = kill_action_for(faction);
            let witnesses: Vec<(String, Faction)> = self
                .state
                .witnesses_near(&self.state.player.position, self.config.witness_radius)
                .into_iter()
                .filter(|(id, _)| id != character_id)
                .collect();
            let ctx = ActionContext {
                timestamp: self.state.time,
                location: position,
                witnesses: &witnesses,
            };
            match self
                .state
                .reputation
                .record_action(&self.actions, action_id, &ctx)
            {
                Ok(outcome) => self.emit(WorldEvent::ActionRecorded {
                    action_id: outcome.action_id,
                    witnesses: outcome.witnesses,
                }),
                Err(err) => log::warn!("{LOG_CHARACTER_DIED}: no reputation consequence ({err})"),
            }
        }

        self.emit(WorldEvent::CharacterDied {
            character_id: character_id.to_string(),
            killer_id: killer_id.map(str::to_string),
        });
    }

    fn settle_player_death(&mut self) {
        self.state.player.combat = CombatPhase::Dead;
        log::warn!("{LOG_PLAYER_DIED}: the player has died at {}", self.state.time);
        self.emit(WorldEvent::PlayerDied);
        if self.state.combat.is_some() {
            self.close_combat(CombatEndReason::PlayerDied);
        }
    }

    fn close_combat(&mut self, reason: CombatEndReason) {
        let Some(session) = self.state.combat.take() else {
            return;
        };
        for enemy in &session.enemies {
            if let Some(character) = self.state.character_mut(enemy)
                && matches!(
                    character.combat,
                    CombatPhase::InCombat | CombatPhase::Retreating
                )
            {
                character.combat = CombatPhase::Idle;
            }
        }
        if self.state.player.combat != CombatPhase::Dead {
            self.state.player.combat = CombatPhase::Idle;
        }
        log::info!(
            "{}: {} after {:.1}s",
            if reason == CombatEndReason::Timeout {
                LOG_COMBAT_TIMEOUT
            } else {
                LOG_COMBAT_ENDED
            },
            reason.as_str(),
            session.elapsed_secs
        );
        self.emit(WorldEvent::CombatEnded { reason });
    }

    // Reputation and events -------------------------------------------------

    /// Record a player action witnessed by everyone alive near the player.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NotFound`] for an unknown action id; nothing changes.
    pub fn record_action(&mut self, action_id: &str) -> SimResult<ActionOutcome> {
        let outcome = record_player_action(
            &mut self.state,
            &self.actions,
            self.config.witness_radius,
            action_id,
        )?;
        self.emit(WorldEvent::ActionRecorded {
            action_id: outcome.action_id.clone(),
            witnesses: outcome.witnesses,
        });
        Ok(outcome)
    }

    /// Mark an external event active. Returns false when it was already active.
    pub fn trigger_event(&mut self, event_id: &str) -> bool {
        let newly = self.state.active_events.insert(event_id.to_string());
        if newly {
            self.emit(WorldEvent::EventTriggered {
                event_id: event_id.to_string(),
            });
        }
        newly
    }

    /// Finish an active event and lift every schedule override it installed.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NotFound`] when the event is not active.
    pub fn complete_event(&mut self, event_id: &str) -> SimResult<()> {
        if !self.state.active_events.remove(event_id) {
            return Err(SimError::not_found(EntityKind::Event, event_id));
        }
        self.state.completed_events.insert(event_id.to_string());
        self.emit(WorldEvent::EventCompleted {
            event_id: event_id.to_string(),
        });
        for character_id in self.state.schedules.clear_overrides_for_event(event_id) {
            self.emit(WorldEvent::OverrideCleared { character_id });
        }
        self.resolve_schedules();
        Ok(())
    }

    /// Install an event override for a character; it governs their schedule immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NotFound`] for an unknown character and
    /// [`SimError::InvalidState`] when the activity list is malformed.
    pub fn set_event_override(
        &mut self,
        character_id: &str,
        event_id: &str,
        activities: Vec<Activity>,
    ) -> SimResult<()> {
        if self.state.character(character_id).is_none() {
            return Err(SimError::not_found(EntityKind::Character, character_id));
        }
        let probe = schedule::Schedule::new(character_id, activities);
        probe
            .validate()
            .map_err(|err| SimError::invalid_state(err.to_string()))?;
        self.state.schedules.set_event_override(
            character_id,
            EventOverride {
                event_id: event_id.to_string(),
                activities: probe.daily_routine,
            },
        );
        self.emit(WorldEvent::OverrideSet {
            character_id: character_id.to_string(),
            event_id: event_id.to_string(),
        });
        self.resolve_schedules();
        Ok(())
    }

    /// Remove a character's event override.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NotFound`] for an unknown character and
    /// [`SimError::InvalidState`] when no override is installed.
    pub fn clear_event_override(&mut self, character_id: &str) -> SimResult<()> {
        if self.state.character(character_id).is_none() {
            return Err(SimError::not_found(EntityKind::Character, character_id));
        }
        if self
            .state
            .schedules
            .clear_event_override(character_id)
            .is_none()
        {
            return Err(SimError::invalid_state(format!(
                "{character_id} has no event override"
            )));
        }
        self.emit(WorldEvent::OverrideCleared {
            character_id: character_id.to_string(),
        });
        self.resolve_schedules();
        Ok(())
    }

    // Dialogue --------------------------------------------------------------

    /// Open the dialogue registered for a character.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NotFound`] for an unknown character or one without dialogue, and
    /// [`SimError::InvalidState`] if a dialogue or combat is already running or the character
    /// is dead.
    pub fn start_dialogue(&mut self, character_id: &str) -> SimResult<DialogueView> {
        if self.state.dialogue.is_some() {
            return Err(SimError::invalid_state("a dialogue is already open"));
        }
        if self.state.combat.is_some() {
            return Err(SimError::invalid_state("cannot talk during combat"));
        }
        let character = self
            .state
            .character(character_id)
            .ok_or_else(|| SimError::not_found(EntityKind::Character, character_id))?;
        if !character.is_alive() {
            return Err(SimError::invalid_state(format!("{character_id} is dead")));
        }
        let mut gate = self.gate();
        let cursor = dialogue::start_dialogue(gate.library, character_id, &mut gate)?;
        let events = gate.events;
        self.finish_dialogue_step(cursor, events)
    }

    /// Move past the current speech node.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidState`] when no dialogue is open or the node is not speech.
    pub fn continue_dialogue(&mut self) -> SimResult<DialogueView> {
        let cursor = self.open_cursor()?;
        let mut gate = self.gate();
        let next = dialogue::continue_dialogue(gate.library, &cursor, &mut gate)?;
        let events = gate.events;
        self.finish_dialogue_step(next, events)
    }

    /// Choose option `index` of the current choice node.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidIndex`] or [`SimError::InvalidState`] with nothing changed.
    pub fn select_choice(&mut self, index: usize) -> SimResult<DialogueView> {
        let cursor = self.open_cursor()?;
        let mut gate = self.gate();
        let next = dialogue::select_choice(gate.library, &cursor, index, &mut gate)?;
        let events = gate.events;
        self.finish_dialogue_step(next, events)
    }

    /// Close the open dialogue.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidState`] when no dialogue is open.
    pub fn end_dialogue(&mut self) -> SimResult<()> {
        self.state
            .dialogue
            .take()
            .map(|_| ())
            .ok_or_else(|| SimError::invalid_state("no dialogue is open"))
    }

    /// What the player currently sees, if a dialogue is open.
    #[must_use]
    pub fn dialogue_view(&self) -> Option<DialogueView> {
        let cursor = self.state.dialogue.as_ref()?;
        dialogue::view(&self.dialogues, cursor, &LedgerView(&self.state)).ok()
    }

    /// Selectable options at the current node, with their original indices.
    #[must_use]
    pub fn available_choices(&self) -> Vec<(usize, DialogueOption)> {
        self.state.dialogue.as_ref().map_or_else(Vec::new, |cursor| {
            dialogue::available_choices(&self.dialogues, cursor, &LedgerView(&self.state))
        })
    }

    fn open_cursor(&self) -> SimResult<dialogue::DialogueCursor> {
        self.state
            .dialogue
            .clone()
            .ok_or_else(|| SimError::invalid_state("no dialogue is open"))
    }

    fn gate(&mut self) -> GateWorld<'_> {
        GateWorld {
            state: &mut self.state,
            library: &self.dialogues,
            actions: &self.actions,
            witness_radius: self.config.witness_radius,
            events: Vec::new(),
        }
    }

    fn finish_dialogue_step(
        &mut self,
        cursor: Option<dialogue::DialogueCursor>,
        events: Vec<WorldEvent>,
    ) -> SimResult<DialogueView> {
        for event in events {
            self.emit(event);
        }
        self.state.dialogue = cursor;
        Ok(self.dialogue_view().unwrap_or(DialogueView::Ended))
    }

    // Combat ----------------------------------------------------------------

    /// Engage the listed characters.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NotFound`] for unknown ids and [`SimError::InvalidState`] when
    /// combat or dialogue is already running, the list is empty, or anyone involved is dead.
    pub fn start_combat(&mut self, enemy_ids: &[&str]) -> SimResult<()> {
        if self.state.combat.is_some() {
            return Err(SimError::invalid_state("combat already in progress"));
        }
        if self.state.dialogue.is_some() {
            return Err(SimError::invalid_state("cannot fight during a dialogue"));
        }
        if enemy_ids.is_empty() {
            return Err(SimError::invalid_state("combat needs at least one enemy"));
        }
        if !self.state.player.vitals.alive {
            return Err(SimError::invalid_state("the player is dead"));
        }
        for id in enemy_ids {
            let character = self
                .state
                .character(id)
                .ok_or_else(|| SimError::not_found(EntityKind::Character, *id))?;
            if !character.is_alive() {
                return Err(SimError::invalid_state(format!("{id} is dead")));
            }
        }

        let mut enemies = EnemyList::new();
        for id in enemy_ids {
            if enemies.iter().any(|existing| existing == id) {
                continue;
            }
            if let Some(character) = self.state.character_mut(id) {
                character.combat = CombatPhase::InCombat;
            }
            enemies.push((*id).to_string());
        }
        self.state.player.combat = CombatPhase::InCombat;
        log::info!("{LOG_COMBAT_STARTED}: {enemies:?}");
        self.emit(WorldEvent::CombatStarted {
            enemies: enemies.to_vec(),
        });
        self.state.combat = Some(CombatSession::new(enemies, self.config.combat_timeout_secs));
        Ok(())
    }

    /// End the current engagement.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidState`] when no combat is running.
    pub fn end_combat(&mut self) -> SimResult<()> {
        if self.state.combat.is_none() {
            return Err(SimError::invalid_state("no combat in progress"));
        }
        self.close_combat(CombatEndReason::Ended);
        Ok(())
    }

    /// Fire the player's weapon at an enemy in the current engagement.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidState`] outside combat, against someone not in the
    /// engagement or already dead, or while the weapon is empty or reloading.
    pub fn fire_at(&mut self, target_id: &str) -> SimResult<ShotReport> {
        let session = self
            .state
            .combat
            .as_ref()
            .ok_or_else(|| SimError::invalid_state("no combat in progress"))?;
        if !session.involves(target_id) {
            return Err(SimError::invalid_state(format!(
                "{target_id} is not part of this engagement"
            )));
        }
        if !self.state.player.vitals.alive {
            return Err(SimError::invalid_state("the player is dead"));
        }
        let target = self
            .state
            .character(target_id)
            .ok_or_else(|| SimError::not_found(EntityKind::Character, target_id))?;
        if !target.is_alive() {
            return Err(SimError::invalid_state(format!("{target_id} is already dead")));
        }
        if let Some(reason) = self.state.player.weapon.fire_blocker() {
            return Err(SimError::invalid_state(reason));
        }

        let rolls = ShotRolls {
            misfire: self.rng.roll(),
            hit: self.rng.roll(),
            body_part: self.rng.roll(),
        };
        self.state.rng = self.rng.state();
        let player = &mut self.state.player;
        let resolution = resolve_shot(
            &player.weapon,
            player.stance,
            player.stamina_fraction(),
            rolls,
        );
        if player.weapon.kind.is_firearm() {
            player.weapon.ammo = player.weapon.ammo.saturating_sub(1);
        }
        let stamina_cost = player.weapon.stamina_cost;
        player.spend_stamina(stamina_cost);
        let injury_kind = player.weapon.kind.injury_kind();

        let damage = match resolution {
            ShotResolution::Misfire => {
                self.emit(WorldEvent::ShotMisfire);
                None
            }
            ShotResolution::Miss { .. } => {
                self.emit(WorldEvent::ShotMiss {
                    target_id: target_id.to_string(),
                });
                None
            }
            ShotResolution::Hit {
                body_part, damage, ..
            } => {
                self.emit(WorldEvent::ShotHit {
                    target_id: target_id.to_string(),
                    body_part,
                    damage,
                });
                Some(self.damage_character(
                    target_id,
                    damage,
                    body_part,
                    Some(PLAYER_ID),
                    injury_kind,
                )?)
            }
        };

        Ok(ShotReport {
            target_id: target_id.to_string(),
            resolution,
            damage,
        })
    }

    /// Start reloading the player's weapon; the tick completes it.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidState`] if the weapon cannot be reloaded now.
    pub fn reload(&mut self) -> SimResult<()> {
        self.state.player.weapon.start_reload()
    }

    pub fn set_stance(&mut self, stance: Stance) {
        self.state.player.stance = stance;
    }

    pub fn set_player_position(&mut self, position: Position) {
        self.state.player.position = position;
    }

    // Injury ----------------------------------------------------------------

    /// Damage the player (`"player"`) or a character.
    ///
    /// Without an explicit `kind`, the wound type follows the attacker's weapon when the
    /// attacker is the player, and is a bruise otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NotFound`] for an unknown target and [`SimError::InvalidState`] for
    /// a dead target or an invalid amount.
    pub fn apply_damage(
        &mut self,
        target_id: &str,
        amount: f32,
        body_part: BodyPart,
        attacker_id: Option<&str>,
        kind: Option<InjuryKind>,
    ) -> SimResult<DamageReport> {
        let kind = kind.unwrap_or_else(|| {
            if attacker_id == Some(PLAYER_ID) {
                self.state.player.weapon.kind.injury_kind()
            } else {
                InjuryKind::Bruise
            }
        });
        if target_id == PLAYER_ID {
            let report = injury::apply_damage(
                &mut self.state.player.vitals,
                amount,
                body_part,
                kind,
                attacker_id,
                self.state.time,
                &self.config.bleed,
            )?;
            if report.killed {
                self.settle_player_death();
            }
            return Ok(report);
        }
        self.damage_character(target_id, amount, body_part, attacker_id, kind)
    }

    fn damage_character(
        &mut self,
        target_id: &str,
        amount: f32,
        body_part: BodyPart,
        attacker_id: Option<&str>,
        kind: InjuryKind,
    ) -> SimResult<DamageReport> {
        let now = self.state.time;
        let character = self
            .state
            .character_mut(target_id)
            .ok_or_else(|| SimError::not_found(EntityKind::Character, target_id))?;
        let report = injury::apply_damage(
            &mut character.vitals,
            amount,
            body_part,
            kind,
            attacker_id,
            now,
            &self.config.bleed,
        )?;
        if report.killed {
            self.settle_character_death(target_id, attacker_id);
        }
        Ok(report)
    }

    /// Treat one of an entity's wounds.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NotFound`] for an unknown entity and [`SimError::InvalidIndex`] for
    /// an index outside its injury list.
    pub fn treat_injury(&mut self, entity_id: &str, index: usize) -> SimResult<()> {
        let vitals = self.vitals_mut(entity_id)?;
        injury::treat_injury(vitals, index)
    }

    fn vitals_mut(&mut self, entity_id: &str) -> SimResult<&mut Vitals> {
        if entity_id == PLAYER_ID {
            return Ok(&mut self.state.player.vitals);
        }
        self.state
            .character_mut(entity_id)
            .map(|character| &mut character.vitals)
            .ok_or_else(|| SimError::not_found(EntityKind::Character, entity_id))
    }

    // Queries ---------------------------------------------------------------

    #[must_use]
    pub const fn time(&self) -> SimTime {
        self.state.time
    }

    #[must_use]
    pub const fn season(&self) -> Season {
        self.state.time.season()
    }

    #[must_use]
    pub fn character(&self, id: &str) -> Option<&Character> {
        self.state.character(id)
    }

    #[must_use]
    pub const fn player(&self) -> &PlayerState {
        &self.state.player
    }

    #[must_use]
    pub const fn ledger(&self) -> &ReputationLedger {
        &self.state.reputation
    }

    /// Current activity of a character.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NotFound`] for an unknown character.
    pub fn activity_of(&self, character_id: &str) -> SimResult<Option<&Activity>> {
        self.state
            .character(character_id)
            .map(|character| character.current_activity.as_ref())
            .ok_or_else(|| SimError::not_found(EntityKind::Character, character_id))
    }

    /// Current location of a character.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NotFound`] for an unknown character.
    pub fn location_of(&self, character_id: &str) -> SimResult<Option<&str>> {
        self.state
            .character(character_id)
            .map(Character::location_id)
            .ok_or_else(|| SimError::not_found(EntityKind::Character, character_id))
    }

    #[must_use]
    pub fn characters_at(&self, location_id: &str) -> Vec<String> {
        schedule::characters_at(
            &self.state.schedules,
            location_id,
            &self.state.time,
            &self.state.characters,
        )
    }

    #[must_use]
    pub fn reputation(&self) -> ReputationSnapshot {
        self.state.reputation.snapshot()
    }

    #[must_use]
    pub const fn ending_branch(&self) -> EndingBranch {
        self.state.reputation.determine_ending_branch()
    }

    #[must_use]
    pub fn trust(&self, character_id: &str) -> i32 {
        self.state.reputation.trust(character_id)
    }

    #[must_use]
    pub fn combat_status(&self) -> CombatStatus {
        let player = &self.state.player;
        let enemies = self
            .state
            .combat
            .as_ref()
            .map(|session| {
                session
                    .enemies
                    .iter()
                    .map(|id| {
                        let phase = self
                            .state
                            .character(id)
                            .map_or(CombatPhase::Dead, |character| character.combat);
                        (id.clone(), phase)
                    })
                    .collect()
            })
            .unwrap_or_default();
        CombatStatus {
            player_phase: player.combat,
            stance: player.stance,
            accuracy: crate::combat::calculate_accuracy(player.stance, player.stamina_fraction()),
            ammo: player.weapon.ammo,
            max_ammo: player.weapon.max_ammo,
            reloading: player.weapon.is_reloading(),
            timer_secs: self.state.combat.as_ref().map(|session| session.timer_secs),
            enemies,
        }
    }
}

fn last_attacker(vitals: &Vitals) -> Option<String> {
    vitals
        .injuries
        .iter()
        .rev()
        .find_map(|injury| injury.attacker_id.clone())
}

fn record_player_action(
    state: &mut WorldState,
    actions: &ActionCatalog,
    witness_radius: f32,
    action_id: &str,
) -> SimResult<ActionOutcome> {
    let witnesses = state.witnesses_near(&state.player.position, witness_radius);
    let ctx = ActionContext {
        timestamp: state.time,
        location: state.player.position,
        witnesses: &witnesses,
    };
    let outcome = state.reputation.record_action(actions, action_id, &ctx)?;
    log::info!(
        "{LOG_ACTION_RECORDED}: {action_id} seen by {} (legion {}, community {}, outsider {})",
        outcome.witnesses,
        outcome.legion,
        outcome.community,
        outcome.outsider
    );
    Ok(outcome)
}

/// Read-only view used for gating queries.
struct LedgerView<'a>(&'a WorldState);

impl DialogueWorld for LedgerView<'_> {
    fn faction(&self, faction: Faction) -> i32 {
        self.0.reputation.faction(faction).unwrap_or(0)
    }

    fn trust(&self, character_id: &str) -> i32 {
        self.0.reputation.trust(character_id)
    }

    fn integrity(&self) -> i32 {
        self.0.reputation.integrity()
    }

    fn event_active(&self, event_id: &str) -> bool {
        self.0.active_events.contains(event_id)
    }

    fn apply_deltas(&mut self, _option: &DialogueOption, _character_id: &str) {}

    fn apply_effect(&mut self, _effect: &NodeEffect, _character_id: &str) -> SimResult<()> {
        Err(SimError::invalid_state("read-only dialogue view"))
    }
}

/// Mutable bridge from the dialogue gate into the world.
struct GateWorld<'a> {
    state: &'a mut WorldState,
    library: &'a DialogueLibrary,
    actions: &'a ActionCatalog,
    witness_radius: f32,
    events: Vec<WorldEvent>,
}

impl DialogueWorld for GateWorld<'_> {
    fn faction(&self, faction: Faction) -> i32 {
        self.state.reputation.faction(faction).unwrap_or(0)
    }

    fn trust(&self, character_id: &str) -> i32 {
        self.state.reputation.trust(character_id)
    }

    fn integrity(&self) -> i32 {
        self.state.reputation.integrity()
    }

    fn event_active(&self, event_id: &str) -> bool {
        self.state.active_events.contains(event_id)
    }

    fn apply_deltas(&mut self, option: &DialogueOption, character_id: &str) {
        self.state.reputation.apply_faction_deltas(
            option.legion_delta,
            option.community_delta,
            option.outsider_delta,
        );
        if option.trust_delta != 0 {
            self.state
                .reputation
                .modify_trust(character_id, option.trust_delta);
        }
    }

    fn apply_effect(&mut self, effect: &NodeEffect, character_id: &str) -> SimResult<()> {
        match effect {
            NodeEffect::RecordAction { action_id } => {
                let outcome =
                    record_player_action(self.state, self.actions, self.witness_radius, action_id)?;
                self.events.push(WorldEvent::ActionRecorded {
                    action_id: outcome.action_id,
                    witnesses: outcome.witnesses,
                });
            }
            NodeEffect::ModifyTrust { delta } => {
                self.state.reputation.modify_trust(character_id, *delta);
            }
            NodeEffect::TriggerEvent { event_id } => {
                if self.state.active_events.insert(event_id.clone()) {
                    self.events.push(WorldEvent::EventTriggered {
                        event_id: event_id.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
