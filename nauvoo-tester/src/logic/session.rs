use anyhow::{Context, Result};
use colored::Colorize;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use nauvoo_core::{
    CombatPhase, ContentBundle, ContentError, ContentLoader, DialogueView, GameEngine,
    MemoryStorage, ShotResolution, SimConfig, WorldCoordinator, WorldEvent, WorldState,
};

pub const DEFAULT_SESSION_MINUTES: u32 = 3 * 24 * 60;
const MAX_STEPS: usize = 5_000;
const MAX_DIALOGUE_STEPS: usize = 16;
const MAX_COMBAT_ROUNDS: usize = 40;
const DIALOGUE_PARTNERS: [&str; 2] = ["npc_captain_isaiah_marks", "npc_elder_joseph"];
const REPLAY_SLOT: &str = "replay-check";
const DECISION_LOG_LIMIT: usize = 32;

/// Content loader that stamps the session seed and clock speed into the config.
#[derive(Debug, Clone, Copy)]
pub struct SeededLoader {
    seed: u64,
    time_scale: f32,
}

impl SeededLoader {
    #[must_use]
    pub const fn new(seed: u64, time_scale: f32) -> Self {
        Self { seed, time_scale }
    }
}

impl ContentLoader for SeededLoader {
    type Error = ContentError;

    fn load_content(&self) -> Result<ContentBundle, Self::Error> {
        ContentBundle::load_from_static()
    }

    fn load_config(&self) -> Result<SimConfig, Self::Error> {
        Ok(SimConfig {
            seed: self.seed,
            time_scale: self.time_scale,
            ..SimConfig::default()
        })
    }
}

/// How a scripted player spends their time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStrategy {
    /// Lets the day run without intervening.
    Idle,
    /// Helps out and talks to people.
    Diplomat,
    /// Drills, enforces and picks fights.
    Soldier,
    /// Anything goes.
    Chaotic,
}

impl SessionStrategy {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Diplomat => "diplomat",
            Self::Soldier => "soldier",
            Self::Chaotic => "chaotic",
        }
    }

    /// Weights for wait, act, talk and fight.
    const fn weights(self) -> [u32; 4] {
        match self {
            Self::Idle => [1, 0, 0, 0],
            Self::Diplomat => [4, 3, 3, 0],
            Self::Soldier => [4, 3, 1, 2],
            Self::Chaotic => [3, 3, 2, 2],
        }
    }

    const fn action_pool(self) -> &'static [&'static str] {
        match self {
            Self::Idle => &[],
            Self::Diplomat => &["help_with_task", "show_mercy_to_enemy", "skip_drill"],
            Self::Soldier => &["attend_drill", "enforce_curfew_harshly", "refuse_order"],
            Self::Chaotic => &[
                "help_with_task",
                "attend_drill",
                "skip_drill",
                "enforce_curfew_harshly",
                "show_mercy_to_enemy",
                "refuse_order",
                "kill_stranger",
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepKind {
    Wait,
    Act,
    Talk,
    Fight,
}

impl StepKind {
    fn pick(strategy: SessionStrategy, rng: &mut ChaCha20Rng) -> Self {
        let weights = strategy.weights();
        let total: u32 = weights.iter().sum();
        let mut roll = rng.gen_range(0..total.max(1));
        for (kind, weight) in [Self::Wait, Self::Act, Self::Talk, Self::Fight]
            .into_iter()
            .zip(weights)
        {
            if roll < weight {
                return kind;
            }
            roll -= weight;
        }
        Self::Wait
    }
}

/// A scripted session and the checks its result must pass.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub strategy: SessionStrategy,
    /// Simulated minutes the session runs for.
    pub minutes: u32,
    pub time_scale: f32,
    /// Save, reload and replay the same continuation on both worlds.
    pub replay_check: bool,
    /// Run the whole session a second time and compare.
    pub repeat_check: bool,
    pub expectations: Vec<SessionExpectation>,
}

impl SessionPlan {
    #[must_use]
    pub fn new(strategy: SessionStrategy) -> Self {
        Self {
            strategy,
            minutes: DEFAULT_SESSION_MINUTES,
            time_scale: 10.0,
            replay_check: false,
            repeat_check: false,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_minutes(mut self, minutes: u32) -> Self {
        self.minutes = minutes;
        self
    }

    #[must_use]
    pub const fn with_replay_check(mut self) -> Self {
        self.replay_check = true;
        self
    }

    #[must_use]
    pub const fn with_repeat_check(mut self) -> Self {
        self.repeat_check = true;
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<SessionExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }
}

/// Assertion hook run after a session completes.
type SessionExpectationFn = Arc<dyn Fn(&SessionSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct SessionExpectation(SessionExpectationFn);

impl std::fmt::Debug for SessionExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionExpectation").finish()
    }
}

impl SessionExpectation {
    /// # Errors
    ///
    /// Returns the expectation's failure.
    pub fn evaluate(&self, summary: &SessionSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for SessionExpectation
where
    F: Fn(&SessionSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// Counters gathered while a session runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub steps: usize,
    pub ticks: usize,
    pub minutes_advanced: u64,
    pub day_rollovers: u32,
    pub paused_ticks: usize,
    /// Ticks whose paused flag disagreed with the open dialogue.
    pub pause_violations: usize,
    pub actions_recorded: usize,
    pub dialogues_opened: usize,
    pub choices_made: usize,
    /// Choices offered that the live reputation should have locked.
    pub locked_choices_offered: usize,
    pub combats_started: usize,
    pub shots: usize,
    pub hits: usize,
    pub misfires: usize,
    pub kills: usize,
    pub player_died: bool,
    pub autosaves: usize,
    /// Most recent decisions, newest last.
    pub decision_log: Vec<String>,
}

impl SessionMetrics {
    fn log(&mut self, entry: String) {
        if self.decision_log.len() == DECISION_LOG_LIMIT {
            self.decision_log.remove(0);
        }
        self.decision_log.push(entry);
    }
}

/// Complete record of a session run.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub seed: u64,
    pub strategy: SessionStrategy,
    pub metrics: SessionMetrics,
    pub events: Vec<WorldEvent>,
    pub final_state: WorldState,
    /// Set when the plan asked for a save/load replay.
    pub replay_matches: Option<bool>,
    /// Set when the plan asked for a second identical run.
    pub repeat_matches: Option<bool>,
}

impl SessionSummary {
    #[must_use]
    pub fn count_events(&self, predicate: impl Fn(&WorldEvent) -> bool) -> usize {
        self.events.iter().filter(|event| predicate(event)).count()
    }
}

/// Drives worlds through scripted sessions.
#[derive(Debug, Clone, Copy)]
pub struct WorldTester {
    verbose: bool,
}

impl WorldTester {
    #[must_use]
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Run `plan` once for `seed`, plus whatever follow-up checks the plan asks for.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine refuses a call the script considers legal.
    pub fn run_plan(&self, plan: &SessionPlan, seed: u64) -> Result<SessionSummary> {
        let engine = GameEngine::new(
            SeededLoader::new(seed, plan.time_scale),
            MemoryStorage::new(),
        );
        let mut world = engine.new_world().context("creating world")?;
        let mut session = Session {
            engine: &engine,
            rng: ChaCha20Rng::seed_from_u64(seed),
            metrics: SessionMetrics::default(),
            events: world.drain_events(),
            verbose: self.verbose,
        };
        session.run(&mut world, plan)?;
        session.events.extend(world.drain_events());
        session.metrics.kills = session
            .events
            .iter()
            .filter(|event| matches!(event, WorldEvent::CharacterDied { .. }))
            .count();
        session.metrics.player_died = session.events.contains(&WorldEvent::PlayerDied);

        let replay_matches = if plan.replay_check {
            Some(replay_check(&engine, &mut world, seed)?)
        } else {
            None
        };

        let mut summary = SessionSummary {
            seed,
            strategy: plan.strategy,
            metrics: session.metrics,
            events: session.events,
            final_state: world.snapshot(),
            replay_matches,
            repeat_matches: None,
        };

        if plan.repeat_check {
            let rerun = SessionPlan {
                repeat_check: false,
                expectations: Vec::new(),
                ..plan.clone()
            };
            let second = self.run_plan(&rerun, seed)?;
            summary.repeat_matches = Some(
                second.final_state == summary.final_state && second.events == summary.events,
            );
        }

        Ok(summary)
    }
}

struct Session<'a> {
    engine: &'a GameEngine<SeededLoader, MemoryStorage>,
    rng: ChaCha20Rng,
    metrics: SessionMetrics,
    events: Vec<WorldEvent>,
    verbose: bool,
}

impl Session<'_> {
    fn run(&mut self, world: &mut WorldCoordinator, plan: &SessionPlan) -> Result<()> {
        while self.metrics.minutes_advanced < u64::from(plan.minutes)
            && self.metrics.steps < MAX_STEPS
        {
            self.metrics.steps += 1;
            match StepKind::pick(plan.strategy, &mut self.rng) {
                StepKind::Wait => {
                    let seconds = self.rng.gen_range(1.0f32..30.0);
                    self.tick(world, seconds)?;
                }
                StepKind::Act => self.act(world, plan.strategy)?,
                StepKind::Talk => self.talk(world)?,
                StepKind::Fight => self.fight(world)?,
            }
        }
        Ok(())
    }

    fn tick(&mut self, world: &mut WorldCoordinator, seconds: f32) -> Result<()> {
        let talking = world.state().dialogue.is_some();
        let report = self.engine.tick(world, seconds)?;
        self.metrics.ticks += 1;
        self.metrics.minutes_advanced += u64::from(report.minutes_advanced);
        self.metrics.day_rollovers += report.day_rollovers;
        if report.paused {
            self.metrics.paused_ticks += 1;
        }
        if report.paused != talking || (report.paused && report.minutes_advanced > 0) {
            self.metrics.pause_violations += 1;
        }
        for event in &report.events {
            if *event == WorldEvent::AutosaveDue {
                self.metrics.autosaves += 1;
            }
        }
        self.events.extend(report.events);
        Ok(())
    }

    fn act(&mut self, world: &mut WorldCoordinator, strategy: SessionStrategy) -> Result<()> {
        let pool = strategy.action_pool();
        if pool.is_empty() {
            return Ok(());
        }
        let action = pool[self.rng.gen_range(0..pool.len())];
        world.record_action(action)?;
        self.metrics.actions_recorded += 1;
        self.metrics.log(format!("{} act {action}", world.time()));
        self.events.extend(world.drain_events());
        Ok(())
    }

    fn talk(&mut self, world: &mut WorldCoordinator) -> Result<()> {
        let partner = DIALOGUE_PARTNERS[self.rng.gen_range(0..DIALOGUE_PARTNERS.len())];
        let alive = world.character(partner).is_some_and(|c| c.is_alive());
        if !alive || world.state().combat.is_some() {
            return Ok(());
        }
        let mut view = world.start_dialogue(partner)?;
        self.metrics.dialogues_opened += 1;
        self.metrics.log(format!("{} talk {partner}", world.time()));

        // The world must hold still while the conversation is open.
        self.tick(world, 5.0)?;

        for _ in 0..MAX_DIALOGUE_STEPS {
            let options = match &view {
                DialogueView::Speech { .. } => {
                    view = world.continue_dialogue()?;
                    continue;
                }
                DialogueView::Choice { options, .. } if !options.is_empty() => options.clone(),
                DialogueView::Choice { .. } | DialogueView::Ended => break,
            };
            let (index, option) = &options[self.rng.gen_range(0..options.len())];
            let rep = world.reputation();
            let open = option.requirements.satisfied_by(
                rep.legion,
                rep.community,
                rep.outsider,
                world.trust(partner),
            );
            if !open {
                self.metrics.locked_choices_offered += 1;
            }
            self.metrics.choices_made += 1;
            self.metrics.log(format!("{} choose {index}", world.time()));
            view = world.select_choice(*index)?;
        }
        if world.state().dialogue.is_some() {
            world.end_dialogue()?;
        }
        self.events.extend(world.drain_events());
        Ok(())
    }

    fn fight(&mut self, world: &mut WorldCoordinator) -> Result<()> {
        if !world.player().vitals.alive || world.state().dialogue.is_some() {
            return Ok(());
        }
        let candidates: Vec<String> = world
            .state()
            .characters
            .iter()
            .filter(|c| c.is_alive())
            .map(|c| c.id.clone())
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }
        let enemy = candidates[self.rng.gen_range(0..candidates.len())].clone();
        world.start_combat(&[enemy.as_str()])?;
        self.metrics.combats_started += 1;
        self.metrics.log(format!("{} fight {enemy}", world.time()));
        self.events.extend(world.drain_events());

        for _ in 0..MAX_COMBAT_ROUNDS {
            if world.state().combat.is_none() || !world.player().vitals.alive {
                break;
            }
            let status = world.combat_status();
            if status.reloading {
                self.tick(world, 1.0)?;
                continue;
            }
            if status.ammo == 0 {
                world.reload()?;
                continue;
            }
            let target = status
                .enemies
                .iter()
                .find(|(_, phase)| *phase != CombatPhase::Dead)
                .map(|(id, _)| id.clone());
            let Some(target) = target else {
                break;
            };
            let report = world.fire_at(&target)?;
            self.metrics.shots += 1;
            match report.resolution {
                ShotResolution::Hit { .. } => self.metrics.hits += 1,
                ShotResolution::Misfire => self.metrics.misfires += 1,
                ShotResolution::Miss { .. } => {}
            }
            if self.verbose {
                println!(
                    "     {} shot at {} -> {:?}",
                    "↳".dimmed(),
                    report.target_id,
                    report.resolution
                );
            }
            self.events.extend(world.drain_events());
            self.tick(world, 0.5)?;
        }
        if world.state().combat.is_some() {
            world.end_combat()?;
            self.events.extend(world.drain_events());
        }
        Ok(())
    }
}

/// Save, reload and run the same short skirmish on both copies.
fn replay_check(
    engine: &GameEngine<SeededLoader, MemoryStorage>,
    world: &mut WorldCoordinator,
    seed: u64,
) -> Result<bool> {
    if world.state().dialogue.is_some() {
        world.end_dialogue()?;
    }
    if world.state().combat.is_some() {
        world.end_combat()?;
    }
    engine.save(REPLAY_SLOT, world)?;
    let mut loaded = engine
        .load(REPLAY_SLOT)?
        .context("replay slot vanished after save")?;
    if loaded.snapshot() != world.snapshot() {
        return Ok(false);
    }
    continuation(world, seed)?;
    continuation(&mut loaded, seed)?;
    Ok(loaded.snapshot() == world.snapshot())
}

fn continuation(world: &mut WorldCoordinator, seed: u64) -> Result<()> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed.rotate_left(17));
    for _ in 0..6 {
        world.tick(rng.gen_range(1.0f32..10.0))?;
    }
    let target = world
        .state()
        .characters
        .iter()
        .find(|c| c.is_alive())
        .map(|c| c.id.clone());
    if let Some(target) = target
        && world.player().vitals.alive
    {
        world.start_combat(&[target.as_str()])?;
        for _ in 0..4 {
            if world.state().combat.is_none() || world.combat_status().ammo == 0 {
                break;
            }
            if world.character(&target).is_some_and(|c| c.is_alive()) {
                world.fire_at(&target)?;
            }
            world.tick(0.5)?;
        }
        if world.state().combat.is_some() {
            world.end_combat()?;
        }
    }
    world.drain_events();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_session_only_waits() {
        let plan = SessionPlan::new(SessionStrategy::Idle).with_minutes(24 * 60);
        let summary = WorldTester::new(false).run_plan(&plan, 7).unwrap();
        assert!(summary.metrics.minutes_advanced >= 24 * 60);
        assert_eq!(summary.metrics.actions_recorded, 0);
        assert_eq!(summary.metrics.dialogues_opened, 0);
        assert_eq!(summary.metrics.day_rollovers, 1);
    }

    #[test]
    fn same_seed_gives_same_session() {
        let plan = SessionPlan::new(SessionStrategy::Chaotic)
            .with_minutes(12 * 60)
            .with_repeat_check();
        let summary = WorldTester::new(false).run_plan(&plan, 99).unwrap();
        assert_eq!(summary.repeat_matches, Some(true));
    }

    #[test]
    fn step_weights_respect_strategy() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        for _ in 0..200 {
            assert_eq!(StepKind::pick(SessionStrategy::Idle, &mut rng), StepKind::Wait);
            assert_ne!(
                StepKind::pick(SessionStrategy::Diplomat, &mut rng),
                StepKind::Fight
            );
        }
    }

    #[test]
    fn decision_log_keeps_newest_entries() {
        let mut metrics = SessionMetrics::default();
        for i in 0..(DECISION_LOG_LIMIT + 5) {
            metrics.log(format!("entry {i}"));
        }
        assert_eq!(metrics.decision_log.len(), DECISION_LOG_LIMIT);
        assert_eq!(
            metrics.decision_log.last().map(String::as_str),
            Some("entry 36")
        );
    }
}
