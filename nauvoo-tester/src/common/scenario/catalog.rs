use anyhow::{Result, ensure};

use crate::common::scenario::TestScenario;
use crate::logic::{SessionPlan, SessionStrategy, SessionSummary};
use nauvoo_core::{CombatPhase, EndingBranch, WorldEvent};

const DAY: u32 = 24 * 60;

pub fn catalog_scenarios() -> Vec<TestScenario> {
    vec![
        TestScenario::new(
            "smoke",
            "One quiet day: clock, routines and decay stay consistent",
            SessionPlan::new(SessionStrategy::Idle)
                .with_minutes(DAY)
                .with_expectation(clock_moved_expectation)
                .with_expectation(routines_resolved_expectation)
                .with_expectation(decay_once_per_day_expectation),
        ),
        TestScenario::new(
            "daily-routine",
            "Three idle days roll over, decay and autosave exactly once each",
            SessionPlan::new(SessionStrategy::Idle)
                .with_minutes(3 * DAY)
                .with_expectation(three_rollovers_expectation)
                .with_expectation(decay_once_per_day_expectation)
                .with_expectation(autosave_per_day_expectation),
        ),
        TestScenario::new(
            "reputation-arc",
            "A helpful player's ledger stays bounded and the ending matches it",
            SessionPlan::new(SessionStrategy::Diplomat)
                .with_expectation(ledger_bounded_expectation)
                .with_expectation(ending_matches_ledger_expectation),
        ),
        TestScenario::new(
            "dialogue-gating",
            "Conversations only offer unlocked choices and pause the world",
            SessionPlan::new(SessionStrategy::Diplomat)
                .with_minutes(2 * DAY)
                .with_expectation(dialogue_gating_expectation)
                .with_expectation(pause_expectation),
        ),
        TestScenario::new(
            "combat-skirmish",
            "Skirmishes open and close cleanly and deaths are settled",
            SessionPlan::new(SessionStrategy::Soldier)
                .with_minutes(2 * DAY)
                .with_expectation(combat_bookkeeping_expectation)
                .with_expectation(deaths_settled_expectation)
                .with_expectation(ledger_bounded_expectation),
        ),
        TestScenario::new(
            "save-load-replay",
            "A reloaded save replays the same continuation as the live world",
            SessionPlan::new(SessionStrategy::Chaotic)
                .with_minutes(DAY)
                .with_replay_check()
                .with_expectation(replay_expectation),
        ),
        TestScenario::new(
            "determinism",
            "The same seed produces the same session twice",
            SessionPlan::new(SessionStrategy::Chaotic)
                .with_minutes(DAY)
                .with_repeat_check()
                .with_expectation(repeat_expectation)
                .with_expectation(ledger_bounded_expectation),
        ),
    ]
}

fn count(summary: &SessionSummary, predicate: impl Fn(&WorldEvent) -> bool) -> usize {
    summary.count_events(predicate)
}

fn clock_moved_expectation(summary: &SessionSummary) -> Result<()> {
    let metrics = &summary.metrics;
    ensure!(metrics.ticks > 0, "session never ticked");
    ensure!(
        metrics.minutes_advanced >= u64::from(DAY),
        "only {} minutes advanced",
        metrics.minutes_advanced
    );
    ensure!(
        summary.final_state.time.minute < 24 * 60,
        "clock left unnormalized at minute {}",
        summary.final_state.time.minute
    );
    Ok(())
}

fn routines_resolved_expectation(summary: &SessionSummary) -> Result<()> {
    for character in &summary.final_state.characters {
        if character.is_alive() {
            ensure!(
                character.current_activity.is_some(),
                "{} has no activity at {}",
                character.id,
                summary.final_state.time
            );
        }
    }
    Ok(())
}

fn decay_once_per_day_expectation(summary: &SessionSummary) -> Result<()> {
    let rollovers = count(summary, |e| matches!(e, WorldEvent::DayRollover { .. }));
    let decays = count(summary, |e| matches!(e, WorldEvent::DailyDecay { .. }));
    ensure!(
        rollovers == decays,
        "{rollovers} rollovers but {decays} decay passes"
    );
    ensure!(
        u64::try_from(rollovers)? == summary.final_state.days_elapsed,
        "days_elapsed {} disagrees with {rollovers} rollovers",
        summary.final_state.days_elapsed
    );
    Ok(())
}

fn three_rollovers_expectation(summary: &SessionSummary) -> Result<()> {
    ensure!(
        summary.metrics.day_rollovers == 3,
        "expected 3 rollovers, saw {}",
        summary.metrics.day_rollovers
    );
    Ok(())
}

fn autosave_per_day_expectation(summary: &SessionSummary) -> Result<()> {
    ensure!(
        summary.metrics.autosaves == usize::try_from(summary.metrics.day_rollovers)?,
        "{} autosaves for {} rollovers",
        summary.metrics.autosaves,
        summary.metrics.day_rollovers
    );
    Ok(())
}

fn ledger_bounded_expectation(summary: &SessionSummary) -> Result<()> {
    let ledger = &summary.final_state.reputation;
    ensure!(
        ledger.is_within_bounds(),
        "ledger out of bounds: {:?}",
        ledger.snapshot()
    );
    Ok(())
}

fn ending_matches_ledger_expectation(summary: &SessionSummary) -> Result<()> {
    let ledger = &summary.final_state.reputation;
    ensure!(
        summary.metrics.actions_recorded > 0,
        "diplomat never acted"
    );
    let expected = EndingBranch::classify(ledger.legion(), ledger.community());
    ensure!(
        ledger.determine_ending_branch() == expected,
        "ending {} but factions classify as {expected}",
        ledger.determine_ending_branch()
    );
    Ok(())
}

fn dialogue_gating_expectation(summary: &SessionSummary) -> Result<()> {
    let metrics = &summary.metrics;
    ensure!(metrics.dialogues_opened > 0, "no conversation was opened");
    ensure!(
        metrics.locked_choices_offered == 0,
        "{} locked choices were offered",
        metrics.locked_choices_offered
    );
    ensure!(
        summary.final_state.dialogue.is_none(),
        "a dialogue was left open"
    );
    Ok(())
}

fn pause_expectation(summary: &SessionSummary) -> Result<()> {
    let metrics = &summary.metrics;
    ensure!(
        metrics.pause_violations == 0,
        "{} ticks ignored the open dialogue",
        metrics.pause_violations
    );
    ensure!(
        metrics.paused_ticks <= metrics.dialogues_opened,
        "{} paused ticks for {} dialogues",
        metrics.paused_ticks,
        metrics.dialogues_opened
    );
    Ok(())
}

fn combat_bookkeeping_expectation(summary: &SessionSummary) -> Result<()> {
    let started = count(summary, |e| matches!(e, WorldEvent::CombatStarted { .. }));
    let ended = count(summary, |e| matches!(e, WorldEvent::CombatEnded { .. }));
    ensure!(
        started == summary.metrics.combats_started,
        "{started} combat start events for {} engagements",
        summary.metrics.combats_started
    );
    ensure!(started == ended, "{started} combats started, {ended} ended");
    ensure!(
        summary.final_state.combat.is_none(),
        "combat still running"
    );
    let metrics = &summary.metrics;
    ensure!(
        metrics.hits + metrics.misfires <= metrics.shots,
        "{} hits and {} misfires from {} shots",
        metrics.hits,
        metrics.misfires,
        metrics.shots
    );
    let weapon = &summary.final_state.player.weapon;
    ensure!(
        weapon.ammo <= weapon.max_ammo,
        "ammo {} over capacity {}",
        weapon.ammo,
        weapon.max_ammo
    );
    Ok(())
}

fn deaths_settled_expectation(summary: &SessionSummary) -> Result<()> {
    let dead: Vec<&str> = summary
        .final_state
        .characters
        .iter()
        .filter(|c| !c.is_alive())
        .map(|c| c.id.as_str())
        .collect();
    ensure!(
        dead.len() == summary.metrics.kills,
        "{} dead characters but {} death events",
        dead.len(),
        summary.metrics.kills
    );
    for character in &summary.final_state.characters {
        ensure!(
            character.is_alive() != (character.combat == CombatPhase::Dead),
            "{} is {} with alive={}",
            character.id,
            character.combat,
            character.is_alive()
        );
    }
    Ok(())
}

fn replay_expectation(summary: &SessionSummary) -> Result<()> {
    ensure!(
        summary.replay_matches == Some(true),
        "reloaded world diverged from the live one"
    );
    Ok(())
}

fn repeat_expectation(summary: &SessionSummary) -> Result<()> {
    ensure!(
        summary.repeat_matches == Some(true),
        "second run with seed {} diverged",
        summary.seed
    );
    Ok(())
}
