use nauvoo_core::clock::SimTime;
use nauvoo_core::coordinator::kill_action_for;
use nauvoo_core::injury::{self, BleedTable, BodyPart, Injury, InjuryKind, Vitals};
use nauvoo_core::reputation::{ActionCatalog, ActionContext, EndingBranch, ReputationLedger};
use nauvoo_core::{
    CombatPhase, ContentBundle, DialogueView, Faction, PLAYER_ID, Position, Season, SimConfig,
    SimError, WorldCoordinator, WorldEvent,
};

const MARKS: &str = "npc_captain_isaiah_marks";
const JOHN: &str = "npc_commander_john";
const JOSEPH: &str = "npc_elder_joseph";
const THOMAS: &str = "npc_thomas_brown";

fn world() -> WorldCoordinator {
    WorldCoordinator::new(
        ContentBundle::load_from_static().unwrap(),
        SimConfig::default(),
    )
    .unwrap()
}

#[test]
fn clock_walks_through_day_boundary() {
    let mut time = SimTime::new(1841, 5, 15, 360);
    assert_eq!(time.advance(120), 0);
    assert_eq!(time.minute, 480);
    assert_eq!(time.day, 15);
    assert_eq!(time.advance(960), 1);
    assert_eq!(time.minute, 0);
    assert_eq!(time.day, 16);
    assert_eq!(time.month, 5);
}

#[test]
fn helping_raises_only_the_community() {
    let mut ledger = ReputationLedger::new();
    let outcome = ledger
        .record_action(
            ActionCatalog::default_catalog(),
            "help_with_task",
            &ActionContext::default(),
        )
        .unwrap();
    assert_eq!(outcome.community, 30);
    assert_eq!(ledger.legion(), 0);
    assert_eq!(ledger.outsider(), 0);
}

#[test]
fn drilling_five_times_caps_legion() {
    let mut ledger = ReputationLedger::new();
    for _ in 0..5 {
        ledger
            .record_action(
                ActionCatalog::default_catalog(),
                "attend_drill",
                &ActionContext::default(),
            )
            .unwrap();
    }
    assert_eq!(ledger.legion(), 100);
    assert_eq!(ledger.history().len(), 5);
}

#[test]
fn untreated_gunshot_bleeds_until_treated() {
    let now = SimTime::default();
    let mut vitals = Vitals::default();
    let wound = Injury::from_damage(
        40.0,
        BodyPart::Torso,
        InjuryKind::Gunshot,
        now,
        &BleedTable::default(),
    );
    assert_eq!(wound.severity, 4);
    assert!((wound.bleed_rate - 8.0).abs() < f32::EPSILON);
    vitals.injuries.push(wound);

    injury::update_health(&mut vitals, 5.0, now, 60);
    assert!((vitals.health - 60.0).abs() < 1e-4);

    injury::treat_injury(&mut vitals, 0).unwrap();
    injury::update_health(&mut vitals, 100.0, now, 60);
    assert!((vitals.health - 60.0).abs() < 1e-4);
    assert!(vitals.alive);
}

#[test]
fn endings_follow_faction_standing() {
    assert_eq!(
        EndingBranch::classify(65, 70),
        EndingBranch::RespectedOnBothSides
    );
    assert_eq!(EndingBranch::classify(-40, 45), EndingBranch::TraitorPath);
    assert_eq!(EndingBranch::classify(50, -50), EndingBranch::EnforcerPath);
    assert_eq!(EndingBranch::classify(-30, -30), EndingBranch::OutcastAndBlamed);
    assert_eq!(EndingBranch::classify(0, 0), EndingBranch::CaughtInTheMiddle);
}

#[test]
fn tick_runs_decay_before_schedules() {
    let world = world();
    let mut config = world.config().clone();
    config.time_scale = 60.0;
    let mut world = WorldCoordinator::from_snapshot(
        world.snapshot(),
        &ContentBundle::load_from_static().unwrap(),
        config,
    )
    .unwrap();
    world.drain_events();

    // 18 hours: 06:00 to 00:00 the next day.
    let report = world.tick(18.0).unwrap();
    assert_eq!(report.minutes_advanced, 1_080);
    assert_eq!(report.day_rollovers, 1);
    let decay_at = report
        .events
        .iter()
        .position(|event| matches!(event, WorldEvent::DailyDecay { .. }))
        .unwrap();
    let first_move = report
        .events
        .iter()
        .position(|event| matches!(event, WorldEvent::ActivityChanged { .. }))
        .unwrap();
    assert!(decay_at < first_move);
    assert_eq!(world.time().day, 16);
    assert_eq!(world.state().days_elapsed, 1);
}

#[test]
fn routines_follow_the_day() {
    let mut world = world();
    assert_eq!(world.season(), Season::Spring);
    assert_eq!(world.location_of(JOHN).unwrap(), Some("parade_ground"));
    let training = world.activity_of(MARKS).unwrap().unwrap();
    assert!(!training.interruptible);
    assert_eq!(training.companions, vec![JOHN.to_string()]);

    world.advance_time(5 * 60).unwrap();
    assert_eq!(world.location_of(MARKS).unwrap(), Some("town_square"));
    assert_eq!(world.location_of(THOMAS).unwrap(), Some("smithy"));
    let mut square = world.characters_at("town_square");
    square.sort();
    assert_eq!(square, vec![MARKS.to_string(), JOSEPH.to_string()]);
    assert!(world.characters_at("meetinghouse").is_empty());

    // Late at night nobody's interval matches, so the last entry holds.
    world.advance_time(13 * 60 + 30).unwrap();
    assert_eq!(world.time().minute, 30);
    assert_eq!(world.location_of(MARKS).unwrap(), Some("legion_barracks"));
}

#[test]
fn schedule_snaps_positions_to_locations() {
    let mut world = world();
    world.advance_time(5 * 60).unwrap();
    let marks = world.character(MARKS).unwrap();
    assert_eq!(marks.position, Position::new(0.0, 0.0, 0.0));
    let thomas = world.character(THOMAS).unwrap();
    assert_eq!(thomas.position, Position::new(20.0, 0.0, 0.0));
}

#[test]
fn locked_options_open_with_reputation() {
    let mut world = world();
    world.record_action("help_with_task").unwrap();
    let view = world.start_dialogue(MARKS).unwrap();
    assert!(matches!(view, DialogueView::Speech { .. }));
    world.continue_dialogue().unwrap();
    let choices = world.available_choices();
    assert_eq!(
        choices.iter().map(|(index, _)| *index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );

    // Legion is below the condition threshold, so the captain warns the player.
    let view = world.select_choice(2).unwrap();
    let DialogueView::Speech { node_id, .. } = view else {
        panic!("expected speech");
    };
    assert_eq!(node_id, "node_marks_response_warning");
    // Witness trust from helping, then the option's penalty.
    assert_eq!(world.trust(MARKS), 0);
    assert_eq!(world.continue_dialogue().unwrap(), DialogueView::Ended);
}

#[test]
fn questions_loop_back_to_choices() {
    let mut world = world();
    world.start_dialogue(MARKS).unwrap();
    world.continue_dialogue().unwrap();
    world.select_choice(1).unwrap();
    let view = world.continue_dialogue().unwrap();
    assert!(matches!(view, DialogueView::Choice { .. }));
    world.end_dialogue().unwrap();
    assert!(world.dialogue_view().is_none());
}

#[test]
fn elder_counsel_records_consequence_action() {
    let mut world = world();
    world.set_player_position(Position::new(30.0, 0.0, 0.0));
    let view = world.start_dialogue(JOSEPH).unwrap();
    let DialogueView::Speech { node_id, .. } = view else {
        panic!("expected speech");
    };
    assert_eq!(node_id, "node_elder_welcome");
    world.continue_dialogue().unwrap();
    world.select_choice(0).unwrap();
    assert_eq!(world.reputation().community, 30);
    assert_eq!(world.ledger().history()[0].action_id, "help_with_task");
    // Witness trust from the action plus the option's own trust delta.
    assert_eq!(world.trust(JOSEPH), 15);
    let events = world.drain_events();
    assert!(
        events
            .iter()
            .any(|event| matches!(event, WorldEvent::ActionRecorded { .. }))
    );
}

#[test]
fn low_integrity_changes_elder_greeting() {
    let mut world = world();
    world.record_action("enforce_curfew_harshly").unwrap();
    let view = world.start_dialogue(JOSEPH).unwrap();
    let DialogueView::Speech { node_id, .. } = view else {
        panic!("expected speech");
    };
    assert_eq!(node_id, "node_elder_rebuke");
}

#[test]
fn killing_a_soldier_in_sight_of_his_commander() {
    let mut world = world();
    world.set_player_position(Position::new(8.0, 12.0, 0.0));
    world.start_combat(&[MARKS]).unwrap();
    world
        .apply_damage(MARKS, 95.0, BodyPart::Torso, Some(PLAYER_ID), None)
        .unwrap();
    let report = world.tick(1.0).unwrap();
    assert!(world.state().combat.is_none());
    assert_eq!(world.character(MARKS).unwrap().combat, CombatPhase::Dead);
    assert!(report.events.iter().any(|event| matches!(
        event,
        WorldEvent::CharacterDied { character_id, killer_id: Some(killer) }
            if character_id == MARKS && killer == PLAYER_ID
    )));
    assert_eq!(kill_action_for(Faction::Legion), "kill_legion_soldier");
    assert_eq!(world.reputation().legion, -50);
    assert!(world.trust(JOHN) < 0);
    assert!(world.ledger().standing(JOHN).unwrap().memories[0].will_gossip);
    assert!(matches!(
        world.start_dialogue(MARKS),
        Err(SimError::InvalidState { .. })
    ));
}

#[test]
fn player_bleeding_out_ends_combat() {
    let mut world = world();
    world.start_combat(&[JOHN]).unwrap();
    world
        .apply_damage(
            PLAYER_ID,
            90.0,
            BodyPart::Torso,
            Some(JOHN),
            Some(InjuryKind::Gunshot),
        )
        .unwrap();
    let report = world.tick(1.0).unwrap();
    assert!(report.events.contains(&WorldEvent::PlayerDied));
    assert!(world.state().combat.is_none());
    assert!(!world.player().vitals.alive);
    assert!(world.start_combat(&[JOHN]).is_err());
}

#[test]
fn events_and_overrides_are_idempotent() {
    let mut world = world();
    assert!(world.trigger_event("harvest"));
    assert!(!world.trigger_event("harvest"));
    world.complete_event("harvest").unwrap();
    assert!(world.state().completed_events.contains("harvest"));
    assert!(world.trigger_event("harvest"));
    assert!(matches!(
        world.set_event_override("npc_missing", "harvest", Vec::new()),
        Err(SimError::NotFound { .. })
    ));
}
