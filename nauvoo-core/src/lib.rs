//! Nauvoo World Engine
//!
//! Platform-agnostic world-state core for the Nauvoo settlement simulation: calendar clock,
//! daily routines, faction reputation, injuries and combat, and reputation-gated dialogue.
//! No rendering, input or platform dependencies live here.

pub mod character;
pub mod clock;
pub mod combat;
pub mod config;
pub mod constants;
pub mod content;
pub mod coordinator;
pub mod dialogue;
pub mod error;
pub mod injury;
pub mod numbers;
pub mod persistence;
pub mod reputation;
pub mod rng;
pub mod schedule;
pub mod world;

pub use character::{Character, Faction, Position, Rank, Relationship};
pub use clock::{Season, SimTime};
pub use combat::{
    CombatEndReason, CombatPhase, CombatSession, ShotResolution, Stance, Weapon, WeaponKind,
    calculate_accuracy,
};
pub use config::{ConfigError, SimConfig};
pub use content::{ContentBundle, ContentLoader, StaticContent};
pub use coordinator::{CombatStatus, ShotReport, TickReport, WorldCoordinator, WorldEvent};
pub use dialogue::{
    DialogueCursor, DialogueLibrary, DialogueNode, DialogueOption, DialogueTree, DialogueView,
};
pub use error::{ContentError, EntityKind, IndexKind, SimError, SimResult, SnapshotError};
pub use injury::{BodyPart, DamageReport, Injury, InjuryKind, Vitals};
pub use persistence::{GameStorage, MemoryStorage, SaveEnvelope};
pub use reputation::{
    ActionCatalog, ActionDelta, ActionOutcome, EndingBranch, ReputationLedger,
    ReputationSnapshot, ReputationTier,
};
pub use schedule::{Activity, ActivityKind, Schedule, ScheduleBook};
pub use world::{PLAYER_ID, PlayerState, WorldState};

use constants::AUTOSAVE_SLOT;

/// Binds a content source to a save store and hands out running worlds.
pub struct GameEngine<L, S>
where
    L: ContentLoader,
    S: GameStorage,
{
    loader: L,
    storage: S,
}

impl<L, S> GameEngine<L, S>
where
    L: ContentLoader,
    S: GameStorage,
{
    pub const fn new(loader: L, storage: S) -> Self {
        Self { loader, storage }
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Start a fresh world from the loader's content and config.
    ///
    /// # Errors
    ///
    /// Returns an error if content or config cannot be loaded or fails validation.
    pub fn new_world(&self) -> Result<WorldCoordinator, anyhow::Error>
    where
        L::Error: Into<anyhow::Error>,
    {
        let content = self.loader.load_content().map_err(Into::into)?;
        let config = self.loader.load_config().map_err(Into::into)?;
        Ok(WorldCoordinator::new(content, config)?)
    }

    /// Seal and store the world under `slot`.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be encoded or written.
    pub fn save(&self, slot: &str, world: &WorldCoordinator) -> Result<(), anyhow::Error>
    where
        S::Error: Into<anyhow::Error>,
    {
        let blob = SaveEnvelope::seal(slot, world.snapshot())?.encode()?;
        self.storage.save(slot, &blob).map_err(Into::into)?;
        log::debug!("saved world to slot {slot} at {}", world.time());
        Ok(())
    }

    /// Load a saved world, pairing it with freshly loaded content.
    ///
    /// `Ok(None)` means the slot is empty. A corrupt or stale blob is an error and leaves any
    /// running world untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if storage, content or the snapshot itself fails.
    pub fn load(&self, slot: &str) -> Result<Option<WorldCoordinator>, anyhow::Error>
    where
        L::Error: Into<anyhow::Error>,
        S::Error: Into<anyhow::Error>,
    {
        let Some(blob) = self.storage.load(slot).map_err(Into::into)? else {
            return Ok(None);
        };
        let envelope = SaveEnvelope::decode(&blob)?;
        // Rehydrate with fresh content
        let content = self.loader.load_content().map_err(Into::into)?;
        let config = self.loader.load_config().map_err(Into::into)?;
        let world = WorldCoordinator::from_snapshot(envelope.snapshot, &content, config)?;
        Ok(Some(world))
    }

    /// # Errors
    ///
    /// Returns an error if the slot cannot be removed.
    pub fn delete(&self, slot: &str) -> Result<(), S::Error> {
        self.storage.delete(slot)
    }

    /// # Errors
    ///
    /// Returns an error if the storage cannot be enumerated.
    pub fn slots(&self) -> Result<Vec<String>, S::Error> {
        self.storage.list()
    }

    /// Tick the world and write the autosave slot when a day has rolled over.
    ///
    /// # Errors
    ///
    /// Returns an error if the tick is rejected or the autosave cannot be written.
    pub fn tick(
        &self,
        world: &mut WorldCoordinator,
        delta_seconds: f32,
    ) -> Result<TickReport, anyhow::Error>
    where
        S::Error: Into<anyhow::Error>,
    {
        let report = world.tick(delta_seconds)?;
        if report.events.contains(&WorldEvent::AutosaveDue) {
            self.save(AUTOSAVE_SLOT, world)?;
            log::info!("{}: {}", constants::LOG_AUTOSAVE, world.time());
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Default)]
    struct FastClockLoader;

    impl ContentLoader for FastClockLoader {
        type Error = ContentError;

        fn load_content(&self) -> Result<ContentBundle, Self::Error> {
            ContentBundle::load_from_static()
        }

        fn load_config(&self) -> Result<SimConfig, Self::Error> {
            Ok(SimConfig {
                time_scale: 60.0,
                seed: 0xABCD,
                ..SimConfig::default()
            })
        }
    }

    #[derive(Clone, Copy, Default)]
    struct BrokenLoader;

    #[derive(Debug, thiserror::Error)]
    #[error("content unavailable")]
    struct Unavailable;

    impl ContentLoader for BrokenLoader {
        type Error = Unavailable;

        fn load_content(&self) -> Result<ContentBundle, Self::Error> {
            Err(Unavailable)
        }

        fn load_config(&self) -> Result<SimConfig, Self::Error> {
            Ok(SimConfig::default())
        }
    }

    #[test]
    fn engine_saves_and_reloads_world() {
        let engine = GameEngine::new(StaticContent, MemoryStorage::new());
        let mut world = engine.new_world().unwrap();
        world.record_action("help_with_task").unwrap();
        world.tick(10.0).unwrap();
        engine.save("slot-one", &world).unwrap();

        let loaded = engine.load("slot-one").unwrap().expect("save exists");
        assert_eq!(loaded.time(), world.time());
        assert_eq!(loaded.reputation(), world.reputation());
        assert_eq!(loaded.snapshot(), world.snapshot());
        assert!(engine.load("missing-slot").unwrap().is_none());
        assert_eq!(engine.slots().unwrap(), vec!["slot-one"]);
    }

    #[test]
    fn corrupt_slot_fails_load_only() {
        let storage = MemoryStorage::new();
        storage.put_raw("bad", "{ not json");
        let engine = GameEngine::new(StaticContent, storage);
        assert!(engine.load("bad").is_err());
        let world = engine.new_world().unwrap();
        assert_eq!(world.time(), SimTime::default());
    }

    #[test]
    fn rollover_writes_autosave() {
        let engine = GameEngine::new(FastClockLoader, MemoryStorage::new());
        let mut world = engine.new_world().unwrap();
        // 60 minutes per second: a full day is 24 seconds.
        let report = engine.tick(&mut world, 24.0).unwrap();
        assert_eq!(report.day_rollovers, 1);
        assert!(engine.load(AUTOSAVE_SLOT).unwrap().is_some());
    }

    #[test]
    fn loader_failure_surfaces_as_error() {
        let engine = GameEngine::new(BrokenLoader, MemoryStorage::new());
        let err = engine.new_world().err().expect("loader fails");
        assert_eq!(err.to_string(), "content unavailable");
    }
}
