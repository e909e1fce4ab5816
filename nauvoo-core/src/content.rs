//! Authored content: characters, routines, dialogue and the action catalog.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::character::{Character, Position};
use crate::config::SimConfig;
use crate::dialogue::{DialogueLibrary, DialogueTree, NodeBody, NodeEffect};
use crate::error::ContentError;
use crate::reputation::ActionCatalog;
use crate::schedule::{Schedule, ScheduleBook};

const DEFAULT_CONTENT_DATA: &str = include_str!("../assets/data/content.json");

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentBundle {
    #[serde(default)]
    pub locations: BTreeMap<String, Position>,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub dialogues: Vec<DialogueTree>,
    /// Falls back to the bundled catalog when omitted.
    #[serde(default = "ContentBundle::default_actions")]
    pub actions: ActionCatalog,
}

impl ContentBundle {
    fn default_actions() -> ActionCatalog {
        ActionCatalog::default_catalog().clone()
    }

    /// The founding cast of the settlement.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled asset fails to parse or validate.
    pub fn load_from_static() -> Result<Self, ContentError> {
        Self::from_json(DEFAULT_CONTENT_DATA)
    }

    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed or the content fails validation.
    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        let bundle: Self = serde_json::from_str(json)?;
        bundle.validate()?;
        Ok(bundle)
    }

    /// Cross-check ids and structure across the whole bundle.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ContentError> {
        let mut ids = HashSet::new();
        for character in &self.characters {
            if !ids.insert(character.id.as_str()) {
                return Err(ContentError::DuplicateCharacter(character.id.clone()));
            }
        }
        for schedule in &self.schedules {
            if !ids.contains(schedule.character_id.as_str()) {
                return Err(ContentError::UnknownCharacter(schedule.character_id.clone()));
            }
            schedule.validate()?;
        }
        for tree in &self.dialogues {
            if !ids.contains(tree.character_id.as_str()) {
                return Err(ContentError::UnknownCharacter(tree.character_id.clone()));
            }
            tree.validate()?;
            self.check_actions(tree)?;
        }
        Ok(())
    }

    fn check_actions(&self, tree: &DialogueTree) -> Result<(), ContentError> {
        let referenced = tree.nodes.iter().flat_map(|node| match &node.body {
            NodeBody::Choice { options } => options
                .iter()
                .filter_map(|option| option.consequence_action.as_deref())
                .collect::<Vec<_>>(),
            NodeBody::Action {
                effect: NodeEffect::RecordAction { action_id },
                ..
            } => vec![action_id.as_str()],
            _ => Vec::new(),
        });
        for action in referenced {
            if self.actions.get(action).is_none() {
                return Err(ContentError::UnknownAction {
                    tree: tree.id.clone(),
                    action: action.to_string(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn schedule_book(&self) -> ScheduleBook {
        let mut book = ScheduleBook::new();
        for schedule in &self.schedules {
            book.insert(schedule.clone());
        }
        book
    }

    /// # Errors
    ///
    /// Returns the first tree that fails validation.
    pub fn dialogue_library(&self) -> Result<DialogueLibrary, ContentError> {
        let mut library = DialogueLibrary::new();
        for tree in &self.dialogues {
            library.register(tree.clone())?;
        }
        Ok(library)
    }
}

/// Supplies content and configuration to the engine.
pub trait ContentLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the content bundle.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be loaded or is invalid.
    fn load_content(&self) -> Result<ContentBundle, Self::Error>;

    /// Load simulation configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or parsed.
    fn load_config(&self) -> Result<SimConfig, Self::Error>;
}

/// Loader backed by the assets compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticContent;

impl ContentLoader for StaticContent {
    type Error = ContentError;

    fn load_content(&self) -> Result<ContentBundle, Self::Error> {
        ContentBundle::load_from_static()
    }

    fn load_config(&self) -> Result<SimConfig, Self::Error> {
        Ok(SimConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{Faction, Rank};

    #[test]
    fn static_bundle_loads_founding_cast() {
        let bundle = ContentBundle::load_from_static().unwrap();
        assert_eq!(bundle.characters.len(), 5);
        let marks = &bundle.characters[0];
        assert_eq!(marks.id, "npc_captain_isaiah_marks");
        assert_eq!(marks.faction, Faction::Legion);
        assert_eq!(marks.rank, Rank::Captain);
        assert_eq!(marks.age, 42);
        assert_eq!(bundle.schedules.len(), 5);
        assert!(bundle.actions.get("refuse_order").is_some());
    }

    #[test]
    fn captain_dialogue_matches_introduction() {
        let bundle = ContentBundle::load_from_static().unwrap();
        let library = bundle.dialogue_library().unwrap();
        let tree = library.tree_for("npc_captain_isaiah_marks").unwrap();
        assert_eq!(tree.id, "dialogue_captain_marks_intro");
        assert_eq!(tree.root, "node_marks_intro_1");
        let choices = tree.node("node_marks_choices").unwrap();
        let NodeBody::Choice { options } = &choices.body else {
            panic!("choice node expected");
        };
        assert_eq!(options[0].id, "choice_marks_eager");
        assert_eq!(options[0].legion_delta, 10);
        assert!(options[1].requirements.is_empty());
    }

    #[test]
    fn rejects_dangling_references() {
        let json = r#"{
            "characters": [{ "id": "npc_a", "name": "A" }],
            "schedules": [{ "character_id": "npc_b", "daily_routine": [] }]
        }"#;
        assert_eq!(
            ContentBundle::from_json(json).unwrap_err(),
            ContentError::UnknownCharacter("npc_b".into())
        );

        let json = r#"{
            "characters": [{ "id": "npc_a", "name": "A" }, { "id": "npc_a", "name": "B" }]
        }"#;
        assert_eq!(
            ContentBundle::from_json(json).unwrap_err(),
            ContentError::DuplicateCharacter("npc_a".into())
        );

        let json = r#"{
            "characters": [{ "id": "npc_a", "name": "A" }],
            "dialogues": [{
                "id": "t", "character_id": "npc_a", "root": "n",
                "nodes": [{ "id": "n", "kind": "choice", "options": [
                    { "id": "o", "text": "o", "consequence_action": "juggle" }
                ]}]
            }]
        }"#;
        assert!(matches!(
            ContentBundle::from_json(json),
            Err(ContentError::UnknownAction { .. })
        ));
    }

    #[test]
    fn omitted_actions_use_bundled_catalog() {
        let bundle = ContentBundle::from_json("{}").unwrap();
        assert!(bundle.actions.get("attend_drill").is_some());
    }
}
