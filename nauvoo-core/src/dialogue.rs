//! Dialogue trees and the gate that walks them.
//!
//! A conversation is an explicit state machine over a [`DialogueCursor`]. Speech
//! nodes wait for [`continue_dialogue`], choice nodes wait for [`select_choice`],
//! and condition/action nodes resolve on entry. Live values are read and
//! consequences written through the [`DialogueWorld`] seam.
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::character::Faction;
use crate::constants::NO_REQUIREMENT_SENTINEL;
use crate::error::{ContentError, EntityKind, IndexKind, SimError, SimResult};

/// Next-node id that closes the conversation.
pub const END_NODE: &str = "";

fn requirement<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<i32>::deserialize(deserializer)?;
    Ok(value.filter(|threshold| *threshold != NO_REQUIREMENT_SENTINEL))
}

/// Minimum live values an option needs. Absent thresholds never block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Requirements {
    #[serde(default, deserialize_with = "requirement")]
    pub legion: Option<i32>,
    #[serde(default, deserialize_with = "requirement")]
    pub community: Option<i32>,
    #[serde(default, deserialize_with = "requirement")]
    pub outsider: Option<i32>,
    /// Trust of the character being spoken to.
    #[serde(default, deserialize_with = "requirement")]
    pub trust: Option<i32>,
}

impl Requirements {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True when every configured threshold is at or below the live value.
    #[must_use]
    pub fn satisfied_by(&self, legion: i32, community: i32, outsider: i32, trust: i32) -> bool {
        let meets = |threshold: Option<i32>, live: i32| threshold.is_none_or(|min| live >= min);
        meets(self.legion, legion)
            && meets(self.community, community)
            && meets(self.outsider, outsider)
            && meets(self.trust, trust)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DialogueOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub next_node: String,
    #[serde(default)]
    pub requirements: Requirements,
    #[serde(default)]
    pub legion_delta: i32,
    #[serde(default)]
    pub community_delta: i32,
    #[serde(default)]
    pub outsider_delta: i32,
    #[serde(default)]
    pub trust_delta: i32,
    /// Action recorded in the ledger when this option is chosen.
    #[serde(default)]
    pub consequence_action: Option<String>,
}

/// Test evaluated by a condition node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    ReputationAtLeast { faction: Faction, value: i32 },
    TrustAtLeast { value: i32 },
    EventActive { event_id: String },
    IntegrityAtLeast { value: i32 },
}

/// Side effect of an action node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeEffect {
    RecordAction { action_id: String },
    ModifyTrust { delta: i32 },
    TriggerEvent { event_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeBody {
    Speech {
        #[serde(default)]
        next: String,
    },
    Choice {
        options: Vec<DialogueOption>,
    },
    Condition {
        condition: Condition,
        #[serde(default)]
        on_true: String,
        #[serde(default)]
        on_false: String,
    },
    Action {
        effect: NodeEffect,
        #[serde(default)]
        next: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueNode {
    pub id: String,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub body: NodeBody,
}

impl DialogueNode {
    /// Condition and action nodes move on without the player.
    #[must_use]
    pub const fn is_automatic(&self) -> bool {
        matches!(self.body, NodeBody::Condition { .. } | NodeBody::Action { .. })
    }

    /// Every node id this node can lead to, end sentinel included.
    #[must_use]
    pub fn successors(&self) -> Vec<&str> {
        match &self.body {
            NodeBody::Speech { next } | NodeBody::Action { next, .. } => vec![next.as_str()],
            NodeBody::Choice { options } => options
                .iter()
                .map(|option| option.next_node.as_str())
                .collect(),
            NodeBody::Condition {
                on_true, on_false, ..
            } => vec![on_true.as_str(), on_false.as_str()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTree {
    pub id: String,
    /// Character this conversation belongs to.
    pub character_id: String,
    pub root: String,
    pub nodes: Vec<DialogueNode>,
}

impl DialogueTree {
    #[must_use]
    pub fn node(&self, node_id: &str) -> Option<&DialogueNode> {
        self.nodes.iter().find(|node| node.id == node_id)
    }

    /// Check the root, node ids, every link, and the absence of input-free cycles.
    ///
    /// # Errors
    ///
    /// Returns the first structural problem found.
    pub fn validate(&self) -> Result<(), ContentError> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(ContentError::DuplicateNode {
                    tree: self.id.clone(),
                    node: node.id.clone(),
                });
            }
        }
        if !seen.contains(self.root.as_str()) {
            return Err(ContentError::MissingRoot {
                tree: self.id.clone(),
                root: self.root.clone(),
            });
        }
        for node in &self.nodes {
            for target in node.successors() {
                if target != END_NODE && !seen.contains(target) {
                    return Err(ContentError::DanglingNode {
                        tree: self.id.clone(),
                        node: node.id.clone(),
                        target: target.to_string(),
                    });
                }
            }
        }
        self.check_automatic_cycles()
    }

    fn check_automatic_cycles(&self) -> Result<(), ContentError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Active,
            Done,
        }

        let mut marks: BTreeMap<&str, Mark> = self
            .nodes
            .iter()
            .filter(|node| node.is_automatic())
            .map(|node| (node.id.as_str(), Mark::Unvisited))
            .collect();
        let starts: Vec<&str> = marks.keys().copied().collect();

        for start in starts {
            if marks.get(start) != Some(&Mark::Unvisited) {
                continue;
            }
            // Iterative DFS restricted to automatic nodes.
            let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
            marks.insert(start, Mark::Active);
            while let Some((current, next_edge)) = stack.pop() {
                let successors = self
                    .node(current)
                    .map(DialogueNode::successors)
                    .unwrap_or_default();
                if let Some(target) = successors.get(next_edge).copied() {
                    stack.push((current, next_edge + 1));
                    match marks.get(target) {
                        Some(Mark::Active) => {
                            return Err(ContentError::InputFreeCycle {
                                tree: self.id.clone(),
                                node: target.to_string(),
                            });
                        }
                        Some(Mark::Unvisited) => {
                            marks.insert(target, Mark::Active);
                            stack.push((target, 0));
                        }
                        _ => {}
                    }
                } else {
                    marks.insert(current, Mark::Done);
                }
            }
        }
        Ok(())
    }
}

/// Every registered tree, validated on insertion.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DialogueLibrary {
    trees: BTreeMap<String, DialogueTree>,
}

impl DialogueLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a tree, replacing any tree with the same id.
    ///
    /// # Errors
    ///
    /// Returns the tree's structural error; the library is left unchanged.
    pub fn register(&mut self, tree: DialogueTree) -> Result<(), ContentError> {
        tree.validate()?;
        self.trees.insert(tree.id.clone(), tree);
        Ok(())
    }

    #[must_use]
    pub fn tree(&self, tree_id: &str) -> Option<&DialogueTree> {
        self.trees.get(tree_id)
    }

    /// First tree (by id) registered for a character.
    #[must_use]
    pub fn tree_for(&self, character_id: &str) -> Option<&DialogueTree> {
        self.trees
            .values()
            .find(|tree| tree.character_id == character_id)
    }

    pub fn trees(&self) -> impl Iterator<Item = &DialogueTree> {
        self.trees.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

/// Where an open conversation stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueCursor {
    pub tree_id: String,
    pub node_id: String,
    pub character_id: String,
}

/// Live values and side effects the gate needs from the world.
pub trait DialogueWorld {
    fn faction(&self, faction: Faction) -> i32;
    fn trust(&self, character_id: &str) -> i32;
    fn integrity(&self) -> i32;
    fn event_active(&self, event_id: &str) -> bool;

    /// Apply faction and trust deltas from a chosen option.
    fn apply_deltas(&mut self, option: &DialogueOption, character_id: &str);

    /// Carry out an action node's effect or an option's consequence action.
    ///
    /// # Errors
    ///
    /// Returns an error when the effect references something that does not exist.
    fn apply_effect(&mut self, effect: &NodeEffect, character_id: &str) -> SimResult<()>;
}

/// What the player currently sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DialogueView {
    Speech {
        node_id: String,
        speaker: Option<String>,
        text: String,
    },
    Choice {
        node_id: String,
        speaker: Option<String>,
        text: String,
        /// Selectable options with their index in the node's full list.
        options: Vec<(usize, DialogueOption)>,
    },
    Ended,
}

/// Whether `option` is selectable given the live values.
#[must_use]
pub fn is_choice_available<W: DialogueWorld + ?Sized>(
    option: &DialogueOption,
    world: &W,
    character_id: &str,
) -> bool {
    option.requirements.satisfied_by(
        world.faction(Faction::Legion),
        world.faction(Faction::Community),
        world.faction(Faction::Outsider),
        world.trust(character_id),
    )
}

/// Options of the cursor's choice node that pass their gates, as (index, option) pairs.
#[must_use]
pub fn available_choices<W: DialogueWorld + ?Sized>(
    library: &DialogueLibrary,
    cursor: &DialogueCursor,
    world: &W,
) -> Vec<(usize, DialogueOption)> {
    let Some(node) = library
        .tree(&cursor.tree_id)
        .and_then(|tree| tree.node(&cursor.node_id))
    else {
        return Vec::new();
    };
    match &node.body {
        NodeBody::Choice { options } => options
            .iter()
            .enumerate()
            .filter(|(_, option)| is_choice_available(option, world, &cursor.character_id))
            .map(|(index, option)| (index, option.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Render the node under the cursor.
///
/// # Errors
///
/// Returns [`SimError::NotFound`] if the cursor no longer points into the library.
pub fn view<W: DialogueWorld + ?Sized>(
    library: &DialogueLibrary,
    cursor: &DialogueCursor,
    world: &W,
) -> SimResult<DialogueView> {
    let node = current_node(library, cursor)?;
    Ok(match &node.body {
        NodeBody::Choice { .. } => DialogueView::Choice {
            node_id: node.id.clone(),
            speaker: node.speaker.clone(),
            text: node.text.clone(),
            options: available_choices(library, cursor, world),
        },
        _ => DialogueView::Speech {
            node_id: node.id.clone(),
            speaker: node.speaker.clone(),
            text: node.text.clone(),
        },
    })
}

fn current_node<'a>(library: &'a DialogueLibrary, cursor: &DialogueCursor) -> SimResult<&'a DialogueNode> {
    let tree = library
        .tree(&cursor.tree_id)
        .ok_or_else(|| SimError::not_found(EntityKind::DialogueTree, &cursor.tree_id))?;
    tree.node(&cursor.node_id)
        .ok_or_else(|| SimError::not_found(EntityKind::DialogueNode, &cursor.node_id))
}

/// Open the tree registered for `character_id` and settle on the first node that needs input.
///
/// Returns `None` as the cursor when the conversation ended before any input was needed.
///
/// # Errors
///
/// Returns [`SimError::NotFound`] when no tree is registered for the character.
pub fn start_dialogue<W: DialogueWorld + ?Sized>(
    library: &DialogueLibrary,
    character_id: &str,
    world: &mut W,
) -> SimResult<Option<DialogueCursor>> {
    let tree = library
        .tree_for(character_id)
        .ok_or_else(|| SimError::not_found(EntityKind::DialogueTree, character_id))?;
    let cursor = DialogueCursor {
        tree_id: tree.id.clone(),
        node_id: tree.root.clone(),
        character_id: character_id.to_string(),
    };
    settle(tree, cursor, world)
}

/// Advance past a speech node.
///
/// # Errors
///
/// Returns [`SimError::InvalidState`] when the cursor is not on a speech node.
pub fn continue_dialogue<W: DialogueWorld + ?Sized>(
    library: &DialogueLibrary,
    cursor: &DialogueCursor,
    world: &mut W,
) -> SimResult<Option<DialogueCursor>> {
    let node = current_node(library, cursor)?;
    let NodeBody::Speech { next } = &node.body else {
        return Err(SimError::invalid_state(
            "continue is only valid on a speech node",
        ));
    };
    let tree = library
        .tree(&cursor.tree_id)
        .ok_or_else(|| SimError::not_found(EntityKind::DialogueTree, &cursor.tree_id))?;
    settle(tree, moved(cursor, next), world)
}

/// Choose option `index` of the current choice node, apply its consequences and move on.
///
/// # Errors
///
/// Returns [`SimError::InvalidIndex`] for an index outside the option list and
/// [`SimError::InvalidState`] for a locked option or a non-choice node; nothing changes.
pub fn select_choice<W: DialogueWorld + ?Sized>(
    library: &DialogueLibrary,
    cursor: &DialogueCursor,
    index: usize,
    world: &mut W,
) -> SimResult<Option<DialogueCursor>> {
    let node = current_node(library, cursor)?;
    let NodeBody::Choice { options } = &node.body else {
        return Err(SimError::invalid_state(
            "no choice is pending at this node",
        ));
    };
    let option = options
        .get(index)
        .ok_or(SimError::invalid_index(IndexKind::Choice, index, options.len()))?;
    if !is_choice_available(option, world, &cursor.character_id) {
        return Err(SimError::invalid_state(format!(
            "option {} is locked",
            option.id
        )));
    }

    if let Some(action_id) = &option.consequence_action {
        world.apply_effect(
            &NodeEffect::RecordAction {
                action_id: action_id.clone(),
            },
            &cursor.character_id,
        )?;
    }
    world.apply_deltas(option, &cursor.character_id);

    let tree = library
        .tree(&cursor.tree_id)
        .ok_or_else(|| SimError::not_found(EntityKind::DialogueTree, &cursor.tree_id))?;
    settle(tree, moved(cursor, &option.next_node), world)
}

fn moved(cursor: &DialogueCursor, node_id: &str) -> DialogueCursor {
    DialogueCursor {
        node_id: node_id.to_string(),
        ..cursor.clone()
    }
}

/// Run automatic nodes until one needs input or the end sentinel is reached.
fn settle<W: DialogueWorld + ?Sized>(
    tree: &DialogueTree,
    mut cursor: DialogueCursor,
    world: &mut W,
) -> SimResult<Option<DialogueCursor>> {
    for _ in 0..=tree.nodes.len() {
        if cursor.node_id == END_NODE {
            return Ok(None);
        }
        let node = tree
            .node(&cursor.node_id)
            .ok_or_else(|| SimError::not_found(EntityKind::DialogueNode, &cursor.node_id))?;
        let next = match &node.body {
            NodeBody::Speech { .. } | NodeBody::Choice { .. } => return Ok(Some(cursor)),
            NodeBody::Condition {
                condition,
                on_true,
                on_false,
            } => {
                if evaluate(condition, world, &cursor.character_id) {
                    on_true.clone()
                } else {
                    on_false.clone()
                }
            }
            NodeBody::Action { effect, next } => {
                world.apply_effect(effect, &cursor.character_id)?;
                next.clone()
            }
        };
        cursor.node_id = next;
    }
    Err(SimError::invalid_state(format!(
        "dialogue tree {} did not reach an input node",
        tree.id
    )))
}

fn evaluate<W: DialogueWorld + ?Sized>(condition: &Condition, world: &W, character_id: &str) -> bool {
    match condition {
        Condition::ReputationAtLeast { faction, value } => world.faction(*faction) >= *value,
        Condition::TrustAtLeast { value } => world.trust(character_id) >= *value,
        Condition::EventActive { event_id } => world.event_active(event_id),
        Condition::IntegrityAtLeast { value } => world.integrity() >= *value,
    }
}
