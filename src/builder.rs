//! Converts a public tree into the layered lookahead layout.
//!
//! The tree is walked breadth-first. Every inner node of layer `d` becomes a
//! parent column of layer `d + 1`, and its `a`-th child lands in action row
//! `a`. The parent map recorded on each layer is the only re-indexing the
//! solver ever needs: propagation gathers through it, back-propagation
//! scatters through it.

use std::collections::BTreeMap;

use itertools::iproduct;
use log::debug;
use ndarray::{Array2, Array4, Array5};

use crate::config::ResolveConfig;
use crate::error::{LookaheadError, LookaheadResult};
use crate::layer::{FoldSlot, Layer, NodeSlot, SlotKind};
use crate::player::{Player, Seat};
use crate::tree::{Action, NodeKind, PublicNode, PublicTree};

/// Layers plus the bookkeeping shared across them.
#[derive(Debug, Clone)]
pub struct LookaheadLayout {
    pub layers: Vec<Layer>,
    /// Absolute player re-solving at the root.
    pub resolver: Player,
    pub fold_count: usize,
    pub call_count: usize,
    pub transition_count: usize,
    /// Root action index → row of the depth-limit buffers.
    pub action_to_index: BTreeMap<usize, usize>,
    /// Pot size of each depth-limit row.
    pub transition_pots: Vec<f32>,
}

impl LookaheadLayout {
    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

pub struct LookaheadBuilder<'a> {
    config: &'a ResolveConfig,
    batch_size: usize,
}

impl<'a> LookaheadBuilder<'a> {
    pub fn new(config: &'a ResolveConfig, batch_size: usize) -> Self {
        LookaheadBuilder { config, batch_size }
    }

    pub fn build(&self, tree: &PublicTree) -> LookaheadResult<LookaheadLayout> {
        let resolver = tree.current_player().ok_or_else(|| {
            LookaheadError::InvalidTree("root must be a decision node".to_string())
        })?;
        if tree.root.children.is_empty() {
            return Err(LookaheadError::InvalidTree(
                "root has no actions".to_string(),
            ));
        }

        let mut layers = Vec::new();
        let mut grid: Vec<Vec<Option<&PublicNode>>> = vec![vec![Some(&tree.root)]];
        let mut parents: Vec<NodeSlot> = Vec::new();
        let mut previous_actor: Option<Seat> = None;
        let (mut fold_total, mut call_total, mut transition_total) = (0, 0, 0);
        let mut transition_pots = Vec::new();

        loop {
            let depth = layers.len();
            let actions = grid.len();
            let parent_count = grid[0].len();

            let mut kinds = vec![vec![SlotKind::Absent; parent_count]; actions];
            let mut pot_size = Array2::zeros((actions, parent_count));
            let mut empty_action_mask = Array2::zeros((actions, parent_count));
            let mut inner: Vec<&PublicNode> = Vec::new();
            let mut inner_slots = Vec::new();
            let mut fold_slots = Vec::new();
            let mut call_slots = Vec::new();
            let mut transition_slots = Vec::new();
            let mut actor: Option<Seat> = None;

            for (a, p) in iproduct!(0..actions, 0..parent_count) {
                let Some(node) = grid[a][p] else { continue };
                let slot = NodeSlot::new(a, p);
                pot_size[[a, p]] = node.pot;
                empty_action_mask[[a, p]] = 1.0;
                if !node.is_decision() && !node.children.is_empty() {
                    return Err(LookaheadError::InvalidTree(format!(
                        "leaf {:?} at depth {} has children",
                        node.kind, depth
                    )));
                }

                kinds[a][p] = match node.kind {
                    NodeKind::Decision { player } => {
                        if node.children.is_empty() {
                            return Err(LookaheadError::InvalidTree(format!(
                                "decision node at depth {} has no actions",
                                depth
                            )));
                        }
                        let seat = Seat::of(player, resolver);
                        if actor.is_some_and(|current| current != seat) {
                            return Err(LookaheadError::InvalidTree(format!(
                                "both players act at depth {}",
                                depth
                            )));
                        }
                        actor = Some(seat);
                        inner.push(node);
                        inner_slots.push(slot);
                        SlotKind::Inner
                    }
                    NodeKind::Fold => {
                        let folder = previous_actor.ok_or_else(|| {
                            LookaheadError::InvalidTree("fold at the root".to_string())
                        })?;
                        fold_slots.push(FoldSlot { slot, folder });
                        SlotKind::Fold { folder }
                    }
                    NodeKind::Showdown => {
                        call_slots.push(slot);
                        SlotKind::Call
                    }
                    NodeKind::Transition if node.all_in && self.config.betting.is_no_limit() => {
                        // nothing left to bet, the runout is settled as a call
                        call_slots.push(slot);
                        SlotKind::Call
                    }
                    NodeKind::Transition => {
                        if tree.street >= self.config.streets_count {
                            return Err(LookaheadError::InvalidTree(format!(
                                "street transition on the last street ({})",
                                tree.street
                            )));
                        }
                        transition_slots.push(slot);
                        transition_pots.push(node.pot);
                        SlotKind::Transition
                    }
                };
            }

            let acting_player = actor
                .or(previous_actor.map(Seat::other))
                .unwrap_or(Seat::Resolver);
            let actions_count = inner.iter().map(|n| n.children.len()).max().unwrap_or(0);
            let terminal_actions_count = inner
                .iter()
                .map(|n| n.children.iter().filter(|c| !c.is_decision()).count())
                .max()
                .unwrap_or(0);
            let nonallinbets_count = inner
                .iter()
                .map(|n| {
                    n.children
                        .iter()
                        .filter(|c| c.is_decision() && c.action != Some(Action::AllIn))
                        .count()
                })
                .max()
                .unwrap_or(0);

            let mut layer = Layer {
                depth,
                acting_player,
                actions_count,
                terminal_actions_count,
                bets_count: actions_count.saturating_sub(terminal_actions_count),
                nonallinbets_count,
                parents: std::mem::take(&mut parents),
                kinds,
                term_fold_indices: fold_total..fold_total + fold_slots.len(),
                term_call_indices: call_total..call_total + call_slots.len(),
                transition_indices: transition_total..transition_total + transition_slots.len(),
                fold_slots,
                call_slots,
                transition_slots,
                pot_size,
                empty_action_mask,
                ranges_data: Array5::zeros((0, 0, 0, 0, 0)),
                cfvs_data: Array5::zeros((0, 0, 0, 0, 0)),
                average_cfvs_data: Array5::zeros((0, 0, 0, 0, 0)),
                current_strategy_data: Array4::zeros((0, 0, 0, 0)),
                average_strategies_data: Array4::zeros((0, 0, 0, 0)),
                regrets_data: Array4::zeros((0, 0, 0, 0)),
                positive_regrets_data: Array4::zeros((0, 0, 0, 0)),
            };
            layer.allocate(self.batch_size, self.config.hand_count);
            fold_total = layer.term_fold_indices.end;
            call_total = layer.term_call_indices.end;
            transition_total = layer.transition_indices.end;

            debug!(
                "layer {}: grid {:?}, actor {:?}, folds {}, calls {}, transitions {}",
                depth,
                layer.grid(),
                layer.acting_player,
                layer.fold_slots.len(),
                layer.call_slots.len(),
                layer.transition_slots.len()
            );
            layers.push(layer);

            if inner.is_empty() {
                break;
            }
            grid = (0..actions_count)
                .map(|a| inner.iter().map(|node| node.children.get(a)).collect())
                .collect();
            parents = inner_slots;
            previous_actor = Some(acting_player);
        }

        let action_to_index = layers[1]
            .transition_slots
            .iter()
            .enumerate()
            .map(|(row, slot)| (slot.action, layers[1].transition_indices.start + row))
            .collect();

        Ok(LookaheadLayout {
            layers,
            resolver,
            fold_count: fold_total,
            call_count: call_total,
            transition_count: transition_total,
            action_to_index,
            transition_pots,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BettingLimit;

    fn config(betting: BettingLimit) -> ResolveConfig {
        ResolveConfig {
            hand_count: 3,
            betting,
            ..Default::default()
        }
    }

    #[test]
    fn fold_call_tree_has_one_child_layer() {
        let config = config(BettingLimit::NoLimit);
        let tree = PublicTree::fold_call(Player::P1, 2, 1.0);
        let layout = LookaheadBuilder::new(&config, 2).build(&tree).unwrap();

        assert_eq!(layout.depth(), 2);
        let root = &layout.layers[0];
        assert_eq!(root.grid(), (1, 1));
        assert_eq!(root.acting_player, Seat::Resolver);
        assert_eq!(root.actions_count, 2);
        assert_eq!(root.terminal_actions_count, 2);

        let children = &layout.layers[1];
        assert_eq!(children.grid(), (2, 1));
        assert_eq!(children.parents, vec![NodeSlot::ROOT]);
        assert_eq!(children.kind(NodeSlot::new(0, 0)), SlotKind::Fold { folder: Seat::Resolver });
        assert_eq!(children.kind(NodeSlot::new(1, 0)), SlotKind::Call);
        assert_eq!(children.term_fold_indices, 0..1);
        assert_eq!(children.term_call_indices, 0..1);
        assert_eq!(children.ranges_data.dim(), (2, 1, 2, 2, 3));
    }

    #[test]
    fn bet_or_check_parents_and_padding() {
        let config = config(BettingLimit::NoLimit);
        let tree = PublicTree::bet_or_check(Player::P2, 2, 2.0, 2.0);
        let layout = LookaheadBuilder::new(&config, 1).build(&tree).unwrap();
        assert_eq!(layout.resolver, Player::P2);
        assert_eq!(layout.depth(), 4);

        let second = &layout.layers[2];
        assert_eq!(second.grid(), (2, 2));
        assert_eq!(second.parents, vec![NodeSlot::new(0, 0), NodeSlot::new(1, 0)]);
        assert_eq!(second.kind(NodeSlot::new(0, 0)), SlotKind::Call);
        assert_eq!(second.kind(NodeSlot::new(0, 1)), SlotKind::Fold { folder: Seat::Opponent });
        assert_eq!(second.kind(NodeSlot::new(1, 0)), SlotKind::Inner);
        assert_eq!(second.kind(NodeSlot::new(1, 1)), SlotKind::Call);
        assert_eq!(second.pot_size[[1, 1]], 4.0);

        let third = &layout.layers[3];
        assert_eq!(third.parents, vec![NodeSlot::new(1, 0)]);
        assert_eq!(third.kind(NodeSlot::new(0, 0)), SlotKind::Fold { folder: Seat::Resolver });
        assert_eq!(third.term_fold_indices, 1..2);
        assert_eq!(third.term_call_indices, 2..3);
        assert_eq!(layout.fold_count, 2);
        assert_eq!(layout.call_count, 3);
    }

    #[test]
    fn absent_actions_are_masked() {
        let config = config(BettingLimit::NoLimit);
        let mut tree = PublicTree::bet_or_check(Player::P1, 2, 2.0, 2.0);
        // opponent may only check behind
        tree.root.children[0].children.truncate(1);
        let layout = LookaheadBuilder::new(&config, 1).build(&tree).unwrap();
        let second = &layout.layers[2];
        assert_eq!(second.kind(NodeSlot::new(1, 0)), SlotKind::Absent);
        assert_eq!(second.empty_action_mask[[1, 0]], 0.0);
        assert_eq!(second.empty_action_mask[[1, 1]], 1.0);
        assert_eq!(layout.depth(), 3);
    }

    #[test]
    fn all_in_call_is_terminal_in_no_limit() {
        let config = config(BettingLimit::NoLimit);
        let tree = PublicTree::shove_or_check(Player::P1, 1, 2.0, 10.0);
        let layout = LookaheadBuilder::new(&config, 1).build(&tree).unwrap();
        assert_eq!(layout.transition_count, 1);
        assert_eq!(layout.call_count, 1);
        assert_eq!(layout.action_to_index.get(&0), Some(&0));
        assert_eq!(layout.action_to_index.get(&1), None);
        assert_eq!(layout.layers[2].kind(NodeSlot::new(1, 0)), SlotKind::Call);
        assert_eq!(layout.layers[0].bets_count, 1);
        assert_eq!(layout.layers[0].nonallinbets_count, 0);
    }

    #[test]
    fn all_in_call_is_a_transition_in_limit() {
        let config = config(BettingLimit::Limit);
        let tree = PublicTree::shove_or_check(Player::P1, 1, 2.0, 10.0);
        let layout = LookaheadBuilder::new(&config, 1).build(&tree).unwrap();
        assert_eq!(layout.transition_count, 2);
        assert_eq!(layout.call_count, 0);
        assert_eq!(layout.transition_pots, vec![2.0, 10.0]);
        assert_eq!(layout.layers[2].transition_indices, 1..2);
    }

    #[test]
    fn rejects_transition_on_last_street() {
        let config = config(BettingLimit::Limit);
        let tree = PublicTree::shove_or_check(Player::P1, 2, 2.0, 10.0);
        let err = LookaheadBuilder::new(&config, 1).build(&tree).unwrap_err();
        assert!(matches!(err, LookaheadError::InvalidTree(_)));
    }

    #[test]
    fn rejects_terminal_root() {
        let config = config(BettingLimit::NoLimit);
        let tree = PublicTree::new(2, PublicNode::showdown(Action::Call, 1.0));
        assert!(LookaheadBuilder::new(&config, 1).build(&tree).is_err());
    }
}
