//! One depth level of the lookahead.
//!
//! Layer `d` is a rectangular grid of node slots `[action, parent]`: slot
//! `(a, k)` is the child reached by action `a` from the `k`-th inner node of
//! layer `d - 1`. Layer 0 is the `[1, 1]` grid holding the root. Nodes with
//! fewer actions than the widest node of their layer leave `Absent` padding
//! slots, which the empty-action mask zeroes out.
//!
//! Tensor shapes, with `A` actions, `P` parents, `B` batch, `H` hands:
//! - ranges / cfvs / averages of cfvs: `[A, P, B, 2, H]`
//! - strategies / regrets: `[A, P, B, H]`
//! - pot size / empty-action mask: `[A, P]`

use std::ops::Range;

use ndarray::{s, Array2, Array4, Array5, ArrayView3};

use crate::config::PLAYERS_COUNT;
use crate::player::Seat;

/// Position of a node inside its layer's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeSlot {
    pub action: usize,
    pub parent: usize,
}

impl NodeSlot {
    pub const ROOT: NodeSlot = NodeSlot { action: 0, parent: 0 };

    pub fn new(action: usize, parent: usize) -> Self {
        NodeSlot { action, parent }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Padding for an action the parent does not have.
    Absent,
    Fold { folder: Seat },
    Call,
    Transition,
    Inner,
}

impl SlotKind {
    pub fn is_present(self) -> bool {
        !matches!(self, SlotKind::Absent)
    }
}

/// Fold terminal together with the seat that folded into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldSlot {
    pub slot: NodeSlot,
    pub folder: Seat,
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub depth: usize,
    /// Seat choosing the actions that lead from this layer to the next.
    pub acting_player: Seat,
    /// Width of the action axis of the *next* layer.
    pub actions_count: usize,
    pub terminal_actions_count: usize,
    pub bets_count: usize,
    pub nonallinbets_count: usize,

    /// Parent ordinal `k` → slot of that parent in the previous layer.
    pub parents: Vec<NodeSlot>,
    /// Slot kinds, indexed `[action][parent]`.
    pub kinds: Vec<Vec<SlotKind>>,
    pub fold_slots: Vec<FoldSlot>,
    pub call_slots: Vec<NodeSlot>,
    pub transition_slots: Vec<NodeSlot>,
    pub term_fold_indices: Range<usize>,
    pub term_call_indices: Range<usize>,
    pub transition_indices: Range<usize>,

    pub pot_size: Array2<f32>,
    pub empty_action_mask: Array2<f32>,

    pub ranges_data: Array5<f32>,
    pub cfvs_data: Array5<f32>,
    pub average_cfvs_data: Array5<f32>,
    pub current_strategy_data: Array4<f32>,
    pub average_strategies_data: Array4<f32>,
    pub regrets_data: Array4<f32>,
    pub positive_regrets_data: Array4<f32>,
}

impl Layer {
    /// Grid dimensions `(actions, parents)` of this layer.
    pub fn grid(&self) -> (usize, usize) {
        self.pot_size.dim()
    }

    pub fn kind(&self, slot: NodeSlot) -> SlotKind {
        self.kinds[slot.action][slot.parent]
    }

    /// Allocates zeroed tensors for `batch_size` instances of `hand_count` hands.
    pub fn allocate(&mut self, batch_size: usize, hand_count: usize) {
        let (actions, parents) = self.grid();
        let players = (actions, parents, batch_size, PLAYERS_COUNT, hand_count);
        let single = (actions, parents, batch_size, hand_count);
        self.ranges_data = Array5::zeros(players);
        self.cfvs_data = Array5::zeros(players);
        self.average_cfvs_data = Array5::zeros(players);
        self.current_strategy_data = Array4::zeros(single);
        self.average_strategies_data = Array4::zeros(single);
        self.regrets_data = Array4::zeros(single);
        self.positive_regrets_data = Array4::zeros(single);
    }

    /// Zeroes every mutable tensor, keeping the static layout.
    pub fn reset(&mut self) {
        self.ranges_data.fill(0.0);
        self.cfvs_data.fill(0.0);
        self.average_cfvs_data.fill(0.0);
        self.current_strategy_data.fill(0.0);
        self.average_strategies_data.fill(0.0);
        self.regrets_data.fill(0.0);
        self.positive_regrets_data.fill(0.0);
    }

    /// Ranges of both players at one slot, `[B, 2, H]`.
    pub fn slot_ranges(&self, slot: NodeSlot) -> ArrayView3<'_, f32> {
        self.ranges_data.slice(s![slot.action, slot.parent, .., .., ..])
    }

    pub fn slot_cfvs(&self, slot: NodeSlot) -> ArrayView3<'_, f32> {
        self.cfvs_data.slice(s![slot.action, slot.parent, .., .., ..])
    }
}
