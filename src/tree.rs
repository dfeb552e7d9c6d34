//! Public betting tree handed to the lookahead builder.
//!
//! The tree is already depth-limited: every leaf is either a terminal of the
//! game (fold, showdown) or a `Transition` into the next street whose value
//! is estimated by the depth-limit value function.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LookaheadResult;
use crate::player::Player;

/// Action leading into a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Fold,
    Check,
    Call,
    /// Bet or raise to the given per-player commitment, in chips.
    Bet(u32),
    AllIn,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Fold => write!(f, "Fold"),
            Action::Check => write!(f, "Check"),
            Action::Call => write!(f, "Call"),
            Action::Bet(amount) => write!(f, "Bet {}", amount),
            Action::AllIn => write!(f, "All-in"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Decision { player: Player },
    Fold,
    Showdown,
    /// Street ends without a showdown; continuation is estimated.
    Transition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicNode {
    pub kind: NodeKind,
    /// Action that led here, `None` at the root.
    #[serde(default)]
    pub action: Option<Action>,
    /// Chips committed by each player that are at stake at this node.
    pub pot: f32,
    /// Both players are all-in.
    #[serde(default)]
    pub all_in: bool,
    #[serde(default)]
    pub children: Vec<PublicNode>,
}

impl PublicNode {
    pub fn decision(player: Player, action: Option<Action>, pot: f32, children: Vec<PublicNode>) -> Self {
        PublicNode {
            kind: NodeKind::Decision { player },
            action,
            pot,
            all_in: false,
            children,
        }
    }

    pub fn fold(pot: f32) -> Self {
        PublicNode::leaf(NodeKind::Fold, Action::Fold, pot)
    }

    pub fn showdown(action: Action, pot: f32) -> Self {
        PublicNode::leaf(NodeKind::Showdown, action, pot)
    }

    pub fn transition(action: Action, pot: f32) -> Self {
        PublicNode::leaf(NodeKind::Transition, action, pot)
    }

    fn leaf(kind: NodeKind, action: Action, pot: f32) -> Self {
        PublicNode {
            kind,
            action: Some(action),
            pot,
            all_in: false,
            children: Vec::new(),
        }
    }

    pub fn with_all_in(mut self) -> Self {
        self.all_in = true;
        self
    }

    pub fn acting_player(&self) -> Option<Player> {
        match self.kind {
            NodeKind::Decision { player } => Some(player),
            _ => None,
        }
    }

    pub fn is_decision(&self) -> bool {
        matches!(self.kind, NodeKind::Decision { .. })
    }

    /// Number of node layers below and including this node.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(PublicNode::depth).max().unwrap_or(0)
    }

    fn map_showdowns(&mut self, f: &impl Fn(&mut PublicNode)) {
        if self.kind == NodeKind::Showdown {
            f(self);
        }
        for child in &mut self.children {
            child.map_showdowns(f);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicTree {
    pub street: u8,
    /// Board cards as card indices.
    #[serde(default)]
    pub board: Vec<u8>,
    /// Board class used by value functions that are indexed by class
    /// rather than by concrete board.
    #[serde(default)]
    pub board_class: Option<usize>,
    pub root: PublicNode,
}

impl PublicTree {
    pub fn new(street: u8, root: PublicNode) -> Self {
        PublicTree {
            street,
            board: Vec::new(),
            board_class: None,
            root,
        }
    }

    pub fn from_json(json: &str) -> LookaheadResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> LookaheadResult<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn with_board(mut self, board: Vec<u8>) -> Self {
        self.board = board;
        self
    }

    pub fn with_board_class(mut self, class: usize) -> Self {
        self.board_class = Some(class);
        self
    }

    /// Player acting at the root, i.e. the re-solving player.
    pub fn current_player(&self) -> Option<Player> {
        self.root.acting_player()
    }

    /// Labels of the root actions, in action-slot order.
    pub fn actions(&self) -> Vec<Action> {
        self.root
            .children
            .iter()
            .filter_map(|child| child.action)
            .collect()
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Root player either folds or calls into a showdown.
    pub fn fold_call(resolver: Player, street: u8, pot: f32) -> Self {
        let root = PublicNode::decision(
            resolver,
            None,
            pot,
            vec![PublicNode::fold(pot), PublicNode::showdown(Action::Call, pot)],
        );
        PublicTree::new(street, root)
    }

    /// Single-bet street: the root player checks or bets, the opponent
    /// answers, and a check-bet line gives the root player one more decision.
    pub fn bet_or_check(resolver: Player, street: u8, pot: f32, bet: f32) -> Self {
        let opponent = resolver.opponent();
        let raised = pot + bet;
        let bet_label = Action::Bet(raised.round() as u32);

        let facing_bet = |player: Player| {
            PublicNode::decision(
                player,
                Some(bet_label),
                pot,
                vec![PublicNode::fold(pot), PublicNode::showdown(Action::Call, raised)],
            )
        };

        let after_check = PublicNode::decision(
            opponent,
            Some(Action::Check),
            pot,
            vec![
                PublicNode::showdown(Action::Check, pot),
                facing_bet(resolver),
            ],
        );
        let root = PublicNode::decision(resolver, None, pot, vec![after_check, facing_bet(opponent)]);
        PublicTree::new(street, root)
    }

    /// No-limit spot where the root player checks (ending the street) or
    /// shoves; a called shove is all-in before the street ends.
    pub fn shove_or_check(resolver: Player, street: u8, pot: f32, stack: f32) -> Self {
        let facing_shove = PublicNode::decision(
            resolver.opponent(),
            Some(Action::AllIn),
            pot,
            vec![
                PublicNode::fold(pot),
                PublicNode::transition(Action::Call, stack).with_all_in(),
            ],
        );
        let root = PublicNode::decision(
            resolver,
            None,
            pot,
            vec![PublicNode::transition(Action::Check, pot), facing_shove],
        );
        PublicTree::new(street, root)
    }

    /// Turns every showdown into a street transition, for re-solving an
    /// earlier street with the same betting.
    pub fn depth_limited(mut self, street: u8) -> Self {
        self.street = street;
        self.root.map_showdowns(&|node: &mut PublicNode| node.kind = NodeKind::Transition);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_call_has_two_root_actions() {
        let tree = PublicTree::fold_call(Player::P1, 2, 1.0);
        assert_eq!(tree.actions(), vec![Action::Fold, Action::Call]);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.current_player(), Some(Player::P1));
    }

    #[test]
    fn bet_or_check_reaches_four_layers() {
        let tree = PublicTree::bet_or_check(Player::P2, 2, 2.0, 2.0);
        assert_eq!(tree.depth(), 4);
        assert_eq!(tree.actions(), vec![Action::Check, Action::Bet(4)]);
    }

    #[test]
    fn depth_limited_replaces_showdowns() {
        let tree = PublicTree::bet_or_check(Player::P1, 2, 2.0, 2.0).depth_limited(1);
        assert_eq!(tree.street, 1);
        let check_check = &tree.root.children[0].children[0];
        assert_eq!(check_check.kind, NodeKind::Transition);
        let bet_fold = &tree.root.children[1].children[0];
        assert_eq!(bet_fold.kind, NodeKind::Fold);
    }

    #[test]
    fn json_round_trip_keeps_structure() {
        let tree = PublicTree::shove_or_check(Player::P1, 1, 2.0, 10.0);
        let json = serde_json::to_string(&tree).unwrap();
        let parsed = PublicTree::from_json(&json).unwrap();
        assert_eq!(parsed.depth(), tree.depth());
        assert!(parsed.root.children[1].children[1].all_in);
    }
}
