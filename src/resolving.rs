//! Re-solving at a public node, queried by action.
//!
//! Wraps a fresh `Lookahead` per re-solve and answers the questions a
//! continual re-solving agent asks afterwards: how often to take each action,
//! and what the opponent's values are once an action (or a chance event
//! after it) has happened.

use std::sync::Arc;

use ndarray::{s, Array2, Array3, ArrayView2};

use crate::config::ResolveConfig;
use crate::equity::TerminalEquity;
use crate::error::{LookaheadError, LookaheadResult};
use crate::lookahead::{Lookahead, LookaheadResults};
use crate::ranges::is_valid_range;
use crate::tree::{Action, PublicTree};
use crate::value::ValueFunction;

struct Resolved {
    actions: Vec<Action>,
    lookahead: Lookahead,
    results: LookaheadResults,
}

pub struct Resolving {
    config: ResolveConfig,
    terminal_equity: Arc<dyn TerminalEquity>,
    value_function: Option<Arc<dyn ValueFunction>>,
    possible_hands: Option<Vec<bool>>,
    resolved: Option<Resolved>,
}

impl Resolving {
    pub fn new(config: ResolveConfig, terminal_equity: Arc<dyn TerminalEquity>) -> Self {
        Resolving {
            config,
            terminal_equity,
            value_function: None,
            possible_hands: None,
            resolved: None,
        }
    }

    pub fn with_value_function(mut self, value_function: Arc<dyn ValueFunction>) -> Self {
        self.value_function = Some(value_function);
        self
    }

    /// Hands not blocked by the board of the trees being re-solved.
    pub fn with_possible_hands(mut self, possible_hands: Vec<bool>) -> Self {
        self.possible_hands = Some(possible_hands);
        self
    }

    /// Re-solves `tree` with both ranges known (`[B, H]` each).
    pub fn resolve_first_node(
        &mut self,
        tree: &PublicTree,
        player_range: ArrayView2<'_, f32>,
        opponent_range: ArrayView2<'_, f32>,
    ) -> LookaheadResult<&LookaheadResults> {
        let mut lookahead = self.lookahead(tree, player_range.nrows())?;
        lookahead.resolve_first_node(player_range, opponent_range)?;
        self.store(tree, lookahead)
    }

    /// Re-solves `tree` with the player's range and the opponent's values
    /// achieved before reaching it.
    pub fn resolve(
        &mut self,
        tree: &PublicTree,
        player_range: ArrayView2<'_, f32>,
        opponent_cfvs: ArrayView2<'_, f32>,
    ) -> LookaheadResult<&LookaheadResults> {
        let possible = self.possible_hands();
        for (b, row) in player_range.rows().into_iter().enumerate() {
            if !is_valid_range(row, &possible) {
                return Err(LookaheadError::InvalidRange(format!(
                    "player range {} must be non-negative, sum to 1 and avoid blocked hands",
                    b
                )));
            }
        }
        let mut lookahead = self.lookahead(tree, player_range.nrows())?;
        lookahead.resolve(player_range, opponent_cfvs)?;
        self.store(tree, lookahead)
    }

    pub fn results(&self) -> LookaheadResult<&LookaheadResults> {
        Ok(&self.current()?.results)
    }

    /// Actions available at the re-solved node, in strategy order.
    pub fn possible_actions(&self) -> LookaheadResult<&[Action]> {
        Ok(&self.current()?.actions)
    }

    /// Probability of `action` for every hand, `[B, H]`.
    pub fn action_strategy(&self, action: Action) -> LookaheadResult<Array2<f32>> {
        let resolved = self.current()?;
        let index = action_index(&resolved.actions, action)?;
        Ok(resolved.results.strategy.slice(s![index, .., ..]).to_owned())
    }

    /// Opponent values after the re-solving player takes `action`, `[B, H]`.
    pub fn action_cfv(&self, action: Action) -> LookaheadResult<Array2<f32>> {
        let resolved = self.current()?;
        let index = action_index(&resolved.actions, action)?;
        Ok(resolved.results.children_cfvs.slice(s![index, .., ..]).to_owned())
    }

    /// Opponent values after `action` ends the street and `board` is dealt.
    pub fn chance_action_cfv(&self, action: Action, board: &[u8]) -> LookaheadResult<Array2<f32>> {
        let resolved = self.current()?;
        let index = action_index(&resolved.actions, action)?;
        resolved.lookahead.get_chance_action_cfv(index, board)
    }

    /// Re-solving player's root values; only after `resolve_first_node`.
    pub fn root_cfv(&self) -> LookaheadResult<Option<&Array2<f32>>> {
        Ok(self.current()?.results.root_cfvs.as_ref())
    }

    pub fn root_cfv_both_players(&self) -> LookaheadResult<Option<&Array3<f32>>> {
        Ok(self.current()?.results.root_cfvs_both_players.as_ref())
    }

    fn possible_hands(&self) -> Vec<bool> {
        self.possible_hands
            .clone()
            .unwrap_or_else(|| vec![true; self.config.hand_count])
    }

    fn lookahead(&self, tree: &PublicTree, batch_size: usize) -> LookaheadResult<Lookahead> {
        if batch_size == 0 {
            return Err(LookaheadError::MissingInput("player_range"));
        }
        let mut lookahead = Lookahead::new(Arc::clone(&self.terminal_equity), batch_size, self.config.clone())?
            .with_possible_hands(self.possible_hands());
        if let Some(value_function) = &self.value_function {
            lookahead = lookahead.with_value_function(Arc::clone(value_function));
        }
        lookahead.build_lookahead(tree)?;
        Ok(lookahead)
    }

    fn store(&mut self, tree: &PublicTree, lookahead: Lookahead) -> LookaheadResult<&LookaheadResults> {
        let results = lookahead.get_results()?;
        let resolved = self.resolved.insert(Resolved {
            actions: tree.actions(),
            lookahead,
            results,
        });
        Ok(&resolved.results)
    }

    fn current(&self) -> LookaheadResult<&Resolved> {
        self.resolved.as_ref().ok_or(LookaheadError::NotResolved)
    }
}

fn action_index(actions: &[Action], action: Action) -> LookaheadResult<usize> {
    actions
        .iter()
        .position(|&candidate| candidate == action)
        .ok_or_else(|| LookaheadError::UnknownAction(action.to_string()))
}
