//! Depth-limited lookahead re-solved with CFR+.
//!
//! Lifecycle: `new` → `build_lookahead` → `resolve_first_node` or `resolve`
//! → `get_results` / `get_chance_action_cfv`. `reset` returns a resolved
//! lookahead to the built state so it can be solved again with new inputs.
//!
//! One iteration runs, in order: opponent range reconstruction (gadget
//! resolves only), regret matching, range propagation, strategy averaging,
//! terminal and depth-limit evaluation, value back-propagation, the regret
//! update and value averaging.

mod propagate;
mod results;
mod strategy;
mod terminal;

use std::sync::Arc;

use log::{info, trace};
use ndarray::{s, Array2, ArrayView2};

use crate::builder::{LookaheadBuilder, LookaheadLayout};
use crate::config::ResolveConfig;
use crate::equity::TerminalEquity;
use crate::error::{check_shape, LookaheadError, LookaheadResult};
use crate::gadget::{CfrdGadget, RangeReconstructor};
use crate::layer::Layer;
use crate::player::Seat;
use crate::tree::PublicTree;
use crate::value::ValueFunction;

pub use results::LookaheadResults;

use terminal::{BoardState, TerminalBuffers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Empty,
    Built,
    Resolved,
}

struct BuiltLookahead {
    layout: LookaheadLayout,
    buffers: TerminalBuffers,
    board: BoardState,
}

pub struct Lookahead {
    config: ResolveConfig,
    batch_size: usize,
    terminal_equity: Arc<dyn TerminalEquity>,
    value_function: Option<Arc<dyn ValueFunction>>,
    possible_hands: Option<Vec<bool>>,
    built: Option<BuiltLookahead>,
    gadget: Option<Box<dyn RangeReconstructor>>,
    phase: Phase,
}

impl Lookahead {
    pub fn new(terminal_equity: Arc<dyn TerminalEquity>, batch_size: usize, config: ResolveConfig) -> LookaheadResult<Self> {
        config.validate()?;
        if batch_size == 0 {
            return Err(LookaheadError::InvalidConfig("batch_size must be positive".to_string()));
        }
        if terminal_equity.hand_count() != config.hand_count {
            return Err(LookaheadError::InvalidConfig(format!(
                "terminal equity covers {} hands, config expects {}",
                terminal_equity.hand_count(),
                config.hand_count
            )));
        }
        Ok(Lookahead {
            config,
            batch_size,
            terminal_equity,
            value_function: None,
            possible_hands: None,
            built: None,
            gadget: None,
            phase: Phase::Empty,
        })
    }

    /// Attaches the estimator used at street transitions.
    pub fn with_value_function(mut self, value_function: Arc<dyn ValueFunction>) -> Self {
        self.value_function = Some(value_function);
        self
    }

    /// Hands the reconstructed opponent range may hold; all hands by default.
    pub fn with_possible_hands(mut self, possible_hands: Vec<bool>) -> Self {
        self.possible_hands = Some(possible_hands);
        self
    }

    pub fn config(&self) -> &ResolveConfig {
        &self.config
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn is_resolved(&self) -> bool {
        self.phase == Phase::Resolved
    }

    pub fn layout(&self) -> Option<&LookaheadLayout> {
        self.built.as_ref().map(|built| &built.layout)
    }

    /// Layers of the built lookahead; empty before `build_lookahead`.
    pub fn layers(&self) -> &[Layer] {
        self.layout().map(|layout| layout.layers.as_slice()).unwrap_or(&[])
    }

    /// Lays out `tree`. Building again discards any previous layout and
    /// solution.
    pub fn build_lookahead(&mut self, tree: &PublicTree) -> LookaheadResult<()> {
        let layout = LookaheadBuilder::new(&self.config, self.batch_size).build(tree)?;
        if layout.transition_count > 0 && self.value_function.is_none() {
            return Err(LookaheadError::MissingValueFunction);
        }
        let buffers = TerminalBuffers::new(&layout, self.batch_size, self.config.hand_count);
        self.built = Some(BuiltLookahead {
            layout,
            buffers,
            board: BoardState::from_tree(tree),
        });
        self.gadget = None;
        self.phase = Phase::Built;
        Ok(())
    }

    /// Clears ranges, strategies, regrets and values, keeping the layout.
    pub fn reset(&mut self) {
        if let Some(built) = self.built.as_mut() {
            for layer in built.layout.layers.iter_mut() {
                layer.reset();
            }
            built.buffers.reset();
            self.phase = Phase::Built;
        }
        self.gadget = None;
    }

    /// Re-solves with both ranges given, `[B, H]` each. Only sound where the
    /// opponent's range is exactly known, i.e. at the root of the game.
    pub fn resolve_first_node(
        &mut self,
        player_range: ArrayView2<'_, f32>,
        opponent_range: ArrayView2<'_, f32>,
    ) -> LookaheadResult<()> {
        self.ensure_ready()?;
        self.check_input("player_range", player_range)?;
        self.check_input("opponent_range", opponent_range)?;

        self.seed_root(Seat::Resolver, player_range)?;
        self.seed_root(Seat::Opponent, opponent_range)?;
        self.gadget = None;
        self.compute()
    }

    /// Re-solves with the player's range and the values the opponent achieved
    /// before this node; the opponent range is rebuilt every iteration by a
    /// CFR-D gadget.
    pub fn resolve(&mut self, player_range: ArrayView2<'_, f32>, opponent_cfvs: ArrayView2<'_, f32>) -> LookaheadResult<()> {
        self.ensure_ready()?;
        self.check_input("opponent_cfvs", opponent_cfvs)?;
        let possible_hands = self
            .possible_hands
            .clone()
            .unwrap_or_else(|| vec![true; self.config.hand_count]);
        let gadget = CfrdGadget::new(opponent_cfvs.to_owned(), &possible_hands, &self.config)?;
        self.resolve_with_gadget(player_range, Box::new(gadget))
    }

    /// Same as `resolve` with a caller-supplied range reconstructor.
    pub fn resolve_with_gadget(
        &mut self,
        player_range: ArrayView2<'_, f32>,
        gadget: Box<dyn RangeReconstructor>,
    ) -> LookaheadResult<()> {
        self.ensure_ready()?;
        self.check_input("player_range", player_range)?;

        self.seed_root(Seat::Resolver, player_range)?;
        self.gadget = Some(gadget);
        self.compute()
    }

    /// Opponent values, `[B, H]`, after root action `action` ends the street
    /// and `board` is dealt.
    pub fn get_chance_action_cfv(&self, action: usize, board: &[u8]) -> LookaheadResult<Array2<f32>> {
        let built = self.resolved()?;
        terminal::chance_action_cfv(
            &built.layout,
            &built.buffers,
            self.value_function.as_deref(),
            action,
            board,
        )
    }

    pub fn get_results(&self) -> LookaheadResult<LookaheadResults> {
        let built = self.resolved()?;
        Ok(results::extract(
            &built.layout.layers,
            &self.config,
            self.gadget.is_some(),
        ))
    }

    fn ensure_ready(&self) -> LookaheadResult<()> {
        match self.phase {
            Phase::Empty => Err(LookaheadError::NotBuilt),
            Phase::Resolved => Err(LookaheadError::AlreadyResolved),
            Phase::Built => Ok(()),
        }
    }

    fn resolved(&self) -> LookaheadResult<&BuiltLookahead> {
        match (self.phase, self.built.as_ref()) {
            (Phase::Resolved, Some(built)) => Ok(built),
            _ => Err(LookaheadError::NotResolved),
        }
    }

    fn check_input(&self, name: &'static str, input: ArrayView2<'_, f32>) -> LookaheadResult<()> {
        if input.is_empty() {
            return Err(LookaheadError::MissingInput(name));
        }
        check_shape(name, &[self.batch_size, self.config.hand_count], input.shape())
    }

    fn seed_root(&mut self, seat: Seat, range: ArrayView2<'_, f32>) -> LookaheadResult<()> {
        let built = self.built.as_mut().ok_or(LookaheadError::NotBuilt)?;
        built.layout.layers[0]
            .ranges_data
            .slice_mut(s![0, 0, .., seat.index(), ..])
            .assign(&range);
        Ok(())
    }

    fn compute(&mut self) -> LookaheadResult<()> {
        let built = self.built.as_mut().ok_or(LookaheadError::NotBuilt)?;
        let BuiltLookahead {
            layout,
            buffers,
            board,
        } = built;
        let config = &self.config;

        for iteration in 0..config.cfr_iters {
            if let Some(gadget) = self.gadget.as_mut() {
                set_opponent_starting_range(&mut layout.layers, gadget.as_mut(), iteration)?;
            }
            strategy::compute_current_strategies(&mut layout.layers, config);
            propagate::compute_ranges(&mut layout.layers);
            strategy::update_average_strategies(&mut layout.layers, iteration, config);
            terminal::compute_terminal_equities(
                layout,
                buffers,
                board,
                self.terminal_equity.as_ref(),
                self.value_function.as_deref(),
            )?;
            propagate::compute_cfvs(&mut layout.layers);
            propagate::compute_regrets(&mut layout.layers, config.max_number);
            strategy::cumulate_average_cfvs(&mut layout.layers, iteration, config);
            trace!("cfr iteration {} of {} done", iteration + 1, config.cfr_iters);
        }

        strategy::normalize_average_strategies(&mut layout.layers);
        strategy::normalize_average_cfvs(&mut layout.layers, config);
        self.phase = Phase::Resolved;
        info!(
            "resolved lookahead: depth {}, batch {}, {} iterations ({} averaged){}",
            layout.depth(),
            self.batch_size,
            config.cfr_iters,
            config.averaged_iters(),
            if self.gadget.is_some() { ", reconstructed opponent range" } else { "" }
        );
        Ok(())
    }
}

/// Overwrites the opponent's root range with the reconstructor's output for
/// this iteration.
fn set_opponent_starting_range(
    layers: &mut [Layer],
    gadget: &mut dyn RangeReconstructor,
    iteration: usize,
) -> LookaheadResult<()> {
    let opponent = Seat::Opponent.index();
    let root = &mut layers[0];
    let cfvs = root.cfvs_data.slice(s![0, 0, .., opponent, ..]);
    let range = gadget.compute_opponent_range(cfvs, iteration);
    let mut target = root.ranges_data.slice_mut(s![0, 0, .., opponent, ..]);
    check_shape("reconstructed opponent range", target.shape(), range.shape())?;
    target.assign(&range);
    Ok(())
}
