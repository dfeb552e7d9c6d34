//! Depth-limit value functions.
//!
//! A value function estimates what each player's hands are worth when play
//! continues past the lookahead horizon. Inputs and outputs use the absolute
//! player order `[P1, P2]` on the player axis, independent of who is
//! re-solving.

use std::collections::HashMap;
use std::sync::Arc;

use ndarray::{ArrayView3, ArrayViewMut3, Axis};

use crate::equity::{leduc, MatrixEquity, TerminalEquity};
use crate::error::{check_shape, LookaheadResult};

/// Board the estimate is conditioned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardQuery<'a> {
    /// Bucketed board, used before the board cards are known.
    Class(usize),
    Cards(&'a [u8]),
}

pub trait ValueFunction: Send + Sync {
    /// Fills `values` (`[rows, 2, H]`) with pot-normalised counterfactual
    /// values for both players given their reach `ranges` (`[rows, 2, H]`).
    fn evaluate(
        &self,
        query: BoardQuery<'_>,
        ranges: ArrayView3<'_, f32>,
        values: ArrayViewMut3<'_, f32>,
    ) -> LookaheadResult<()>;
}

/// Check-down estimate: both players see a showdown on the next street with
/// no further betting.
#[derive(Debug, Clone)]
pub struct ShowdownValue {
    default: Arc<MatrixEquity>,
    boards: HashMap<Vec<u8>, Arc<MatrixEquity>>,
    classes: HashMap<usize, Arc<MatrixEquity>>,
}

impl ShowdownValue {
    pub fn new(default: Arc<MatrixEquity>) -> Self {
        ShowdownValue {
            default,
            boards: HashMap::new(),
            classes: HashMap::new(),
        }
    }

    pub fn with_board(mut self, board: Vec<u8>, equity: Arc<MatrixEquity>) -> Self {
        self.boards.insert(board, equity);
        self
    }

    pub fn with_class(mut self, class: usize, equity: Arc<MatrixEquity>) -> Self {
        self.classes.insert(class, equity);
        self
    }

    /// Leduc continuation: averaged equity by default, exact river equity
    /// once the board card (or its class, the card index) is known.
    pub fn leduc() -> Self {
        (0..leduc::HAND_COUNT).fold(ShowdownValue::new(Arc::new(leduc::preflop())), |value, card| {
            let river = Arc::new(leduc::river(card));
            value
                .with_board(vec![card as u8], Arc::clone(&river))
                .with_class(card, river)
        })
    }

    fn equity_for(&self, query: BoardQuery<'_>) -> &MatrixEquity {
        let found = match query {
            BoardQuery::Class(class) => self.classes.get(&class),
            BoardQuery::Cards(board) => self.boards.get(board),
        };
        found.unwrap_or(&self.default)
    }
}

impl ValueFunction for ShowdownValue {
    fn evaluate(
        &self,
        query: BoardQuery<'_>,
        ranges: ArrayView3<'_, f32>,
        mut values: ArrayViewMut3<'_, f32>,
    ) -> LookaheadResult<()> {
        let equity = self.equity_for(query);
        let (rows, _, _) = ranges.dim();
        let expected = [rows, 2, equity.hand_count()];
        check_shape("value function ranges", &expected, ranges.shape())?;
        check_shape("value function values", &expected, values.shape())?;

        for player in 0..2 {
            // call values are owned by the player facing the input range
            equity.call_value(
                ranges.index_axis(Axis(1), 1 - player),
                values.index_axis_mut(Axis(1), player),
            );
        }
        Ok(())
    }
}
