//! Terminal equity: counterfactual values at fold and showdown terminals.
//!
//! Evaluators receive a batch of range rows (one player's range per row) and
//! return pot-normalised values for the *other* player against that range.
//! The lookahead applies the fold sign and the pot scale afterwards.

use ndarray::{Array2, ArrayView2, ArrayViewMut2, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{check_shape, LookaheadError, LookaheadResult};
use crate::player::Perspective;

pub trait TerminalEquity: Send + Sync {
    fn hand_count(&self) -> usize;

    /// Owner of the values written by `call_value` / `fold_value`.
    fn perspective(&self) -> Perspective {
        Perspective::Opponent
    }

    /// Showdown values, `[rows, H]` ranges into `[rows, H]` values.
    fn call_value(&self, ranges: ArrayView2<'_, f32>, values: ArrayViewMut2<'_, f32>);

    /// Unsigned fold values: the pot each hand collects if the range holder
    /// is the one who folded.
    fn fold_value(&self, ranges: ArrayView2<'_, f32>, values: ArrayViewMut2<'_, f32>);
}

/// Terminal equity backed by dense hand-versus-hand matrices.
///
/// `call_matrix[[j, i]]` is the showdown payoff, in pots, of hand `j`
/// against hand `i`; `fold_matrix[[j, i]]` is 1 when the two hands can
/// coexist and 0 when they share a card.
#[derive(Debug, Clone)]
pub struct MatrixEquity {
    call_matrix: Array2<f32>,
    fold_matrix: Array2<f32>,
}

impl MatrixEquity {
    pub fn new(call_matrix: Array2<f32>, fold_matrix: Array2<f32>) -> LookaheadResult<Self> {
        let (rows, cols) = call_matrix.dim();
        if rows != cols || rows == 0 {
            return Err(LookaheadError::InvalidConfig(format!(
                "call matrix must be square and non-empty, got {}x{}",
                rows, cols
            )));
        }
        check_shape("fold_matrix", &[rows, cols], fold_matrix.shape())?;
        Ok(MatrixEquity {
            call_matrix,
            fold_matrix,
        })
    }

    /// Builds both matrices from per-hand showdown strengths. `conflicts(j, i)`
    /// tells whether hands `j` and `i` share a card.
    pub fn from_strengths(strengths: &[f32], conflicts: impl Fn(usize, usize) -> bool) -> Self {
        let n = strengths.len();
        let call_matrix = Array2::from_shape_fn((n, n), |(j, i)| {
            if conflicts(j, i) {
                0.0
            } else {
                match strengths[j].partial_cmp(&strengths[i]) {
                    Some(std::cmp::Ordering::Greater) => 1.0,
                    Some(std::cmp::Ordering::Less) => -1.0,
                    _ => 0.0,
                }
            }
        });
        let fold_matrix = Array2::from_shape_fn((n, n), |(j, i)| if conflicts(j, i) { 0.0 } else { 1.0 });
        MatrixEquity {
            call_matrix,
            fold_matrix,
        }
    }

    pub fn call_matrix(&self) -> ArrayView2<'_, f32> {
        self.call_matrix.view()
    }

    pub fn fold_matrix(&self) -> ArrayView2<'_, f32> {
        self.fold_matrix.view()
    }

    fn apply(matrix: &Array2<f32>, ranges: ArrayView2<'_, f32>, mut values: ArrayViewMut2<'_, f32>) {
        Zip::from(values.rows_mut())
            .and(ranges.rows())
            .par_for_each(|mut out, range| out.assign(&matrix.dot(&range)));
    }
}

impl TerminalEquity for MatrixEquity {
    fn hand_count(&self) -> usize {
        self.call_matrix.nrows()
    }

    fn call_value(&self, ranges: ArrayView2<'_, f32>, values: ArrayViewMut2<'_, f32>) {
        Self::apply(&self.call_matrix, ranges, values);
    }

    fn fold_value(&self, ranges: ArrayView2<'_, f32>, values: ArrayViewMut2<'_, f32>) {
        Self::apply(&self.fold_matrix, ranges, values);
    }
}

/// JSON description of a `MatrixEquity`: hand strengths plus the pairs of
/// hands that cannot be held at the same time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquitySpec {
    pub strengths: Vec<f32>,
    #[serde(default)]
    pub conflicts: Vec<[usize; 2]>,
}

impl EquitySpec {
    pub fn into_equity(self) -> MatrixEquity {
        let conflicts = self.conflicts;
        MatrixEquity::from_strengths(&self.strengths, |j, i| {
            conflicts
                .iter()
                .any(|&[a, b]| (a == j && b == i) || (a == i && b == j))
        })
    }
}

/// Leduc hold'em: six cards (J, Q, K in two suits), one private card per
/// player, one board card.
pub mod leduc {
    use super::*;

    pub const HAND_COUNT: usize = 6;
    const NAMES: [&str; HAND_COUNT] = ["Js", "Jh", "Qs", "Qh", "Ks", "Kh"];

    pub fn rank(card: usize) -> usize {
        card / 2
    }

    pub fn hand_name(hand: usize) -> &'static str {
        NAMES[hand]
    }

    /// Showdown strength of each hand on `board`; pairs beat high cards.
    pub fn strengths(board: usize) -> Vec<f32> {
        (0..HAND_COUNT)
            .map(|hand| {
                if rank(hand) == rank(board) {
                    10.0 + rank(hand) as f32
                } else {
                    rank(hand) as f32
                }
            })
            .collect()
    }

    /// Hands not blocked by the board.
    pub fn possible_hands(board: Option<usize>) -> Vec<bool> {
        (0..HAND_COUNT).map(|hand| Some(hand) != board).collect()
    }

    /// River equity on a given board card.
    pub fn river(board: usize) -> MatrixEquity {
        MatrixEquity::from_strengths(&strengths(board), |j, i| i == j || i == board || j == board)
    }

    /// All-in equity before the board card, averaged over the cards that
    /// can still come.
    pub fn preflop() -> MatrixEquity {
        let rivers: Vec<MatrixEquity> = (0..HAND_COUNT).map(river).collect();
        let call_matrix = Array2::from_shape_fn((HAND_COUNT, HAND_COUNT), |(j, i)| {
            if i == j {
                return 0.0;
            }
            let boards: Vec<usize> = (0..HAND_COUNT).filter(|&b| b != i && b != j).collect();
            let total: f32 = boards.iter().map(|&b| rivers[b].call_matrix[[j, i]]).sum();
            total / boards.len() as f32
        });
        let fold_matrix =
            Array2::from_shape_fn((HAND_COUNT, HAND_COUNT), |(j, i)| if i == j { 0.0 } else { 1.0 });
        MatrixEquity {
            call_matrix,
            fold_matrix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    #[test]
    fn strengths_give_antisymmetric_call_matrix() {
        let equity = MatrixEquity::from_strengths(&[1.0, 2.0, 2.0], |_, _| false);
        let m = equity.call_matrix();
        assert_eq!(m[[1, 0]], 1.0);
        assert_eq!(m[[0, 1]], -1.0);
        assert_eq!(m[[1, 2]], 0.0);
        for j in 0..3 {
            for i in 0..3 {
                assert_eq!(m[[j, i]], -m[[i, j]]);
            }
        }
    }

    #[test]
    fn call_value_is_row_matrix_product() {
        let equity = MatrixEquity::from_strengths(&[0.0, 1.0], |_, _| false);
        let ranges = array![[0.5f32, 0.5], [1.0, 0.0]];
        let mut values = Array2::zeros((2, 2));
        equity.call_value(ranges.view(), values.view_mut());
        // hand 0 loses to hand 1, hand 1 beats hand 0
        let expected = array![[-0.5f32, 0.5], [0.0, 1.0]];
        for (got, want) in values.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(got, want, epsilon = 1e-6);
        }
    }

    #[test]
    fn fold_value_respects_blockers() {
        let equity = MatrixEquity::from_strengths(&[0.0, 1.0, 2.0], |j, i| j == i);
        let ranges = array![[0.2f32, 0.3, 0.5]];
        let mut values = Array2::zeros((1, 3));
        equity.fold_value(ranges.view(), values.view_mut());
        for (got, want) in values.iter().zip([0.8f32, 0.7, 0.5].iter()) {
            assert_abs_diff_eq!(got, want, epsilon = 1e-6);
        }
    }

    #[test]
    fn spec_conflicts_are_symmetric() {
        let spec: EquitySpec = serde_json::from_str(r#"{"strengths": [1, 2, 3], "conflicts": [[0, 2]]}"#).unwrap();
        let equity = spec.into_equity();
        assert_eq!(equity.fold_matrix()[[0, 2]], 0.0);
        assert_eq!(equity.fold_matrix()[[2, 0]], 0.0);
        assert_eq!(equity.call_matrix()[[2, 0]], 0.0);
        assert_eq!(equity.call_matrix()[[2, 1]], 1.0);
    }

    #[test]
    fn mismatched_matrices_are_rejected() {
        let result = MatrixEquity::new(Array2::zeros((2, 2)), Array2::zeros((3, 3)));
        assert!(result.is_err());
    }

    #[test]
    fn leduc_pair_beats_higher_card() {
        // board Jh: Js pairs and beats both kings
        let equity = leduc::river(1);
        assert_eq!(equity.call_matrix()[[0, 4]], 1.0);
        assert_eq!(equity.call_matrix()[[4, 2]], 1.0);
        assert_eq!(equity.fold_matrix()[[1, 3]], 0.0);
        assert_eq!(leduc::possible_hands(Some(1)), vec![true, false, true, true, true, true]);
    }

    #[test]
    fn leduc_preflop_is_zero_sum() {
        let equity = leduc::preflop();
        let m = equity.call_matrix();
        for j in 0..leduc::HAND_COUNT {
            for i in 0..leduc::HAND_COUNT {
                assert_abs_diff_eq!(m[[j, i]], -m[[i, j]], epsilon = 1e-6);
            }
        }
        // a king is favoured against a jack
        assert!(m[[4, 0]] > 0.0);
    }
}
