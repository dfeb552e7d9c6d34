//! Terminal and depth-limit evaluation.
//!
//! Ranges at fold, call and transition slots are gathered into flat buffers
//! (`[slots, B, 2, H]`), handed to the collaborators in one call per kind,
//! and the values scattered back into the layers. Transition buffers use the
//! absolute player order the value function expects.

use ndarray::{s, Array2, Array3, Array4, ArrayView2, ArrayViewMut2, ArrayViewMut3, ArrayView3, Axis};

use crate::builder::LookaheadLayout;
use crate::config::PLAYERS_COUNT;
use crate::equity::TerminalEquity;
use crate::error::{LookaheadError, LookaheadResult};
use crate::layer::Layer;
use crate::player::{Perspective, Player, Seat};
use crate::tree::PublicTree;
use crate::value::{BoardQuery, ValueFunction};

/// Board context of the lookahead root.
#[derive(Debug, Clone, Default)]
pub(super) struct BoardState {
    board: Vec<u8>,
    board_class: Option<usize>,
}

impl BoardState {
    pub(super) fn from_tree(tree: &PublicTree) -> Self {
        BoardState {
            board: tree.board.clone(),
            board_class: tree.board_class,
        }
    }

    fn query(&self) -> BoardQuery<'_> {
        match self.board_class {
            Some(class) => BoardQuery::Class(class),
            None => BoardQuery::Cards(&self.board),
        }
    }
}

#[derive(Debug, Clone)]
pub(super) struct TerminalBuffers {
    fold_ranges: Array4<f32>,
    fold_values: Array4<f32>,
    call_ranges: Array4<f32>,
    call_values: Array4<f32>,
    transition_ranges: Array4<f32>,
    transition_values: Array4<f32>,
}

impl TerminalBuffers {
    pub(super) fn new(layout: &LookaheadLayout, batch_size: usize, hand_count: usize) -> Self {
        let shape = |rows: usize| (rows, batch_size, PLAYERS_COUNT, hand_count);
        TerminalBuffers {
            fold_ranges: Array4::zeros(shape(layout.fold_count)),
            fold_values: Array4::zeros(shape(layout.fold_count)),
            call_ranges: Array4::zeros(shape(layout.call_count)),
            call_values: Array4::zeros(shape(layout.call_count)),
            transition_ranges: Array4::zeros(shape(layout.transition_count)),
            transition_values: Array4::zeros(shape(layout.transition_count)),
        }
    }

    pub(super) fn reset(&mut self) {
        for buffer in [
            &mut self.fold_ranges,
            &mut self.fold_values,
            &mut self.call_ranges,
            &mut self.call_values,
            &mut self.transition_ranges,
            &mut self.transition_values,
        ] {
            buffer.fill(0.0);
        }
    }

    fn gather(&mut self, layers: &[Layer], resolver: Player) {
        for layer in layers.iter().skip(1) {
            for (i, fold) in layer.fold_slots.iter().enumerate() {
                self.fold_ranges
                    .index_axis_mut(Axis(0), layer.term_fold_indices.start + i)
                    .assign(&layer.slot_ranges(fold.slot));
            }
            for (i, slot) in layer.call_slots.iter().enumerate() {
                self.call_ranges
                    .index_axis_mut(Axis(0), layer.term_call_indices.start + i)
                    .assign(&layer.slot_ranges(*slot));
            }
            for (i, slot) in layer.transition_slots.iter().enumerate() {
                let row = layer.transition_indices.start + i;
                let ranges = layer.slot_ranges(*slot);
                for seat in Seat::BOTH {
                    self.transition_ranges
                        .slice_mut(s![row, .., seat.player(resolver).index(), ..])
                        .assign(&ranges.index_axis(Axis(1), seat.index()));
                }
            }
        }
    }

    fn scatter(&self, layers: &mut [Layer], perspective: Perspective, resolver: Player) {
        for layer in layers.iter_mut().skip(1) {
            for (i, fold) in layer.fold_slots.iter().enumerate() {
                let values = self
                    .fold_values
                    .index_axis(Axis(0), layer.term_fold_indices.start + i);
                let mut target = layer
                    .cfvs_data
                    .slice_mut(s![fold.slot.action, fold.slot.parent, .., .., ..]);
                assign_by_owner(&mut target, values, perspective);
                // the folder loses what the other player collects
                target
                    .index_axis_mut(Axis(1), fold.folder.index())
                    .mapv_inplace(|v| -v);
            }
            for (i, slot) in layer.call_slots.iter().enumerate() {
                let values = self
                    .call_values
                    .index_axis(Axis(0), layer.term_call_indices.start + i);
                let mut target = layer
                    .cfvs_data
                    .slice_mut(s![slot.action, slot.parent, .., .., ..]);
                assign_by_owner(&mut target, values, perspective);
            }
            for (i, slot) in layer.transition_slots.iter().enumerate() {
                let row = layer.transition_indices.start + i;
                for seat in Seat::BOTH {
                    layer
                        .cfvs_data
                        .slice_mut(s![slot.action, slot.parent, .., seat.index(), ..])
                        .assign(&self.transition_values.slice(s![row, .., seat.player(resolver).index(), ..]));
                }
            }
        }
    }
}

/// Writes collaborator output computed from seat `q`'s range into the slot
/// of whoever owns those values.
fn assign_by_owner(target: &mut ArrayViewMut3<'_, f32>, values: ArrayView3<'_, f32>, perspective: Perspective) {
    for seat in Seat::BOTH {
        target
            .index_axis_mut(Axis(1), perspective.owner(seat).index())
            .assign(&values.index_axis(Axis(1), seat.index()));
    }
}

fn evaluate_rows(
    ranges: &Array4<f32>,
    values: &mut Array4<f32>,
    evaluate: impl FnOnce(ArrayView2<'_, f32>, ArrayViewMut2<'_, f32>),
) -> LookaheadResult<()> {
    if ranges.is_empty() {
        return Ok(());
    }
    let hands = ranges.len_of(Axis(3));
    let rows = ranges.len() / hands;
    evaluate(
        ranges.view().into_shape((rows, hands))?,
        values.view_mut().into_shape((rows, hands))?,
    );
    Ok(())
}

/// Fills the values of every terminal and depth-limit slot for the current
/// ranges, scaled by the slot's pot.
pub(super) fn compute_terminal_equities(
    layout: &mut LookaheadLayout,
    buffers: &mut TerminalBuffers,
    board: &BoardState,
    equity: &dyn TerminalEquity,
    value_function: Option<&dyn ValueFunction>,
) -> LookaheadResult<()> {
    let resolver = layout.resolver;
    buffers.gather(&layout.layers, resolver);

    if layout.transition_count > 0 {
        let value_function = value_function.ok_or(LookaheadError::MissingValueFunction)?;
        let (rows, batch, players, hands) = buffers.transition_ranges.dim();
        value_function.evaluate(
            board.query(),
            buffers.transition_ranges.view().into_shape((rows * batch, players, hands))?,
            buffers.transition_values.view_mut().into_shape((rows * batch, players, hands))?,
        )?;
    }
    evaluate_rows(&buffers.call_ranges, &mut buffers.call_values, |r, v| equity.call_value(r, v))?;
    evaluate_rows(&buffers.fold_ranges, &mut buffers.fold_values, |r, v| equity.fold_value(r, v))?;

    buffers.scatter(&mut layout.layers, equity.perspective(), resolver);
    for layer in layout.layers.iter_mut().skip(1) {
        let pot = layer
            .pot_size
            .view()
            .insert_axis(Axis(2))
            .insert_axis(Axis(3))
            .insert_axis(Axis(4));
        layer.cfvs_data *= &pot;
    }
    Ok(())
}

/// Opponent values, `[B, H]`, after root `action` leads into a street
/// transition and `board` is dealt. Uses the transition ranges of the last
/// iteration.
pub(super) fn chance_action_cfv(
    layout: &LookaheadLayout,
    buffers: &TerminalBuffers,
    value_function: Option<&dyn ValueFunction>,
    action: usize,
    board: &[u8],
) -> LookaheadResult<Array2<f32>> {
    let row = *layout
        .action_to_index
        .get(&action)
        .ok_or(LookaheadError::UnmappedAction(action))?;
    let value_function = value_function.ok_or(LookaheadError::MissingValueFunction)?;

    let ranges = buffers.transition_ranges.index_axis(Axis(0), row);
    let mut values = Array3::zeros(ranges.raw_dim());
    value_function.evaluate(BoardQuery::Cards(board), ranges, values.view_mut())?;

    let pot = layout.transition_pots[row];
    let opponent = layout.resolver.opponent().index();
    Ok(values.index_axis(Axis(1), opponent).mapv(|v| v * pot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::LookaheadBuilder;
    use crate::config::ResolveConfig;
    use crate::equity::MatrixEquity;
    use crate::layer::NodeSlot;
    use approx::assert_abs_diff_eq;

    fn fold_call(resolver: Player) -> (LookaheadLayout, TerminalBuffers) {
        let config = ResolveConfig {
            hand_count: 2,
            ..Default::default()
        };
        let mut layout = LookaheadBuilder::new(&config, 1)
            .build(&PublicTree::fold_call(resolver, 2, 3.0))
            .unwrap();
        for layer in layout.layers.iter_mut() {
            layer.ranges_data.fill(0.5);
        }
        let buffers = TerminalBuffers::new(&layout, 1, 2);
        (layout, buffers)
    }

    #[test]
    fn fold_values_are_signed_and_scaled() {
        let (mut layout, mut buffers) = fold_call(Player::P1);
        let equity = MatrixEquity::from_strengths(&[1.0, 0.0], |_, _| false);
        compute_terminal_equities(&mut layout, &mut buffers, &BoardState::default(), &equity, None).unwrap();

        let fold = layout.layers[1].slot_cfvs(NodeSlot::new(0, 0));
        // resolver folded a pot of 3 against an opponent range of mass 1
        assert_abs_diff_eq!(fold[[0, Seat::Resolver.index(), 0]], -3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(fold[[0, Seat::Opponent.index(), 1]], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn call_values_are_zero_sum() {
        let (mut layout, mut buffers) = fold_call(Player::P2);
        let equity = MatrixEquity::from_strengths(&[1.0, 0.0], |_, _| false);
        layout.layers[1].ranges_data[[1, 0, 0, 0, 0]] = 0.9;
        layout.layers[1].ranges_data[[1, 0, 0, 1, 1]] = 0.2;
        compute_terminal_equities(&mut layout, &mut buffers, &BoardState::default(), &equity, None).unwrap();

        let layer = &layout.layers[1];
        let call = layer.slot_cfvs(NodeSlot::new(1, 0));
        let ranges = layer.slot_ranges(NodeSlot::new(1, 0));
        let total = |seat: Seat| -> f32 {
            (0..2).map(|h| call[[0, seat.index(), h]] * ranges[[0, seat.index(), h]]).sum()
        };
        assert_abs_diff_eq!(total(Seat::Resolver), -total(Seat::Opponent), epsilon = 1e-5);
    }

    #[test]
    fn unmapped_chance_action_is_an_error() {
        let (layout, buffers) = fold_call(Player::P1);
        let err = chance_action_cfv(&layout, &buffers, None, 1, &[0]).unwrap_err();
        assert!(matches!(err, LookaheadError::UnmappedAction(1)));
    }
}
