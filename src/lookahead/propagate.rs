//! Forward range propagation and backward value propagation.
//!
//! Both directions go through `Layer::parents`: child column `k` of layer
//! `d` hangs under slot `parents[k]` of layer `d - 1`.

use ndarray::{s, Axis, Zip};

use crate::layer::{Layer, SlotKind};

/// Reach probabilities of every node. The acting player's range is scaled by
/// the current strategy; the other range is passed through unchanged.
pub(super) fn compute_ranges(layers: &mut [Layer]) {
    for d in 1..layers.len() {
        let (upper, lower) = layers.split_at_mut(d);
        let parent = &upper[d - 1];
        let layer = &mut lower[0];
        let actor = parent.acting_player.index();
        let (actions, _) = layer.grid();

        for (k, slot) in layer.parents.iter().enumerate() {
            let source = parent.slot_ranges(*slot);
            for a in 0..actions {
                let mut target = layer.ranges_data.slice_mut(s![a, k, .., .., ..]);
                target.assign(&source);
                let mut acting = target.index_axis_mut(Axis(1), actor);
                acting *= &layer.current_strategy_data.slice(s![a, k, .., ..]);
            }
        }
    }
}

/// Values of inner nodes from their children, deepest layer first. The
/// acting player's value is the strategy-weighted sum over actions, the
/// other player's value the plain sum (their reach already carries the
/// strategy).
pub(super) fn compute_cfvs(layers: &mut [Layer]) {
    for d in (1..layers.len()).rev() {
        let (upper, lower) = layers.split_at_mut(d);
        let parent = &mut upper[d - 1];
        let layer = &mut lower[0];
        let actor = parent.acting_player.index();

        let mask = layer
            .empty_action_mask
            .view()
            .insert_axis(Axis(2))
            .insert_axis(Axis(3))
            .insert_axis(Axis(4));
        layer.cfvs_data *= &mask;

        let mut weighted = layer.cfvs_data.clone();
        let mut acting = weighted.index_axis_mut(Axis(3), actor);
        acting *= &layer.current_strategy_data;
        let summed = weighted.sum_axis(Axis(0));

        for (k, slot) in layer.parents.iter().enumerate() {
            parent
                .cfvs_data
                .slice_mut(s![slot.action, slot.parent, .., .., ..])
                .assign(&summed.index_axis(Axis(0), k));
        }
    }
}

/// CFR+ regret update: add each action's advantage over the value the
/// parent received, then floor at zero.
pub(super) fn compute_regrets(layers: &mut [Layer], max_number: f32) {
    for d in 1..layers.len() {
        let (upper, lower) = layers.split_at_mut(d);
        let parent = &upper[d - 1];
        let layer = &mut lower[0];
        let actor = parent.acting_player.index();
        let (actions, _) = layer.grid();

        for (k, slot) in layer.parents.iter().enumerate() {
            let received = parent
                .cfvs_data
                .slice(s![slot.action, slot.parent, .., actor, ..]);
            for a in 0..actions {
                if layer.kinds[a][k] == SlotKind::Absent {
                    continue;
                }
                Zip::from(layer.regrets_data.slice_mut(s![a, k, .., ..]))
                    .and(layer.cfvs_data.slice(s![a, k, .., actor, ..]))
                    .and(&received)
                    .for_each(|regret, &value, &base| {
                        *regret = (*regret + value - base).clamp(0.0, max_number);
                    });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::LookaheadBuilder;
    use crate::config::ResolveConfig;
    use crate::layer::NodeSlot;
    use crate::player::{Player, Seat};
    use crate::tree::PublicTree;
    use approx::assert_abs_diff_eq;

    fn bet_or_check_layers() -> Vec<Layer> {
        let config = ResolveConfig {
            hand_count: 2,
            ..Default::default()
        };
        LookaheadBuilder::new(&config, 1)
            .build(&PublicTree::bet_or_check(Player::P1, 2, 2.0, 2.0))
            .unwrap()
            .layers
    }

    #[test]
    fn ranges_multiply_strategies_along_the_path() {
        let mut layers = bet_or_check_layers();
        layers[0].ranges_data.fill(1.0);
        for layer in layers.iter_mut().skip(1) {
            layer.current_strategy_data.fill(0.5);
        }
        compute_ranges(&mut layers);

        // check, bet (resolver), then resolver's call: 0.5 * 0.5
        let deep = layers[3].slot_ranges(NodeSlot::new(1, 0));
        assert_abs_diff_eq!(deep[[0, Seat::Resolver.index(), 0]], 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(deep[[0, Seat::Opponent.index(), 0]], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn cfvs_scatter_into_parent_slots() {
        let mut layers = bet_or_check_layers();
        let resolver = Seat::Resolver.index();
        layers[3].current_strategy_data.fill(0.5);
        layers[3].cfvs_data.slice_mut(s![0, 0, .., resolver, ..]).fill(-2.0);
        layers[3].cfvs_data.slice_mut(s![1, 0, .., resolver, ..]).fill(4.0);
        compute_cfvs(&mut layers);

        // layer 3 hangs under slot (1, 0) of layer 2, where the resolver acts
        let value = layers[2].slot_cfvs(NodeSlot::new(1, 0));
        assert_abs_diff_eq!(value[[0, resolver, 0]], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn regrets_never_go_negative() {
        let mut layers = bet_or_check_layers();
        for layer in layers.iter_mut() {
            layer.cfvs_data.fill(-3.0);
        }
        layers[0].cfvs_data.fill(10.0);
        compute_regrets(&mut layers, 1e6);
        for layer in &layers {
            assert!(layer.regrets_data.iter().all(|&r| r >= 0.0));
        }
    }
}
