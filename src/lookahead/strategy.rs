//! Regret matching, averaging and the final normalisation pass.

use ndarray::{s, Axis, Zip};

use crate::config::ResolveConfig;
use crate::layer::Layer;
use crate::player::Seat;

/// Regret matching on every layer below the root. The strategy stored on
/// layer `d` belongs to the player acting at layer `d - 1`.
pub(super) fn compute_current_strategies(layers: &mut [Layer], config: &ResolveConfig) {
    let (eps, max) = (config.regret_epsilon, config.max_number);
    for layer in layers.iter_mut().skip(1) {
        let mask = layer
            .empty_action_mask
            .view()
            .insert_axis(Axis(2))
            .insert_axis(Axis(3));
        Zip::from(&mut layer.positive_regrets_data)
            .and(&layer.regrets_data)
            .and_broadcast(&mask)
            .for_each(|positive, &regret, &valid| *positive = regret.clamp(eps, max) * valid);

        // every parent has at least one valid action, so the sums are >= eps
        let sums = layer.positive_regrets_data.sum_axis(Axis(0)).insert_axis(Axis(0));
        Zip::from(&mut layer.current_strategy_data)
            .and(&layer.positive_regrets_data)
            .and_broadcast(&sums)
            .for_each(|strategy, &positive, &sum| *strategy = positive / sum);
    }
}

pub(super) fn update_average_strategies(layers: &mut [Layer], iteration: usize, config: &ResolveConfig) {
    if iteration < config.cfr_skip_iters {
        return;
    }
    // only the root decision is reported, and its reach is the input range
    let children = &mut layers[1];
    children.average_strategies_data += &children.current_strategy_data;
}

pub(super) fn cumulate_average_cfvs(layers: &mut [Layer], iteration: usize, config: &ResolveConfig) {
    if iteration < config.cfr_skip_iters {
        return;
    }
    for layer in layers.iter_mut().take(2) {
        layer.average_cfvs_data += &layer.cfvs_data;
    }
}

/// Turns the summed root strategy into probabilities. Hands the re-solving
/// player never holds get the first valid action with certainty.
pub(super) fn normalize_average_strategies(layers: &mut [Layer]) {
    let (root, rest) = layers.split_at_mut(1);
    let reach = root[0]
        .ranges_data
        .slice(s![0, 0, .., Seat::Resolver.index(), ..]);
    let children = &mut rest[0];
    let (actions, parents) = children.grid();

    for parent in 0..parents {
        let fallback = (0..actions)
            .find(|&a| children.kinds[a][parent].is_present())
            .unwrap_or(0);
        let mut column = children
            .average_strategies_data
            .slice_mut(s![.., parent, .., ..]);
        for ((b, h), &mass) in reach.indexed_iter() {
            let mut lane = column.slice_mut(s![.., b, h]);
            let total = lane.sum();
            if is_reachable(mass, total) {
                lane /= total;
            } else {
                lane.fill(0.0);
                lane[fallback] = 1.0;
            }
        }
    }
}

fn is_reachable(mass: f32, total: f32) -> bool {
    mass > 0.0 && total > 0.0 && total.is_finite()
}

pub(super) fn normalize_average_cfvs(layers: &mut [Layer], config: &ResolveConfig) {
    layers[0].average_cfvs_data /= config.averaged_iters() as f32;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::LookaheadBuilder;
    use crate::player::Player;
    use crate::tree::PublicTree;
    use approx::assert_abs_diff_eq;

    fn layers() -> (Vec<Layer>, ResolveConfig) {
        let config = ResolveConfig {
            cfr_iters: 4,
            cfr_skip_iters: 2,
            hand_count: 2,
            ..Default::default()
        };
        let layout = LookaheadBuilder::new(&config, 1)
            .build(&PublicTree::fold_call(Player::P1, 2, 1.0))
            .unwrap();
        (layout.layers, config)
    }

    #[test]
    fn zero_regrets_give_uniform_strategy() {
        let (mut layers, config) = layers();
        compute_current_strategies(&mut layers, &config);
        for &p in layers[1].current_strategy_data.iter() {
            assert_abs_diff_eq!(p, 0.5, epsilon = 1e-6);
        }
    }

    #[test]
    fn masked_actions_get_no_probability() {
        let (mut layers, config) = layers();
        layers[1].empty_action_mask[[0, 0]] = 0.0;
        layers[1].regrets_data.fill(5.0);
        compute_current_strategies(&mut layers, &config);
        assert_eq!(layers[1].current_strategy_data[[0, 0, 0, 0]], 0.0);
        assert_abs_diff_eq!(layers[1].current_strategy_data[[1, 0, 0, 1]], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn regrets_are_proportional() {
        let (mut layers, config) = layers();
        layers[1].regrets_data[[0, 0, 0, 0]] = 1.0;
        layers[1].regrets_data[[1, 0, 0, 0]] = 3.0;
        compute_current_strategies(&mut layers, &config);
        assert_abs_diff_eq!(layers[1].current_strategy_data[[0, 0, 0, 0]], 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(layers[1].current_strategy_data[[1, 0, 0, 0]], 0.75, epsilon = 1e-6);
    }

    #[test]
    fn warm_up_iterations_are_not_averaged() {
        let (mut layers, config) = layers();
        layers[1].current_strategy_data.fill(1.0);
        for iteration in 0..config.cfr_iters {
            update_average_strategies(&mut layers, iteration, &config);
        }
        assert_eq!(layers[1].average_strategies_data[[0, 0, 0, 0]], config.averaged_iters() as f32);
    }

    #[test]
    fn unreached_hand_falls_back_to_first_action() {
        let (mut layers, _) = layers();
        layers[0].ranges_data[[0, 0, 0, 0, 0]] = 1.0;
        layers[1].average_strategies_data[[0, 0, 0, 0]] = 1.0;
        layers[1].average_strategies_data[[1, 0, 0, 0]] = 3.0;
        layers[1].average_strategies_data[[1, 0, 0, 1]] = 2.0;
        normalize_average_strategies(&mut layers);

        let strategy = &layers[1].average_strategies_data;
        assert_abs_diff_eq!(strategy[[1, 0, 0, 0]], 0.75, epsilon = 1e-6);
        // hand 1 has no mass in the root range
        assert_eq!(strategy[[0, 0, 0, 1]], 1.0);
        assert_eq!(strategy[[1, 0, 0, 1]], 0.0);
    }
}
