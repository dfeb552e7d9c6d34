use ndarray::{s, Array2, Array3, Axis};
use serde::Serialize;

use crate::config::ResolveConfig;
use crate::layer::Layer;
use crate::player::Seat;

/// Output of one re-solve. Every array carries the batch axis `B`.
#[derive(Debug, Clone, Serialize)]
pub struct LookaheadResults {
    /// Average root strategy of the re-solving player, `[A, B, H]`.
    pub strategy: Array3<f32>,
    /// Opponent's average values at the root, `[B, H]`.
    pub achieved_cfvs: Array2<f32>,
    /// Opponent's average values after each root action, conditioned on the
    /// action being taken, `[A, B, H]`.
    pub children_cfvs: Array3<f32>,
    /// Re-solving player's root values, `[B, H]`. Only set when both ranges
    /// were given.
    pub root_cfvs: Option<Array2<f32>>,
    /// Root values of both players in `[re-solving player, opponent]` order,
    /// `[B, 2, H]`.
    pub root_cfvs_both_players: Option<Array3<f32>>,
}

impl LookaheadResults {
    pub fn actions_count(&self) -> usize {
        self.strategy.len_of(Axis(0))
    }

    pub fn batch_size(&self) -> usize {
        self.strategy.len_of(Axis(1))
    }
}

pub(super) fn extract(layers: &[Layer], config: &ResolveConfig, reconstructed: bool) -> LookaheadResults {
    let (root, children) = (&layers[0], &layers[1]);
    let resolver = Seat::Resolver.index();
    let opponent = Seat::Opponent.index();

    let strategy = children.average_strategies_data.index_axis(Axis(1), 0).to_owned();
    let root_values = root.average_cfvs_data.slice(s![0, 0, .., .., ..]);
    let achieved_cfvs = root_values.index_axis(Axis(1), opponent).to_owned();

    // accumulated child values are weighted by the probability of the action
    let reach = root.ranges_data.slice(s![0, 0, .., resolver, ..]);
    let averaged = config.averaged_iters() as f32;
    let mut children_cfvs = children
        .average_cfvs_data
        .slice(s![.., 0, .., opponent, ..])
        .to_owned();
    for (a, mut per_action) in children_cfvs.outer_iter_mut().enumerate() {
        for (b, mut values) in per_action.outer_iter_mut().enumerate() {
            let scaler = strategy.slice(s![a, b, ..]).dot(&reach.row(b)) * averaged;
            if scaler > 0.0 {
                values /= scaler;
            } else {
                values.fill(0.0);
            }
        }
    }

    let (root_cfvs, root_cfvs_both_players) = if reconstructed {
        (None, None)
    } else {
        (
            Some(root_values.index_axis(Axis(1), resolver).to_owned()),
            Some(root_values.to_owned()),
        )
    };

    LookaheadResults {
        strategy,
        achieved_cfvs,
        children_cfvs,
        root_cfvs,
        root_cfvs_both_players,
    }
}
