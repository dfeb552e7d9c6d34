//! Opponent range reconstruction for re-solving away from the game root.
//!
//! The CFR-D gadget gives the opponent, for every hand, a choice between
//! terminating with the values it achieved before the re-solve and playing
//! into the lookahead. Regrets over that choice are updated with CFR+ each
//! iteration; the probability of playing is the reconstructed range.

use ndarray::{Array2, ArrayView2, Zip};

use crate::config::ResolveConfig;
use crate::error::{check_shape, LookaheadError, LookaheadResult};

pub trait RangeReconstructor: Send {
    /// Opponent range (`[B, H]`) for `iteration`, given the opponent's
    /// counterfactual values at the lookahead root from the previous
    /// iteration.
    fn compute_opponent_range(&mut self, current_cfvs: ArrayView2<'_, f32>, iteration: usize) -> Array2<f32>;
}

pub struct CfrdGadget {
    terminate_values: Array2<f32>,
    range_mask: Array2<f32>,
    play_regrets: Array2<f32>,
    terminate_regrets: Array2<f32>,
    play_strategy: Array2<f32>,
    terminate_strategy: Array2<f32>,
    regret_epsilon: f32,
    max_number: f32,
}

impl CfrdGadget {
    /// `opponent_cfvs` is `[B, H]`; `possible_hands` masks hands blocked by
    /// the board and must have `H` entries.
    pub fn new(opponent_cfvs: Array2<f32>, possible_hands: &[bool], config: &ResolveConfig) -> LookaheadResult<Self> {
        if opponent_cfvs.is_empty() {
            return Err(LookaheadError::MissingInput("opponent_cfvs"));
        }
        let (batch, hands) = opponent_cfvs.dim();
        check_shape("possible_hands", &[hands], &[possible_hands.len()])?;

        let mask_row: Vec<f32> = possible_hands.iter().map(|&p| if p { 1.0 } else { 0.0 }).collect();
        let range_mask = Array2::from_shape_fn((batch, hands), |(_, h)| mask_row[h]);
        Ok(CfrdGadget {
            terminate_values: opponent_cfvs,
            range_mask,
            play_regrets: Array2::zeros((batch, hands)),
            terminate_regrets: Array2::zeros((batch, hands)),
            play_strategy: Array2::zeros((batch, hands)),
            terminate_strategy: Array2::ones((batch, hands)),
            regret_epsilon: config.regret_epsilon,
            max_number: config.max_number,
        })
    }
}

impl RangeReconstructor for CfrdGadget {
    fn compute_opponent_range(&mut self, current_cfvs: ArrayView2<'_, f32>, _iteration: usize) -> Array2<f32> {
        let (eps, max) = (self.regret_epsilon, self.max_number);
        Zip::from(&mut self.play_regrets)
            .and(&mut self.terminate_regrets)
            .and(&current_cfvs)
            .and(&self.terminate_values)
            .and(&self.play_strategy)
            .and(&self.terminate_strategy)
            .for_each(|play_regret, terminate_regret, &play, &terminate, &p_play, &p_terminate| {
                let total = play * p_play + terminate * p_terminate;
                *play_regret = (*play_regret + play - total).clamp(eps, max);
                *terminate_regret = (*terminate_regret + terminate - total).clamp(eps, max);
            });

        Zip::from(&mut self.play_strategy)
            .and(&mut self.terminate_strategy)
            .and(&self.play_regrets)
            .and(&self.terminate_regrets)
            .and(&self.range_mask)
            .for_each(|p_play, p_terminate, &play_regret, &terminate_regret, &mask| {
                let sum = play_regret + terminate_regret;
                *p_play = play_regret / sum * mask;
                *p_terminate = terminate_regret / sum * mask;
            });

        self.play_strategy.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn config() -> ResolveConfig {
        ResolveConfig {
            hand_count: 3,
            ..Default::default()
        }
    }

    #[test]
    fn first_iteration_follows_terminate_values() {
        let mut gadget = CfrdGadget::new(array![[1.0f32, -1.0, 0.0]], &[true, true, true], &config()).unwrap();
        let range = gadget.compute_opponent_range(array![[0.0f32, 0.0, 0.0]].view(), 0);
        // terminating beats playing for hand 0, loses for hand 1, ties for hand 2
        assert_abs_diff_eq!(range[[0, 0]], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(range[[0, 1]], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(range[[0, 2]], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn blocked_hands_get_no_mass() {
        let mut gadget = CfrdGadget::new(array![[0.0f32, 0.0, 0.0]], &[true, false, true], &config()).unwrap();
        let range = gadget.compute_opponent_range(array![[1.0f32, 1.0, 1.0]].view(), 0);
        assert_eq!(range[[0, 1]], 0.0);
        assert!(range[[0, 0]] > 0.5);
    }

    #[test]
    fn playing_for_more_than_the_gadget_value_raises_reach() {
        let mut gadget = CfrdGadget::new(array![[0.0f32, 0.0, 0.0]], &[true; 3], &config()).unwrap();
        let mut range = Array2::zeros((1, 3));
        for iteration in 0..20 {
            range = gadget.compute_opponent_range(array![[2.0f32, -2.0, 0.0]].view(), iteration);
        }
        assert!(range[[0, 0]] > 0.99);
        assert!(range[[0, 1]] < 0.01);
    }

    #[test]
    fn empty_cfvs_are_missing_input() {
        let err = CfrdGadget::new(Array2::zeros((0, 3)), &[true; 3], &config()).err();
        assert!(matches!(err, Some(LookaheadError::MissingInput(_))));
    }
}
