//! Training data for depth-limit value functions.
//!
//! Each sample is a root spot solved with random ranges for both players;
//! the target is the pair of root value vectors, normalised by the pot.

use std::io::Write;
use std::sync::Arc;

use log::info;
use ndarray::s;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ResolveConfig;
use crate::equity::{leduc, TerminalEquity};
use crate::error::{LookaheadError, LookaheadResult};
use crate::lookahead::Lookahead;
use crate::player::{Player, Seat};
use crate::ranges::RangeGenerator;
use crate::tree::PublicTree;
use crate::value::ValueFunction;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSample {
    pub board: Vec<u8>,
    pub pot: f32,
    /// Ranges of `[P1, P2]`.
    pub ranges: [Vec<f32>; 2],
    /// Pot-normalised root values of `[P1, P2]`.
    pub values: [Vec<f32>; 2],
}

/// Everything needed to solve one kind of root spot.
pub struct SampleSpot {
    pub tree: PublicTree,
    pub terminal_equity: Arc<dyn TerminalEquity>,
    pub value_function: Option<Arc<dyn ValueFunction>>,
    pub generator: RangeGenerator,
}

impl SampleSpot {
    /// Leduc river spot: one bet or check on `board` with a pot-sized bet.
    pub fn leduc_river(board: usize, pot: f32) -> LookaheadResult<Self> {
        if board >= leduc::HAND_COUNT {
            return Err(LookaheadError::InvalidConfig(format!("no Leduc card {}", board)));
        }
        let tree = PublicTree::bet_or_check(Player::P1, 2, pot, pot).with_board(vec![board as u8]);
        let generator = RangeGenerator::new(&leduc::strengths(board), &leduc::possible_hands(Some(board)))?;
        Ok(SampleSpot {
            tree,
            terminal_equity: Arc::new(leduc::river(board)),
            value_function: None,
            generator,
        })
    }
}

/// Solves `batch_size` random instances of `spot` in one batched lookahead.
pub fn generate_samples<R: Rng + ?Sized>(
    spot: &SampleSpot,
    config: &ResolveConfig,
    batch_size: usize,
    rng: &mut R,
) -> LookaheadResult<Vec<TrainingSample>> {
    let resolver = spot
        .tree
        .current_player()
        .ok_or_else(|| LookaheadError::InvalidTree("root must be a decision node".to_string()))?;
    let pot = spot.tree.root.pot;
    if !(pot > 0.0) {
        return Err(LookaheadError::InvalidTree(format!("root pot must be positive, got {}", pot)));
    }

    let player_ranges = spot.generator.generate_batch(batch_size, rng);
    let opponent_ranges = spot.generator.generate_batch(batch_size, rng);

    let mut lookahead = Lookahead::new(Arc::clone(&spot.terminal_equity), batch_size, config.clone())?;
    if let Some(value_function) = &spot.value_function {
        lookahead = lookahead.with_value_function(Arc::clone(value_function));
    }
    lookahead.build_lookahead(&spot.tree)?;
    lookahead.resolve_first_node(player_ranges.view(), opponent_ranges.view())?;
    let values = lookahead
        .get_results()?
        .root_cfvs_both_players
        .ok_or(LookaheadError::NotResolved)?;

    let samples = (0..batch_size)
        .map(|b| {
            let by_seat = |seat: Seat| match seat {
                Seat::Resolver => player_ranges.row(b).to_vec(),
                Seat::Opponent => opponent_ranges.row(b).to_vec(),
            };
            let value_of = |seat: Seat| {
                values
                    .slice(s![b, seat.index(), ..])
                    .mapv(|v| v / pot)
                    .to_vec()
            };
            let seats = [Player::P1, Player::P2].map(|player| Seat::of(player, resolver));
            TrainingSample {
                board: spot.tree.board.clone(),
                pot,
                ranges: seats.map(by_seat),
                values: seats.map(value_of),
            }
        })
        .collect();
    Ok(samples)
}

/// Generates `batches` batches of Leduc river samples in parallel, each from
/// its own seeded generator so the output does not depend on scheduling.
pub fn generate_leduc_river(
    config: &ResolveConfig,
    pots: &[f32],
    batches: usize,
    batch_size: usize,
    seed: u64,
) -> LookaheadResult<Vec<TrainingSample>> {
    if pots.is_empty() {
        return Err(LookaheadError::InvalidConfig("at least one pot size is required".to_string()));
    }
    let per_batch = (0..batches)
        .into_par_iter()
        .map(|batch| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(batch as u64));
            let board = rng.gen_range(0..leduc::HAND_COUNT);
            let pot = pots[rng.gen_range(0..pots.len())];
            let spot = SampleSpot::leduc_river(board, pot)?;
            generate_samples(&spot, config, batch_size, &mut rng)
        })
        .collect::<LookaheadResult<Vec<_>>>()?;

    let samples: Vec<TrainingSample> = per_batch.into_iter().flatten().collect();
    info!("generated {} samples in {} batches", samples.len(), batches);
    Ok(samples)
}

/// One JSON object per line.
pub fn write_json_lines<W: Write>(samples: &[TrainingSample], mut writer: W) -> LookaheadResult<()> {
    for sample in samples {
        serde_json::to_writer(&mut writer, sample)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Zero-sum residual of a sample: sum over players of range-weighted values.
pub fn zero_sum_residual(sample: &TrainingSample) -> f32 {
    (0..2)
        .map(|p| {
            sample.ranges[p]
                .iter()
                .zip(&sample.values[p])
                .map(|(r, v)| r * v)
                .sum::<f32>()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn config() -> ResolveConfig {
        ResolveConfig {
            cfr_iters: 300,
            cfr_skip_iters: 100,
            ..Default::default()
        }
    }

    #[test]
    fn river_samples_are_zero_sum() {
        let spot = SampleSpot::leduc_river(2, 2.0).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let samples = generate_samples(&spot, &config(), 3, &mut rng).unwrap();
        assert_eq!(samples.len(), 3);
        for sample in &samples {
            assert_eq!(sample.board, vec![2]);
            assert_eq!(sample.ranges[0].len(), leduc::HAND_COUNT);
            // blocked by the board
            assert_eq!(sample.ranges[0][2], 0.0);
            assert_abs_diff_eq!(zero_sum_residual(sample), 0.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn parallel_generation_is_deterministic() {
        let config = ResolveConfig {
            cfr_iters: 20,
            cfr_skip_iters: 10,
            ..Default::default()
        };
        let first = generate_leduc_river(&config, &[2.0, 4.0], 3, 2, 11).unwrap();
        let second = generate_leduc_river(&config, &[2.0, 4.0], 3, 2, 11).unwrap();
        assert_eq!(first.len(), 6);
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.ranges, b.ranges);
            assert_eq!(a.values, b.values);
        }
    }

    #[test]
    fn json_lines_are_one_sample_per_line() {
        let sample = TrainingSample {
            board: vec![1],
            pot: 2.0,
            ranges: [vec![1.0, 0.0], vec![0.0, 1.0]],
            values: [vec![0.5, 0.0], vec![0.0, -0.5]],
        };
        let mut out = Vec::new();
        write_json_lines(&[sample.clone(), sample], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
        let parsed: TrainingSample = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(parsed.board, vec![1]);
    }
}
