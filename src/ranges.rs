//! Ranges over private hands: parsing, validation and random generation.

use itertools::Itertools;
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;

use crate::error::{LookaheadError, LookaheadResult};

const RANGE_TOLERANCE: f32 = 1e-4;

/// Parses a comma separated list of hand weights, e.g. `"0.5, 0.5"`.
pub fn parse_range(text: &str, hand_count: usize) -> LookaheadResult<Array1<f32>> {
    let weights = text
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<f32>()
                .map_err(|_| LookaheadError::InvalidRange(format!("'{}' is not a number", part)))
        })
        .collect::<LookaheadResult<Vec<f32>>>()?;
    if weights.len() != hand_count {
        return Err(LookaheadError::InvalidRange(format!(
            "expected {} weights, got {}",
            hand_count,
            weights.len()
        )));
    }
    Ok(Array1::from(weights))
}

/// Scales `range` to sum to one over the possible hands and zeroes the rest.
pub fn normalize(range: ArrayView1<'_, f32>, possible_hands: &[bool]) -> LookaheadResult<Array1<f32>> {
    let masked: Array1<f32> = range
        .iter()
        .zip(possible_hands)
        .map(|(&w, &possible)| if possible { w.max(0.0) } else { 0.0 })
        .collect();
    let total = masked.sum();
    if !(total > 0.0) {
        return Err(LookaheadError::InvalidRange("range has no mass on possible hands".to_string()));
    }
    Ok(masked / total)
}

/// A proper range: non-negative, summing to one, zero on impossible hands.
pub fn is_valid_range(range: ArrayView1<'_, f32>, possible_hands: &[bool]) -> bool {
    if range.len() != possible_hands.len() {
        return false;
    }
    let blocked_mass: f32 = range
        .iter()
        .zip(possible_hands)
        .filter_map(|(&w, &possible)| (!possible).then_some(w))
        .sum();
    range.iter().all(|&w| w >= 0.0 && w.is_finite())
        && (range.sum() - 1.0).abs() < RANGE_TOLERANCE
        && blocked_mass == 0.0
}

/// Random ranges for training-data generation.
///
/// Possible hands are sorted by strength and the unit mass is split
/// recursively: each half of the sorted list receives a uniformly random
/// share of its parent's mass. Neighbouring hands thus get correlated weights,
/// which looks more like a real range than independent draws do.
#[derive(Debug, Clone)]
pub struct RangeGenerator {
    hand_count: usize,
    /// Possible hands, weakest first.
    sorted_hands: Vec<usize>,
}

impl RangeGenerator {
    pub fn new(strengths: &[f32], possible_hands: &[bool]) -> LookaheadResult<Self> {
        if strengths.len() != possible_hands.len() {
            return Err(LookaheadError::ShapeMismatch {
                name: "possible_hands",
                expected: vec![strengths.len()],
                got: vec![possible_hands.len()],
            });
        }
        let sorted_hands: Vec<usize> = (0..strengths.len())
            .filter(|&h| possible_hands[h])
            .sorted_by(|&a, &b| strengths[a].total_cmp(&strengths[b]))
            .collect();
        if sorted_hands.is_empty() {
            return Err(LookaheadError::InvalidRange("no possible hands".to_string()));
        }
        Ok(RangeGenerator {
            hand_count: strengths.len(),
            sorted_hands,
        })
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Array1<f32> {
        let mut mass = vec![0.0; self.sorted_hands.len()];
        split_mass(&mut mass, 1.0, rng);
        let mut range = Array1::zeros(self.hand_count);
        for (&hand, &weight) in self.sorted_hands.iter().zip(&mass) {
            range[hand] = weight;
        }
        range
    }

    /// `[batch_size, H]` independent ranges.
    pub fn generate_batch<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Array2<f32> {
        let mut ranges = Array2::zeros((batch_size, self.hand_count));
        for mut row in ranges.rows_mut() {
            row.assign(&self.generate(rng));
        }
        ranges
    }
}

fn split_mass<R: Rng + ?Sized>(hands: &mut [f32], mass: f32, rng: &mut R) {
    if hands.len() == 1 {
        hands[0] = mass;
        return;
    }
    // an odd middle hand goes to either half
    let mut half = hands.len() / 2;
    if hands.len() % 2 == 1 && rng.gen_bool(0.5) {
        half += 1;
    }
    let left = mass * rng.gen::<f32>();
    let (low, high) = hands.split_at_mut(half);
    split_mass(low, left, rng);
    split_mass(high, mass - left, rng);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn parses_weights() {
        let range = parse_range("0.25, 0.75", 2).unwrap();
        assert_eq!(range, array![0.25f32, 0.75]);
        assert!(parse_range("0.5,x", 2).is_err());
        assert!(parse_range("1.0", 2).is_err());
    }

    #[test]
    fn normalize_drops_blocked_hands() {
        let range = normalize(array![1.0f32, 1.0, 2.0].view(), &[true, false, true]).unwrap();
        assert_abs_diff_eq!(range[0], 1.0 / 3.0, epsilon = 1e-6);
        assert_eq!(range[1], 0.0);
        assert!(is_valid_range(range.view(), &[true, false, true]));
    }

    #[test]
    fn validity_checks() {
        assert!(is_valid_range(array![0.5f32, 0.5].view(), &[true, true]));
        assert!(!is_valid_range(array![0.5f32, 0.6].view(), &[true, true]));
        assert!(!is_valid_range(array![1.5f32, -0.5].view(), &[true, true]));
        assert!(!is_valid_range(array![0.5f32, 0.5].view(), &[true, false]));
    }

    #[test]
    fn generated_ranges_are_valid() {
        let possible = [true, true, false, true, true, true];
        let generator = RangeGenerator::new(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0], &possible).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let batch = generator.generate_batch(16, &mut rng);
        for row in batch.rows() {
            assert!(is_valid_range(row, &possible));
        }
    }

    #[test]
    fn single_possible_hand_takes_all_mass() {
        let generator = RangeGenerator::new(&[3.0, 1.0], &[false, true]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(generator.generate(&mut rng), array![0.0f32, 1.0]);
    }
}
