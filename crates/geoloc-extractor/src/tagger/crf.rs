//! Linear-chain CRF decoding

use ndarray::{Array1, Array2, ArrayView2};

use super::TaggerError;

/// Learned CRF parameters over `T` tags
pub(crate) struct Crf {
    start: Array1<f32>,
    end: Array1<f32>,
    /// `transitions[[i, j]]` scores moving from tag `i` to tag `j`
    transitions: Array2<f32>,
}

impl Crf {
    pub(crate) fn new(start: Array1<f32>, end: Array1<f32>, transitions: Array2<f32>) -> Self {
        Self {
            start,
            end,
            transitions,
        }
    }

    pub(crate) fn num_tags(&self) -> usize {
        self.start.len()
    }

    /// Highest-scoring tag path over the first `len` rows of `emissions`.
    ///
    /// Ties resolve to the lowest tag index.
    pub(crate) fn viterbi(&self, emissions: ArrayView2<f32>, len: usize) -> Result<Vec<usize>, TaggerError> {
        if len == 0 || len > emissions.nrows() {
            return Err(TaggerError::InvalidMask(format!(
                "{len} valid positions for {} emission rows",
                emissions.nrows()
            )));
        }

        let n = self.num_tags();
        let mut score: Array1<f32> = &self.start + &emissions.row(0);
        let mut history: Vec<Vec<usize>> = Vec::with_capacity(len - 1);

        for t in 1..len {
            let mut next = Array1::<f32>::zeros(n);
            let mut backpointers = vec![0usize; n];
            for j in 0..n {
                let (best_prev, best) = argmax((0..n).map(|i| score[i] + self.transitions[[i, j]]));
                next[j] = best + emissions[[t, j]];
                backpointers[j] = best_prev;
            }
            score = next;
            history.push(backpointers);
        }

        score += &self.end;
        let (mut best, best_score) = argmax(score.iter().copied());
        if !best_score.is_finite() {
            return Err(TaggerError::NonFinite);
        }

        let mut path = Vec::with_capacity(len);
        path.push(best);
        for backpointers in history.iter().rev() {
            best = backpointers[best];
            path.push(best);
        }
        path.reverse();
        Ok(path)
    }
}

fn argmax(values: impl Iterator<Item = f32>) -> (usize, f32) {
    let mut best = (0, f32::NEG_INFINITY);
    for (idx, value) in values.enumerate() {
        if value > best.1 {
            best = (idx, value);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn emissions() -> Array2<f32> {
        array![[1.0, 0.0], [0.0, 2.0], [1.5, 0.0]]
    }

    fn sticky() -> Array2<f32> {
        array![[0.0, -10.0], [-10.0, 0.0]]
    }

    #[test]
    fn test_emissions_only() {
        let crf = Crf::new(Array1::zeros(2), Array1::zeros(2), Array2::zeros((2, 2)));
        assert_eq!(crf.viterbi(emissions().view(), 3).unwrap(), vec![0, 1, 0]);
    }

    #[test]
    fn test_transitions_change_the_path() {
        // 0,0,0 scores 2.5; 1,1,1 scores 2.0; switching costs 10 per move
        let crf = Crf::new(Array1::zeros(2), Array1::zeros(2), sticky());
        assert_eq!(crf.viterbi(emissions().view(), 3).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn test_end_transitions_are_applied() {
        let crf = Crf::new(Array1::zeros(2), array![0.0, 5.0], sticky());
        assert_eq!(crf.viterbi(emissions().view(), 3).unwrap(), vec![1, 1, 1]);
    }

    #[test]
    fn test_start_transitions_are_applied() {
        let crf = Crf::new(array![0.0, 3.0], Array1::zeros(2), Array2::zeros((2, 2)));
        assert_eq!(crf.viterbi(emissions().view(), 3).unwrap(), vec![1, 1, 0]);
    }

    #[test]
    fn test_only_valid_prefix_is_decoded() {
        let crf = Crf::new(Array1::zeros(2), Array1::zeros(2), Array2::zeros((2, 2)));
        assert_eq!(crf.viterbi(emissions().view(), 2).unwrap(), vec![0, 1]);
        assert!(crf.viterbi(emissions().view(), 0).is_err());
        assert!(crf.viterbi(emissions().view(), 4).is_err());
    }

    #[test]
    fn test_ties_pick_lowest_index() {
        let crf = Crf::new(Array1::zeros(3), Array1::zeros(3), Array2::zeros((3, 3)));
        let flat = Array2::<f32>::zeros((2, 3));
        assert_eq!(crf.viterbi(flat.view(), 2).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_nan_scores_are_rejected() {
        let crf = Crf::new(Array1::zeros(2), Array1::zeros(2), Array2::zeros((2, 2)));
        let bad = array![[f32::NAN, f32::NAN]];
        assert!(matches!(crf.viterbi(bad.view(), 1), Err(TaggerError::NonFinite)));
    }
}
