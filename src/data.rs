use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    InvalidSampleCount,
    InvalidSequenceLength,
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSampleCount => write!(f, "dataset needs at least one sample"),
            Self::InvalidSequenceLength => write!(f, "sequences need at least one bit"),
        }
    }
}

impl std::error::Error for DataError {}

/// Draw `n_elems` uniform bits and return them with their parity label.
pub fn generate_sample(n_elems: usize, rng: &mut StdRng) -> (Vec<u8>, f64) {
    let bits: Vec<u8> = (0..n_elems).map(|_| rng.gen_range(0..2u8)).collect();
    let label = parity(&bits);
    (bits, label)
}

/// XOR-reduction of a bit sequence: 1.0 if an odd number of bits are set.
pub fn parity(bits: &[u8]) -> f64 {
    let ones = bits.iter().filter(|bit| **bit == 1).count();
    if ones % 2 == 1 { 1.0 } else { 0.0 }
}

/// Fixed-size collection of bitstrings with parity labels.
///
/// True labels are immutable after construction. The working labels handed
/// to training are re-derived from the true labels on every
/// [`set_noise_rate`](Self::set_noise_rate) call, so corruption never
/// compounds across epochs.
#[derive(Debug, Clone)]
pub struct ParityDataset {
    sequences: Vec<Vec<u8>>,
    true_labels: Vec<f64>,
    labels: Vec<f64>,
    noise_enabled: bool,
}

impl ParityDataset {
    pub fn new(
        n_samples: usize,
        n_elems: usize,
        noise_enabled: bool,
        rng: &mut StdRng,
    ) -> Result<Self, DataError> {
        if n_samples == 0 {
            return Err(DataError::InvalidSampleCount);
        }
        if n_elems == 0 {
            return Err(DataError::InvalidSequenceLength);
        }

        let mut sequences = Vec::with_capacity(n_samples);
        let mut true_labels = Vec::with_capacity(n_samples);
        for _ in 0..n_samples {
            let (bits, label) = generate_sample(n_elems, rng);
            sequences.push(bits);
            true_labels.push(label);
        }
        let labels = true_labels.clone();

        Ok(Self {
            sequences,
            true_labels,
            labels,
            noise_enabled,
        })
    }

    /// Re-decide label corruption for every sample from its true label.
    ///
    /// Each sample flips independently with probability `p`. A rate of zero
    /// (or a dataset constructed with noise disabled) restores the true
    /// labels exactly.
    pub fn set_noise_rate(&mut self, p: f64, rng: &mut StdRng) {
        for (label, true_label) in self.labels.iter_mut().zip(&self.true_labels) {
            let flip = self.noise_enabled && p > 0.0 && rng.gen_range(0.0..1.0) < p;
            *label = if flip { 1.0 - *true_label } else { *true_label };
        }
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn n_elems(&self) -> usize {
        self.sequences[0].len()
    }

    pub fn bits(&self, idx: usize) -> &[u8] {
        &self.sequences[idx]
    }

    pub fn label(&self, idx: usize) -> f64 {
        self.labels[idx]
    }

    pub fn true_label(&self, idx: usize) -> f64 {
        self.true_labels[idx]
    }

    /// Index batches covering the dataset once in shuffled order.
    pub fn shuffled_batches(&self, batch_size: usize, rng: &mut StdRng) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        order
            .chunks(batch_size.max(1))
            .map(|chunk| chunk.to_vec())
            .collect()
    }
}
