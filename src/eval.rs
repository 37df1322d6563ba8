use crate::data::ParityDataset;
use crate::model::LstmParity;

/// Fraction of logits whose thresholded prediction matches the label.
///
/// Sigmoid at 0.5 is equivalent to thresholding the raw logit at zero.
pub fn batch_accuracy(logits: &[f64], labels: &[f64]) -> f64 {
    assert_eq!(
        logits.len(),
        labels.len(),
        "batch_accuracy expects matching lengths"
    );
    if logits.is_empty() {
        return 0.0;
    }
    let correct = logits
        .iter()
        .zip(labels)
        .filter(|(logit, label)| {
            let predicted = if **logit > 0.0 { 1.0 } else { 0.0 };
            predicted == **label
        })
        .count();
    (correct as f64) / (logits.len() as f64)
}

/// Accuracy pooled over every sample in the evaluation set, scored against
/// the dataset's current working labels. No gradients are involved and the
/// traversal order is fixed, so the result is deterministic for frozen
/// parameters and data.
pub fn dataset_accuracy(model: &LstmParity, data: &ParityDataset, batch_size: usize) -> f64 {
    let mut correct = 0usize;
    for start in (0..data.len()).step_by(batch_size.max(1)) {
        let end = (start + batch_size.max(1)).min(data.len());
        for idx in start..end {
            let predicted = if model.logit(data.bits(idx)) > 0.0 {
                1.0
            } else {
                0.0
            };
            if predicted == data.label(idx) {
                correct += 1;
            }
        }
    }
    (correct as f64) / (data.len() as f64)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::data::ParityDataset;
    use crate::model::LstmParity;

    use super::{batch_accuracy, dataset_accuracy};

    #[test]
    fn all_positive_logits_on_positive_labels_score_one() {
        let logits = [0.3, 2.0, 5.1, 0.001];
        let labels = [1.0, 1.0, 1.0, 1.0];
        assert_eq!(batch_accuracy(&logits, &labels), 1.0);
    }

    #[test]
    fn all_negative_logits_on_positive_labels_score_zero() {
        let logits = [-0.3, -2.0, -5.1, -0.001];
        let labels = [1.0, 1.0, 1.0, 1.0];
        assert_eq!(batch_accuracy(&logits, &labels), 0.0);
    }

    #[test]
    fn mixed_batch_scores_fraction_correct() {
        let logits = [1.0, -1.0, 1.0, -1.0];
        let labels = [1.0, 0.0, 0.0, 0.0];
        assert_eq!(batch_accuracy(&logits, &labels), 0.75);
    }

    #[test]
    fn dataset_accuracy_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(21);
        let data = ParityDataset::new(150, 6, false, &mut rng).expect("dataset");
        let model = LstmParity::new(1, 21);

        let first = dataset_accuracy(&model, &data, 128);
        let second = dataset_accuracy(&model, &data, 128);
        assert_eq!(first, second);
        assert!((0.0..=1.0).contains(&first));
    }

    #[test]
    fn dataset_accuracy_ignores_batch_partitioning() {
        let mut rng = StdRng::seed_from_u64(8);
        let data = ParityDataset::new(100, 4, false, &mut rng).expect("dataset");
        let model = LstmParity::new(1, 8);

        assert_eq!(
            dataset_accuracy(&model, &data, 128),
            dataset_accuracy(&model, &data, 7)
        );
    }
}
