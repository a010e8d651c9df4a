//! Seeded, stratified validation holdout.
//!
//! Training monitors macro-F1 on a held-out slice of the training folder;
//! this split is deterministic for a given seed so runs are reproducible.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::dataset::loader::ImageSample;
use crate::utils::error::{Result, WasteNetError};

/// Split samples into (train, validation) with per-class proportions intact.
///
/// Every class contributes `valid_fraction` of its samples (at least one,
/// when it has more than one) to the validation set.
pub fn stratified_holdout(
    samples: Vec<ImageSample>,
    valid_fraction: f64,
    seed: u64,
) -> Result<(Vec<ImageSample>, Vec<ImageSample>)> {
    if !(0.0..1.0).contains(&valid_fraction) {
        return Err(WasteNetError::Configuration(format!(
            "validation fraction must be in [0, 1), got {}",
            valid_fraction
        )));
    }

    let mut by_class: BTreeMap<usize, Vec<ImageSample>> = BTreeMap::new();
    for sample in samples {
        by_class.entry(sample.label).or_default().push(sample);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut valid = Vec::new();

    for (_, mut class_samples) in by_class {
        class_samples.shuffle(&mut rng);

        let n = class_samples.len();
        let mut n_valid = (n as f64 * valid_fraction).round() as usize;
        if valid_fraction > 0.0 && n_valid == 0 && n > 1 {
            n_valid = 1;
        }

        valid.extend(class_samples.drain(..n_valid));
        train.extend(class_samples);
    }

    // Interleave classes rather than leaving them grouped.
    train.shuffle(&mut rng);
    valid.shuffle(&mut rng);

    Ok((train, valid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn samples(per_class: &[usize]) -> Vec<ImageSample> {
        let mut out = Vec::new();
        for (label, &count) in per_class.iter().enumerate() {
            for i in 0..count {
                out.push(ImageSample {
                    path: PathBuf::from(format!("{}/{}.jpg", label, i)),
                    label,
                    class_name: label.to_string(),
                });
            }
        }
        out
    }

    #[test]
    fn test_split_proportions_per_class() {
        let (train, valid) = stratified_holdout(samples(&[10, 20, 30]), 0.2, 42).unwrap();

        assert_eq!(train.len() + valid.len(), 60);
        for label in 0..3 {
            let expected = [2, 4, 6][label];
            let got = valid.iter().filter(|s| s.label == label).count();
            assert_eq!(got, expected, "class {} validation count", label);
        }
    }

    #[test]
    fn test_split_is_deterministic() {
        let a = stratified_holdout(samples(&[8, 8]), 0.25, 7).unwrap();
        let b = stratified_holdout(samples(&[8, 8]), 0.25, 7).unwrap();

        let paths = |v: &[ImageSample]| v.iter().map(|s| s.path.clone()).collect::<Vec<_>>();
        assert_eq!(paths(&a.0), paths(&b.0));
        assert_eq!(paths(&a.1), paths(&b.1));
    }

    #[test]
    fn test_small_class_keeps_a_training_sample() {
        let (train, valid) = stratified_holdout(samples(&[2]), 0.2, 1).unwrap();
        assert_eq!(valid.len(), 1);
        assert_eq!(train.len(), 1);
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        assert!(stratified_holdout(samples(&[4]), 1.0, 0).is_err());
        assert!(stratified_holdout(samples(&[4]), -0.1, 0).is_err());
    }
}
