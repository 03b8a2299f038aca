//! Разбиения выборки: train/test и k-fold

use linfa::DatasetBase;
use ndarray::Axis;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{PipelineError, Result};
use crate::models::RatingDataset;

/// Подвыборка строк в заданном порядке
pub fn subset(dataset: &RatingDataset, rows: &[usize]) -> RatingDataset {
    DatasetBase::new(
        dataset.records().select(Axis(0), rows),
        dataset.targets().select(Axis(0), rows),
    )
}

/// Перемешивание с зерном; первые ceil(n * test_fraction) строк перестановки
/// уходят в тест, остальные в обучение
pub fn train_test_split(
    dataset: &RatingDataset,
    test_fraction: f64,
    seed: u64,
) -> Result<(RatingDataset, RatingDataset)> {
    let n = dataset.records().nrows();
    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(PipelineError::EmptyTable(format!(
            "Cannot split {} rows with test fraction {}",
            n, test_fraction
        )));
    }

    let mut permutation: Vec<usize> = (0..n).collect();
    permutation.shuffle(&mut StdRng::seed_from_u64(seed));
    let (test_rows, train_rows) = permutation.split_at(n_test);

    tracing::debug!("Split {} rows into {} train / {} test", n, train_rows.len(), n_test);

    Ok((subset(dataset, train_rows), subset(dataset, test_rows)))
}

/// Последовательные фолды без перемешивания; первые n % k фолдов на строку длиннее.
/// Возвращает пары (обучающие строки, проверочные строки).
pub fn kfold_indices(n: usize, k: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if k < 2 {
        return Err(PipelineError::Config(format!(
            "Cross-validation needs at least 2 folds, got {}",
            k
        )));
    }
    if n < k {
        return Err(PipelineError::EmptyTable(format!(
            "Cannot build {} folds from {} rows",
            k, n
        )));
    }

    let base = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let end = start + size;
        let valid: Vec<usize> = (start..end).collect();
        let train: Vec<usize> = (0..start).chain(end..n).collect();
        folds.push((train, valid));
        start = end;
    }
    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    fn dataset(n: usize) -> RatingDataset {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| (i * 10 + j) as f64);
        let y = Array1::from_shape_fn(n, |i| i as f64);
        DatasetBase::new(x, y)
    }

    #[test]
    fn test_split_sizes_and_alignment() {
        let data = dataset(20);
        let (train, test) = train_test_split(&data, 0.2, 42).unwrap();
        assert_eq!(train.records().nrows(), 16);
        assert_eq!(test.records().nrows(), 4);

        // Строки и цели перемещаются вместе
        for (row, target) in test.records().rows().into_iter().zip(test.targets()) {
            assert_eq!(row[0], target * 10.0);
        }

        let mut all: Vec<f64> = train.targets().iter().chain(test.targets()).copied().collect();
        all.sort_by(f64::total_cmp);
        assert_eq!(all, (0..20).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_reproducible() {
        let data = dataset(30);
        let (_, a) = train_test_split(&data, 0.2, 42).unwrap();
        let (_, b) = train_test_split(&data, 0.2, 42).unwrap();
        assert_eq!(a.targets(), b.targets());
    }

    #[test]
    fn test_split_needs_both_partitions() {
        assert!(train_test_split(&dataset(1), 0.2, 42).is_err());
        assert!(train_test_split(&dataset(10), 0.0, 42).is_err());
    }

    #[test]
    fn test_kfold_covers_every_row_once() {
        let folds = kfold_indices(12, 5).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|(_, v)| v.len()).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2, 2]);

        let mut seen: Vec<usize> = folds.iter().flat_map(|(_, v)| v.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..12).collect::<Vec<_>>());

        for (train, valid) in &folds {
            assert_eq!(train.len() + valid.len(), 12);
            assert!(valid.iter().all(|v| !train.contains(v)));
        }
    }

    #[test]
    fn test_kfold_rejects_bad_arguments() {
        assert!(matches!(kfold_indices(10, 1), Err(PipelineError::Config(_))));
        assert!(matches!(kfold_indices(3, 5), Err(PipelineError::EmptyTable(_))));
    }
}
