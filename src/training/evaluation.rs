//! Проверка моделей на втором наборе данных и выбор победителя

use linfa::traits::Predict;
use ndarray::Array1;

use super::metrics::mean_absolute_error;
use super::trainer::CandidateModel;
use crate::config::SecondaryScalerPolicy;
use crate::error::{PipelineError, Result};
use crate::preprocessing::imputation::Imputer;
use crate::preprocessing::normalization::{FittedScaler, ScalerOrigin};
use crate::preprocessing::table::{column_kind, ColumnKind, FeatureTable, RawTable};
use crate::types::{CandidateScore, EvaluationReport, ReferenceRow, SelectedFeatureSet};

/// Индекс наименьшей ошибки; при равенстве побеждает первый
pub fn select_winner(maes: &[f64]) -> Result<usize> {
    if maes.is_empty() {
        return Err(PipelineError::EmptyTable(
            "No candidates to choose from".to_string(),
        ));
    }
    if let Some(i) = maes.iter().position(|m| m.is_nan()) {
        return Err(PipelineError::Numerical(format!(
            "Candidate {} has a NaN score",
            i
        )));
    }

    let mut best = 0;
    for (i, mae) in maes.iter().enumerate() {
        if *mae < maes[best] {
            best = i;
        }
    }
    Ok(best)
}

/// Второй набор, подготовленный для оценки
#[derive(Debug, Clone)]
pub struct SecondarySet {
    pub features: FeatureTable,
    pub target: Array1<f64>,
    /// Скейлер, которым масштабированы признаки
    pub scaler: FittedScaler,
}

pub struct Evaluator {
    target: String,
    policy: SecondaryScalerPolicy,
}

impl Evaluator {
    pub fn new(target: &str, policy: SecondaryScalerPolicy) -> Self {
        Self {
            target: target.to_string(),
            policy,
        }
    }

    /// Отбор целевого и выбранных столбцов, заполнение средним, масштабирование
    pub fn prepare(
        &self,
        raw: &RawTable,
        selected: &SelectedFeatureSet,
        training_scaler: &FittedScaler,
    ) -> Result<SecondarySet> {
        let mut wanted = vec![self.target.clone()];
        wanted.extend(selected.names().iter().cloned());
        let restricted = raw.select(&wanted)?;

        let columns = restricted
            .columns()
            .iter()
            .map(|column| {
                let name = column.name().to_string();
                if column_kind(column) != Some(ColumnKind::Numeric) {
                    return Err(PipelineError::NonNumericColumn(name));
                }
                Imputer::mean_fill(column)?
                    .map(|filled| (name.clone(), filled))
                    .ok_or_else(|| {
                        PipelineError::EmptyTable(format!(
                            "Column `{}` has no observed values in the secondary dataset",
                            name
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let table = FeatureTable::from_columns(columns, restricted.n_rows())?;
        let (features, target) = table.split_target(&self.target)?;

        let scaler = match self.policy {
            SecondaryScalerPolicy::Refit => FittedScaler::fit(&features, ScalerOrigin::Secondary)?,
            SecondaryScalerPolicy::ReuseTraining => training_scaler.clone(),
        };
        let features = scaler.transform(&features)?;

        tracing::info!(
            "Secondary dataset: {} rows, scaler origin {:?}",
            features.n_rows(),
            scaler.origin()
        );

        Ok(SecondarySet {
            features,
            target,
            scaler,
        })
    }

    /// Ошибка каждого кандидата на втором наборе и выбор победителя.
    /// `test_targets` это истинные значения отложенной выборки основного набора.
    pub fn evaluate(
        &self,
        candidates: &[CandidateModel],
        secondary: &SecondarySet,
        test_targets: &Array1<f64>,
    ) -> Result<EvaluationReport> {
        let records = secondary.features.values();
        let mut scores = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let pred: Array1<f64> = candidate.model.predict(records);
            let secondary_mae = mean_absolute_error(secondary.target.view(), pred.view())?;
            tracing::info!(
                "{}: test MAE {:.4}, secondary MAE {:.4}",
                candidate.family,
                candidate.test_mae,
                secondary_mae
            );
            scores.push(CandidateScore {
                family: candidate.family,
                hyperparams: candidate.hyperparams.clone(),
                cv_score: candidate.cv_score,
                baseline_mae: candidate.baseline_mae,
                test_mae: candidate.test_mae,
                secondary_mae,
            });
        }

        let maes: Vec<f64> = scores.iter().map(|s| s.secondary_mae).collect();
        let winner = &candidates[select_winner(&maes)?];
        tracing::info!("Winner: {}", winner.family);

        if winner.test_predictions.len() != test_targets.len() {
            return Err(PipelineError::RowMismatch {
                context: "reference table".to_string(),
                got: winner.test_predictions.len(),
                expected: test_targets.len(),
            });
        }
        let reference = test_targets
            .iter()
            .zip(winner.test_predictions.iter())
            .map(|(&y_test, &y_pred)| ReferenceRow { y_test, y_pred })
            .collect();

        Ok(EvaluationReport {
            scores,
            winner: winner.family,
            reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::table::{categorical_column, numeric_column};

    #[test]
    fn test_lowest_error_wins() {
        assert_eq!(select_winner(&[0.30, 0.25, 0.28]).unwrap(), 1);
    }

    #[test]
    fn test_ties_go_to_first_family() {
        assert_eq!(select_winner(&[0.25, 0.25, 0.28]).unwrap(), 0);
        assert_eq!(select_winner(&[0.30, 0.28, 0.28]).unwrap(), 1);
    }

    #[test]
    fn test_nan_score_aborts() {
        assert!(matches!(
            select_winner(&[0.30, f64::NAN, 0.28]),
            Err(PipelineError::Numerical(_))
        ));
        assert!(select_winner(&[]).is_err());
    }

    fn secondary_raw() -> RawTable {
        RawTable::new(vec![
            numeric_column("overall", vec![Some(60.0), Some(70.0), Some(80.0), Some(90.0)]),
            numeric_column("age", vec![Some(20.0), None, Some(30.0), Some(34.0)]),
            numeric_column("potential", vec![Some(70.0), Some(75.0), Some(85.0), Some(91.0)]),
            categorical_column("club", vec![Some("A"), Some("B"), Some("A"), Some("C")]),
        ])
        .unwrap()
    }

    fn training_scaler() -> FittedScaler {
        let table = FeatureTable::new(
            vec!["age".into(), "potential".into()],
            ndarray::array![[18.0, 60.0], [40.0, 95.0]],
        )
        .unwrap();
        FittedScaler::fit(&table, ScalerOrigin::Primary).unwrap()
    }

    #[test]
    fn test_prepare_follows_scaler_policy() {
        let selected = SelectedFeatureSet::new(vec!["age".into(), "potential".into()]).unwrap();

        let refit = Evaluator::new("overall", SecondaryScalerPolicy::Refit)
            .prepare(&secondary_raw(), &selected, &training_scaler())
            .unwrap();
        assert_eq!(refit.scaler.origin(), ScalerOrigin::Secondary);
        assert_eq!(refit.target.to_vec(), vec![60.0, 70.0, 80.0, 90.0]);
        // Пропуск заполнен средним: (20 + 30 + 34) / 3 = 28
        assert!((refit.scaler.mean()[0] - 28.0).abs() < 1e-12);

        let reuse = Evaluator::new("overall", SecondaryScalerPolicy::ReuseTraining)
            .prepare(&secondary_raw(), &selected, &training_scaler())
            .unwrap();
        assert_eq!(reuse.scaler, training_scaler());
    }

    #[test]
    fn test_prepare_rejects_missing_and_non_numeric_columns() {
        let evaluator = Evaluator::new("overall", SecondaryScalerPolicy::Refit);

        let missing = SelectedFeatureSet::new(vec!["age".into(), "pace".into()]).unwrap();
        assert!(matches!(
            evaluator.prepare(&secondary_raw(), &missing, &training_scaler()),
            Err(PipelineError::MissingColumn(name)) if name == "pace"
        ));

        let categorical = SelectedFeatureSet::new(vec!["age".into(), "club".into()]).unwrap();
        assert!(matches!(
            evaluator.prepare(&secondary_raw(), &categorical, &training_scaler()),
            Err(PipelineError::NonNumericColumn(name)) if name == "club"
        ));
    }
}
