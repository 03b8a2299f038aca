//! Офлайн-конвейер: от сырых таблиц до модели-победителя
//!
//! Каждый этап получает неизменяемые таблицы предыдущего и возвращает новые.

use std::path::Path;

use chrono::Utc;
use linfa::DatasetBase;
use ndarray::Array1;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::models::{RatingDataset, TrainedModel};
use crate::preprocessing::{
    CategoryEncoder, Cleaner, ColumnKind, FeatureRanker, FeatureTable, FittedScaler, Imputer,
    RawTable, ScalerOrigin,
};
use crate::training::{CandidateModel, Evaluator, ModelTrainer};
use crate::types::{EvaluationReport, FeatureImportanceRanking, SelectedFeatureSet};

/// Всё, что производит один запуск конвейера
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub ranking: FeatureImportanceRanking,
    pub selected: SelectedFeatureSet,
    /// Скейлер основного набора, которым масштабировано обучение
    pub training_scaler: FittedScaler,
    /// Скейлер, применённый ко второму набору; он и сохраняется
    pub persisted_scaler: FittedScaler,
    pub report: EvaluationReport,
    pub model: TrainedModel,
}

pub struct RatingPipeline {
    config: PipelineConfig,
}

impl RatingPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run_paths<P: AsRef<Path>, Q: AsRef<Path>>(&self, primary: P, secondary: Q) -> Result<PipelineOutput> {
        let primary = RawTable::from_csv_path(primary)?;
        let secondary = RawTable::from_csv_path(secondary)?;
        self.run(&primary, &secondary)
    }

    pub fn run(&self, primary: &RawTable, secondary: &RawTable) -> Result<PipelineOutput> {
        let (candidates, target) = self.prepare_candidates(primary)?;
        let (ranking, selected) = self.rank(&candidates, &target)?;
        let (scaled, training_scaler) = self.scale_selected(&candidates, &selected)?;

        let dataset = DatasetBase::new(scaled.values().clone(), target);
        let (train, test) = crate::training::train_test_split(
            &dataset,
            self.config.split.test_fraction,
            self.config.split.seed,
        )?;
        let trained = self.train(&train, &test)?;

        let evaluator = Evaluator::new(&self.config.target_column, self.config.secondary_scaler);
        let secondary_set = evaluator.prepare(secondary, &selected, &training_scaler)?;
        let report = evaluator.evaluate(&trained, &secondary_set, test.targets())?;

        let winner = trained
            .into_iter()
            .find(|c| c.family == report.winner)
            .ok_or_else(|| PipelineError::Numerical("Winner is missing from candidates".to_string()))?;

        let model = TrainedModel {
            hyperparams: winner.hyperparams,
            feature_names: selected.names().to_vec(),
            trained_at: Utc::now(),
            model: winner.model,
        };

        Ok(PipelineOutput {
            ranking,
            selected,
            training_scaler,
            persisted_scaler: secondary_set.scaler,
            report,
            model,
        })
    }

    /// Очистка, заполнение пропусков, кодирование и отделение цели
    pub fn prepare_candidates(&self, raw: &RawTable) -> Result<(FeatureTable, Array1<f64>)> {
        let target_name = &self.config.target_column;
        let cleaned = Cleaner::new(self.config.missing_threshold).clean(raw)?;
        if cleaned.n_columns() == 0 {
            return Err(PipelineError::EmptyTable(
                "No columns left after dropping sparse columns".to_string(),
            ));
        }
        if cleaned.n_rows() == 0 {
            return Err(PipelineError::EmptyTable("Dataset has no rows".to_string()));
        }

        match cleaned.kind(target_name) {
            None => return Err(PipelineError::MissingColumn(target_name.clone())),
            Some(ColumnKind::Categorical) => {
                return Err(PipelineError::NonNumericColumn(target_name.clone()))
            }
            Some(ColumnKind::Numeric) => {}
        }

        let (numeric, categorical) = Imputer::impute(&cleaned)?;
        let (encoded, _) = CategoryEncoder::fit_transform(&categorical)?;
        let combined = numeric.hconcat(&encoded)?;
        let (features, target) = combined.split_target(target_name)?;

        tracing::info!(
            "Prepared {} candidate features over {} rows",
            features.n_columns(),
            features.n_rows()
        );
        Ok((features, target))
    }

    pub fn rank(
        &self,
        features: &FeatureTable,
        target: &Array1<f64>,
    ) -> Result<(FeatureImportanceRanking, SelectedFeatureSet)> {
        let ranker = FeatureRanker::new(self.config.ranking.clone());
        let (ranking, selected) = ranker.rank_and_select(features, target)?;
        for entry in ranking.head(self.config.ranking.selected_count + 1) {
            tracing::info!("Importance {:<28} {:.4}", entry.name, entry.importance);
        }
        Ok((ranking, selected))
    }

    /// Скейлер обучается на выбранных столбцах всего основного набора
    pub fn scale_selected(
        &self,
        features: &FeatureTable,
        selected: &SelectedFeatureSet,
    ) -> Result<(FeatureTable, FittedScaler)> {
        let table = features.select(selected.names())?;
        let scaler = FittedScaler::fit(&table, ScalerOrigin::Primary)?;
        let scaled = scaler.transform(&table)?;
        Ok((scaled, scaler))
    }

    pub fn train(&self, train: &RatingDataset, test: &RatingDataset) -> Result<Vec<CandidateModel>> {
        tracing::info!(
            "Training on {} rows, testing on {} rows",
            train.records().nrows(),
            test.records().nrows()
        );
        ModelTrainer::new(&self.config).train_all(train, test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::{categorical_column, numeric_column};

    fn pipeline() -> RatingPipeline {
        RatingPipeline::new(PipelineConfig::default()).unwrap()
    }

    #[test]
    fn test_prepare_candidates_encodes_and_separates_target() {
        let raw = RawTable::new(vec![
            numeric_column("overall", vec![Some(70.0), Some(80.0), Some(75.0)]),
            numeric_column("age", vec![Some(20.0), None, Some(30.0)]),
            categorical_column("foot", vec![Some("Right"), Some("Left"), None]),
            numeric_column("sparse", vec![None, None, Some(1.0)]),
        ])
        .unwrap();

        let (features, target) = pipeline().prepare_candidates(&raw).unwrap();
        assert_eq!(features.names(), &["age".to_string(), "foot".to_string()]);
        assert_eq!(target.to_vec(), vec![70.0, 80.0, 75.0]);
        assert_eq!(features.column("foot").unwrap().to_vec(), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_prepare_candidates_requires_numeric_target() {
        let raw = RawTable::new(vec![
            categorical_column("overall", vec![Some("high"), Some("low")]),
            numeric_column("age", vec![Some(20.0), Some(30.0)]),
        ])
        .unwrap();
        assert!(matches!(
            pipeline().prepare_candidates(&raw),
            Err(PipelineError::NonNumericColumn(_))
        ));

        let raw = RawTable::new(vec![numeric_column("age", vec![Some(1.0)])]).unwrap();
        assert!(matches!(
            pipeline().prepare_candidates(&raw),
            Err(PipelineError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_everything_dropped_is_an_empty_table() {
        let raw = RawTable::new(vec![numeric_column("overall", vec![None, None])]).unwrap();
        assert!(matches!(
            pipeline().prepare_candidates(&raw),
            Err(PipelineError::EmptyTable(_))
        ));
    }
}
