//! Каталог артефактов обученной модели

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::TrainedModel;
use crate::pipeline::PipelineOutput;
use crate::preprocessing::FittedScaler;
use crate::types::{EvaluationReport, ReferenceRow};

pub const MODEL_FILE: &str = "model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const REFERENCE_FILE: &str = "reference.csv";
pub const REPORT_FILE: &str = "report.json";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_output(&self, output: &PipelineOutput) -> Result<()> {
        self.save_model(&output.model)?;
        self.save_scaler(&output.persisted_scaler)?;
        self.save_reference(&output.report.reference)?;
        self.save_report(&output.report)?;
        tracing::info!("Artifacts written to {}", self.dir.display());
        Ok(())
    }

    pub fn save_model(&self, model: &TrainedModel) -> Result<()> {
        self.write_json(MODEL_FILE, model)
    }

    pub fn save_scaler(&self, scaler: &FittedScaler) -> Result<()> {
        self.write_json(SCALER_FILE, scaler)
    }

    pub fn save_report(&self, report: &EvaluationReport) -> Result<()> {
        self.write_json(REPORT_FILE, report)
    }

    /// Заголовок `y_test,y_pred`
    pub fn save_reference(&self, rows: &[ReferenceRow]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut writer = csv::Writer::from_path(self.dir.join(REFERENCE_FILE))?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn load_model(&self) -> Result<TrainedModel> {
        self.read_json(MODEL_FILE)
    }

    pub fn load_scaler(&self) -> Result<FittedScaler> {
        self.read_json(SCALER_FILE)
    }

    pub fn load_report(&self) -> Result<EvaluationReport> {
        self.read_json(REPORT_FILE)
    }

    pub fn load_reference(&self) -> Result<Vec<ReferenceRow>> {
        let mut reader = csv::Reader::from_path(self.dir.join(REFERENCE_FILE))?;
        let rows = reader
            .deserialize()
            .collect::<std::result::Result<Vec<ReferenceRow>, csv::Error>>()?;
        Ok(rows)
    }

    fn write_json<T: serde::Serialize>(&self, name: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let writer = BufWriter::new(File::create(self.dir.join(name))?);
        serde_json::to_writer_pretty(writer, value)?;
        Ok(())
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T> {
        let reader = BufReader::new(File::open(self.dir.join(name))?);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::{FeatureTable, ScalerOrigin};
    use ndarray::array;

    #[test]
    fn test_reference_csv_has_expected_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("out"));
        let rows = vec![
            ReferenceRow { y_test: 70.0, y_pred: 71.5 },
            ReferenceRow { y_test: 82.0, y_pred: 80.25 },
        ];
        store.save_reference(&rows).unwrap();

        let text = fs::read_to_string(dir.path().join("out").join(REFERENCE_FILE)).unwrap();
        assert!(text.starts_with("y_test,y_pred\n"));
        assert_eq!(store.load_reference().unwrap(), rows);
    }

    #[test]
    fn test_scaler_loads_independently() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let table = FeatureTable::new(vec!["age".into()], array![[20.0], [30.0]]).unwrap();
        let scaler = FittedScaler::fit(&table, ScalerOrigin::Secondary).unwrap();

        store.save_scaler(&scaler).unwrap();
        assert_eq!(store.load_scaler().unwrap(), scaler);
        assert!(store.load_model().is_err());
    }
}
