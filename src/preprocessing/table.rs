//! Табличные данные: сырая таблица игроков и числовая таблица признаков
//!
//! Сырая таблица это `DataFrame` polars со столбцами Float64 или String.
//! На границе `FeatureTable` значения переводятся в `Array2<f64>`.

use std::collections::HashSet;
use std::path::Path;

use ndarray::{concatenate, Array1, Array2, ArrayView1, Axis};
use polars::io::mmap::MmapBytesReader;
use polars::prelude::*;

use crate::error::{PipelineError, Result};

/// Маркеры пропущенного значения в CSV
const MISSING_MARKERS: [&str; 7] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL"];

/// Тип столбца сырой таблицы
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// Числовой столбец; None означает пропуск
pub fn numeric_column(name: &str, values: Vec<Option<f64>>) -> Column {
    Series::new(name.into(), values).into()
}

/// Категориальный столбец; None означает пропуск
pub fn categorical_column(name: &str, values: Vec<Option<&str>>) -> Column {
    Series::new(name.into(), values).into()
}

/// Сырая таблица игроков со смешанными типами столбцов
#[derive(Debug, Clone)]
pub struct RawTable {
    frame: DataFrame,
    /// Хранится отдельно: таблица без столбцов сохраняет число строк
    n_rows: usize,
}

impl RawTable {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map(|c| c.len()).unwrap_or(0);
        Self::with_rows(columns, n_rows)
    }

    /// Таблица с явным числом строк (допускает ноль столбцов)
    pub fn with_rows(columns: Vec<Column>, n_rows: usize) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name().as_str()) {
                return Err(PipelineError::DuplicateColumn(column.name().to_string()));
            }
            if column.len() != n_rows {
                return Err(PipelineError::RowMismatch {
                    context: format!("column `{}`", column.name()),
                    got: column.len(),
                    expected: n_rows,
                });
            }
            if column_kind(column).is_none() {
                return Err(PipelineError::NonNumericColumn(column.name().to_string()));
            }
        }
        let frame = DataFrame::new(columns)?;
        Ok(Self { frame, n_rows })
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let table = Self::from_csv_reader(file)?;
        tracing::info!(
            "Loaded {} rows and {} columns from {}",
            table.n_rows(),
            table.n_columns(),
            path.as_ref().display()
        );
        Ok(table)
    }

    /// Столбец числовой, если все непустые ячейки разбираются как конечные f64
    pub fn from_csv_reader<R: MmapBytesReader>(reader: R) -> Result<Self> {
        // Все столбцы читаются строками, типы выводятся ниже
        let raw = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .into_reader_with_file_handle(reader)
            .finish()?;

        let columns = raw
            .get_columns()
            .iter()
            .map(infer_column)
            .collect::<Result<Vec<_>>>()?;
        Self::with_rows(columns, raw.height())
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.frame.width()
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn columns(&self) -> &[Column] {
        self.frame.get_columns()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.frame.column(name).ok()
    }

    pub fn kind(&self, name: &str) -> Option<ColumnKind> {
        self.column(name).and_then(column_kind)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// Новая таблица только с указанными столбцами, в указанном порядке
    pub fn select(&self, names: &[String]) -> Result<RawTable> {
        let columns = names
            .iter()
            .map(|name| {
                self.column(name)
                    .cloned()
                    .ok_or_else(|| PipelineError::MissingColumn(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        RawTable::with_rows(columns, self.n_rows)
    }

    pub fn retain_columns<F>(&self, mut keep: F) -> Result<RawTable>
    where
        F: FnMut(&Column) -> bool,
    {
        let columns = self.columns().iter().filter(|c| keep(c)).cloned().collect();
        RawTable::with_rows(columns, self.n_rows)
    }
}

pub fn column_kind(column: &Column) -> Option<ColumnKind> {
    match column.dtype() {
        DataType::Float64 => Some(ColumnKind::Numeric),
        DataType::String => Some(ColumnKind::Categorical),
        _ => None,
    }
}

/// Вывод типа строкового столбца CSV: маркеры пропусков становятся null
fn infer_column(column: &Column) -> Result<Column> {
    let name = column.name().as_str();
    let cells: Vec<Option<&str>> = column
        .str()?
        .into_iter()
        .map(|cell| cell.map(str::trim).filter(|s| !MISSING_MARKERS.contains(s)))
        .collect();

    let parsed: Option<Vec<Option<f64>>> = cells
        .iter()
        .map(|cell| match cell {
            None => Some(None),
            Some(s) => s.parse::<f64>().ok().map(Some),
        })
        .collect();

    match parsed {
        Some(numbers) => {
            let bad = numbers
                .iter()
                .zip(&cells)
                .find(|(number, _)| number.map_or(false, |v| !v.is_finite()));
            if let Some((_, cell)) = bad {
                return Err(PipelineError::NonFiniteValue {
                    column: name.to_string(),
                    value: cell.unwrap_or_default().to_string(),
                });
            }
            Ok(numeric_column(name, numbers))
        }
        None => Ok(categorical_column(name, cells)),
    }
}

/// Числовая таблица признаков без пропусков
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    names: Vec<String>,
    values: Array2<f64>,
}

impl FeatureTable {
    pub fn new(names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if names.len() != values.ncols() {
            return Err(PipelineError::FeatureMismatch {
                expected: names,
                got: (0..values.ncols()).map(|i| format!("#{}", i)).collect(),
            });
        }
        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self { names, values })
    }

    pub fn from_columns(columns: Vec<(String, Vec<f64>)>, n_rows: usize) -> Result<Self> {
        let mut values = Array2::zeros((n_rows, columns.len()));
        let mut names = Vec::with_capacity(columns.len());
        for (j, (name, column)) in columns.into_iter().enumerate() {
            if column.len() != n_rows {
                return Err(PipelineError::RowMismatch {
                    context: format!("column `{}`", name),
                    got: column.len(),
                    expected: n_rows,
                });
            }
            values.column_mut(j).assign(&Array1::from(column));
            names.push(name);
        }
        Self::new(names, values)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.values.ncols()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.position(name).map(|j| self.values.column(j))
    }

    /// Выбор столбцов по имени; порядок задаётся аргументом
    pub fn select(&self, names: &[String]) -> Result<FeatureTable> {
        let indices = names
            .iter()
            .map(|name| {
                self.position(name)
                    .ok_or_else(|| PipelineError::MissingColumn(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        FeatureTable::new(names.to_vec(), self.values.select(Axis(1), &indices))
    }

    /// Отделение целевого столбца от признаков
    pub fn split_target(&self, target: &str) -> Result<(FeatureTable, Array1<f64>)> {
        let idx = self
            .position(target)
            .ok_or_else(|| PipelineError::MissingColumn(target.to_string()))?;
        let y = self.values.column(idx).to_owned();
        let keep: Vec<usize> = (0..self.n_columns()).filter(|&j| j != idx).collect();
        let names = keep.iter().map(|&j| self.names[j].clone()).collect();
        let features = FeatureTable::new(names, self.values.select(Axis(1), &keep))?;
        Ok((features, y))
    }

    /// Горизонтальное объединение двух таблиц с одинаковым числом строк
    pub fn hconcat(&self, other: &FeatureTable) -> Result<FeatureTable> {
        if self.n_rows() != other.n_rows() {
            return Err(PipelineError::RowMismatch {
                context: "table concatenation".to_string(),
                got: other.n_rows(),
                expected: self.n_rows(),
            });
        }
        let values = concatenate(Axis(1), &[self.values.view(), other.values.view()])
            .map_err(|e| PipelineError::Numerical(format!("Failed to concatenate tables: {}", e)))?;
        let mut names = self.names.clone();
        names.extend(other.names.iter().cloned());
        FeatureTable::new(names, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const SAMPLE: &str = "\
short_name,age,overall,club,dob
Messi,33,93,Barcelona,1987-06-24
Ronaldo,,92,,1985-02-05
Oblak,27,NaN,Atletico,1993-01-07
";

    fn load(csv: &'static str) -> Result<RawTable> {
        RawTable::from_csv_reader(std::io::Cursor::new(csv))
    }

    fn numbers(table: &RawTable, name: &str) -> Vec<Option<f64>> {
        table.column(name).unwrap().f64().unwrap().into_iter().collect()
    }

    #[test]
    fn test_csv_type_inference() {
        let table = load(SAMPLE).unwrap();
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.n_columns(), 5);

        assert_eq!(table.kind("age"), Some(ColumnKind::Numeric));
        assert_eq!(numbers(&table, "age"), vec![Some(33.0), None, Some(27.0)]);
        assert_eq!(numbers(&table, "overall")[2], None);

        assert_eq!(table.kind("club"), Some(ColumnKind::Categorical));
        assert_eq!(table.column("club").unwrap().null_count(), 1);
        assert_eq!(table.kind("dob"), Some(ColumnKind::Categorical));
        assert_eq!(table.kind("missing"), None);
    }

    #[test]
    fn test_non_finite_numbers_are_rejected() {
        let result = load("age,overall\n30,80\ninf,75\n");
        match result {
            Err(PipelineError::NonFiniteValue { column, value }) => {
                assert_eq!(column, "age");
                assert_eq!(value, "inf");
            }
            other => panic!("expected a non-finite error, got {:?}", other),
        }
        assert!(matches!(
            load("value_eur\n1.5e6\n-Infinity\n"),
            Err(PipelineError::NonFiniteValue { .. })
        ));

        // В текстовом столбце "inf" это обычная категория
        let table = load("nickname\nLeo\ninf\n").unwrap();
        assert_eq!(table.kind("nickname"), Some(ColumnKind::Categorical));
    }

    #[test]
    fn test_raw_table_rejects_ragged_columns() {
        let result = RawTable::new(vec![
            numeric_column("a", vec![Some(1.0), Some(2.0)]),
            numeric_column("b", vec![Some(1.0)]),
        ]);
        assert!(matches!(result, Err(PipelineError::RowMismatch { .. })));

        let result = RawTable::new(vec![
            numeric_column("a", vec![Some(1.0)]),
            numeric_column("a", vec![Some(1.0)]),
        ]);
        assert!(matches!(result, Err(PipelineError::DuplicateColumn(_))));
    }

    #[test]
    fn test_select_keeps_order_and_row_count() {
        let table = RawTable::new(vec![
            numeric_column("a", vec![Some(1.0), None]),
            categorical_column("b", vec![Some("x"), Some("y")]),
        ])
        .unwrap();
        let selected = table.select(&["b".into(), "a".into()]).unwrap();
        assert_eq!(selected.column_names(), vec!["b".to_string(), "a".to_string()]);

        let empty = table.retain_columns(|_| false).unwrap();
        assert_eq!(empty.n_columns(), 0);
        assert_eq!(empty.n_rows(), 2);
        assert!(matches!(
            table.select(&["c".into()]),
            Err(PipelineError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_split_target_and_select() {
        let table = FeatureTable::new(
            vec!["a".into(), "overall".into(), "b".into()],
            array![[1.0, 70.0, 3.0], [2.0, 80.0, 4.0]],
        )
        .unwrap();

        let (features, y) = table.split_target("overall").unwrap();
        assert_eq!(features.names(), &["a".to_string(), "b".to_string()]);
        assert_eq!(y, array![70.0, 80.0]);
        assert_eq!(features.values(), &array![[1.0, 3.0], [2.0, 4.0]]);

        let reordered = features.select(&["b".into(), "a".into()]).unwrap();
        assert_eq!(reordered.values(), &array![[3.0, 1.0], [4.0, 2.0]]);

        assert!(matches!(
            table.split_target("potential"),
            Err(PipelineError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_hconcat_checks_rows_and_names() {
        let left = FeatureTable::new(vec!["a".into()], array![[1.0], [2.0]]).unwrap();
        let right = FeatureTable::new(vec!["b".into()], array![[3.0], [4.0]]).unwrap();
        let both = left.hconcat(&right).unwrap();
        assert_eq!(both.names(), &["a".to_string(), "b".to_string()]);

        let short = FeatureTable::new(vec!["c".into()], array![[5.0]]).unwrap();
        assert!(matches!(
            left.hconcat(&short),
            Err(PipelineError::RowMismatch { .. })
        ));
        assert!(matches!(
            left.hconcat(&left),
            Err(PipelineError::DuplicateColumn(_))
        ));
    }
}
