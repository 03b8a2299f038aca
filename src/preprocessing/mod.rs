/// Модуль предобработки данных

pub mod cleaning;
pub mod encoding;
pub mod feature_selection;
pub mod imputation;
pub mod normalization;
pub mod table;

pub use cleaning::Cleaner;
pub use encoding::{CategoryEncoder, CategoryEncoding};
pub use feature_selection::FeatureRanker;
pub use imputation::{CategoricalTable, Imputer};
pub use normalization::{FittedScaler, ScalerOrigin};
pub use table::{categorical_column, numeric_column, ColumnKind, FeatureTable, RawTable};
