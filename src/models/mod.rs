pub mod column;
pub mod dataset;
pub mod question;

pub use column::{Column, ColumnLevel, ALL_COLUMNS, CACHED_COLUMNS};
pub use dataset::{parse_decimal, Dataset};
pub use question::QuestionRequest;
