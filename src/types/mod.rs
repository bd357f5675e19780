
pub mod row_matrix;

pub use row_matrix::RowMatrix;
