pub mod dense;
pub mod error;
pub mod factor;
pub mod sparse;

pub use dense::DenseMatrix;
pub use error::{Error, Result};
pub use factor::Factorizer;
pub use sparse::SparseMatrix;
