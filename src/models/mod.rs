pub mod analyzed;
pub mod extracted;
pub mod flattened;
pub mod lenient;
pub mod validation;

pub use analyzed::*;
pub use extracted::*;
pub use flattened::*;
pub use lenient::{Scalar, NOT_AVAILABLE};
pub use validation::*;
