pub mod error;
pub mod filter;
pub mod filter_order;
pub mod filter_where;
pub mod matcher;
pub mod types;

pub use error::FilterError;
pub use filter::{validate_identifier, Filter};
pub use types::*;
