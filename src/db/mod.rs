pub mod envelope;
pub mod error;
pub mod executor;
pub mod statement;

pub use envelope::{Envelope, Pagination};
pub use error::{DbError, DbFailure, DbResult};
pub use executor::{QueryExecutor, RetryPolicy, Rows};
pub use statement::{Param, Statement};
