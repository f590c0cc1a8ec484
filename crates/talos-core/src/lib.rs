pub mod checkpoint;
pub mod config;
pub mod error;
pub mod plan;
pub mod retry;
pub mod schema;
pub mod sink;
pub mod testutil;
pub mod traits;
pub mod work;
pub mod worker;

pub use error::AppError;
pub use schema::{FilteredRecord, project};
pub use traits::{Fetcher, OutputSink};
pub use work::{RawDocument, WorkStatus, WorkUnit};
