// Query Processing Module
//
// This module contains the execution pipeline: scans, window evaluation and the
// batch iteration contract that connects them.

pub mod executor;

// Export key public interfaces
pub use executor::result::QueryResult;
