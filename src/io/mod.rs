//! Reading and writing observations and results
pub mod csv;
pub mod dump;
pub mod summary;
