// crates/core/src/lib.rs
pub mod backfill;
pub mod cache;
pub mod cursor;
pub mod discovery;
pub mod error;
pub mod event;
pub mod ingest;

pub use backfill::*;
pub use cache::*;
pub use cursor::*;
pub use discovery::*;
pub use error::*;
pub use event::*;
pub use ingest::*;
