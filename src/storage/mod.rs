pub mod record_store;
pub mod snapshot_writer;

pub use record_store::*;
pub use snapshot_writer::*;
