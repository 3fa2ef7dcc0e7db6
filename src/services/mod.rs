// Service layer between the HTTP routes and the backend gateways.
// Validation and derivation happen here so nothing invalid is ever sent out.

pub mod files;
pub mod records;

pub use files::{Download, FileService};
pub use records::{RecordList, RecordService};
