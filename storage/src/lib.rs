pub mod index;
pub mod store;
pub mod wal;

pub use store::{LocalStore, PaperScan, StoreError, StoreMutation, StoreStats};
