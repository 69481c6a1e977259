//! DOE: the asynchronous book-building UCT variant (spec §4.5). A single
//! persistent tree, grown through one lock at a time, with evaluation
//! farmed out to a bounded worker pool and the result exported as a
//! flat opening book.

pub mod engine;
pub mod export;
pub mod node;
pub mod pool;
pub mod store;

pub use engine::{DoeEngine, Scorer};
pub use export::{export_book, BookEntry, BookExport};
pub use node::DoeNode;
pub use pool::WorkerPool;
pub use store::{default_store_path, SqliteStore, Store};
