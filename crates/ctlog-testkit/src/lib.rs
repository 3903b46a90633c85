//! Shared in-memory fixtures backing the other crates' test suites: an
//! `EntryDb`, a `ConsistentStore`, and an election backend, all
//! single-process stand-ins for the external systems the real engine talks
//! to.

pub mod election;
pub mod entrydb;
pub mod store;

pub use election::InMemoryElectionBackend;
pub use entrydb::InMemoryEntryDb;
pub use store::LocalStore;
