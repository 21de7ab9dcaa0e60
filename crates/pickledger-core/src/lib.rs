// Library root: re-exports all modules so the binary and integration tests
// can reach the engine's public API.

pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod picks;
pub mod rebuild;
pub mod reconcile;
pub mod report;
pub mod xref;
