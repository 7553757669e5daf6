//! Admin surface: ledger-wide listings and manual reprocessing.

pub mod handlers;
