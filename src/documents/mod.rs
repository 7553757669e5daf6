//! Read side: artifact listings and document downloads.

pub mod handlers;
