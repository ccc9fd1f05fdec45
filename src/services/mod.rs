//! Business logic services

pub mod identity;
pub mod ledger;
