//! Purchased top-up credit: SKU catalog and grant issuance.

mod catalog;
mod issuer;

pub use catalog::{SkuCatalog, SkuEntry};
pub use issuer::{CreditIssuer, DEFAULT_GRANT_VALIDITY_DAYS, GrantOutcome};
