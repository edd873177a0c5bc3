//! Entitlement policy: which sessions an account may run and for how long.

mod policy;

pub use policy::{EntitlementPolicy, EntitlementPolicyBuilder};
