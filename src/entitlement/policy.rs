//! Table-driven session caps and rolling pools.
//!
//! Lookups never fail: a mode or tier missing from the tables yields `0`,
//! which callers treat as "not entitled".

use std::collections::HashMap;

use crate::types::{Mode, Seconds, Tier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementPolicy {
    caps: HashMap<Mode, Seconds>,
    cap_overrides: HashMap<(Tier, Mode), Seconds>,
    pools: HashMap<Tier, Seconds>,
}

impl EntitlementPolicy {
    pub fn builder() -> EntitlementPolicyBuilder {
        EntitlementPolicyBuilder::new()
    }

    /// Maximum `active_seconds` a single session in `mode` may reach.
    pub fn session_cap(&self, tier: Tier, mode: Mode) -> Seconds {
        if let Some(cap) = self.cap_overrides.get(&(tier, mode)) {
            return *cap;
        }
        self.caps.get(&mode).copied().unwrap_or(0)
    }

    /// Included seconds per rolling window for `tier`.
    pub fn monthly_pool(&self, tier: Tier) -> Seconds {
        self.pools.get(&tier).copied().unwrap_or(0)
    }

    pub fn is_entitled(&self, tier: Tier, mode: Mode) -> bool {
        self.session_cap(tier, mode) > 0
    }
}

impl Default for EntitlementPolicy {
    fn default() -> Self {
        EntitlementPolicyBuilder::new().with_defaults().build()
    }
}

#[derive(Debug, Default)]
pub struct EntitlementPolicyBuilder {
    caps: HashMap<Mode, Seconds>,
    cap_overrides: HashMap<(Tier, Mode), Seconds>,
    pools: HashMap<Tier, Seconds>,
}

impl EntitlementPolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(mut self) -> Self {
        self.caps.insert(Mode::Friend, 900);
        self.caps.insert(Mode::Romantic, 1800);
        self.caps.insert(Mode::Intimate, 3600);

        self.cap_overrides.insert((Tier::Trial, Mode::Friend), 600);

        self.pools.insert(Tier::Trial, 600);
        self.pools.insert(Tier::MemberFriend, 900);
        self.pools.insert(Tier::MemberRomantic, 2700);
        self.pools.insert(Tier::MemberIntimate, 6300);
        self
    }

    pub fn cap(mut self, mode: Mode, seconds: Seconds) -> Self {
        self.caps.insert(mode, seconds);
        self
    }

    pub fn cap_override(mut self, tier: Tier, mode: Mode, seconds: Seconds) -> Self {
        self.cap_overrides.insert((tier, mode), seconds);
        self
    }

    pub fn pool(mut self, tier: Tier, seconds: Seconds) -> Self {
        self.pools.insert(tier, seconds);
        self
    }

    pub fn without_mode(mut self, mode: Mode) -> Self {
        self.caps.remove(&mode);
        self.cap_overrides.retain(|(_, m), _| *m != mode);
        self
    }

    pub fn build(self) -> EntitlementPolicy {
        EntitlementPolicy {
            caps: self.caps,
            cap_overrides: self.cap_overrides,
            pools: self.pools,
        }
    }
}
