//! Catalog of purchasable top-up SKUs.
//!
//! SKU names follow `<channel>_<minutes>m_<cents>`, e.g. `tts_30m_999` is
//! thirty minutes of audio for 9.99.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Channel, Seconds};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkuEntry {
    pub sku: String,
    pub seconds: Seconds,
    /// Channel implied by the SKU prefix, if any.
    pub channel: Option<Channel>,
    /// List price implied by the SKU suffix, if any.
    pub list_price: Option<Decimal>,
}

impl SkuEntry {
    pub fn new(sku: impl Into<String>, seconds: Seconds) -> Self {
        let sku = sku.into();
        let channel = sku
            .split('_')
            .next()
            .and_then(|prefix| prefix.parse::<Channel>().ok());
        let list_price = sku
            .rsplit('_')
            .next()
            .filter(|cents| cents.len() >= 3 && cents.chars().all(|c| c.is_ascii_digit()))
            .and_then(|cents| cents.parse::<i64>().ok())
            .map(|cents| Decimal::new(cents, 2));
        Self {
            sku,
            seconds,
            channel,
            list_price,
        }
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.list_price = Some(price);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SkuCatalog {
    entries: BTreeMap<String, SkuEntry>,
}

impl SkuCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        Self::empty()
            .entry(SkuEntry::new("tts_15m_499", 900).with_price(dec!(4.99)))
            .entry(SkuEntry::new("tts_30m_999", 1800).with_price(dec!(9.99)))
            .entry(SkuEntry::new("tts_60m_1499", 3600).with_price(dec!(14.99)))
            .entry(SkuEntry::new("text_15m_099", 900).with_price(dec!(0.99)))
            .entry(SkuEntry::new("text_30m_299", 1800).with_price(dec!(2.99)))
            .entry(SkuEntry::new("text_60m_599", 3600).with_price(dec!(5.99)))
    }

    pub fn entry(mut self, entry: SkuEntry) -> Self {
        self.insert(entry);
        self
    }

    pub fn sku(self, sku: impl Into<String>, seconds: Seconds) -> Self {
        self.entry(SkuEntry::new(sku, seconds))
    }

    pub fn insert(&mut self, entry: SkuEntry) {
        self.entries.insert(entry.sku.clone(), entry);
    }

    pub fn get(&self, sku: &str) -> Option<&SkuEntry> {
        self.entries.get(sku)
    }

    pub fn seconds_for(&self, sku: &str) -> Option<Seconds> {
        self.get(sku).map(|e| e.seconds)
    }

    pub fn entries(&self) -> impl Iterator<Item = &SkuEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
