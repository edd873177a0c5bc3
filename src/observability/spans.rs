//! Structured span definitions for tracing.

use std::time::Instant;

use tracing::{Level, Span, field, span};

use super::metrics::MeterMetrics;
use crate::types::{AccountId, Mode, SessionId, Tier};

/// Tracing configuration.
#[derive(Clone, Debug, Default)]
pub struct TracingConfig {
    pub enabled: bool,
    pub level: TracingLevel,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TracingLevel {
    #[default]
    Info,
    Debug,
    Trace,
}

impl TracingLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            TracingLevel::Info => "info",
            TracingLevel::Debug => "debug",
            TracingLevel::Trace => "trace",
        }
    }
}

impl TracingConfig {
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn level(mut self, level: TracingLevel) -> Self {
        self.level = level;
        self
    }
}

/// Span around one engine operation, recording its latency on finish.
pub struct MeterSpan {
    span: Span,
    start: Instant,
}

impl MeterSpan {
    pub fn start(account_id: &AccountId, tier: Tier, mode: Mode) -> Self {
        Self::wrap(span!(
            Level::INFO,
            "meter.start",
            account_id = %account_id,
            tier = %tier,
            mode = %mode,
            session_id = field::Empty,
            latency_ms = field::Empty,
        ))
    }

    pub fn tick(session_id: &SessionId, delta_seconds: i64, is_active: bool) -> Self {
        Self::wrap(span!(
            Level::INFO,
            "meter.tick",
            session_id = %session_id,
            delta_seconds,
            is_active,
            remaining = field::Empty,
            latency_ms = field::Empty,
        ))
    }

    pub fn grant(account_id: &AccountId, sku: &str) -> Self {
        Self::wrap(span!(
            Level::INFO,
            "meter.grant",
            account_id = %account_id,
            sku,
            latency_ms = field::Empty,
        ))
    }

    fn wrap(span: Span) -> Self {
        Self {
            span,
            start: Instant::now(),
        }
    }

    pub fn record_session(&self, session_id: &SessionId) {
        self.span
            .record("session_id", field::display(session_id));
    }

    pub fn record_remaining(&self, remaining: u64) {
        self.span.record("remaining", remaining);
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn finish(self, metrics: &MeterMetrics) {
        let elapsed = self.start.elapsed();
        self.span.record("latency_ms", elapsed.as_millis() as u64);
        metrics
            .operation_latency_ms
            .observe(elapsed.as_secs_f64() * 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_span_records_latency() {
        let metrics = MeterMetrics::new();
        let account = AccountId::parse("span-account").unwrap();

        let span = MeterSpan::start(&account, Tier::Trial, Mode::Friend);
        span.record_session(&SessionId::new());
        span.finish(&metrics);

        let span = MeterSpan::tick(&SessionId::new(), 15, true);
        span.record_remaining(585);
        span.finish(&metrics);

        assert_eq!(metrics.operation_latency_ms.count(), 2);
    }

    #[test]
    fn test_tracing_level_filter() {
        let config = TracingConfig::new().level(TracingLevel::Debug);
        assert!(config.enabled);
        assert_eq!(config.level.as_filter(), "debug");
        assert!(!TracingConfig::disabled().enabled);
        assert_eq!(TracingConfig::new().level, TracingLevel::Info);
    }
}
