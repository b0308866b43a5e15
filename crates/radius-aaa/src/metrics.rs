//! Request counters rendered in Prometheus text format
//!
//! Rejects are counted per [`RejectKind`] tag so dashboards can split
//! bad passwords from binding failures without parsing logs.

use crate::error::RejectKind;
use radius_wire::AcctStatusType;
use std::fmt::{Display, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Prometheus exposition text builder
#[derive(Debug, Clone, Default)]
pub struct PrometheusMetrics {
    pub content: String,
}

impl PrometheusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn header(&mut self, name: &str, kind: &str, help: &str) {
        let _ = writeln!(self.content, "# HELP {} {}", name, help);
        let _ = writeln!(self.content, "# TYPE {} {}", name, kind);
    }

    pub fn add_gauge(&mut self, name: &str, value: impl Display, help: &str) {
        self.header(name, "gauge", help);
        let _ = writeln!(self.content, "{} {}", name, value);
    }

    pub fn add_counter(&mut self, name: &str, value: impl Display, help: &str) {
        self.header(name, "counter", help);
        let _ = writeln!(self.content, "{} {}", name, value);
    }

    /// One counter family with a sample per label set
    pub fn add_labeled_counters<V: Display>(
        &mut self,
        name: &str,
        help: &str,
        samples: &[(Vec<(&str, &str)>, V)],
    ) {
        self.header(name, "counter", help);
        for (labels, value) in samples {
            let label_str = labels
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, v))
                .collect::<Vec<_>>()
                .join(",");
            let _ = writeln!(self.content, "{}{{{}}} {}", name, label_str, value);
        }
    }
}

const ACCT_STATUS_COUNT: usize = 5;

const ACCT_STATUSES: [AcctStatusType; ACCT_STATUS_COUNT] = [
    AcctStatusType::Start,
    AcctStatusType::Stop,
    AcctStatusType::InterimUpdate,
    AcctStatusType::AccountingOn,
    AcctStatusType::AccountingOff,
];

fn acct_index(status: AcctStatusType) -> usize {
    ACCT_STATUSES
        .iter()
        .position(|s| *s == status)
        .unwrap_or(0)
}

pub struct AuthMetrics {
    started: Instant,
    accepts: AtomicU64,
    rejects: [AtomicU64; RejectKind::COUNT],
    challenges: AtomicU64,
    dropped: AtomicU64,
    panics: AtomicU64,
    accounting: [AtomicU64; ACCT_STATUS_COUNT],
    accounting_errors: AtomicU64,
}

impl Default for AuthMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthMetrics {
    pub fn new() -> Self {
        AuthMetrics {
            started: Instant::now(),
            accepts: AtomicU64::new(0),
            rejects: std::array::from_fn(|_| AtomicU64::new(0)),
            challenges: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            panics: AtomicU64::new(0),
            accounting: std::array::from_fn(|_| AtomicU64::new(0)),
            accounting_errors: AtomicU64::new(0),
        }
    }

    pub fn record_accept(&self) {
        self.accepts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reject(&self, kind: RejectKind) {
        self.rejects[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_challenge(&self) {
        self.challenges.fetch_add(1, Ordering::Relaxed);
    }

    /// Request answered with nothing (suppressed by a guard, bad secret)
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panic(&self) {
        self.panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accounting(&self, status: AcctStatusType) {
        self.accounting[acct_index(status)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accounting_error(&self) {
        self.accounting_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accepts(&self) -> u64 {
        self.accepts.load(Ordering::Relaxed)
    }

    pub fn rejects(&self, kind: RejectKind) -> u64 {
        self.rejects[kind.index()].load(Ordering::Relaxed)
    }

    pub fn challenges(&self) -> u64 {
        self.challenges.load(Ordering::Relaxed)
    }

    pub fn panics(&self) -> u64 {
        self.panics.load(Ordering::Relaxed)
    }

    pub fn accounting(&self, status: AcctStatusType) -> u64 {
        self.accounting[acct_index(status)].load(Ordering::Relaxed)
    }

    pub fn accounting_errors(&self) -> u64 {
        self.accounting_errors.load(Ordering::Relaxed)
    }

    pub fn render_prometheus(&self) -> String {
        let mut metrics = PrometheusMetrics::new();

        metrics.add_gauge(
            "radius_uptime_seconds",
            self.started.elapsed().as_secs(),
            "Seconds since the engine started",
        );
        metrics.add_counter(
            "radius_auth_accept_total",
            self.accepts(),
            "Access-Accept responses sent",
        );

        let rejects: Vec<_> = RejectKind::ALL
            .iter()
            .map(|kind| (vec![("reason", kind.metrics_tag())], self.rejects(*kind)))
            .collect();
        metrics.add_labeled_counters(
            "radius_auth_reject_total",
            "Access-Reject responses by reason",
            &rejects,
        );

        metrics.add_counter(
            "radius_auth_challenge_total",
            self.challenges(),
            "Access-Challenge responses sent",
        );
        metrics.add_counter(
            "radius_auth_dropped_total",
            self.dropped.load(Ordering::Relaxed),
            "Requests left unanswered",
        );
        metrics.add_counter(
            "radius_auth_panic_total",
            self.panics(),
            "Pipeline executions that panicked",
        );

        let accounting: Vec<_> = ACCT_STATUSES
            .iter()
            .map(|status| (vec![("status", status.name())], self.accounting(*status)))
            .collect();
        metrics.add_labeled_counters(
            "radius_acct_requests_total",
            "Accounting-Request packets by Acct-Status-Type",
            &accounting,
        );
        metrics.add_counter(
            "radius_acct_errors_total",
            self.accounting_errors(),
            "Accounting requests whose processing failed",
        );

        metrics.content
    }
}
