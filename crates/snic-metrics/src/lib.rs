//! Metric declarations for the SNIC UART driver.
//!
//! Every counter, gauge and histogram the driver records is declared once
//! in [`metric_defs`], so call sites name a constant instead of a string.
//! The `metrics` crate is re-exported; with no recorder installed every
//! call is a no-op.
//!
//! ```rust,ignore
//! use snic_metrics::{describe_metrics, metric_defs, MetricLabels};
//!
//! describe_metrics();
//! let labels = MetricLabels::new("/dev/ttyUSB0").with_category("wifi");
//! metrics::counter!(metric_defs::FRAMES_RX.name, &labels).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// Which `metrics` macro a [`Metric`] is recorded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// Name, kind, unit and label keys of one driver metric.
///
/// ```rust
/// use snic_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const WRITES: Metric = Metric::counter("snic.link.writes")
///     .with_description("Writes issued to the link")
///     .with_labels(&["link"]);
///
/// assert_eq!(WRITES.kind, MetricKind::Counter);
/// assert_eq!(WRITES.unit, Unit::Count);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    /// Defaults to [`Unit::Count`].
    pub unit: Unit,
    /// Label keys recorded alongside the value; `link` is always first.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(kind: MetricKind, name: &'static str) -> Self {
        Metric {
            name,
            kind,
            description: "",
            unit: Unit::Count,
            labels: &[],
        }
    }

    pub const fn counter(name: &'static str) -> Self {
        Self::new(MetricKind::Counter, name)
    }

    pub const fn gauge(name: &'static str) -> Self {
        Self::new(MetricKind::Gauge, name)
    }

    pub const fn histogram(name: &'static str) -> Self {
        Self::new(MetricKind::Histogram, name)
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Hand the description and unit to the installed recorder.
    pub fn describe(&self) {
        let (name, unit, description) = (self.name, self.unit, self.description);
        match self.kind {
            MetricKind::Counter => describe_counter!(name, unit, description),
            MetricKind::Gauge => describe_gauge!(name, unit, description),
            MetricKind::Histogram => describe_histogram!(name, unit, description),
        }
    }
}

/// All metric definitions for the driver.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Link / Framing
    // ========================================================================

    /// Bytes read from the link.
    pub const LINK_RX_BYTES: Metric = Metric::counter("snic.link.rx_bytes")
        .with_description("Bytes read from the serial link")
        .with_unit(Unit::Bytes)
        .with_labels(&["link"]);

    /// Bytes written to the link.
    pub const LINK_TX_BYTES: Metric = Metric::counter("snic.link.tx_bytes")
        .with_description("Bytes written to the serial link")
        .with_unit(Unit::Bytes)
        .with_labels(&["link"]);

    /// Whether the reader loop is alive (1) or not (0).
    pub const LINK_UP: Metric = Metric::gauge("snic.link.up")
        .with_description("1 while the reader loop is running, 0 once stopped or disconnected")
        .with_labels(&["link"]);

    /// Fatal link failures.
    pub const LINK_FAILURES: Metric = Metric::counter("snic.link.failures")
        .with_description("Unrecoverable read or write failures on the link")
        .with_labels(&["link"]);

    /// Frames written.
    pub const FRAMES_TX: Metric = Metric::counter("snic.frames.tx")
        .with_description("Frames written to the link")
        .with_labels(&["link", "category"]);

    /// Valid frames received.
    pub const FRAMES_RX: Metric = Metric::counter("snic.frames.rx")
        .with_description("Valid frames received from the link")
        .with_labels(&["link", "category"]);

    /// Frames discarded by the decoder.
    ///
    /// Labels: link, reason (`checksum` or `end_marker`)
    pub const FRAMES_INVALID: Metric = Metric::counter("snic.frames.invalid")
        .with_description("Frames discarded for a bad checksum or missing end marker")
        .with_labels(&["link", "reason"]);

    // ========================================================================
    // Requests
    // ========================================================================

    /// Requests issued.
    pub const REQUESTS: Metric = Metric::counter("snic.requests")
        .with_description("Requests sent to the module")
        .with_labels(&["link", "category"]);

    /// Requests that got no matching response in time.
    pub const REQUESTS_TIMED_OUT: Metric = Metric::counter("snic.requests.timed_out")
        .with_description("Requests that timed out waiting for a response")
        .with_labels(&["link", "category"]);

    /// Time from send to matched response.
    pub const REQUEST_LATENCY: Metric = Metric::histogram("snic.requests.latency_ms")
        .with_description("Time from sending a request to receiving its response")
        .with_unit(Unit::Milliseconds)
        .with_labels(&["link", "category"]);

    /// Responses that matched no pending request.
    pub const RESPONSES_UNMATCHED: Metric = Metric::counter("snic.responses.unmatched")
        .with_description("Responses dropped because no pending request matched them")
        .with_labels(&["link", "category"]);

    // ========================================================================
    // Indications
    // ========================================================================

    /// Indications delivered to an observer.
    pub const INDICATIONS_DISPATCHED: Metric = Metric::counter("snic.indications.dispatched")
        .with_description("Indications delivered to a registered observer")
        .with_labels(&["link", "category"]);

    /// Indications with no registered observer.
    pub const INDICATIONS_UNROUTED: Metric = Metric::counter("snic.indications.unrouted")
        .with_description("Indications dropped because no observer was registered")
        .with_labels(&["link", "category"]);

    /// All metrics, for [`describe_metrics`](super::describe_metrics).
    pub const ALL: &[&Metric] = &[
        &LINK_RX_BYTES,
        &LINK_TX_BYTES,
        &LINK_UP,
        &LINK_FAILURES,
        &FRAMES_TX,
        &FRAMES_RX,
        &FRAMES_INVALID,
        &REQUESTS,
        &REQUESTS_TIMED_OUT,
        &REQUEST_LATENCY,
        &RESPONSES_UNMATCHED,
        &INDICATIONS_DISPATCHED,
        &INDICATIONS_UNROUTED,
    ];
}

/// Labels identifying the link a metric was recorded on.
///
/// ```rust
/// use snic_metrics::MetricLabels;
///
/// let labels = MetricLabels::new("COM3");
/// let extended = labels.with(&[("category", "gen".to_string())]);
/// assert!(extended.iter().any(|(k, v)| *k == "link" && v == "COM3"));
/// assert_eq!(extended.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MetricLabels {
    /// Link name (serial port or bridge address).
    pub link: String,
}

impl MetricLabels {
    /// Creates labels for the named link.
    pub fn new(link: impl Into<String>) -> Self {
        Self { link: link.into() }
    }

    /// Converts the labels to the metrics crate label format.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("link", self.link.clone())]
    }

    /// Returns labels with additional key-value pairs.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }

    /// Shorthand for the common `category` label.
    pub fn with_category(&self, category: &'static str) -> Vec<(&'static str, String)> {
        self.with(&[("category", category.to_string())])
    }
}

/// Describes all driver metrics.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_labels() {
        let labels = MetricLabels::new("bridge:5000");
        assert_eq!(labels.to_labels(), vec![("link", "bridge:5000".to_string())]);

        let with_category = labels.with_category("wifi");
        assert_eq!(with_category.len(), 2);
        assert!(with_category.contains(&("category", "wifi".to_string())));
    }

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::FRAMES_RX.name, "snic.frames.rx");
        assert_eq!(metric_defs::FRAMES_RX.kind, MetricKind::Counter);
        assert_eq!(metric_defs::LINK_UP.kind, MetricKind::Gauge);
        assert_eq!(metric_defs::REQUEST_LATENCY.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::REQUEST_LATENCY.unit, Unit::Milliseconds);
        assert_eq!(metric_defs::LINK_UP.unit, Unit::Count);
        assert_eq!(metric_defs::FRAMES_INVALID.labels, &["link", "reason"]);
    }

    #[test]
    fn test_all_metrics_unique() {
        let mut names: Vec<_> = metric_defs::ALL.iter().map(|m| m.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), metric_defs::ALL.len());
        assert_eq!(metric_defs::ALL.len(), 13);
    }

    #[test]
    fn test_describe_without_recorder_is_noop() {
        describe_metrics();
    }
}
