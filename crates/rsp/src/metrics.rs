//! Session metrics and an in-memory recorder for the `--metrics` summary.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;

use metrics::{
    Counter, CounterFn, Gauge, GaugeFn, Histogram, HistogramFn, Key, KeyName, Label, Metadata,
    Recorder, SharedString, Unit, describe_counter, describe_gauge, describe_histogram,
};
use parking_lot::RwLock;

pub const DEBUG_ENTRIES: &str = "rsp_debug_entries_total";
pub const RETIRED_INSTRUCTIONS: &str = "rsp_target_instructions_retired";
pub const RESUME_INSTRUCTIONS: &str = "rsp_resume_instructions";

/// Register descriptions for every metric the server and stub record.
pub fn init() {
    rsp_stub::metrics::describe();

    describe_counter!(
        DEBUG_ENTRIES,
        Unit::Count,
        "Times the target stopped into the debug loop"
    );
    describe_gauge!(
        RETIRED_INSTRUCTIONS,
        Unit::Count,
        "Instructions retired by the target when the session ended"
    );
    describe_histogram!(
        RESUME_INSTRUCTIONS,
        Unit::Count,
        "Instructions retired per continue or step"
    );
}

#[derive(Default)]
struct Store {
    counters: RwLock<BTreeMap<String, u64>>,
    gauges: RwLock<BTreeMap<String, f64>>,
    histograms: RwLock<BTreeMap<String, Vec<f64>>>,
}

/// One registered metric, whichever kind.
struct Slot {
    key: String,
    store: Arc<Store>,
}

impl CounterFn for Slot {
    fn increment(&self, value: u64) {
        let mut counters = self.store.counters.write();
        *counters.entry(self.key.clone()).or_insert(0) += value;
    }

    fn absolute(&self, value: u64) {
        let mut counters = self.store.counters.write();
        counters.insert(self.key.clone(), value);
    }
}

impl GaugeFn for Slot {
    fn increment(&self, value: f64) {
        let mut gauges = self.store.gauges.write();
        *gauges.entry(self.key.clone()).or_insert(0.0) += value;
    }

    fn decrement(&self, value: f64) {
        let mut gauges = self.store.gauges.write();
        *gauges.entry(self.key.clone()).or_insert(0.0) -= value;
    }

    fn set(&self, value: f64) {
        let mut gauges = self.store.gauges.write();
        gauges.insert(self.key.clone(), value);
    }
}

impl HistogramFn for Slot {
    fn record(&self, value: f64) {
        let mut histograms = self.store.histograms.write();
        histograms.entry(self.key.clone()).or_default().push(value);
    }
}

/// Recorder that keeps every metric in memory until the process exits.
#[derive(Default)]
pub struct SummaryRecorder {
    store: Arc<Store>,
}

impl SummaryRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install as the global recorder.
    ///
    /// Returns `None` if another recorder is already installed.
    #[must_use]
    pub fn install(self) -> Option<SummaryHandle> {
        let store = Arc::clone(&self.store);
        metrics::set_global_recorder(self).ok()?;
        Some(SummaryHandle { store })
    }

    fn slot(&self, key: &Key) -> Arc<Slot> {
        Arc::new(Slot {
            key: key_name(key),
            store: Arc::clone(&self.store),
        })
    }
}

/// `name{k=v,...}`, or just `name` without labels.
fn key_name(key: &Key) -> String {
    let pair = |l: &Label| format!("{}={}", l.key(), l.value());
    let labels: Vec<String> = key.labels().map(pair).collect();
    if labels.is_empty() {
        key.name().to_string()
    } else {
        format!("{}{{{}}}", key.name(), labels.join(","))
    }
}

impl Recorder for SummaryRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(self.slot(key))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(self.slot(key))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(self.slot(key))
    }
}

/// Read access to what the installed [`SummaryRecorder`] collected.
pub struct SummaryHandle {
    store: Arc<Store>,
}

impl SummaryHandle {
    #[must_use]
    pub fn counter(&self, key: &str) -> Option<u64> {
        self.store.counters.read().get(key).copied()
    }

    #[must_use]
    pub fn gauge(&self, key: &str) -> Option<f64> {
        self.store.gauges.read().get(key).copied()
    }

    /// Render everything collected, sorted by key.
    #[must_use]
    pub fn summary(&self) -> String {
        let counters = self.store.counters.read().clone();
        let gauges = self.store.gauges.read().clone();
        let histograms = self.store.histograms.read().clone();

        if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
            return "No metrics collected.\n".to_string();
        }

        let mut out = String::from("\n## Metrics Summary\n\n");
        if !counters.is_empty() {
            out.push_str("### Counters\n");
            for (key, value) in &counters {
                out.push_str(&format!("  {key}: {value}\n"));
            }
            out.push('\n');
        }
        if !gauges.is_empty() {
            out.push_str("### Gauges\n");
            for (key, value) in &gauges {
                out.push_str(&format!("  {key}: {value:.2}\n"));
            }
            out.push('\n');
        }
        if !histograms.is_empty() {
            out.push_str("### Histograms\n");
            for (key, values) in &histograms {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                #[allow(clippy::cast_precision_loss)]
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                out.push_str(&format!(
                    "  {key}: n={} min={min:.0} mean={mean:.1} max={max:.0}\n",
                    values.len()
                ));
            }
            out.push('\n');
        }
        out
    }

    /// Write the summary to `out`.
    ///
    /// # Errors
    ///
    /// Writing to `out` fails.
    pub fn write_summary(&self, out: &mut impl Write) -> io::Result<()> {
        out.write_all(self.summary().as_bytes())?;
        out.flush()
    }

    /// Print the summary to stderr, since stdout may carry the debugger
    /// link. A closed stderr is ignored.
    pub fn print_summary(&self) {
        let _ = self.write_summary(&mut io::stderr().lock());
    }
}
