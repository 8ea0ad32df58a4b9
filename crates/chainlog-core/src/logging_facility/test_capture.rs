//! In-memory event capture for log assertions in tests
//!
//! Events are flattened into `field -> value` maps. Strings are stored
//! unquoted, everything else through its `Debug` form, so a `u64` of 42 is
//! `"42"` and a bool is `"true"`.

use chainlog_core_types::schema::{FIELD_EVENT, FIELD_OP};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

type Buffer = Arc<Mutex<Vec<CapturedEvent>>>;

#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn op(&self) -> Option<&str> {
        self.field(FIELD_OP)
    }

    pub fn event(&self) -> Option<&str> {
        self.field(FIELD_EVENT)
    }

    pub fn is(&self, op: &str, event: &str) -> bool {
        self.op() == Some(op) && self.event() == Some(event)
    }
}

#[derive(Default)]
struct Fields(BTreeMap<String, String>);

impl Visit for Fields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value));
    }
}

struct CaptureLayer(Buffer);

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = Fields::default();
        event.record(&mut fields);
        let captured = CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            fields: fields.0,
        };
        if let Ok(mut buffer) = self.0.lock() {
            buffer.push(captured);
        }
    }
}

/// Shared view of everything logged since capture was installed
#[derive(Clone)]
pub struct TestCapture(Buffer);

impl TestCapture {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.0.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events logged under operation `op`
    pub fn for_op(&self, op: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.op() == Some(op))
            .collect()
    }

    /// Warnings logged under operation `op`
    pub fn warnings(&self, op: &str) -> Vec<CapturedEvent> {
        self.for_op(op)
            .into_iter()
            .filter(|e| e.level == Level::WARN)
            .collect()
    }

    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CapturedEvent) -> bool,
    {
        self.events().iter().filter(|e| predicate(e)).count()
    }

    /// # Panics
    ///
    /// Panics when no event of `op` carries `event`.
    pub fn assert_event_exists(&self, op: &str, event: &str) {
        let events = self.events();
        assert!(
            events.iter().any(|e| e.is(op, event)),
            "no {}/{} event among {} captured",
            op,
            event,
            events.len()
        );
    }
}

static CAPTURE: OnceLock<TestCapture> = OnceLock::new();

/// Install the capture layer as the global subscriber on first use
///
/// Every test in one binary shares the buffer, so assertions should key on
/// a field value unique to the test (an op name, a temp path).
///
/// ```
/// use chainlog_core::log_op_start;
/// use chainlog_core::logging_facility::test_capture::init_test_capture;
///
/// let capture = init_test_capture();
/// log_op_start!("doc_seal_archive");
/// capture.assert_event_exists("doc_seal_archive", "start");
/// ```
pub fn init_test_capture() -> TestCapture {
    CAPTURE
        .get_or_init(|| {
            let buffer = Buffer::default();
            let _ = tracing_subscriber::registry()
                .with(CaptureLayer(buffer.clone()))
                .try_init();
            TestCapture(buffer)
        })
        .clone()
}
