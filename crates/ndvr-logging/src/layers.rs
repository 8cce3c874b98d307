//! Custom tracing layers for NDVR
//!
//! [`RouterContextLayer`] attaches the active [`RouterContextGuard`] context
//! to new spans. [`jsonl_layer`] builds the JSON-lines formatter used for
//! console and file output; it copies that context onto every event as
//! `router` and `instance_id`.

use std::fmt::Write as _;

use tracing::{Event, Subscriber, span};
use tracing_subscriber::fmt::format::{Format, FormatEvent, FormatFields, Json, JsonFields, Writer};
use tracing_subscriber::fmt::{self, FmtContext, MakeWriter};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::{LookupSpan, SpanRef};

use crate::context::{RouterContextData, RouterContextGuard};

/// Layer that stamps spans with the active router context
#[derive(Debug, Default, Clone, Copy)]
pub struct RouterContextLayer;

impl RouterContextLayer {
    /// Create a new router context layer
    pub fn new() -> Self {
        Self
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct RouterContextExtension {
    pub data: RouterContextData,
}

impl<S> Layer<S> for RouterContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        // Explicit context wins; otherwise inherit from the parent span
        let data = RouterContextGuard::current().or_else(|| {
            span.parent()
                .and_then(|parent| router_context(&parent))
        });
        if let Some(data) = data {
            span.extensions_mut().insert(RouterContextExtension { data });
        }
    }
}

/// Router context recorded on a span, if any
pub fn router_context<'a, R>(span: &SpanRef<'a, R>) -> Option<RouterContextData>
where
    R: LookupSpan<'a>,
{
    span.extensions()
        .get::<RouterContextExtension>()
        .map(|ext| ext.data.clone())
}

/// JSON event format that adds the router context of the innermost
/// stamped span
#[derive(Debug, Clone)]
pub struct RouterJson {
    inner: Format<Json>,
}

impl RouterJson {
    fn new(include_location: bool) -> Self {
        let inner = fmt::format()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .flatten_event(true)
            .with_file(include_location)
            .with_line_number(include_location)
            .with_thread_ids(false)
            .with_thread_names(false);
        Self { inner }
    }
}

impl<S, N> FormatEvent<S, N> for RouterJson
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let context = ctx
            .event_scope()
            .and_then(|mut scope| scope.find_map(|span| router_context(&span)));
        let Some(context) = context else {
            return self.inner.format_event(ctx, writer, event);
        };

        let mut line = String::new();
        self.inner.format_event(ctx, Writer::new(&mut line), event)?;
        let mut value: serde_json::Value =
            serde_json::from_str(&line).map_err(|_| std::fmt::Error)?;
        if let Some(fields) = value.as_object_mut() {
            fields.insert("router".to_string(), context.short_id.into());
            fields.insert("instance_id".to_string(), context.instance_id.to_string().into());
        }
        writeln!(writer, "{}", value)
    }
}

/// JSON-lines formatting layer writing to `writer`
pub fn jsonl_layer<S, W>(writer: W, include_location: bool) -> fmt::Layer<S, JsonFields, RouterJson, W>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fmt::layer()
        .fmt_fields(JsonFields::new())
        .event_format(RouterJson::new(include_location))
        .with_writer(writer)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use ndvr_core::RouterIdentity;
    use parking_lot::Mutex;
    use tracing::{info, info_span};
    use tracing_subscriber::Registry;
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn lines(&self) -> Vec<serde_json::Value> {
            let bytes = self.0.lock().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    /// Captures the context each new span was stamped with
    struct SpanContexts(Arc<Mutex<Vec<Option<String>>>>);

    impl<S> Layer<S> for SpanContexts
    where
        S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    {
        fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
            if let Some(span) = ctx.span(id) {
                self.0
                    .lock()
                    .push(router_context(&span).map(|data| data.short_id));
            }
        }
    }

    #[test]
    fn test_spans_get_router_context() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subscriber = Registry::default()
            .with(RouterContextLayer::new())
            .with(SpanContexts(Arc::clone(&seen)));

        tracing::subscriber::with_default(subscriber, || {
            let _outside = info_span!("outside");

            let router = RouterIdentity::from_ordinal(4);
            let _guard = RouterContextGuard::new(&router);
            let parent = info_span!("round");
            let _entered = parent.enter();
            drop(_guard);

            // Inherited from the parent span after the guard is gone
            let _child = info_span!("merge");
        });

        assert_eq!(
            *seen.lock(),
            vec![None, Some("Router4".to_string()), Some("Router4".to_string())]
        );
    }

    #[test]
    fn test_jsonl_layer_output() {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = Registry::default().with(jsonl_layer(move || writer.clone(), false));

        tracing::subscriber::with_default(subscriber, || {
            let span = info_span!("router", id = "/%C1.Router/Router0");
            let _entered = span.enter();
            info!(round = 1, merged = 2, "Round complete");
        });

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        let event = &lines[0];
        assert_eq!(event["message"], "Round complete");
        assert_eq!(event["round"], 1);
        assert_eq!(event["span"]["name"], "router");
        assert_eq!(event["span"]["id"], "/%C1.Router/Router0");
        assert!(event.get("filename").is_none());
        assert!(event.get("router").is_none());
    }

    #[test]
    fn test_jsonl_events_carry_router_context() {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = Registry::default()
            .with(RouterContextLayer::new())
            .with(jsonl_layer(move || writer.clone(), true));

        let router = RouterIdentity::from_ordinal(4);
        let instance_id = uuid::Uuid::new_v4();
        tracing::subscriber::with_default(subscriber, || {
            let span = {
                let _context = RouterContextGuard::with_instance_id(&router, instance_id);
                info_span!("router", id = %router)
            };
            let _entered = span.enter();
            let merge = info_span!("merge");
            let _merge = merge.enter();
            info!(changed = 3, "Merged routing object");
        });

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        let event = &lines[0];
        assert_eq!(event["router"], "Router4");
        assert_eq!(event["instance_id"], instance_id.to_string());
        assert_eq!(event["changed"], 3);
        assert_eq!(event["span"]["name"], "merge");
        assert!(event.get("filename").is_some());
    }
}
