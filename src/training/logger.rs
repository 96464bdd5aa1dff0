//! Per-split decision logging.
//!
//! The builder accepts an optional text sink at construction; when present,
//! every split decision is written out as one line. Write failures are
//! swallowed — logging must never abort a build.

use std::io::Write;

/// Log sink for split decisions. Verbose mode is "sink present".
pub struct SplitLogger {
    sink: Option<Box<dyn Write>>,
}

impl SplitLogger {
    /// Wrap an optional sink. `None` disables logging entirely.
    pub fn new(sink: Option<Box<dyn Write>>) -> Self {
        Self { sink }
    }

    /// Whether a sink is attached.
    #[inline]
    pub fn enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub(crate) fn start(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            let _ = writeln!(sink, "\nGradient boost tree building started:");
        }
    }

    pub(crate) fn split(&mut self, feature: u32, threshold: f32, criterion: f64) {
        if let Some(sink) = self.sink.as_mut() {
            let _ = writeln!(
                sink,
                "Split result: index = {feature} threshold = {threshold}, criterion = {criterion}"
            );
        }
    }

    pub(crate) fn const_node(&mut self, criterion: f64) {
        if let Some(sink) = self.sink.as_mut() {
            let _ = writeln!(
                sink,
                "Split result: created const node.\t\tcriterion = {criterion}"
            );
        }
    }

    pub(crate) fn finish(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            let _ = writeln!(sink, "\nGradient boost tree building finished:");
        }
    }
}

impl std::fmt::Debug for SplitLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitLogger")
            .field("enabled", &self.enabled())
            .finish()
    }
}
