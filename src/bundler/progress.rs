//! Progress reporting for export runs.
//!
//! The orchestrator owns the 0–100 scale and hands each target a sub-range;
//! the assembler advances a [`StepProgress`] inside that sub-range one step at
//! a time.

/// Receives progress updates.
pub trait ProgressSink: Send + Sync {
    /// Overall progress changed. `percent` is in `0..=100`.
    fn step(&self, percent: u32, message: &str);

    /// One line of output from a long-running external command.
    fn command_output(&self, _line: &str) {}
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn step(&self, _percent: u32, _message: &str) {}
}

/// Writes progress to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn step(&self, percent: u32, message: &str) {
        log::info!("[{:>3}%] {}", percent, message);
    }

    fn command_output(&self, line: &str) {
        log::debug!("{}", line);
    }
}

/// Step counter scaled into a sub-range of the overall progress.
pub struct StepProgress<'a> {
    sink: &'a dyn ProgressSink,
    from: f64,
    span: f64,
    current: u32,
    total: u32,
}

impl<'a> StepProgress<'a> {
    /// Counter of `total` steps covering `from..from + span` percent.
    pub fn new(sink: &'a dyn ProgressSink, from: f64, span: f64, total: u32) -> Self {
        Self {
            sink,
            from,
            span,
            current: 0,
            total: total.max(1),
        }
    }

    /// Advances one step and reports `message`.
    ///
    /// Never goes past the step budget.
    pub fn step(&mut self, message: &str) {
        debug_assert!(self.current < self.total, "step budget exceeded: {message}");
        self.current = (self.current + 1).min(self.total);
        self.sink.step(self.percent(), message);
    }

    /// Current overall percentage.
    pub fn percent(&self) -> u32 {
        let fraction = f64::from(self.current) / f64::from(self.total);
        (self.from + self.span * fraction).clamp(0.0, 100.0) as u32
    }

    /// Steps taken so far.
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Step budget.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Forwards streamed command output to the sink.
    pub fn command_output(&self, line: &str) {
        self.sink.command_output(line);
    }
}
