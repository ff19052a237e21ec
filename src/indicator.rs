//! The typing indicator shown while a reply is pending.
//!
//! [`coordinate`] runs an operation and an [`Indicator`] side by side on the current
//! task.  They share a single `ready` flag that only the operation's side writes:
//!
//! - the worker awaits the operation, sets the flag, and hands back the value;
//! - the indicator checks the flag before every frame, draws a frame and sleeps one
//!   interval while it is unset, and tears itself down once it is set.
//!
//! The coordinator returns when both sides are done, so the indicator is on screen for
//! the whole wait and outlives the result by at most one interval.  The value passes
//! through untouched, including `Err` values.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Time between indicator frames.
pub const TYPING_INTERVAL: Duration = Duration::from_millis(200);

///////////////////////////////////////////// Indicator /////////////////////////////////////////////

/// A visual progress element.
pub trait Indicator: Send {
    /// Draw the next frame.
    fn advance(&mut self);

    /// Remove the element from the screen.  Called exactly once.
    fn finish(&mut self);
}

impl<I: Indicator + ?Sized> Indicator for Box<I> {
    fn advance(&mut self) {
        (**self).advance();
    }

    fn finish(&mut self) {
        (**self).finish();
    }
}

/// A spinner on stderr that counts frames.
///
/// Nothing is drawn when stderr is not a terminal.  Dropping an unfinished
/// indicator clears it, so a panicking operation leaves nothing behind.
pub struct ProgressIndicator {
    bar: ProgressBar,
    finished: bool,
}

impl ProgressIndicator {
    /// Creates a spinner labelled with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} {pos}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.set_message(message.into());
        Self {
            bar,
            finished: false,
        }
    }

    /// Creates an indicator that never draws.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            finished: false,
        }
    }

    /// True once the indicator has been torn down.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Indicator for ProgressIndicator {
    fn advance(&mut self) {
        self.bar.inc(1);
        self.bar.tick();
    }

    fn finish(&mut self) {
        if !self.finished {
            self.bar.finish_and_clear();
            self.finished = true;
        }
    }
}

impl Drop for ProgressIndicator {
    fn drop(&mut self) {
        self.finish();
    }
}

//////////////////////////////////////////// coordinate ////////////////////////////////////////////

/// Await `operation` while `indicator` animates every `interval`.
///
/// Returns the operation's output unchanged, after the indicator has finished.
/// Both halves run on the calling task; nothing is spawned and the operation is
/// never cancelled.
pub async fn coordinate<I, F>(mut indicator: I, interval: Duration, operation: F) -> F::Output
where
    I: Indicator,
    F: Future,
{
    let ready = AtomicBool::new(false);

    let worker = async {
        let output = operation.await;
        ready.store(true, Ordering::Release);
        output
    };

    let animation = async {
        let mut frames = 0u64;
        while !ready.load(Ordering::Acquire) {
            indicator.advance();
            frames += 1;
            tokio::time::sleep(interval).await;
        }
        indicator.finish();
        tracing::trace!(frames, "typing indicator finished");
    };

    let (output, ()) = tokio::join!(worker, animation);
    output
}

//////////////////////////////////////////// Coordinator ///////////////////////////////////////////

type IndicatorFactory = Arc<dyn Fn() -> Box<dyn Indicator> + Send + Sync>;

/// Attaches a fresh indicator to any async operation.
#[derive(Clone)]
pub struct Coordinator {
    interval: Duration,
    factory: IndicatorFactory,
}

impl Coordinator {
    /// Creates a coordinator that builds one indicator per operation with `factory`.
    pub fn new<F>(interval: Duration, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Indicator> + Send + Sync + 'static,
    {
        Self {
            interval,
            factory: Arc::new(factory),
        }
    }

    /// A spinner reading "`label` typing..." at [`TYPING_INTERVAL`].
    pub fn typing(label: &str) -> Self {
        let message = format!("{label} typing...");
        Self::new(TYPING_INTERVAL, move || -> Box<dyn Indicator> {
            Box::new(ProgressIndicator::new(message.clone()))
        })
    }

    /// A coordinator whose indicators never draw.
    pub fn hidden() -> Self {
        Self::new(TYPING_INTERVAL, || -> Box<dyn Indicator> {
            Box::new(ProgressIndicator::hidden())
        })
    }

    /// Time between frames.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Await `operation` with an indicator running.
    pub async fn run<F: Future>(&self, operation: F) -> F::Output {
        coordinate((self.factory)(), self.interval, operation).await
    }

    /// Decorate a zero-argument async operation with the indicator.
    pub fn wrap<Op>(&self, operation: Op) -> WithIndicator<Op> {
        WithIndicator {
            coordinator: self.clone(),
            operation,
        }
    }
}

/// An async operation with an indicator attached; see [`Coordinator::wrap`].
pub struct WithIndicator<Op> {
    coordinator: Coordinator,
    operation: Op,
}

impl<Op, Fut> WithIndicator<Op>
where
    Op: FnOnce() -> Fut,
    Fut: Future,
{
    /// Run the operation once.
    pub async fn call(self) -> Fut::Output {
        let Self {
            coordinator,
            operation,
        } = self;
        coordinator.run(operation()).await
    }
}

impl<Op, Fut> WithIndicator<Op>
where
    Op: FnMut() -> Fut,
    Fut: Future,
{
    /// Run the operation, keeping the wrapper for later calls.
    pub async fn call_mut(&mut self) -> Fut::Output {
        let operation = (self.operation)();
        self.coordinator.run(operation).await
    }
}
