//! Trailing-edge debouncing of rapid view changes.
//!
//! Panning and zooming produce a burst of region requests; only the last one
//! of a burst is worth building. A [`Debouncer`] forwards a value once no
//! newer value has arrived for the configured window.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Default quiet window before a request is forwarded.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(150);

const OUTPUT_CAPACITY: usize = 16;

/// Forwards the latest submitted value after a quiet period.
///
/// Dropping the debouncer flushes any pending value and ends the background
/// task once the receiver has taken it.
#[derive(Debug)]
pub struct Debouncer<T> {
    input: mpsc::UnboundedSender<T>,
    handle: JoinHandle<()>,
    window: Duration,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Spawns the debouncing task on the current runtime.
    ///
    /// Returns the debouncer and the receiver of settled values.
    pub fn spawn(window: Duration) -> (Self, mpsc::Receiver<T>) {
        let (input, input_rx) = mpsc::unbounded_channel();
        let (output, output_rx) = mpsc::channel(OUTPUT_CAPACITY);
        let handle = tokio::spawn(run(window, input_rx, output));
        (
            Self {
                input,
                handle,
                window,
            },
            output_rx,
        )
    }

    /// Submits a value, replacing any value still waiting for the window.
    ///
    /// Returns `false` if the background task has stopped.
    pub fn submit(&self, value: T) -> bool {
        self.input.send(value).is_ok()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Closes the input and waits for the pending value to be flushed.
    pub async fn close(self) {
        let Self { input, handle, .. } = self;
        drop(input);
        let _ = handle.await;
    }
}

async fn run<T>(window: Duration, mut input: mpsc::UnboundedReceiver<T>, output: mpsc::Sender<T>) {
    let mut pending: Option<T> = None;
    loop {
        match pending.take() {
            None => match input.recv().await {
                Some(value) => pending = Some(value),
                None => break,
            },
            Some(value) => {
                tokio::select! {
                    next = input.recv() => match next {
                        Some(newer) => {
                            trace!("Debounce window restarted");
                            pending = Some(newer);
                        }
                        None => {
                            let _ = output.send(value).await;
                            break;
                        }
                    },
                    _ = tokio::time::sleep(window) => {
                        if output.send(value).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
}
