//! Core station abstraction and runner for the threaded pipeline.

use crate::pipeline::error::{ErrorReporter, StationError};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A processing station in the pipeline.
///
/// Each station receives input, processes it, and produces output.
/// Stations run in their own threads and are connected by channels.
pub trait Station: Send + 'static {
    /// The input type this station receives.
    type Input: Send + 'static;
    /// The output type this station produces.
    type Output: Send + 'static;

    /// Processes a single input item.
    ///
    /// Returns:
    /// - `Ok(Some(output))` - Successfully processed and produced output
    /// - `Ok(None)` - Successfully processed but no output (e.g., still buffering)
    /// - `Err(StationError)` - Processing failed
    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StationError>;

    /// Returns the name of this station for logging and error reporting.
    fn name(&self) -> &'static str;

    /// Called when the station is shutting down.
    ///
    /// Override this to perform cleanup operations.
    fn shutdown(&mut self) {}
}

/// How a runner hands output to the next station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Wait for room in the output channel.
    #[default]
    Blocking,
    /// Never wait: when the output channel is full the item is dropped and
    /// reported as a recoverable error.
    NonBlocking,
}

/// Runs a station in a dedicated thread.
pub struct StationRunner<S: Station> {
    /// Handle to the spawned thread.
    handle: Option<JoinHandle<()>>,
    /// Name of the station (cached for error reporting).
    station_name: &'static str,
    /// Phantom data to mark the station type.
    _phantom: PhantomData<S>,
}

impl<S: Station> StationRunner<S> {
    /// Spawns a station that blocks on a full output channel.
    pub fn spawn(
        station: S,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self::spawn_with_delivery(
            station,
            input_rx,
            output_tx,
            error_reporter,
            Delivery::Blocking,
        )
    }

    /// Spawns a new station in a dedicated thread.
    ///
    /// # Arguments
    /// * `station` - The station implementation to run
    /// * `input_rx` - Channel to receive inputs from
    /// * `output_tx` - Channel to send outputs to
    /// * `error_reporter` - Reporter for handling errors
    /// * `delivery` - Whether to wait on a full output channel
    pub fn spawn_with_delivery(
        mut station: S,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
        delivery: Delivery,
    ) -> Self {
        let station_name = station.name();

        let handle = thread::Builder::new()
            .name(format!("station-{}", station_name))
            .spawn(move || {
                Self::run_station(&mut station, input_rx, output_tx, error_reporter, delivery);
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(station = station_name, "failed to spawn station thread: {}", e);
                None
            }
        };

        Self {
            handle,
            station_name,
            _phantom: PhantomData,
        }
    }

    /// Main processing loop for the station.
    fn run_station(
        station: &mut S,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
        delivery: Delivery,
    ) {
        let station_name = station.name();

        while let Ok(input) = input_rx.recv() {
            match station.process(input) {
                Ok(Some(output)) => {
                    let delivered = match delivery {
                        Delivery::Blocking => output_tx.send(output).is_ok(),
                        Delivery::NonBlocking => match output_tx.try_send(output) {
                            Ok(()) => true,
                            Err(TrySendError::Full(_)) => {
                                error_reporter.report(
                                    station_name,
                                    &StationError::Recoverable(
                                        "downstream full, output dropped".to_string(),
                                    ),
                                );
                                true
                            }
                            Err(TrySendError::Disconnected(_)) => false,
                        },
                    };
                    if !delivered {
                        // Output channel closed, shutdown
                        break;
                    }
                }
                Ok(None) => {}
                Err(StationError::Recoverable(msg)) => {
                    // Report but continue processing
                    error_reporter.report(station_name, &StationError::Recoverable(msg));
                }
                Err(StationError::Fatal(msg)) => {
                    error_reporter.report(station_name, &StationError::Fatal(msg));
                    break;
                }
            }
        }

        station.shutdown();
    }

    /// Waits for the station thread to complete.
    pub fn join(mut self) -> Result<(), String> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| format!("Station '{}' thread panicked", self.station_name))
        } else {
            Ok(())
        }
    }

    /// Returns the name of the station.
    pub fn name(&self) -> &'static str {
        self.station_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    // Mock station that doubles integers
    struct DoublerStation {
        shutdown_called: Arc<AtomicBool>,
    }

    impl Station for DoublerStation {
        type Input = i32;
        type Output = i32;

        fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StationError> {
            Ok(Some(input * 2))
        }

        fn name(&self) -> &'static str {
            "Doubler"
        }

        fn shutdown(&mut self) {
            self.shutdown_called.store(true, Ordering::SeqCst);
        }
    }

    // Mock station that fails on certain inputs
    struct FailingStation {
        fail_on: i32,
        fatal: bool,
    }

    impl Station for FailingStation {
        type Input = i32;
        type Output = i32;

        fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StationError> {
            if input == self.fail_on {
                let msg = format!("Failed on {}", input);
                if self.fatal {
                    Err(StationError::Fatal(msg))
                } else {
                    Err(StationError::Recoverable(msg))
                }
            } else {
                Ok(Some(input))
            }
        }

        fn name(&self) -> &'static str {
            "Failing"
        }
    }

    // Mock error reporter that collects errors
    #[derive(Default)]
    struct MockReporter {
        errors: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl ErrorReporter for MockReporter {
        fn report(&self, station: &str, error: &StationError) {
            let mut errors = self.errors.lock().unwrap();
            errors.push((station.to_string(), error.to_string()));
        }
    }

    #[test]
    fn test_station_runner_basic_processing() {
        let (input_tx, input_rx) = bounded(10);
        let (output_tx, output_rx) = bounded(10);
        let shutdown_flag = Arc::new(AtomicBool::new(false));

        let station = DoublerStation {
            shutdown_called: shutdown_flag.clone(),
        };
        let runner = StationRunner::spawn(
            station,
            input_rx,
            output_tx,
            Arc::new(MockReporter::default()),
        );
        assert_eq!(runner.name(), "Doubler");

        input_tx.send(1).unwrap();
        input_tx.send(2).unwrap();
        input_tx.send(3).unwrap();
        drop(input_tx);

        let outputs: Vec<i32> = output_rx.iter().collect();
        assert_eq!(outputs, vec![2, 4, 6]);

        runner.join().unwrap();
        assert!(shutdown_flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_station_runner_recoverable_error_skips_item() {
        let (input_tx, input_rx) = bounded(10);
        let (output_tx, output_rx) = bounded(10);
        let reporter = Arc::new(MockReporter::default());
        let errors = reporter.errors.clone();

        let station = FailingStation {
            fail_on: 2,
            fatal: false,
        };
        let runner = StationRunner::spawn(station, input_rx, output_tx, reporter);

        for i in 1..=3 {
            input_tx.send(i).unwrap();
        }
        drop(input_tx);

        let outputs: Vec<i32> = output_rx.iter().collect();
        assert_eq!(outputs, vec![1, 3]);

        let reported = errors.lock().unwrap();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].0, "Failing");
        assert!(reported[0].1.contains("Failed on 2"));
        drop(reported);

        runner.join().unwrap();
    }

    #[test]
    fn test_station_runner_fatal_error_stops_station() {
        let (input_tx, input_rx) = bounded(10);
        let (output_tx, output_rx) = bounded(10);

        let station = FailingStation {
            fail_on: 2,
            fatal: true,
        };
        let runner = StationRunner::spawn(
            station,
            input_rx,
            output_tx,
            Arc::new(MockReporter::default()),
        );

        for i in 1..=3 {
            input_tx.send(i).unwrap();
        }

        runner.join().unwrap();
        let outputs: Vec<i32> = output_rx.iter().collect();
        assert_eq!(outputs, vec![1]);
    }

    #[test]
    fn test_non_blocking_delivery_drops_when_full() {
        let (input_tx, input_rx) = bounded(10);
        let (output_tx, output_rx) = bounded(2);
        let reporter = Arc::new(MockReporter::default());
        let errors = reporter.errors.clone();
        let shutdown_flag = Arc::new(AtomicBool::new(false));

        let station = DoublerStation {
            shutdown_called: shutdown_flag.clone(),
        };
        let runner = StationRunner::spawn_with_delivery(
            station,
            input_rx,
            output_tx,
            reporter,
            Delivery::NonBlocking,
        );

        // Nobody reads output while inputs are processed.
        for i in 1..=5 {
            input_tx.send(i).unwrap();
        }
        drop(input_tx);
        runner.join().unwrap();

        let outputs: Vec<i32> = output_rx.try_iter().collect();
        assert_eq!(outputs, vec![2, 4]);
        assert_eq!(errors.lock().unwrap().len(), 3);
        assert!(shutdown_flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_station_runner_output_channel_closed() {
        let (input_tx, input_rx) = bounded(10);
        let (output_tx, output_rx) = bounded(10);
        let shutdown_flag = Arc::new(AtomicBool::new(false));

        let station = DoublerStation {
            shutdown_called: shutdown_flag.clone(),
        };
        let runner = StationRunner::spawn(
            station,
            input_rx,
            output_tx,
            Arc::new(MockReporter::default()),
        );

        drop(output_rx);
        input_tx.send(1).unwrap();

        runner.join().unwrap();
        assert!(shutdown_flag.load(Ordering::SeqCst));
    }
}
