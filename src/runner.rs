//! Retryable async operation runner.
//!
//! A [`RetryRunner`] executes a caller-supplied operation, publishes its
//! [`OperationState`] through a `tokio::sync::watch` channel and offers
//! [`Handle::retry`] / [`Handle::reset`]. Every state write is guarded by a
//! generation token, so a slow attempt that was superseded by a reset, a
//! manual retry or a new submission can never overwrite newer state.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{json, Value as JsonValue};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::sleep;

use crate::{
    classify::classify_raw, ClassifiedError, ErrorKind, OperationState, RawError, RetryOptions,
};

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, RawError>> + Send>>;
type Operation<T> = Arc<dyn Fn() -> BoxFuture<T> + Send + Sync>;
type SuccessHook<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&ClassifiedError) + Send + Sync>;

/// Builder for a retryable operation.
///
/// ```no_run
/// use zali_client::{ErrorKind, RetryOptions, RetryRunner};
///
/// # async fn demo() {
/// let handle = RetryRunner::new(|| async { Err::<u64, _>("request timed out") })
///     .with_options(RetryOptions::default().with_auto_retry(true))
///     .with_context("operation", "connectWallet")
///     .on_error(|err| eprintln!("{}", err.message))
///     .start();
///
/// let state = handle.settled().await;
/// assert_eq!(state.error.map(|err| err.kind), Some(ErrorKind::Timeout));
/// # }
/// ```
pub struct RetryRunner<T> {
    operation: Operation<T>,
    options: RetryOptions,
    on_success: Option<SuccessHook<T>>,
    on_error: Option<ErrorHook>,
    context: Vec<(String, JsonValue)>,
}

impl<T> fmt::Debug for RetryRunner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryRunner")
            .field("options", &self.options)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl<T> RetryRunner<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wraps an operation that may be invoked once per attempt.
    pub fn new<F, Fut, E>(operation: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<RawError> + 'static,
    {
        let operation: Operation<T> = Arc::new(move || -> BoxFuture<T> {
            let attempt = operation();
            Box::pin(async move { attempt.await.map_err(Into::into) })
        });
        Self {
            operation,
            options: RetryOptions::default(),
            on_success: None,
            on_error: None,
            context: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: RetryOptions) -> Self {
        self.options = options;
        self
    }

    /// Adds a diagnostic tag to every error this runner classifies.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    /// Called once per successful attempt, after state is updated.
    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(hook));
        self
    }

    /// Called once per terminal failure, after state is updated.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ClassifiedError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Starts the initial attempt. Must be called inside a tokio runtime.
    pub fn start(self) -> Handle<T> {
        let handle = self.build();
        handle.submit();
        handle
    }

    /// Builds an idle handle without starting an attempt.
    pub fn build(self) -> Handle<T> {
        let (state, _) = watch::channel(OperationState::pristine(&self.options));
        Handle {
            shared: Arc::new(Shared {
                operation: self.operation,
                options: self.options,
                on_success: self.on_success,
                on_error: self.on_error,
                context: self.context,
                control: Mutex::new(Control::default()),
                state,
            }),
        }
    }
}

/// Runs `operation` with `options` and returns its live handle.
pub fn run<T, F, Fut, E>(operation: F, options: RetryOptions) -> Handle<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<RawError> + 'static,
{
    RetryRunner::new(operation).with_options(options).start()
}

/// Read access to a running operation plus retry/reset controls.
pub struct Handle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("options", &self.shared.options)
            .field("state", &*self.shared.state.borrow())
            .finish()
    }
}

impl<T> Handle<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Snapshot of the current state.
    pub fn state(&self) -> OperationState<T> {
        self.shared.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<OperationState<T>> {
        self.shared.state.subscribe()
    }

    pub fn options(&self) -> &RetryOptions {
        &self.shared.options
    }

    /// Waits until no attempt is in flight or pending and returns that state.
    pub async fn settled(&self) -> OperationState<T> {
        let mut receiver = self.subscribe();
        let settled = match receiver.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }

    /// Starts another attempt of the current submission.
    ///
    /// Returns `false` without touching state when the retry budget is spent.
    /// On an idle handle this starts the original attempt instead.
    pub fn retry(&self) -> bool {
        let max_retries = self.shared.options.max_retries;
        self.shared.launch(|state| {
            if state.is_idle() {
                Some(0)
            } else if state.retry_count >= max_retries {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    retry_count = state.retry_count,
                    max_retries,
                    "retry budget exhausted; ignoring retry"
                );
                None
            } else {
                Some(state.retry_count + 1)
            }
        })
    }

    /// Starts a new logical submission from retry count zero.
    pub fn submit(&self) {
        self.shared.launch(|_| Some(0));
    }

    /// Returns to the pristine state and cancels any pending retry.
    ///
    /// An attempt still in flight keeps running, but its result is discarded.
    pub fn reset(&self) {
        let mut control = self.shared.lock_control();
        control.generation += 1;
        if let Some(driver) = control.driver.take() {
            driver.abort();
        }
        self.shared
            .state
            .send_replace(OperationState::pristine(&self.shared.options));

        #[cfg(feature = "tracing")]
        tracing::debug!(generation = control.generation, "operation reset");
    }
}

#[derive(Default)]
struct Control {
    generation: u64,
    driver: Option<JoinHandle<()>>,
}

struct Shared<T> {
    operation: Operation<T>,
    options: RetryOptions,
    on_success: Option<SuccessHook<T>>,
    on_error: Option<ErrorHook>,
    context: Vec<(String, JsonValue)>,
    control: Mutex<Control>,
    state: watch::Sender<OperationState<T>>,
}

impl<T> Shared<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn lock_control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Supersedes any running attempt chain and starts a new one at the
    /// retry count chosen by `next`, or does nothing when `next` declines.
    fn launch<F>(self: &Arc<Self>, next: F) -> bool
    where
        F: FnOnce(&OperationState<T>) -> Option<u32>,
    {
        let mut control = self.lock_control();
        let Some(retry_count) = next(&self.state.borrow()) else {
            return false;
        };

        control.generation += 1;
        let generation = control.generation;
        if let Some(driver) = control.driver.take() {
            driver.abort();
        }
        self.state
            .send_modify(|state| state.begin_attempt(retry_count, &self.options));

        let shared = Arc::clone(self);
        control.driver = Some(tokio::spawn(async move {
            shared.drive(generation, retry_count).await;
        }));
        true
    }

    /// Runs attempts for one generation until it settles or is superseded.
    async fn drive(self: Arc<Self>, generation: u64, mut retry_count: u32) {
        loop {
            #[cfg(feature = "tracing")]
            tracing::debug!(generation, retry_count, "starting attempt");

            let raw = match self.attempt().await {
                Ok(data) => {
                    self.settle_success(generation, data);
                    return;
                }
                Err(raw) => raw,
            };

            let error = self.classify(&raw);
            let auto_retry = self.options.auto_retry
                && retry_count < self.options.max_retries
                && error.is_recoverable();

            #[cfg(feature = "tracing")]
            tracing::debug!(
                generation,
                retry_count,
                kind = %error.kind,
                auto_retry,
                "attempt failed"
            );

            if !auto_retry {
                self.settle_error(generation, error);
                return;
            }

            let delay_ms = self.options.delay_for_retry(retry_count);
            if !self.apply(generation, |state| state.next_retry_delay_ms = delay_ms) {
                return;
            }

            #[cfg(feature = "tracing")]
            tracing::debug!("retrying operation after {} ms", delay_ms);

            sleep(Duration::from_millis(delay_ms)).await;
            retry_count += 1;
            if !self.apply(generation, |state| {
                state.begin_attempt(retry_count, &self.options)
            }) {
                return;
            }
        }
    }

    /// Runs the operation on its own task so a panic surfaces as a failure.
    async fn attempt(&self) -> Result<T, RawError> {
        let operation = Arc::clone(&self.operation);
        match tokio::spawn(async move { operation().await }).await {
            Ok(outcome) => outcome,
            Err(err) => Err(join_failure(err)),
        }
    }

    fn classify(&self, raw: &RawError) -> ClassifiedError {
        self.context
            .iter()
            .fold(classify_raw(raw), |err, (key, value)| {
                err.with_context(key.clone(), value.clone())
            })
    }

    /// Applies `update` only if `generation` is still current.
    fn apply<F>(&self, generation: u64, update: F) -> bool
    where
        F: FnOnce(&mut OperationState<T>),
    {
        let control = self.lock_control();
        if control.generation != generation {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                generation,
                current = control.generation,
                "discarding stale attempt result"
            );
            return false;
        }
        self.state.send_modify(update);
        true
    }

    /// Hooks run outside the control lock so they may call back into the
    /// handle. A reset landing between this check and the hook call can
    /// still see one observer call for the attempt it superseded.
    fn is_current(&self, generation: u64) -> bool {
        self.lock_control().generation == generation
    }

    fn settle_success(&self, generation: u64, data: T) {
        let observed = self.on_success.as_ref().map(|_| data.clone());
        if !self.apply(generation, |state| state.succeed(data)) {
            return;
        }
        if let (Some(hook), Some(data)) = (&self.on_success, observed) {
            if self.is_current(generation) {
                hook(&data);
            }
        }
    }

    fn settle_error(&self, generation: u64, error: ClassifiedError) {
        #[cfg(feature = "tracing")]
        let kind = error.kind;
        let observed = self.on_error.as_ref().map(|_| error.clone());
        if !self.apply(generation, |state| state.fail(error)) {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(generation, kind = %kind, "operation failed");

        if let (Some(hook), Some(error)) = (&self.on_error, observed) {
            if self.is_current(generation) {
                hook(&error);
            }
        }
    }
}

fn join_failure(err: JoinError) -> RawError {
    let detail = if err.is_panic() {
        let payload = err.into_panic();
        payload
            .downcast_ref::<&str>()
            .map(|text| (*text).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "operation panicked".to_owned())
    } else {
        "operation task was cancelled".to_owned()
    };
    RawError::Classified(
        ClassifiedError::new(ErrorKind::UnknownError).with_cause(json!({ "panic": detail })),
    )
}
