use crate::{ClassifiedError, RetryOptions};

/// Lifecycle phase of an operation. Exactly one phase holds at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// No attempt has started since creation or the last reset.
    #[default]
    Idle,
    /// An attempt is in flight or an automatic retry is pending.
    Loading,
    Success,
    Error,
}

/// Live outcome of a retryable operation.
#[derive(Clone, Debug, PartialEq)]
pub struct OperationState<T> {
    pub phase: Phase,
    /// Present only while the latest attempt has succeeded.
    pub data: Option<T>,
    /// Present only in [`Phase::Error`].
    pub error: Option<ClassifiedError>,
    /// Retries made so far; 0 means the original attempt.
    pub retry_count: u32,
    /// Delay the next retry will wait, for countdown display.
    pub next_retry_delay_ms: u64,
}

impl<T> OperationState<T> {
    pub(crate) fn pristine(options: &RetryOptions) -> Self {
        Self {
            phase: Phase::Idle,
            data: None,
            error: None,
            retry_count: 0,
            next_retry_delay_ms: options.delay_for_retry(0),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn is_success(&self) -> bool {
        self.phase == Phase::Success
    }

    pub fn is_error(&self) -> bool {
        self.phase == Phase::Error
    }

    pub(crate) fn begin_attempt(&mut self, retry_count: u32, options: &RetryOptions) {
        self.phase = Phase::Loading;
        self.data = None;
        self.error = None;
        self.retry_count = retry_count;
        self.next_retry_delay_ms = options.delay_for_retry(retry_count);
    }

    pub(crate) fn succeed(&mut self, data: T) {
        self.phase = Phase::Success;
        self.data = Some(data);
        self.error = None;
    }

    pub(crate) fn fail(&mut self, error: ClassifiedError) {
        self.phase = Phase::Error;
        self.data = None;
        self.error = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::{OperationState, Phase};
    use crate::{ClassifiedError, ErrorKind, RetryOptions};

    #[test]
    fn pristine_state_has_no_flags_set() {
        let state = OperationState::<u8>::pristine(&RetryOptions::default());
        assert!(state.is_idle());
        assert!(!state.is_loading() && !state.is_success() && !state.is_error());
        assert_eq!(state.data, None);
        assert_eq!(state.error, None);
        assert_eq!(state.next_retry_delay_ms, 1_000);
    }

    #[test]
    fn transitions_keep_a_single_phase() {
        let opts = RetryOptions::default().with_exponential_backoff(10_000);
        let mut state = OperationState::pristine(&opts);

        state.begin_attempt(2, &opts);
        assert_eq!(state.phase, Phase::Loading);
        assert_eq!(state.next_retry_delay_ms, 4_000);

        state.fail(ClassifiedError::new(ErrorKind::Timeout));
        assert!(state.is_error() && !state.is_loading());

        state.begin_attempt(3, &opts);
        assert_eq!(state.error, None);

        state.succeed("ok");
        assert!(state.is_success());
        assert_eq!(state.data, Some("ok"));
        assert_eq!(state.retry_count, 3);
    }
}
