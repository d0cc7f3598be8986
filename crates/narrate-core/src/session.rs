//! Engine session ownership and lifecycle.
//!
//! Each backend owns exactly one live session to its underlying speech
//! runtime. Sessions are never shared: callers reach them through
//! `&mut` access on the owning backend, which serializes every operation
//! at the call boundary.
//!
//! Some OS speech drivers wedge when reused after a queued batch flush.
//! The lifecycle therefore tracks a `Flushed` state: a flushed session is
//! handed out again only after it has been torn down (best effort) and
//! recreated with its retained configuration.

use crate::error::{NarrateError, NarrateResult};

/// Lifecycle state of an engine session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The session accepts synthesis work.
    Ready,
    /// A batch flush completed; the session must be recreated before reuse.
    Flushed,
}

/// A live handle to a synthesis runtime.
pub trait EngineSession: Sized {
    /// Configuration needed to (re)create the session.
    type Config: Clone;

    /// Whether the underlying runtime must be recreated after a batch
    /// flush. Drivers without the reuse hang keep this `false` and pass
    /// through the lifecycle as a no-op.
    const RESTART_AFTER_FLUSH: bool;

    /// Create a live session. Failure means the runtime capability is
    /// missing and surfaces as [`NarrateError::EngineInit`].
    fn start(config: &Self::Config) -> NarrateResult<Self>;

    /// Tear the session down. Best effort: failures are swallowed.
    fn stop(&mut self);
}

/// Owns one [`EngineSession`] and drives its state machine.
pub struct EngineLifecycle<S: EngineSession> {
    session: S,
    config: S::Config,
    state: SessionState,
}

impl<S: EngineSession> EngineLifecycle<S> {
    /// Start a fresh session from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::EngineInit`] when the session cannot be
    /// constructed.
    pub fn start(config: S::Config) -> NarrateResult<Self> {
        let session = S::start(&config)?;
        Ok(Self {
            session,
            config,
            state: SessionState::Ready,
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Borrow the session for one synthesis operation, recreating it
    /// first if the previous batch flush left it unusable.
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::EngineInit`] when the replacement session
    /// cannot be constructed.
    pub fn acquire(&mut self) -> NarrateResult<&mut S> {
        if self.state == SessionState::Flushed {
            self.restart()?;
        }
        Ok(&mut self.session)
    }

    /// Record that a batch flush finished.
    ///
    /// Sessions of hang-prone drivers move to [`SessionState::Flushed`];
    /// others stay `Ready` (the uniform no-op transition).
    pub fn flush_completed(&mut self) {
        if S::RESTART_AFTER_FLUSH {
            self.state = SessionState::Flushed;
        }
    }

    /// Tear down the current session (best effort) and start a new one
    /// with the identical retained configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::EngineInit`] when construction of the
    /// replacement fails; the lifecycle then stays in its prior state so
    /// a later call can retry.
    pub fn restart(&mut self) -> NarrateResult<()> {
        self.session.stop();
        self.session = S::start(&self.config).map_err(|err| match err {
            NarrateError::EngineInit { message } => NarrateError::engine_init(format!(
                "failed to recreate engine session: {message}"
            )),
            other => other,
        })?;
        self.state = SessionState::Ready;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Debug)]
    struct ProbeConfig {
        starts: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
        fail_start: Arc<AtomicBool>,
    }

    impl ProbeConfig {
        fn new() -> Self {
            Self {
                starts: Arc::new(AtomicUsize::new(0)),
                stops: Arc::new(AtomicUsize::new(0)),
                fail_start: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[derive(Debug)]
    struct ProbeSession {
        config: ProbeConfig,
    }

    impl EngineSession for ProbeSession {
        type Config = ProbeConfig;
        const RESTART_AFTER_FLUSH: bool = true;

        fn start(config: &ProbeConfig) -> NarrateResult<Self> {
            if config.fail_start.load(Ordering::SeqCst) {
                return Err(NarrateError::engine_init("probe start failure"));
            }
            config.starts.fetch_add(1, Ordering::SeqCst);
            Ok(Self {
                config: config.clone(),
            })
        }

        fn stop(&mut self) {
            self.config.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct SteadySession;

    impl EngineSession for SteadySession {
        type Config = ();
        const RESTART_AFTER_FLUSH: bool = false;

        fn start(_config: &()) -> NarrateResult<Self> {
            Ok(Self)
        }

        fn stop(&mut self) {}
    }

    #[test]
    fn test_starts_ready() {
        let config = ProbeConfig::new();
        let lifecycle = EngineLifecycle::<ProbeSession>::start(config.clone()).unwrap();
        assert_eq!(lifecycle.state(), SessionState::Ready);
        assert_eq!(config.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_flush_moves_to_flushed() {
        let config = ProbeConfig::new();
        let mut lifecycle = EngineLifecycle::<ProbeSession>::start(config).unwrap();
        lifecycle.flush_completed();
        assert_eq!(lifecycle.state(), SessionState::Flushed);
    }

    #[test]
    fn test_acquire_after_flush_recreates_session() {
        let config = ProbeConfig::new();
        let mut lifecycle = EngineLifecycle::<ProbeSession>::start(config.clone()).unwrap();
        lifecycle.flush_completed();

        lifecycle.acquire().unwrap();
        assert_eq!(lifecycle.state(), SessionState::Ready);
        assert_eq!(config.starts.load(Ordering::SeqCst), 2);
        assert_eq!(config.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_acquire_in_ready_does_not_restart() {
        let config = ProbeConfig::new();
        let mut lifecycle = EngineLifecycle::<ProbeSession>::start(config.clone()).unwrap();
        lifecycle.acquire().unwrap();
        lifecycle.acquire().unwrap();
        assert_eq!(config.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_restart_is_fatal_and_state_sticks() {
        let config = ProbeConfig::new();
        let mut lifecycle = EngineLifecycle::<ProbeSession>::start(config.clone()).unwrap();
        lifecycle.flush_completed();
        config.fail_start.store(true, Ordering::SeqCst);

        let err = lifecycle.acquire().unwrap_err();
        assert!(matches!(err, NarrateError::EngineInit { .. }));
        assert_eq!(lifecycle.state(), SessionState::Flushed);

        // The teardown half already ran, and a later acquire retries.
        config.fail_start.store(false, Ordering::SeqCst);
        lifecycle.acquire().unwrap();
        assert_eq!(lifecycle.state(), SessionState::Ready);
    }

    #[test]
    fn test_no_op_transition_for_steady_sessions() {
        let mut lifecycle = EngineLifecycle::<SteadySession>::start(()).unwrap();
        lifecycle.flush_completed();
        assert_eq!(lifecycle.state(), SessionState::Ready);
    }
}
