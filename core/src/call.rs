//! The per-call controller: resolution state, handler registration and
//! dispatch.
//!
//! # Design
//! A `Call` is a cheap handle around shared state holding the phase and the
//! three handler slots. Registration checks the phase and stores the handler
//! in one critical section, so a registration racing the transport's
//! completion fires exactly once: either from the completion (registered
//! first) or immediately (registered after). Handlers always run outside the
//! lock, which lets a handler register more handlers on the same call.
//!
//! The `Completer` is the write side of the outcome cell. It is consumed by
//! `load`/`error`, and dropping it unused resolves the call as abandoned.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::error::TransportError;
use crate::http::HttpResponse;
use crate::outcome::{Outcome, Resolution};
use crate::types::{Body, DataType};

/// Handler invoked on any resolution.
pub type AlwaysFn = Arc<dyn Fn(&Outcome) + Send + Sync>;
/// Handler invoked on success with the (possibly parsed) body.
pub type DoneFn = Arc<dyn Fn(&Body, &Outcome) + Send + Sync>;
/// Handler invoked on error.
pub type FailFn = Arc<dyn Fn(&Outcome) + Send + Sync>;

/// Lifecycle phase of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Created, not yet dispatched.
    Idle,
    /// Sent, waiting for the transport.
    Pending,
    Succeeded,
    Errored,
}

/// A set of optional handlers, registered together.
///
/// An absent slot is skipped on registration, so it never replaces a handler
/// that is already present.
#[derive(Clone, Default)]
pub struct Callbacks {
    pub always: Option<AlwaysFn>,
    pub done: Option<DoneFn>,
    pub fail: Option<FailFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always<F>(mut self, f: F) -> Self
    where
        F: Fn(&Outcome) + Send + Sync + 'static,
    {
        self.always = Some(Arc::new(f));
        self
    }

    pub fn done<F>(mut self, f: F) -> Self
    where
        F: Fn(&Body, &Outcome) + Send + Sync + 'static,
    {
        self.done = Some(Arc::new(f));
        self
    }

    pub fn fail<F>(mut self, f: F) -> Self
    where
        F: Fn(&Outcome) + Send + Sync + 'static,
    {
        self.fail = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("always", &self.always.is_some())
            .field("done", &self.done.is_some())
            .field("fail", &self.fail.is_some())
            .finish()
    }
}

enum Phase {
    Idle,
    Pending,
    Resolved(Arc<Outcome>, Resolution),
}

struct Inner {
    phase: Phase,
    handlers: Callbacks,
}

impl Inner {
    fn resolved(&self) -> Option<(&Arc<Outcome>, Resolution)> {
        match &self.phase {
            Phase::Resolved(outcome, resolution) => Some((outcome, *resolution)),
            _ => None,
        }
    }
}

struct Shared {
    id: Uuid,
    inner: Mutex<Inner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Handlers never run under the lock, so poisoning only means another
        // registration panicked mid-store; the state itself is still valid.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the outcome once and fire the handlers present at that moment.
    fn resolve(&self, outcome: Outcome, resolution: Resolution) {
        let outcome = Arc::new(outcome);
        let (always, done, fail) = {
            let mut inner = self.lock();
            if inner.resolved().is_some() {
                log::debug!("call {}: ignoring second resolution", self.id);
                return;
            }
            inner.phase = Phase::Resolved(Arc::clone(&outcome), resolution);
            let handlers = &inner.handlers;
            match resolution {
                Resolution::Succeeded => (handlers.always.clone(), handlers.done.clone(), None),
                Resolution::Errored => (handlers.always.clone(), None, handlers.fail.clone()),
            }
        };

        log::debug!(
            "call {}: {:?} with status {} {}",
            self.id,
            resolution,
            outcome.status,
            outcome.status_text
        );

        if let Some(always) = always {
            always(&outcome);
        }
        if let Some(done) = done {
            done(&outcome.body, &outcome);
        }
        if let Some(fail) = fail {
            fail(&outcome);
        }
    }
}

/// Handle to one request. Clones refer to the same call.
#[derive(Clone)]
pub struct Call {
    shared: Arc<Shared>,
}

impl Call {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                inner: Mutex::new(Inner {
                    phase: Phase::Idle,
                    handlers: Callbacks::default(),
                }),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn state(&self) -> CallState {
        match self.shared.lock().phase {
            Phase::Idle => CallState::Idle,
            Phase::Pending => CallState::Pending,
            Phase::Resolved(_, Resolution::Succeeded) => CallState::Succeeded,
            Phase::Resolved(_, Resolution::Errored) => CallState::Errored,
        }
    }

    /// The outcome, once the call has resolved.
    pub fn outcome(&self) -> Option<Arc<Outcome>> {
        self.shared
            .lock()
            .resolved()
            .map(|(outcome, _)| Arc::clone(outcome))
    }

    /// Run `f` on any resolution. Fires immediately if already resolved.
    pub fn always<F>(&self, f: F) -> &Self
    where
        F: Fn(&Outcome) + Send + Sync + 'static,
    {
        self.register_always(Some(Arc::new(f)))
    }

    /// Run `f` with the body on success. Fires immediately if already
    /// succeeded; never fires for an errored call.
    pub fn done<F>(&self, f: F) -> &Self
    where
        F: Fn(&Body, &Outcome) + Send + Sync + 'static,
    {
        self.register_done(Some(Arc::new(f)))
    }

    /// Run `f` on error. Fires immediately if already errored; never fires
    /// for a successful call.
    pub fn fail<F>(&self, f: F) -> &Self
    where
        F: Fn(&Outcome) + Send + Sync + 'static,
    {
        self.register_fail(Some(Arc::new(f)))
    }

    /// `done(on_done)` followed by `fail(on_fail)`.
    pub fn then<D, E>(&self, on_done: D, on_fail: E) -> &Self
    where
        D: Fn(&Body, &Outcome) + Send + Sync + 'static,
        E: Fn(&Outcome) + Send + Sync + 'static,
    {
        self.done(on_done).fail(on_fail)
    }

    /// Register every present handler in `callbacks`, in always, done, fail
    /// order.
    pub fn register(&self, callbacks: Callbacks) -> &Self {
        self.register_always(callbacks.always)
            .register_done(callbacks.done)
            .register_fail(callbacks.fail)
    }

    pub fn register_always(&self, f: Option<AlwaysFn>) -> &Self {
        let Some(f) = f else { return self };
        let ready = {
            let mut inner = self.shared.lock();
            inner.handlers.always = Some(Arc::clone(&f));
            inner.resolved().map(|(outcome, _)| Arc::clone(outcome))
        };
        log::trace!("call {}: always registered", self.shared.id);
        if let Some(outcome) = ready {
            f(&outcome);
        }
        self
    }

    pub fn register_done(&self, f: Option<DoneFn>) -> &Self {
        let Some(f) = f else { return self };
        let ready = {
            let mut inner = self.shared.lock();
            inner.handlers.done = Some(Arc::clone(&f));
            match inner.resolved() {
                Some((outcome, Resolution::Succeeded)) => Some(Arc::clone(outcome)),
                _ => None,
            }
        };
        log::trace!("call {}: done registered", self.shared.id);
        if let Some(outcome) = ready {
            f(&outcome.body, &outcome);
        }
        self
    }

    pub fn register_fail(&self, f: Option<FailFn>) -> &Self {
        let Some(f) = f else { return self };
        let ready = {
            let mut inner = self.shared.lock();
            inner.handlers.fail = Some(Arc::clone(&f));
            match inner.resolved() {
                Some((outcome, Resolution::Errored)) => Some(Arc::clone(outcome)),
                _ => None,
            }
        };
        log::trace!("call {}: fail registered", self.shared.id);
        if let Some(outcome) = ready {
            f(&outcome);
        }
        self
    }

    pub(crate) fn mark_pending(&self) {
        let mut inner = self.shared.lock();
        if matches!(inner.phase, Phase::Idle) {
            inner.phase = Phase::Pending;
        }
    }

    pub(crate) fn resolve(&self, (outcome, resolution): (Outcome, Resolution)) {
        self.shared.resolve(outcome, resolution);
    }

    pub(crate) fn completer(&self, data_type: DataType) -> Completer {
        Completer {
            shared: Some(Arc::clone(&self.shared)),
            data_type,
        }
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

/// Completion notifier handed to a `Transport` with each request.
///
/// Exactly one of `load` or `error` should be called. Dropping the completer
/// without calling either resolves the call with
/// `TransportError::Abandoned`.
pub struct Completer {
    shared: Option<Arc<Shared>>,
    data_type: DataType,
}

impl Completer {
    /// The transport received a response, whatever its status.
    pub fn load(mut self, response: HttpResponse) {
        if let Some(shared) = self.shared.take() {
            let (outcome, resolution) = Outcome::from_response(response, self.data_type);
            shared.resolve(outcome, resolution);
        }
    }

    /// The transport could not obtain a response.
    pub fn error(mut self, error: TransportError) {
        if let Some(shared) = self.shared.take() {
            let (outcome, resolution) = Outcome::transport_error(error);
            shared.resolve(outcome, resolution);
        }
    }

    /// Id of the call this completer resolves.
    pub fn call_id(&self) -> Option<Uuid> {
        self.shared.as_ref().map(|shared| shared.id)
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            let (outcome, resolution) = Outcome::transport_error(TransportError::Abandoned);
            shared.resolve(outcome, resolution);
        }
    }
}

impl fmt::Debug for Completer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("call", &self.call_id())
            .field("data_type", &self.data_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn count(c: &Arc<AtomicUsize>) -> usize {
        c.load(Ordering::SeqCst)
    }

    fn pending_call() -> (Call, Completer) {
        let call = Call::new();
        call.mark_pending();
        let completer = call.completer(DataType::Raw);
        (call, completer)
    }

    #[test]
    fn new_call_is_idle() {
        let call = Call::new();
        assert_eq!(call.state(), CallState::Idle);
        assert!(call.outcome().is_none());
    }

    #[test]
    fn early_always_fires_once_on_completion() {
        let (call, completer) = pending_call();
        let hits = counter();
        let h = Arc::clone(&hits);
        call.always(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count(&hits), 0);

        completer.load(HttpResponse::new(200, "OK", "hi"));
        assert_eq!(count(&hits), 1);
        assert_eq!(call.state(), CallState::Succeeded);
    }

    #[test]
    fn late_always_fires_immediately_once() {
        let (call, completer) = pending_call();
        completer.load(HttpResponse::new(200, "OK", "hi"));

        let hits = counter();
        let h = Arc::clone(&hits);
        call.always(move |outcome| {
            assert_eq!(outcome.status, 200);
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count(&hits), 1);
    }

    #[test]
    fn done_receives_body_and_outcome() {
        let (call, completer) = pending_call();
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        call.done(move |body, outcome| {
            *s.lock().unwrap() = Some((body.clone(), outcome.status));
        });
        completer.load(HttpResponse::new(201, "Created", "made"));

        let seen = seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen, (Body::Text("made".to_string()), 201));
    }

    #[test]
    fn done_never_fires_for_errors() {
        let (call, completer) = pending_call();
        let hits = counter();
        let h = Arc::clone(&hits);
        call.done(move |_, _| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        completer.load(HttpResponse::new(500, "Internal Server Error", ""));

        let h = Arc::clone(&hits);
        call.done(move |_, _| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count(&hits), 0);
        assert_eq!(call.state(), CallState::Errored);
    }

    #[test]
    fn fail_never_fires_for_success() {
        let (call, completer) = pending_call();
        let hits = counter();
        let h = Arc::clone(&hits);
        call.fail(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        completer.load(HttpResponse::new(302, "Found", ""));

        let h = Arc::clone(&hits);
        call.fail(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count(&hits), 0);
    }

    #[test]
    fn late_fail_fires_for_transport_error() {
        let (call, completer) = pending_call();
        completer.error(TransportError::Connection("refused".to_string()));

        let statuses = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&statuses);
        call.fail(move |outcome| s.lock().unwrap().push(outcome.status));
        assert_eq!(*statuses.lock().unwrap(), vec![0]);
    }

    #[test]
    fn reregistering_done_replaces_previous_handler() {
        let (call, completer) = pending_call();
        let first = counter();
        let second = counter();
        let f = Arc::clone(&first);
        call.done(move |_, _| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        let s = Arc::clone(&second);
        call.done(move |_, _| {
            s.fetch_add(1, Ordering::SeqCst);
        });

        completer.load(HttpResponse::new(200, "OK", ""));
        assert_eq!(count(&first), 0);
        assert_eq!(count(&second), 1);
    }

    #[test]
    fn always_runs_before_done() {
        let (call, completer) = pending_call();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o = Arc::clone(&order);
        call.done(move |_, _| o.lock().unwrap().push("done"));
        let o = Arc::clone(&order);
        call.always(move |_| o.lock().unwrap().push("always"));

        completer.load(HttpResponse::new(200, "OK", ""));
        assert_eq!(*order.lock().unwrap(), vec!["always", "done"]);
    }

    #[test]
    fn then_registers_both_handlers() {
        let (call, completer) = pending_call();
        let done = counter();
        let fail = counter();
        let d = Arc::clone(&done);
        let f = Arc::clone(&fail);
        call.then(
            move |_, _| {
                d.fetch_add(1, Ordering::SeqCst);
            },
            move |_| {
                f.fetch_add(1, Ordering::SeqCst);
            },
        );
        completer.load(HttpResponse::new(404, "Not Found", ""));
        assert_eq!(count(&done), 0);
        assert_eq!(count(&fail), 1);
    }

    #[test]
    fn absent_callbacks_do_not_replace_present_ones() {
        let (call, completer) = pending_call();
        let hits = counter();
        let h = Arc::clone(&hits);
        call.always(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        call.register(Callbacks::new());
        call.register_always(None);

        completer.load(HttpResponse::new(200, "OK", ""));
        assert_eq!(count(&hits), 1);
    }

    #[test]
    fn handler_may_register_on_same_call() {
        let (call, completer) = pending_call();
        let hits = counter();
        let inner_call = call.clone();
        let h = Arc::clone(&hits);
        call.always(move |_| {
            let h = Arc::clone(&h);
            inner_call.done(move |_, _| {
                h.fetch_add(1, Ordering::SeqCst);
            });
        });

        completer.load(HttpResponse::new(200, "OK", ""));
        assert_eq!(count(&hits), 1);
    }

    #[test]
    fn outcome_is_written_once() {
        let call = Call::new();
        call.resolve(Outcome::invalid(Settings::base()));
        call.completer(DataType::Raw)
            .load(HttpResponse::new(200, "OK", ""));

        assert_eq!(call.state(), CallState::Errored);
        assert_eq!(call.outcome().unwrap().status, 900);
    }

    #[test]
    fn dropped_completer_resolves_as_abandoned() {
        let (call, completer) = pending_call();
        drop(completer);

        assert_eq!(call.state(), CallState::Errored);
        let outcome = call.outcome().unwrap();
        assert_eq!(
            outcome.error(),
            Some(&crate::error::AjaxError::Transport(TransportError::Abandoned))
        );
    }

    #[test]
    fn unhandled_error_is_absorbed() {
        let (call, completer) = pending_call();
        completer.load(HttpResponse::new(503, "Service Unavailable", ""));
        assert_eq!(call.state(), CallState::Errored);
    }
}
