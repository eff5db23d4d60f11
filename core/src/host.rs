//! Host-driven transport.
//!
//! # Design
//! `HostTransport` performs no I/O. It queues each outgoing request with its
//! `Completer` so the host (a test, an event loop, a C caller through the
//! FFI crate) can execute the request however it likes and report back.
//! Clones share one queue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use crate::call::Completer;
use crate::http::{HttpRequest, Transport};

/// A request waiting for the host, paired with its completion notifier.
#[derive(Debug)]
pub struct Exchange {
    pub request: HttpRequest,
    pub completer: Completer,
}

#[derive(Debug, Clone)]
pub struct HostTransport {
    queue: Arc<Mutex<VecDeque<Exchange>>>,
    cors: bool,
}

impl HostTransport {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            cors: true,
        }
    }

    /// A host transport that reports no CORS support.
    pub fn without_cors() -> Self {
        Self {
            cors: false,
            ..Self::new()
        }
    }

    /// Oldest request not yet taken by the host.
    pub fn next_exchange(&self) -> Option<Exchange> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for HostTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HostTransport {
    fn supports_cors(&self) -> bool {
        self.cors
    }

    fn send(&self, request: HttpRequest, completer: Completer) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Exchange { request, completer });
    }
}
