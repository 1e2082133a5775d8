use arc_swap::ArcSwap;
use hyper::service::Service;
use std::sync::Arc;

/// Holds the active request handler behind a single swappable reference.
///
/// The serving path is one wait-free load; `swap` installs a replacement
/// wholesale. A request observes either the prior or the new handler in
/// full, never a mix, so the routing table can be rebuilt and installed
/// while the listener keeps serving.
pub struct HotSwap<S> {
    current: Arc<ArcSwap<S>>,
}

impl<S> HotSwap<S> {
    pub fn new(initial: S) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// Installs `next` for all subsequent calls.
    pub fn swap(&self, next: S) {
        self.current.store(Arc::new(next));
    }
}

impl<S> Clone for HotSwap<S> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
        }
    }
}

impl<S, R> Service<R> for HotSwap<S>
where
    S: Service<R>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn call(&self, req: R) -> Self::Future {
        self.current.load().call(req)
    }
}
