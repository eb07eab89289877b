//! Implicit context
//!
//! Properties pushed here are attached to every record created on the same
//! thread while the scope is active, without being passed to each call.
//!
//! - [`with_context`]: run a closure inside a scope
//! - [`push_context`]: RAII scope through a [`ContextGuard`]
//! - [`ContextFuture`]: re-enter a scope each time a future is polled

use super::value::Properties;
use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

thread_local! {
    static FRAMES: RefCell<Vec<Arc<Properties>>> = const { RefCell::new(Vec::new()) };
}

/// Merged view of every active scope on this thread; inner scopes win.
pub fn current_context() -> Properties {
    FRAMES.with(|frames| {
        frames
            .borrow()
            .iter()
            .fold(Properties::new(), |merged, frame| {
                merged.overlay((**frame).clone())
            })
    })
}

pub(crate) fn has_context() -> bool {
    FRAMES.with(|frames| !frames.borrow().is_empty())
}

/// Run `f` with `properties` added to the implicit context.
pub fn with_context<R>(properties: Properties, f: impl FnOnce() -> R) -> R {
    let _guard = push_context(properties);
    f()
}

/// Add `properties` to the implicit context until the guard is dropped.
///
/// The guard is bound to the creating thread.
///
/// # Example
///
/// ```
/// use logtape::{current_context, push_context, Properties};
///
/// {
///     let _guard = push_context(Properties::new().with_field("request_id", "abc-123"));
///     assert!(current_context().contains_key("request_id"));
/// }
/// assert!(current_context().is_empty());
/// ```
pub fn push_context(properties: Properties) -> ContextGuard {
    let depth = push_frame(Arc::new(properties));
    ContextGuard {
        depth,
        _not_send: PhantomData,
    }
}

fn push_frame(frame: Arc<Properties>) -> usize {
    FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        frames.push(frame);
        frames.len() - 1
    })
}

fn truncate_frames(depth: usize) {
    FRAMES.with(|frames| frames.borrow_mut().truncate(depth));
}

/// RAII guard for an implicit context scope
///
/// Dropping it removes its scope along with anything pushed after it.
pub struct ContextGuard {
    depth: usize,
    _not_send: PhantomData<Rc<()>>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        truncate_frames(self.depth);
    }
}

/// Future that carries an implicit context scope across `.await` points.
///
/// The scope is active only while the inner future is being polled, so it
/// follows the task between threads.
pub struct ContextFuture<F> {
    frame: Arc<Properties>,
    inner: Pin<Box<F>>,
}

impl<F: Future> ContextFuture<F> {
    pub fn new(properties: Properties, future: F) -> Self {
        Self {
            frame: Arc::new(properties),
            inner: Box::pin(future),
        }
    }
}

impl<F: Future> Future for ContextFuture<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let depth = push_frame(Arc::clone(&this.frame));
        let result = this.inner.as_mut().poll(cx);
        truncate_frames(depth);
        result
    }
}

/// Wrap `future` so it runs inside an implicit context scope.
pub fn in_context<F: Future>(properties: Properties, future: F) -> ContextFuture<F> {
    ContextFuture::new(properties, future)
}
