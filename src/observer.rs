use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver};

use log::warn;

type Callback<E> = Box<dyn FnMut(&E)>;

/// Single replaceable subscriber for fire-and-forget notifications.
///
/// At most one listener is active; subscribing again replaces it. A panicking
/// listener is caught and logged so the notifier's state is never affected.
pub struct Listener<E> {
    callback: Option<Callback<E>>,
}

impl<E> Listener<E> {
    pub fn new() -> Self {
        Listener { callback: None }
    }

    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&E) + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    pub fn unsubscribe(&mut self) {
        self.callback = None;
    }

    #[inline]
    pub fn is_subscribed(&self) -> bool {
        self.callback.is_some()
    }

    pub fn notify(&mut self, event: &E) {
        if let Some(callback) = self.callback.as_mut() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(event)));
            if outcome.is_err() {
                warn!("event listener panicked; notification dropped");
            }
        }
    }
}

impl<E: Clone + 'static> Listener<E> {
    /// Replace the listener with one that forwards clones into a channel.
    ///
    /// Once the receiver is dropped, notifications are silently discarded.
    pub fn channel(&mut self) -> Receiver<E> {
        let (tx, rx) = mpsc::channel();
        self.subscribe(move |event: &E| {
            let _ = tx.send(event.clone());
        });
        rx
    }
}

impl<E> Default for Listener<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Listener<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_notify_without_listener_is_noop() {
        let mut listener: Listener<u32> = Listener::new();
        listener.notify(&1);
        assert!(!listener.is_subscribed());
    }

    #[test]
    fn test_subscribe_replaces_previous() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut listener = Listener::new();

        let first = Rc::clone(&seen);
        listener.subscribe(move |e: &u32| first.borrow_mut().push(("first", *e)));
        listener.notify(&1);

        let second = Rc::clone(&seen);
        listener.subscribe(move |e: &u32| second.borrow_mut().push(("second", *e)));
        listener.notify(&2);

        assert_eq!(*seen.borrow(), vec![("first", 1), ("second", 2)]);
    }

    #[test]
    fn test_channel_receives_events() {
        let mut listener = Listener::new();
        let rx = listener.channel();
        listener.notify(&"a".to_string());
        listener.notify(&"b".to_string());
        let got: Vec<String> = rx.try_iter().collect();
        assert_eq!(got, vec!["a", "b"]);
    }

    #[test]
    fn test_panicking_listener_is_contained() {
        let mut listener = Listener::new();
        listener.subscribe(|_: &u32| panic!("listener bug"));
        listener.notify(&7);
        assert!(listener.is_subscribed());
    }

    #[test]
    fn test_unsubscribe() {
        let count = Rc::new(RefCell::new(0));
        let mut listener = Listener::new();
        let c = Rc::clone(&count);
        listener.subscribe(move |_: &u32| *c.borrow_mut() += 1);
        listener.notify(&0);
        listener.unsubscribe();
        listener.notify(&0);
        assert_eq!(*count.borrow(), 1);
    }
}
