//! Exception events and their delivery.
//!
//! When the tool can't reach the directory, or the library fails while
//! exchanging the extended request, an [`ExceptionEvent`] is built and
//! handed to every [`ExceptionListener`] registered on the
//! [`ExceptionBus`]. Delivery is synchronous: [`publish()`](ExceptionBus::publish)
//! returns after the last listener has been called.
//!
//! The bus is an ordinary value, owned by whoever creates it. Listeners are
//! identified by their `Arc` allocation. Registering the same listener twice
//! is allowed and yields two deliveries per event; each call to
//! [`unregister()`](ExceptionBus::unregister) removes one registration.

use std::sync::{Arc, Mutex, MutexGuard};

use ldap3::result::LdapError;

use crate::result::ResultCode;

/// Notification that an LDAP request has failed.
#[derive(Clone, Debug)]
pub struct ExceptionEvent {
    /// Name of the tool which issued the request.
    pub source: String,
    /// URL of the server, if a connection had been established.
    pub connection: Option<String>,
    /// The failure as reported by the protocol library.
    pub error: Arc<LdapError>,
    /// Result code derived from `error`.
    pub code: ResultCode,
}

impl ExceptionEvent {
    pub fn new(source: &str, connection: Option<&str>, error: LdapError) -> Self {
        let code = ResultCode::from(&error);
        ExceptionEvent {
            source: source.to_owned(),
            connection: connection.map(str::to_owned),
            error: Arc::new(error),
            code,
        }
    }
}

/// Receiver of exception events.
pub trait ExceptionListener: Send + Sync {
    /// The server rejected the request, or a problem occurred while
    /// sending the request or reading the response.
    fn ldap_request_failed(&self, event: &ExceptionEvent);
}

/// Ordered registry of exception listeners.
#[derive(Default)]
pub struct ExceptionBus {
    listeners: Mutex<Vec<Arc<dyn ExceptionListener>>>,
}

impl ExceptionBus {
    pub fn new() -> Self {
        Self::default()
    }

    // A listener which panicked inside publish() never runs while the lock
    // is held, so a poisoned registry is still consistent.
    fn registry(&self) -> MutexGuard<'_, Vec<Arc<dyn ExceptionListener>>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a listener to the registry. `None` is ignored.
    pub fn register(&self, listener: Option<Arc<dyn ExceptionListener>>) {
        if let Some(listener) = listener {
            self.registry().push(listener);
        }
    }

    /// Remove the earliest registration of `listener`. Does nothing if the
    /// listener isn't registered.
    pub fn unregister(&self, listener: &Arc<dyn ExceptionListener>) {
        let mut registry = self.registry();
        if let Some(pos) = registry.iter().position(|l| Arc::ptr_eq(l, listener)) {
            registry.remove(pos);
        }
    }

    /// Deliver `event` to every listener registered at the time of the call,
    /// in registration order.
    ///
    /// The registry is copied before delivery and the lock released, so a
    /// listener may register or unregister listeners from its callback; the
    /// change takes effect from the next `publish()`. A panic in a listener
    /// propagates to the caller and the remaining listeners aren't called.
    pub fn publish(&self, event: &ExceptionEvent) {
        let snapshot = self.registry().clone();
        if snapshot.is_empty() {
            return;
        }
        debug!(
            "delivering {} event from {} to {} listener(s)",
            event.code,
            event.source,
            snapshot.len()
        );
        for listener in snapshot {
            listener.ldap_request_failed(event);
        }
    }

    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry().is_empty()
    }
}

/// Listener which writes every event to the log at error level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogListener;

impl ExceptionListener for LogListener {
    fn ldap_request_failed(&self, event: &ExceptionEvent) {
        match event.connection {
            Some(ref url) => error!("{}: request to {} failed: {}", event.source, url, event.error),
            None => error!("{}: {}", event.source, event.error),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::io;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Journal(Mutex<Vec<String>>);

    impl Journal {
        fn entries(&self) -> Vec<String> {
            self.0.lock().expect("journal").clone()
        }
    }

    struct Recorder {
        name: &'static str,
        journal: Arc<Journal>,
    }

    impl ExceptionListener for Recorder {
        fn ldap_request_failed(&self, event: &ExceptionEvent) {
            self.journal
                .0
                .lock()
                .expect("journal")
                .push(format!("{}:{}", self.name, event.source));
        }
    }

    fn recorder(name: &'static str, journal: &Arc<Journal>) -> Arc<dyn ExceptionListener> {
        Arc::new(Recorder {
            name,
            journal: journal.clone(),
        })
    }

    fn event(source: &str) -> ExceptionEvent {
        let err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        ExceptionEvent::new(source, None, LdapError::from(err))
    }

    #[test]
    fn empty_bus_delivers_nothing() {
        let bus = ExceptionBus::new();
        assert!(bus.is_empty());
        bus.publish(&event("E"));
    }

    #[test]
    fn delivery_in_registration_order() {
        let journal = Arc::new(Journal::default());
        let bus = ExceptionBus::new();
        bus.register(Some(recorder("A", &journal)));
        bus.register(Some(recorder("B", &journal)));
        bus.publish(&event("E"));
        bus.publish(&event("F"));
        assert_eq!(journal.entries(), vec!["A:E", "B:E", "A:F", "B:F"]);
    }

    #[test]
    fn none_is_ignored() {
        let bus = ExceptionBus::new();
        bus.register(None);
        assert_eq!(bus.len(), 0);
    }

    #[test]
    fn duplicates_receive_one_delivery_each() {
        let journal = Arc::new(Journal::default());
        let bus = ExceptionBus::new();
        let a = recorder("A", &journal);
        bus.register(Some(a.clone()));
        bus.register(Some(a.clone()));
        bus.publish(&event("E"));
        assert_eq!(journal.entries(), vec!["A:E", "A:E"]);

        bus.unregister(&a);
        assert_eq!(bus.len(), 1);
        bus.publish(&event("F"));
        assert_eq!(journal.entries(), vec!["A:E", "A:E", "A:F"]);
    }

    #[test]
    fn unregister_absent_is_noop() {
        let journal = Arc::new(Journal::default());
        let bus = ExceptionBus::new();
        let a = recorder("A", &journal);
        let b = recorder("B", &journal);
        bus.register(Some(a.clone()));
        bus.unregister(&b);
        assert_eq!(bus.len(), 1);
        bus.unregister(&a);
        bus.unregister(&a);
        assert!(bus.is_empty());
    }

    struct Joiner {
        bus: Arc<ExceptionBus>,
        newcomer: Arc<dyn ExceptionListener>,
        journal: Arc<Journal>,
    }

    impl ExceptionListener for Joiner {
        fn ldap_request_failed(&self, event: &ExceptionEvent) {
            self.journal
                .0
                .lock()
                .expect("journal")
                .push(format!("J:{}", event.source));
            self.bus.register(Some(self.newcomer.clone()));
        }
    }

    #[test]
    fn listener_added_during_delivery_waits_for_next_event() {
        let journal = Arc::new(Journal::default());
        let bus = Arc::new(ExceptionBus::new());
        bus.register(Some(Arc::new(Joiner {
            bus: bus.clone(),
            newcomer: recorder("N", &journal),
            journal: journal.clone(),
        })));
        bus.publish(&event("E"));
        assert_eq!(journal.entries(), vec!["J:E"]);
        bus.publish(&event("F"));
        assert_eq!(journal.entries(), vec!["J:E", "J:F", "N:F"]);
    }

    struct Leaver {
        bus: Arc<ExceptionBus>,
        other: Arc<dyn ExceptionListener>,
    }

    impl ExceptionListener for Leaver {
        fn ldap_request_failed(&self, _event: &ExceptionEvent) {
            self.bus.unregister(&self.other);
        }
    }

    #[test]
    fn listener_removed_during_delivery_still_gets_current_event() {
        let journal = Arc::new(Journal::default());
        let bus = Arc::new(ExceptionBus::new());
        let b = recorder("B", &journal);
        bus.register(Some(Arc::new(Leaver {
            bus: bus.clone(),
            other: b.clone(),
        })));
        bus.register(Some(b));
        bus.publish(&event("E"));
        bus.publish(&event("F"));
        assert_eq!(journal.entries(), vec!["B:E"]);
    }

    struct Panicker;

    impl ExceptionListener for Panicker {
        fn ldap_request_failed(&self, _event: &ExceptionEvent) {
            panic!("listener failure");
        }
    }

    #[test]
    fn panicking_listener_stops_delivery() {
        let journal = Arc::new(Journal::default());
        let bus = ExceptionBus::new();
        bus.register(Some(Arc::new(Panicker)));
        bus.register(Some(recorder("B", &journal)));
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            bus.publish(&event("E"))
        }));
        assert!(res.is_err());
        assert!(journal.entries().is_empty());
        assert_eq!(bus.len(), 2);
    }

    #[test]
    fn concurrent_registration_is_not_lost() {
        let journal = Arc::new(Journal::default());
        let bus = Arc::new(ExceptionBus::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bus = bus.clone();
                let journal = journal.clone();
                std::thread::spawn(move || {
                    for _ in 0..16 {
                        bus.register(Some(recorder("T", &journal)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread");
        }
        assert_eq!(bus.len(), 128);
        bus.publish(&event("E"));
        assert_eq!(journal.entries().len(), 128);
    }

    #[test]
    fn event_code_follows_error() {
        let e = event("tool");
        assert_eq!(e.code, ResultCode::CONNECT_ERROR);
        assert!(e.connection.is_none());
    }
}
