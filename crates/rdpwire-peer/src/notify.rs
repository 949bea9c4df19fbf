use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ProtocolFault;

/// Category a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Close,
    Error,
    Event,
}

/// Something the protocol tells its listeners about.
#[derive(Debug)]
pub enum Notification {
    /// The inbound stream ended.
    Close,
    /// A non-fatal fault. The protocol keeps running.
    Error(ProtocolFault),
    /// A payload that arrived while no request was outstanding.
    Event(Value),
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::Close => NotificationKind::Close,
            Notification::Error(_) => NotificationKind::Error,
            Notification::Event(_) => NotificationKind::Event,
        }
    }

    pub fn as_event(&self) -> Option<&Value> {
        match self {
            Notification::Event(body) => Some(body),
            _ => None,
        }
    }

    pub fn as_fault(&self) -> Option<&ProtocolFault> {
        match self {
            Notification::Error(fault) => Some(fault),
            _ => None,
        }
    }

    /// Decode an event body into a typed message.
    ///
    /// Returns `None` for non-event notifications.
    pub fn decode_event<T: DeserializeOwned>(&self) -> Option<serde_json::Result<T>> {
        self.as_event().map(|body| T::deserialize(body))
    }
}

pub(crate) type Handler = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Ordered listener lists, one per [`NotificationKind`].
#[derive(Default)]
pub struct Listeners {
    handlers: HashMap<NotificationKind, Vec<Handler>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the list for `kind`.
    pub fn on<F>(&mut self, kind: NotificationKind, handler: F)
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.handlers.entry(kind).or_default().push(Arc::new(handler));
    }

    /// Number of listeners registered for `kind`.
    pub fn count(&self, kind: NotificationKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Copy of the current listener list for `kind`.
    ///
    /// Callers invoke the copy with [`invoke`] after releasing any lock
    /// around `self`, so a listener may register more listeners without
    /// deadlocking.
    pub(crate) fn snapshot(&self, kind: NotificationKind) -> Vec<Handler> {
        self.handlers.get(&kind).cloned().unwrap_or_default()
    }
}

/// Run `handlers` in order. Returns how many were called.
pub(crate) fn invoke(handlers: &[Handler], notification: &Notification) -> usize {
    for handler in handlers {
        handler(notification);
    }
    handlers.len()
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("close", &self.count(NotificationKind::Close))
            .field("error", &self.count(NotificationKind::Error))
            .field("event", &self.count(NotificationKind::Event))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    fn emit(listeners: &Listeners, notification: &Notification) -> usize {
        invoke(&listeners.snapshot(notification.kind()), notification)
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::new();
        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            listeners.on(NotificationKind::Close, move |_| seen.lock().unwrap().push(tag));
        }

        assert_eq!(emit(&listeners, &Notification::Close), 3);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn emit_only_reaches_matching_kind() {
        let hits = Arc::new(Mutex::new(0));
        let mut listeners = Listeners::new();
        let counter = Arc::clone(&hits);
        listeners.on(NotificationKind::Event, move |_| *counter.lock().unwrap() += 1);

        assert_eq!(emit(&listeners, &Notification::Close), 0);
        assert_eq!(emit(&listeners, &Notification::Event(json!({}))), 1);
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn emit_without_listeners_is_a_no_op() {
        let listeners = Listeners::new();
        assert_eq!(emit(&listeners, &Notification::Event(json!(null))), 0);
        assert_eq!(listeners.count(NotificationKind::Error), 0);
    }

    #[test]
    fn decode_event_into_typed_message() {
        #[derive(Deserialize)]
        struct TabNavigated {
            from: String,
            url: String,
        }

        let note = Notification::Event(json!({"from": "tab1", "url": "about:blank"}));
        let typed: TabNavigated = note.decode_event().unwrap().unwrap();
        assert_eq!(typed.from, "tab1");
        assert_eq!(typed.url, "about:blank");
        assert!(Notification::Close.decode_event::<TabNavigated>().is_none());
    }
}
