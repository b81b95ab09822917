use crate::domain::logging::{LogComponent, get_logger, get_time_provider};
use crate::domain::market_data::PriceCategorySettings;
use std::cell::RefCell;
use std::fmt::Debug;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};
use strum::{AsRefStr, Display as StrumDisplay, EnumIter};

/// Base trait for all domain events
pub trait DomainEvent: Debug + Clone {
    fn event_type(&self) -> &'static str;
    fn timestamp(&self) -> u64 {
        get_time_provider().current_timestamp()
    }
}

/// Events published by the market board
#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    FetchStarted {
        version: u64,
        total: usize,
    },
    PricesUpdated {
        version: u64,
        item_ids: Vec<u32>,
    },
    FetchCompleted {
        version: u64,
        applied: bool,
    },
    FetchError {
        version: u64,
        message: String,
    },
    ServerChanged {
        server: String,
        previous_server: String,
    },
    SettingsChanged {
        show_prices: bool,
    },
    CategoriesChanged {
        settings: PriceCategorySettings,
    },
}

/// Discriminant used to subscribe to one kind of [`MarketEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumIter, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum MarketEventKind {
    FetchStarted,
    PricesUpdated,
    FetchCompleted,
    FetchError,
    ServerChanged,
    SettingsChanged,
    CategoriesChanged,
}

impl MarketEvent {
    pub fn kind(&self) -> MarketEventKind {
        match self {
            MarketEvent::FetchStarted { .. } => MarketEventKind::FetchStarted,
            MarketEvent::PricesUpdated { .. } => MarketEventKind::PricesUpdated,
            MarketEvent::FetchCompleted { .. } => MarketEventKind::FetchCompleted,
            MarketEvent::FetchError { .. } => MarketEventKind::FetchError,
            MarketEvent::ServerChanged { .. } => MarketEventKind::ServerChanged,
            MarketEvent::SettingsChanged { .. } => MarketEventKind::SettingsChanged,
            MarketEvent::CategoriesChanged { .. } => MarketEventKind::CategoriesChanged,
        }
    }
}

impl DomainEvent for MarketEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MarketEvent::FetchStarted { .. } => "fetch-started",
            MarketEvent::PricesUpdated { .. } => "prices-updated",
            MarketEvent::FetchCompleted { .. } => "fetch-completed",
            MarketEvent::FetchError { .. } => "fetch-error",
            MarketEvent::ServerChanged { .. } => "server-changed",
            MarketEvent::SettingsChanged { .. } => "settings-changed",
            MarketEvent::CategoriesChanged { .. } => "categories-changed",
        }
    }
}

/// Handle returned by every `subscribe` call.
///
/// Dropping it keeps the listener registered; call [`Subscription::unsubscribe`]
/// to remove it. Unsubscribing twice is a no-op.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to cancel.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

type Listener<T> = Rc<dyn Fn(&T)>;

struct ListenerRegistry<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// Multi-subscriber listener list with synchronous fan-out.
///
/// A panicking listener is logged and skipped; the remaining listeners still
/// run. This needs an unwinding panic runtime: `wasm32-unknown-unknown`
/// aborts on panic, so browser listeners must not panic. Listeners may subscribe or unsubscribe while being notified; changes
/// take effect from the next notification.
pub struct ListenerSet<T> {
    name: &'static str,
    registry: Rc<RefCell<ListenerRegistry<T>>>,
}

impl<T: 'static> ListenerSet<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            registry: Rc::new(RefCell::new(ListenerRegistry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, listener: Listener<T>) -> Subscription {
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push((id, listener));
            id
        };

        let weak: Weak<RefCell<ListenerRegistry<T>>> = Rc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = weak.upgrade() {
                registry.borrow_mut().listeners.retain(|(other, _)| *other != id);
            }
        })
    }

    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Listener<T>> = self
            .registry
            .borrow()
            .listeners
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        for listener in snapshot {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(value))) {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                get_logger().error(
                    LogComponent::Domain("Events"),
                    &format!("Listener on '{}' panicked: {}", self.name, reason),
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Typed observer registry for [`MarketEvent`]s
pub struct EventBus {
    listeners: ListenerSet<MarketEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: ListenerSet::new("market-board"),
        }
    }

    /// Subscribes `handler` to a single event kind.
    pub fn subscribe<F>(&self, kind: MarketEventKind, handler: F) -> Subscription
    where
        F: Fn(&MarketEvent) + 'static,
    {
        self.listeners.subscribe(Rc::new(move |event: &MarketEvent| {
            if event.kind() == kind {
                handler(event);
            }
        }))
    }

    /// Subscribes `handler` to every event.
    pub fn subscribe_all<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&MarketEvent) + 'static,
    {
        self.listeners.subscribe(Rc::new(handler))
    }

    pub fn publish(&self, event: MarketEvent) {
        get_logger().trace(
            LogComponent::Domain("Events"),
            &format!("Publishing {}", event.event_type()),
        );
        self.listeners.notify(&event);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn kind_filter_only_delivers_matching_events() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let _sub = bus.subscribe(MarketEventKind::SettingsChanged, move |_| counter.set(counter.get() + 1));

        bus.publish(MarketEvent::SettingsChanged { show_prices: true });
        bus.publish(MarketEvent::FetchCompleted { version: 1, applied: true });

        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn panicking_listener_does_not_starve_others() {
        let bus = EventBus::new();
        let delivered = Rc::new(Cell::new(false));
        let flag = delivered.clone();
        let _bad = bus.subscribe_all(|_| panic!("listener failure"));
        let _good = bus.subscribe_all(move |_| flag.set(true));

        bus.publish(MarketEvent::SettingsChanged { show_prices: false });

        assert!(delivered.get());
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe_all(|_| {});
        assert_eq!(bus.listener_count(), 1);
        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(bus.listener_count(), 0);
        assert!(!sub.is_active());
    }

    #[test]
    fn listener_may_unsubscribe_itself_during_delivery() {
        let bus = Rc::new(EventBus::new());
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let inner = slot.clone();
        let sub = bus.subscribe_all(move |_| {
            if let Some(mut sub) = inner.borrow_mut().take() {
                sub.unsubscribe();
            }
        });
        *slot.borrow_mut() = Some(sub);

        bus.publish(MarketEvent::SettingsChanged { show_prices: true });
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn kinds_have_kebab_case_names() {
        assert_eq!(MarketEventKind::FetchStarted.to_string(), "fetch-started");
        assert_eq!(
            MarketEvent::ServerChanged { server: "A".into(), previous_server: "B".into() }.event_type(),
            MarketEventKind::ServerChanged.as_ref()
        );
    }
}
