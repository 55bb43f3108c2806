//! Lifecycle hooks: executor teardown and object-drop notification.
//!
//! The host fires two kinds of callbacks the adapter must participate in:
//! statement teardown (flush any open writer) and catalog object drops
//! (remove the metadata row). Instead of each participant stashing the
//! previous callback pointer and chaining to it, observers register on an
//! ordered list and the dispatcher runs every one of them in registration
//! order. An observer that fails does not stop the ones after it; the first
//! error is reported once all have run.

use strata_error::Result;
use strata_types::cx::Cx;
use strata_types::RelationId;

/// Catalog object class carried on a drop event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    /// A relation (table-like object).
    Relation,
    /// Any other catalog object. Drop observers ignore these.
    Other,
}

/// One catalog drop notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropEvent {
    /// Class of the dropped object.
    pub class: ObjectClass,
    /// Identifier of the dropped object.
    pub object: RelationId,
    /// Sub-object (e.g. a single column), when the drop targets part of an
    /// object rather than the whole.
    pub sub_object: Option<u32>,
}

impl DropEvent {
    /// Whether this event drops a whole relation.
    ///
    /// Column drops arrive with a sub-object set and must not trigger
    /// storage cleanup.
    pub fn is_relation_drop(&self) -> bool {
        self.class == ObjectClass::Relation && self.sub_object.is_none()
    }
}

type Observer<H> = Box<dyn FnMut(&Cx, &mut H) -> Result<()> + Send>;

/// An ordered list of observers sharing a mutable target `H`.
///
/// `H` is whatever state the observers act on, typically the access-method
/// routine table itself.
pub struct ObserverList<H> {
    observers: Vec<Observer<H>>,
}

impl<H> ObserverList<H> {
    /// An empty list.
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Append an observer. Observers run in registration order.
    pub fn register<F>(&mut self, observer: F)
    where
        F: FnMut(&Cx, &mut H) -> Result<()> + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Run every observer against `target`.
    ///
    /// All observers run even when an earlier one fails; the first error is
    /// returned after the pass completes, later ones are logged and dropped.
    pub fn run(&mut self, cx: &Cx, target: &mut H) -> Result<()> {
        let mut first_err = None;
        for (i, observer) in self.observers.iter_mut().enumerate() {
            if let Err(err) = observer(cx, target) {
                tracing::warn!(observer = i, error = %err, "lifecycle observer failed");
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<H> Default for ObserverList<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// The two observer lists the adapter participates in, bundled.
pub struct LifecycleHooks<H> {
    teardown: ObserverList<H>,
    drop: ObserverList<(DropEvent, H)>,
}

impl<H> LifecycleHooks<H> {
    /// Hooks with no observers registered.
    pub fn new() -> Self {
        Self {
            teardown: ObserverList::new(),
            drop: ObserverList::new(),
        }
    }

    /// Register a statement-teardown observer.
    pub fn on_teardown<F>(&mut self, observer: F)
    where
        F: FnMut(&Cx, &mut H) -> Result<()> + Send + 'static,
    {
        self.teardown.register(observer);
    }

    /// Register a catalog-drop observer. The observer sees the event next to
    /// the target and decides for itself whether the event concerns it.
    pub fn on_drop<F>(&mut self, observer: F)
    where
        F: FnMut(&Cx, &mut (DropEvent, H)) -> Result<()> + Send + 'static,
    {
        self.drop.register(observer);
    }

    /// Fire statement teardown.
    pub fn fire_teardown(&mut self, cx: &Cx, target: &mut H) -> Result<()> {
        self.teardown.run(cx, target)
    }

    /// Fire a catalog-drop notification. `target` is moved through the
    /// observer pass and handed back alongside the result.
    pub fn fire_drop(&mut self, cx: &Cx, event: DropEvent, target: H) -> (H, Result<()>) {
        let mut carried = (event, target);
        let outcome = self.drop.run(cx, &mut carried);
        (carried.1, outcome)
    }
}

impl<H> Default for LifecycleHooks<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use strata_error::StrataError;

    #[test]
    fn observers_run_in_registration_order() {
        let cx = Cx::for_testing();
        let mut list: ObserverList<Vec<u32>> = ObserverList::new();
        list.register(|_, log: &mut Vec<u32>| {
            log.push(1);
            Ok(())
        });
        list.register(|_, log: &mut Vec<u32>| {
            log.push(2);
            Ok(())
        });
        list.register(|_, log: &mut Vec<u32>| {
            log.push(3);
            Ok(())
        });

        let mut log = Vec::new();
        list.run(&cx, &mut log).unwrap();
        assert_eq!(log, vec![1, 2, 3]);
    }

    #[test]
    fn a_failing_observer_does_not_stop_later_ones() {
        let cx = Cx::for_testing();
        let mut list: ObserverList<Vec<u32>> = ObserverList::new();
        list.register(|_, log: &mut Vec<u32>| {
            log.push(1);
            Ok(())
        });
        list.register(|_, _: &mut Vec<u32>| Err(StrataError::internal("first failure")));
        list.register(|_, log: &mut Vec<u32>| {
            log.push(3);
            Ok(())
        });
        list.register(|_, _: &mut Vec<u32>| Err(StrataError::internal("second failure")));

        let mut log = Vec::new();
        let err = list.run(&cx, &mut log).unwrap_err();
        assert_eq!(log, vec![1, 3]);
        // First error wins.
        assert!(err.to_string().contains("first failure"));
    }

    #[test]
    fn relation_drop_classification() {
        let whole = DropEvent {
            class: ObjectClass::Relation,
            object: RelationId::new(1).unwrap(),
            sub_object: None,
        };
        let column = DropEvent {
            sub_object: Some(2),
            ..whole
        };
        let other = DropEvent {
            class: ObjectClass::Other,
            ..whole
        };
        assert!(whole.is_relation_drop());
        assert!(!column.is_relation_drop());
        assert!(!other.is_relation_drop());
    }

    #[test]
    fn teardown_and_drop_lists_are_independent() {
        let cx = Cx::for_testing();
        let fired = Arc::new(AtomicU32::new(0));
        let mut hooks: LifecycleHooks<u32> = LifecycleHooks::new();

        let counter = Arc::clone(&fired);
        hooks.on_teardown(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        hooks.on_drop(|_, carried: &mut (DropEvent, u32)| {
            if carried.0.is_relation_drop() {
                carried.1 += 100;
            }
            Ok(())
        });

        let mut target = 0u32;
        hooks.fire_teardown(&cx, &mut target).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(target, 0);

        let event = DropEvent {
            class: ObjectClass::Relation,
            object: RelationId::new(7).unwrap(),
            sub_object: None,
        };
        let (target, outcome) = hooks.fire_drop(&cx, event, target);
        outcome.unwrap();
        assert_eq!(target, 100);
    }
}
