//! Listener registry and publication

use std::collections::HashMap;
use std::sync::Arc;

use crate::event::Event;

pub type Listener = Arc<dyn Fn(&mut Event) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Runs before the action; may rewrite params.
    Before,
    /// Runs after a successful action.
    After,
}

#[derive(Clone, Default)]
pub struct Publisher {
    listeners: HashMap<String, Vec<(Phase, Listener)>>,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `name`. Listeners run in registration order.
    pub fn subscribe<F>(&mut self, name: impl Into<String>, phase: Phase, listener: F) -> &mut Self
    where
        F: Fn(&mut Event) + Send + Sync + 'static,
    {
        self.listeners
            .entry(name.into())
            .or_default()
            .push((phase, Arc::new(listener)));
        self
    }

    pub fn unsubscribe_all(&mut self, name: &str) {
        self.listeners.remove(name);
    }

    pub fn has_listeners(&self, name: &str) -> bool {
        self.listeners
            .get(name)
            .is_some_and(|listeners| !listeners.is_empty())
    }

    /// Run the listeners registered for the event's name in `phase`.
    pub fn notify(&self, phase: Phase, event: &mut Event) {
        event.resume_propagation();

        let Some(listeners) = self.listeners.get(event.name()) else {
            return;
        };

        for (_, listener) in listeners.iter().filter(|(p, _)| *p == phase) {
            listener(&mut *event);
            if event.is_propagation_stopped() {
                tracing::debug!(event = %event.name(), ?phase, "Event propagation stopped");
                break;
            }
        }
    }

    /// Publish `event` around `action`. The action's result is returned as-is;
    /// `After` listeners only see successful actions.
    pub fn publish<T, E, F>(&self, mut event: Event, action: F) -> Result<T, E>
    where
        F: FnOnce(&mut Event) -> Result<T, E>,
    {
        self.notify(Phase::Before, &mut event);
        let output = action(&mut event)?;
        self.notify(Phase::After, &mut event);
        Ok(output)
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&str, usize> = self
            .listeners
            .iter()
            .map(|(name, listeners)| (name.as_str(), listeners.len()))
            .collect();
        f.debug_struct("Publisher").field("listeners", &counts).finish()
    }
}
