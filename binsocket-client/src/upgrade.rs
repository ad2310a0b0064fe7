//! Upgrade handler: the listeners a connection is opened with

use crate::listener::Listener;
use std::fmt;

/// Completes an upgrade request by attaching listeners to the new connection
pub struct UpgradeHandler {
    listeners: Vec<Box<dyn Listener>>,
}

impl UpgradeHandler {
    /// Start building a handler
    pub fn builder() -> UpgradeHandlerBuilder {
        UpgradeHandlerBuilder::default()
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn into_listeners(self) -> Vec<Box<dyn Listener>> {
        self.listeners
    }
}

impl fmt::Debug for UpgradeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpgradeHandler")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Builder for [`UpgradeHandler`]
#[derive(Default)]
pub struct UpgradeHandlerBuilder {
    listeners: Vec<Box<dyn Listener>>,
}

impl UpgradeHandlerBuilder {
    /// Register a listener; listeners are called in registration order
    pub fn add_listener(mut self, listener: impl Listener) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Finish the handler
    pub fn build(self) -> UpgradeHandler {
        UpgradeHandler {
            listeners: self.listeners,
        }
    }
}

impl fmt::Debug for UpgradeHandlerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpgradeHandlerBuilder")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
