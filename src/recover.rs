//! Ordered failure-handler chains
//!
//! A [`HandlerChain`] holds an ordered sequence of failure handlers. Each
//! handler inspects an error and reports a tagged outcome: [`Recovery::Handled`]
//! stops the chain, [`Recovery::Declined`] passes the error to the next
//! handler. When every handler declines, the original failure is surfaced
//! unchanged.

use anyhow::Error;

/// Outcome of one handler's look at a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// The handler dealt with the failure; later handlers never see it.
    Handled,
    /// The handler passed; the failure moves on down the chain.
    Declined,
}

impl Recovery {
    pub fn is_handled(self) -> bool {
        matches!(self, Recovery::Handled)
    }
}

type Handler = Box<dyn Fn(&Error) -> Recovery + Send + Sync>;

/// Ordered sequence of failure handlers
#[derive(Default)]
pub struct HandlerChain {
    handlers: Vec<Handler>,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler to the end of the chain
    pub fn with_handler<H>(mut self, handler: H) -> Self
    where
        H: Fn(&Error) -> Recovery + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Offer the error to each handler in order; stops at the first
    /// [`Recovery::Handled`] outcome.
    pub fn dispatch(&self, error: &Error) -> Recovery {
        for handler in &self.handlers {
            if handler(error).is_handled() {
                return Recovery::Handled;
            }
        }
        Recovery::Declined
    }

    /// Consume a failure: `Ok(())` when some handler dealt with it, the
    /// original error when every handler declined.
    pub fn absorb(&self, error: Error) -> Result<(), Error> {
        match self.dispatch(&error) {
            Recovery::Handled => Ok(()),
            Recovery::Declined => Err(error),
        }
    }
}

impl std::fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerChain")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
