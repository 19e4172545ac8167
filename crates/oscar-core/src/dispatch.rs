//! Method registration and message dispatch
//!
//! A [`Methods`] table is a plain ordered list of `(pattern, handler)`
//! pairs. [`Dispatcher::build`] compiles every pattern up front and fails
//! as a whole if any one of them is malformed, so a bad registration is
//! reported before any traffic is read.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::address::Pattern;
use crate::types::Message;
use crate::{Error, Result};

/// Result returned by a method handler
pub type MethodResult = anyhow::Result<()>;

/// A message handler
pub type Method = Arc<dyn Fn(&Message) -> MethodResult + Send + Sync>;

/// Ordered association from address pattern to handler
#[derive(Clone, Default)]
pub struct Methods {
    entries: Vec<(String, Method)>,
}

impl Methods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `pattern`, replacing any earlier handler for
    /// the same pattern in place
    pub fn insert<F>(&mut self, pattern: impl Into<String>, handler: F)
    where
        F: Fn(&Message) -> MethodResult + Send + Sync + 'static,
    {
        let pattern = pattern.into();
        let handler: Method = Arc::new(handler);
        match self.entries.iter_mut().find(|(p, _)| *p == pattern) {
            Some(entry) => entry.1 = handler,
            None => self.entries.push((pattern, handler)),
        }
    }

    /// Builder-style [`Methods::insert`]
    pub fn with<F>(mut self, pattern: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Message) -> MethodResult + Send + Sync + 'static,
    {
        self.insert(pattern, handler);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered patterns in registration order
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }
}

impl std::fmt::Debug for Methods {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.patterns()).finish()
    }
}

/// Compiled, immutable method table for one serve invocation
pub struct Dispatcher {
    routes: Vec<(Pattern, Method)>,
}

impl Dispatcher {
    /// Compile every registered pattern
    pub fn build(methods: Option<Methods>) -> Result<Self> {
        let methods = methods.ok_or(Error::NilDispatcher)?;
        if methods.is_empty() {
            return Err(Error::EmptyDispatcher);
        }

        let routes = methods
            .entries
            .into_iter()
            .map(|(pattern, handler)| -> Result<(Pattern, Method)> {
                Ok((Pattern::compile(&pattern)?, handler))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { routes })
    }

    /// Invoke every handler whose pattern matches `msg.address`, in
    /// registration order
    ///
    /// Handler failures are logged and do not stop the remaining handlers.
    /// Returns the number of handlers invoked; zero means the message was
    /// dropped.
    pub fn dispatch(&self, msg: &Message) -> usize {
        let mut invoked = 0;
        for (pattern, handler) in &self.routes {
            if !pattern.matches(&msg.address) {
                continue;
            }
            invoked += 1;
            if let Err(e) = handler(msg) {
                warn!("Method {} failed for {}: {:#}", pattern, msg.address, e);
            }
        }
        if invoked == 0 {
            debug!("No method matched {}, dropping", msg.address);
        }
        invoked
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|(p, _)| p.as_str()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let methods = Methods::new()
            .with("/a", |_| Ok(()))
            .with("/b", |_| Ok(()))
            .with("/a", |_| anyhow::bail!("replaced"));

        assert_eq!(methods.len(), 2);
        assert_eq!(methods.patterns().collect::<Vec<_>>(), ["/a", "/b"]);
    }

    #[test]
    fn test_debug_lists_patterns() {
        let methods = Methods::new().with("/x/*", |_| Ok(()));
        assert_eq!(format!("{methods:?}"), r#"["/x/*"]"#);

        let dispatcher = Dispatcher::build(Some(methods)).unwrap();
        assert_eq!(format!("{dispatcher:?}"), r#"["/x/*"]"#);
    }
}
