//! Name → command lookup.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use crate::command::Command;

pub type CommandFactory = Arc<dyn Fn() -> Arc<dyn Command> + Send + Sync>;

/// Commands are registered by factory and built on first lookup.
#[derive(Default)]
pub struct CommandRegistry {
    factories: BTreeMap<String, CommandFactory>,
    loaded: Mutex<HashMap<String, Arc<dyn Command>>>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every builtin command.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::commands::register_builtins(&mut registry);
        registry
    }

    /// Register (or replace) a command.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Arc<dyn Command> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(command) = loaded.get(name) {
            return Some(Arc::clone(command));
        }
        let factory = self.factories.get(name)?;
        let command = factory();
        tracing::debug!(command = name, "loaded command");
        loaded.insert(name.to_string(), Arc::clone(&command));
        Some(command)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandSpec;
    use crate::context::ExecContext;
    use crate::result::CommandResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static BUILT: AtomicUsize = AtomicUsize::new(0);

    struct Nop;

    #[async_trait]
    impl Command for Nop {
        fn spec(&self) -> CommandSpec {
            CommandSpec::new("nop", "does nothing", "nop")
        }

        async fn run(&self, _ctx: &mut ExecContext<'_>) -> CommandResult {
            CommandResult::ok()
        }
    }

    #[test]
    fn loads_lazily_once() {
        let mut registry = CommandRegistry::new();
        registry.register("nop", || {
            BUILT.fetch_add(1, Ordering::SeqCst);
            Arc::new(Nop)
        });
        assert_eq!(BUILT.load(Ordering::SeqCst), 0);
        assert!(registry.get("nop").is_some());
        assert!(registry.get("nop").is_some());
        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn builtins_are_sorted() {
        let registry = CommandRegistry::with_builtins();
        let names: Vec<&str> = registry.names().collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(registry.contains("ls"));
        assert!(registry.contains("run"));
    }
}
