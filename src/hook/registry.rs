use crate::deploy::CancellationToken;
use crate::error::Result;
use crate::topology::{ConnectionResolver, Topology};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything a hook receives when the event fires
pub struct LifecycleContext<'a> {
    pub topology: &'a Topology,
    pub connections: &'a dyn ConnectionResolver,
    pub cancel: &'a CancellationToken,
}

#[async_trait]
pub trait LifecycleHook: Send + Sync {
    /// Registration key; a registry holds at most one hook per name
    fn name(&self) -> &str;

    async fn after_resources_created(&self, ctx: &LifecycleContext<'_>) -> Result<()>;
}

#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hook` unless one with the same name is already present
    pub fn try_add(&mut self, hook: Arc<dyn LifecycleHook>) -> bool {
        if self.hooks.iter().any(|h| h.name() == hook.name()) {
            debug!("Lifecycle hook {} already registered", hook.name());
            return false;
        }

        debug!("Registered lifecycle hook {}", hook.name());
        self.hooks.push(hook);
        true
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook in order, stopping at the first failure
    pub async fn after_resources_created(&self, ctx: &LifecycleContext<'_>) -> Result<()> {
        for hook in &self.hooks {
            info!("Running lifecycle hook {}", hook.name());

            if let Err(e) = hook.after_resources_created(ctx).await {
                warn!(
                    "Lifecycle hook {} failed [{}]: {}",
                    hook.name(),
                    e.code(),
                    e
                );
                return Err(e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeployError;
    use crate::topology::ServerConnectionResolver;
    use std::sync::Mutex;

    struct NamedHook {
        name: &'static str,
        fail: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl LifecycleHook for NamedHook {
        fn name(&self) -> &str {
            self.name
        }

        async fn after_resources_created(&self, _ctx: &LifecycleContext<'_>) -> Result<()> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                return Err(DeployError::Internal(format!("{} failed", self.name)));
            }
            Ok(())
        }
    }

    fn hook(name: &'static str, fail: bool, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<dyn LifecycleHook> {
        Arc::new(NamedHook {
            name,
            fail,
            log: log.clone(),
        })
    }

    #[test]
    fn test_try_add_ignores_duplicates() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();

        assert!(registry.try_add(hook("deploy", false, &log)));
        assert!(!registry.try_add(hook("deploy", false, &log)));
        assert!(registry.try_add(hook("seed", false, &log)));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_hooks_run_in_order_and_stop_on_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        registry.try_add(hook("first", false, &log));
        registry.try_add(hook("second", true, &log));
        registry.try_add(hook("third", false, &log));

        let topology = Topology::default();
        let connections = ServerConnectionResolver::from_topology(&topology, None);
        let cancel = CancellationToken::new();
        let ctx = LifecycleContext {
            topology: &topology,
            connections: &connections,
            cancel: &cancel,
        };

        assert!(registry.after_resources_created(&ctx).await.is_err());
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }
}
