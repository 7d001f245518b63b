//! Plugin registry: metadata index, instance cache and lifecycle teardown.
//!
//! A registry is an ordinary value. Callers construct one at startup and pass
//! it where it is needed; there is no process-wide default.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{normalize_extension, PluginConfig, PluginContext};
use crate::error::{LifecycleError, RegistryError};
use crate::plugin::{Lifecycle, PluginMetadata, TemplatePlugin};
use crate::render::{transform, TemplateOutput};
use crate::tree::GenRoot;

/// Constructs a fresh, uninitialized plugin instance.
pub type PluginFactory = Arc<dyn Fn() -> Arc<dyn TemplatePlugin> + Send + Sync>;

struct Registration {
    metadata: PluginMetadata,
    /// `None` for plugins registered as a ready-made instance.
    factory: Option<PluginFactory>,
}

#[derive(Default)]
struct Inner {
    entries: BTreeMap<String, Registration>,
    instances: HashMap<String, Arc<dyn TemplatePlugin>>,
}

/// Outcome of [`PluginRegistry::dispose_all`].
#[derive(Debug, Default)]
pub struct DisposeReport {
    /// Plugins that released their resources.
    pub disposed: Vec<String>,
    /// Plugins whose teardown failed; teardown of the others still ran.
    pub failures: Vec<LifecycleError>,
    /// Instance-only registrations dropped along with their instance.
    pub unregistered: Vec<String>,
}

impl DisposeReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Name → plugin index with a memoized instance cache.
#[derive(Default)]
pub struct PluginRegistry {
    inner: RwLock<Inner>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        f.debug_struct("PluginRegistry")
            .field("plugins", &inner.entries.keys().collect::<Vec<_>>())
            .field("instances", &inner.instances.len())
            .finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a plugin by metadata and factory. Nothing is constructed yet.
    pub fn register<F>(&self, metadata: PluginMetadata, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Arc<dyn TemplatePlugin> + Send + Sync + 'static,
    {
        let mut inner = self.write();
        if inner.entries.contains_key(&metadata.name) {
            return Err(RegistryError::DuplicatePlugin(metadata.name));
        }
        tracing::debug!(plugin = %metadata.name, runtime = %metadata.runtime, "Registered template plugin");
        inner.entries.insert(
            metadata.name.clone(),
            Registration {
                metadata,
                factory: Some(Arc::new(factory)),
            },
        );
        Ok(())
    }

    /// Register a concrete instance and cache it immediately.
    pub fn register_instance(&self, plugin: Arc<dyn TemplatePlugin>) -> Result<(), RegistryError> {
        let metadata = plugin.metadata().clone();
        let mut inner = self.write();
        if inner.entries.contains_key(&metadata.name) {
            return Err(RegistryError::DuplicatePlugin(metadata.name));
        }
        tracing::debug!(plugin = %metadata.name, "Registered template plugin instance");
        inner.instances.insert(metadata.name.clone(), plugin);
        inner.entries.insert(
            metadata.name.clone(),
            Registration {
                metadata,
                factory: None,
            },
        );
        Ok(())
    }

    /// Remove a registration and its cached instance, disposing the instance
    /// if it was initialized. Returns whether anything was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let (removed, instance) = {
            let mut inner = self.write();
            (
                inner.entries.remove(name).is_some(),
                inner.instances.remove(name),
            )
        };
        if let Some(plugin) = instance {
            if plugin.state().lifecycle() == Lifecycle::Initialized {
                if let Err(e) = plugin.dispose() {
                    tracing::warn!(plugin = %name, error = %e, "Failed to dispose unregistered plugin");
                }
            }
        }
        removed
    }

    pub fn has(&self, name: &str) -> bool {
        self.read().entries.contains_key(name)
    }

    pub fn get_metadata(&self, name: &str) -> Option<PluginMetadata> {
        self.read().entries.get(name).map(|r| r.metadata.clone())
    }

    /// Metadata of every registration, ordered by name.
    pub fn get_all_metadata(&self) -> Vec<PluginMetadata> {
        self.read()
            .entries
            .values()
            .map(|r| r.metadata.clone())
            .collect()
    }

    /// Registrations whose runtime matches `runtime`, case-insensitively.
    pub fn get_by_runtime(&self, runtime: &str) -> Vec<PluginMetadata> {
        self.read()
            .entries
            .values()
            .filter(|r| r.metadata.runtime.eq_ignore_ascii_case(runtime))
            .map(|r| r.metadata.clone())
            .collect()
    }

    /// Registrations producing files with `extension` (with or without the dot).
    pub fn get_by_extension(&self, extension: &str) -> Vec<PluginMetadata> {
        let extension = normalize_extension(extension);
        self.read()
            .entries
            .values()
            .filter(|r| r.metadata.file_extension.eq_ignore_ascii_case(&extension))
            .map(|r| r.metadata.clone())
            .collect()
    }

    /// Shared instance for `name`, constructed on first use.
    ///
    /// When `config` is given and the instance is constructed by this call,
    /// the instance is initialized with it. A cached instance is returned
    /// unchanged; `config` is ignored.
    pub fn get(
        &self,
        name: &str,
        config: Option<&PluginConfig>,
    ) -> Result<Arc<dyn TemplatePlugin>, RegistryError> {
        if let Some(plugin) = self.read().instances.get(name) {
            return Ok(Arc::clone(plugin));
        }

        let mut inner = self.write();
        // Another caller may have won the race between the two locks.
        if let Some(plugin) = inner.instances.get(name) {
            return Ok(Arc::clone(plugin));
        }
        let factory = Self::factory(&inner, name)?;
        let plugin = factory();
        if let Some(config) = config {
            plugin.initialize(&PluginContext::new(config.clone()))?;
        }
        inner.instances.insert(name.to_string(), Arc::clone(&plugin));
        tracing::debug!(plugin = %name, "Cached template plugin instance");
        Ok(plugin)
    }

    /// A fresh instance that is never cached.
    pub fn create(
        &self,
        name: &str,
        config: Option<&PluginConfig>,
    ) -> Result<Arc<dyn TemplatePlugin>, RegistryError> {
        let factory = Self::factory(&self.read(), name)?;
        let plugin = factory();
        if let Some(config) = config {
            plugin.initialize(&PluginContext::new(config.clone()))?;
        }
        Ok(plugin)
    }

    fn factory(inner: &Inner, name: &str) -> Result<PluginFactory, RegistryError> {
        let registration = inner
            .entries
            .get(name)
            .ok_or_else(|| RegistryError::UnregisteredPlugin(name.to_string()))?;
        registration
            .factory
            .clone()
            .ok_or_else(|| RegistryError::NotConstructible(name.to_string()))
    }

    /// Resolve the shared instance and initialize it with `context`.
    pub fn initialize(
        &self,
        name: &str,
        context: &PluginContext,
    ) -> Result<Arc<dyn TemplatePlugin>, RegistryError> {
        let plugin = self.get(name, None)?;
        plugin.initialize(context)?;
        Ok(plugin)
    }

    /// Render `tree` with the shared instance of `name`.
    pub fn render(&self, name: &str, tree: &GenRoot) -> Result<TemplateOutput, RegistryError> {
        let plugin = self.get(name, None)?;
        Ok(transform(tree, plugin.as_ref())?)
    }

    /// Dispose every cached, initialized instance and empty the cache.
    ///
    /// A failing plugin is logged and recorded; the remaining plugins are
    /// still disposed. Factory registrations are kept, so `get` constructs
    /// anew. Instance-only registrations cannot be rebuilt and are removed.
    pub fn dispose_all(&self) -> DisposeReport {
        let mut report = DisposeReport::default();
        let instances: Vec<(String, Arc<dyn TemplatePlugin>)> = {
            let mut inner = self.write();
            inner.entries.retain(|name, registration| {
                let keep = registration.factory.is_some();
                if !keep {
                    report.unregistered.push(name.clone());
                }
                keep
            });
            inner.instances.drain().collect()
        };

        for (name, plugin) in instances {
            if plugin.state().lifecycle() != Lifecycle::Initialized {
                continue;
            }
            match plugin.dispose() {
                Ok(()) => report.disposed.push(name),
                Err(e) => {
                    tracing::warn!(plugin = %name, error = %e, "Failed to dispose template plugin");
                    report.failures.push(e);
                }
            }
        }

        tracing::debug!(
            disposed = report.disposed.len(),
            failed = report.failures.len(),
            unregistered = report.unregistered.len(),
            "Disposed template plugins"
        );
        report
    }

    /// Drop every registration and cached instance without disposing.
    pub fn clear(&self) {
        let mut inner = self.write();
        inner.entries.clear();
        inner.instances.clear();
    }

    /// Number of registrations.
    pub fn size(&self) -> usize {
        self.read().entries.len()
    }
}
