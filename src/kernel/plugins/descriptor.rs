use serde::Serialize;
use std::sync::Arc;

use super::context::PluginContext;
use super::PluginError;
use crate::kernel::services::ports::EditorSurface;

pub type HookResult = Result<(), PluginError>;

pub type BeforeMountHook = Arc<dyn Fn(&dyn EditorSurface) -> HookResult + Send + Sync>;
pub type MountHook = Arc<dyn Fn(&PluginContext) -> HookResult + Send + Sync>;
pub type ContentChangeHook = Arc<dyn Fn(&PluginContext, &str) + Send + Sync>;
pub type DisposeHook = Arc<dyn Fn() + Send + Sync>;

/// Optional lifecycle callbacks. Absent hooks are skipped by the runtime.
#[derive(Clone, Default)]
pub struct PluginHooks {
    pub on_before_mount: Option<BeforeMountHook>,
    pub on_mount: Option<MountHook>,
    pub on_content_change: Option<ContentChangeHook>,
    pub on_dispose: Option<DisposeHook>,
}

#[derive(Clone)]
pub struct PluginDescriptor {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    /// Higher mounts earlier.
    pub priority: i32,
    pub dependencies: Vec<String>,
    pub hooks: PluginHooks,
}

impl PluginDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: "0.1.0".to_string(),
            description: None,
            priority: 0,
            dependencies: Vec::new(),
            hooks: PluginHooks::default(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    pub fn on_before_mount<F>(mut self, hook: F) -> Self
    where
        F: Fn(&dyn EditorSurface) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.on_before_mount = Some(Arc::new(hook));
        self
    }

    pub fn on_mount<F>(mut self, hook: F) -> Self
    where
        F: Fn(&PluginContext) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.on_mount = Some(Arc::new(hook));
        self
    }

    pub fn on_content_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&PluginContext, &str) + Send + Sync + 'static,
    {
        self.hooks.on_content_change = Some(Arc::new(hook));
        self
    }

    pub fn on_dispose<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.on_dispose = Some(Arc::new(hook));
        self
    }
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("priority", &self.priority)
            .field("dependencies", &self.dependencies)
            .field("on_before_mount", &self.hooks.on_before_mount.is_some())
            .field("on_mount", &self.hooks.on_mount.is_some())
            .field("on_content_change", &self.hooks.on_content_change.is_some())
            .field("on_dispose", &self.hooks.on_dispose.is_some())
            .finish()
    }
}

/// Read-only registry row for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub priority: i32,
    pub dependencies: Vec<String>,
    pub enabled: bool,
}

impl PluginInfo {
    pub(crate) fn from_descriptor(descriptor: &PluginDescriptor, enabled: bool) -> Self {
        Self {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            description: descriptor.description.clone(),
            priority: descriptor.priority,
            dependencies: descriptor.dependencies.clone(),
            enabled,
        }
    }
}
