//! Plugin system: registry, per-editor lifecycle runtime, context facade and
//! the event bus plugins talk over.

pub mod builtin;
pub mod bus;
pub mod context;
pub mod descriptor;
pub mod registry;
pub mod runtime;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

pub use bus::{Disposable, EventBus, EventHandler};
pub use context::PluginContext;
pub use descriptor::{HookResult, PluginDescriptor, PluginHooks, PluginInfo};
pub use registry::{PluginRegistry, RegistryEvent, RegistryObserver};
pub use runtime::{LifecyclePhase, PluginDiagnostic, PluginLifecycle, PluginRuntime};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    #[error("{0}")]
    Hook(String),
    #[error("plugin panicked: {0}")]
    Panic(String),
}

impl PluginError {
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook(message.into())
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs a plugin hook, turning a panic into [`PluginError::Panic`].
pub(crate) fn guarded<F>(hook: F) -> HookResult
where
    F: FnOnce() -> HookResult,
{
    match panic::catch_unwind(AssertUnwindSafe(hook)) {
        Ok(result) => result,
        Err(payload) => Err(PluginError::Panic(panic_message(payload.as_ref()))),
    }
}
