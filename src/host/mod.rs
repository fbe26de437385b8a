//! Reference host application.
//!
//! A small application whose live state is driven entirely through
//! configurators. The command-line tool runs against it.

pub mod model;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::ensure;

use crate::configurator::{Attribute, ConfiguratorRegistry, RegistryBuilder, SectionConfigurator};
use crate::error::RegistryError;
pub use model::{
    HostState, Mode, RealmConfig, SecurityConfig, SystemConfig, ToolInstallation, ToolsConfig,
    UserConfig,
};

/// Live state shared between the configurators and the rest of the host.
#[derive(Debug, Default)]
pub struct LiveState {
    inner: RwLock<HostState>,
}

impl LiveState {
    /// Creates a host in its default state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> HostState {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut HostState)) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }
}

/// Builds the registry of the host's configurators, bound to `state`.
///
/// Each root element replaces its whole section of the live state.
pub fn registry(state: &Arc<LiveState>) -> Result<ConfiguratorRegistry, RegistryError> {
    let system = {
        let state = Arc::clone(state);
        SectionConfigurator::<SystemConfig>::new("system")
            .attribute(Attribute::of::<String>("system_message"))
            .attribute(Attribute::of::<u32>("executors"))
            .attribute(Attribute::of::<Mode>("mode"))
            .attribute(Attribute::of::<String>("labels").multiple())
            .on_apply(move |system| {
                ensure!(system.executors > 0, "executors must be at least 1");
                state.update(|s| s.system = system);
                Ok(())
            })
    };

    let security = {
        let state = Arc::clone(state);
        SectionConfigurator::<SecurityConfig>::new("security")
            .attribute(Attribute::of::<RealmConfig>("realm"))
            .attribute(Attribute::of::<String>("admins").multiple())
            .on_apply(move |security| {
                let mut ids = HashSet::new();
                for user in &security.realm.users {
                    ensure!(ids.insert(user.id.as_str()), "duplicate user '{}'", user.id);
                }
                for admin in &security.admins {
                    ensure!(ids.contains(admin.as_str()), "admin '{}' is not a known user", admin);
                }
                state.update(|s| s.security = security);
                Ok(())
            })
    };

    let tools = {
        let state = Arc::clone(state);
        SectionConfigurator::<ToolsConfig>::new("tools")
            .attribute(Attribute::of::<ToolInstallation>("installations").multiple())
            .on_apply(move |tools| {
                let mut names = HashSet::new();
                for tool in &tools.installations {
                    ensure!(names.insert(tool.name.as_str()), "duplicate tool '{}'", tool.name);
                }
                state.update(|s| s.tools = tools);
                Ok(())
            })
    };

    RegistryBuilder::new()
        .root_for::<SystemConfig>(system)
        .root_for::<SecurityConfig>(security)
        .root_for::<ToolsConfig>(tools)
        .nested::<RealmConfig>(
            SectionConfigurator::<RealmConfig>::new("realm")
                .attribute(Attribute::of::<bool>("allow_signup"))
                .attribute(Attribute::of::<UserConfig>("users").multiple()),
        )
        .nested::<UserConfig>(
            SectionConfigurator::<UserConfig>::new("user")
                .attribute(Attribute::of::<String>("id"))
                .attribute(Attribute::of::<String>("name")),
        )
        .nested::<ToolInstallation>(
            SectionConfigurator::<ToolInstallation>::new("installation")
                .attribute(Attribute::of::<String>("name"))
                .attribute(Attribute::of::<PathBuf>("home")),
        )
        .build()
}
