//! Live state of the reference host application.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything the host application can be configured with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostState {
    /// General system settings.
    pub system: SystemConfig,

    /// Authentication and user settings.
    pub security: SecurityConfig,

    /// Tool installations available to jobs.
    pub tools: ToolsConfig,
}

/// General system settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    /// Banner shown on the front page.
    #[serde(default)]
    pub system_message: Option<String>,

    /// Number of concurrent executors.
    #[serde(default = "default_executors")]
    pub executors: u32,

    /// Scheduling mode.
    #[serde(default)]
    pub mode: Mode,

    /// Labels advertised by this node.
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            system_message: None,
            executors: default_executors(),
            mode: Mode::default(),
            labels: Vec::new(),
        }
    }
}

/// How work is scheduled onto this node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Run any job.
    #[default]
    Normal,
    /// Only run jobs that ask for one of this node's labels.
    Exclusive,
}

/// Authentication and user settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    /// User database.
    #[serde(default)]
    pub realm: RealmConfig,

    /// Ids of users with administrative permission.
    #[serde(default)]
    pub admins: Vec<String>,
}

/// Built-in user database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RealmConfig {
    /// Whether visitors may create accounts.
    #[serde(default)]
    pub allow_signup: bool,

    /// Predefined users.
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

/// One predefined user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    /// Login id.
    pub id: String,

    /// Display name; defaults to the id.
    #[serde(default)]
    pub name: Option<String>,
}

/// Tool installations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Known installations, by name.
    #[serde(default)]
    pub installations: Vec<ToolInstallation>,
}

/// One installed tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolInstallation {
    /// Name jobs use to refer to the installation.
    pub name: String,

    /// Installation directory.
    pub home: PathBuf,
}

fn default_executors() -> u32 {
    2
}
