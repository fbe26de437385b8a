//! Administrative surface: management page metadata, permission checks, and
//! the reload trigger.

pub mod metrics;
pub mod server;

use std::sync::Arc;

use tracing::{info, warn};

use crate::engine::{ConfigurationEngine, LoadReport};
use crate::error::ConfigError;
pub use metrics::Metrics;
pub use server::AdminServer;

/// Metadata of the management page.
pub struct ManagementLink;

impl ManagementLink {
    pub const DISPLAY_NAME: &'static str = "Configuration as Code";
    pub const URL_NAME: &'static str = "configuration-as-code";
    pub const ICON: &'static str = "/static/casc/logo-head.svg";
    pub const DESCRIPTION: &'static str =
        "Configure the application from human-readable declarative configuration files";

    /// Path of the management page.
    pub fn page_path() -> String {
        format!("/{}/", Self::URL_NAME)
    }
}

/// What a caller presented to prove its identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    token: Option<String>,
}

impl Credentials {
    /// A caller that presented nothing.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A caller presenting a bearer token.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Extracts a bearer token from an `Authorization` header value.
    pub fn from_authorization(header: Option<&str>) -> Self {
        let token = header
            .and_then(|h| h.trim().strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Self { token }
    }

    /// The presented token, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/// Decides whether a caller may perform administrative actions.
#[cfg_attr(test, mockall::automock)]
pub trait Authorizer: Send + Sync {
    /// Returns true when `credentials` grant administrative permission.
    fn is_administrator(&self, credentials: &Credentials) -> bool;
}

/// Grants administrative permission to callers presenting a shared token.
///
/// Without a configured token nobody is an administrator.
#[derive(Debug, Clone, Default)]
pub struct TokenAuthorizer {
    token: Option<String>,
}

impl TokenAuthorizer {
    /// Creates an authorizer; blank tokens are treated as unset.
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }
}

impl Authorizer for TokenAuthorizer {
    fn is_administrator(&self, credentials: &Credentials) -> bool {
        match (&self.token, credentials.token()) {
            (Some(expected), Some(given)) => {
                constant_time_eq(expected.as_bytes(), given.as_bytes())
            }
            _ => false,
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Result of a reload request.
#[derive(Debug)]
pub enum ReloadOutcome {
    /// The configuration was reloaded; the caller should be sent to `redirect`.
    Reloaded { report: LoadReport, redirect: String },
    /// The caller lacks permission. Nothing happened.
    Denied,
}

/// Re-runs the engine on behalf of an administrator.
pub struct ReloadTrigger {
    engine: Arc<ConfigurationEngine>,
    authorizer: Arc<dyn Authorizer>,
}

impl ReloadTrigger {
    /// Creates a trigger for `engine`, gated by `authorizer`.
    pub fn new(engine: Arc<ConfigurationEngine>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self { engine, authorizer }
    }

    /// Runs a full load cycle if `credentials` are authorized.
    ///
    /// Unauthorized callers get [`ReloadOutcome::Denied`] and no error.
    pub fn reload(&self, credentials: &Credentials) -> Result<ReloadOutcome, ConfigError> {
        if !self.authorizer.is_administrator(credentials) {
            warn!("Ignoring reload request without administrative permission");
            return Ok(ReloadOutcome::Denied);
        }

        let report = self.engine.configure()?;
        info!(id = %report.id, sources = ?report.source_names(), "Reload completed");

        Ok(ReloadOutcome::Reloaded {
            report,
            redirect: ManagementLink::page_path(),
        })
    }

    /// The engine this trigger reloads.
    pub fn engine(&self) -> &Arc<ConfigurationEngine> {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FixedProperties, SourceResolver};
    use crate::configurator::RegistryBuilder;
    use mockall::predicate::eq;
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> Arc<ConfigurationEngine> {
        let registry = RegistryBuilder::new().build().unwrap();
        Arc::new(
            ConfigurationEngine::new(Arc::new(registry), Arc::new(FixedProperties::new()))
                .with_resolver(
                    SourceResolver::new().with_default_path(dir.path().join("casc.yaml")),
                ),
        )
    }

    #[test]
    fn denied_reload_is_silent_and_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut authorizer = MockAuthorizer::new();
        authorizer
            .expect_is_administrator()
            .with(eq(Credentials::bearer("guess")))
            .times(1)
            .return_const(false);

        let trigger = ReloadTrigger::new(engine(&dir), Arc::new(authorizer));
        let outcome = trigger.reload(&Credentials::bearer("guess")).unwrap();

        assert!(matches!(outcome, ReloadOutcome::Denied));
        assert_eq!(trigger.engine().last_loaded(), None);
    }

    #[test]
    fn authorized_reload_runs_configure_and_redirects() {
        let dir = TempDir::new().unwrap();
        let mut authorizer = MockAuthorizer::new();
        authorizer.expect_is_administrator().return_const(true);

        let trigger = ReloadTrigger::new(engine(&dir), Arc::new(authorizer));
        let outcome = trigger.reload(&Credentials::bearer("secret")).unwrap();

        match outcome {
            ReloadOutcome::Reloaded { report, redirect } => {
                assert!(report.sources.is_empty());
                assert_eq!(redirect, "/configuration-as-code/");
            }
            ReloadOutcome::Denied => panic!("reload was denied"),
        }
        assert!(trigger.engine().last_loaded().is_some());
    }

    #[test]
    fn authorized_reload_propagates_load_failures() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("casc.yaml"), "unknown: {}\n").unwrap();
        let mut authorizer = MockAuthorizer::new();
        authorizer.expect_is_administrator().return_const(true);

        let trigger = ReloadTrigger::new(engine(&dir), Arc::new(authorizer));
        let err = trigger.reload(&Credentials::bearer("secret")).unwrap_err();

        assert!(matches!(
            err,
            ConfigError::UnknownRootElement { ref name, .. } if name == "unknown"
        ));
        assert_eq!(trigger.engine().last_loaded(), None);
    }

    #[test]
    fn token_authorizer_requires_matching_token() {
        let authorizer = TokenAuthorizer::new(Some("s3cret".to_string()));
        assert!(authorizer.is_administrator(&Credentials::bearer("s3cret")));
        assert!(!authorizer.is_administrator(&Credentials::bearer("s3cre")));
        assert!(!authorizer.is_administrator(&Credentials::bearer("S3CRET")));
        assert!(!authorizer.is_administrator(&Credentials::anonymous()));
    }

    #[test]
    fn token_authorizer_without_token_denies_everyone() {
        for authorizer in [TokenAuthorizer::new(None), TokenAuthorizer::new(Some("  ".into()))] {
            assert!(!authorizer.is_administrator(&Credentials::bearer("")));
            assert!(!authorizer.is_administrator(&Credentials::bearer("anything")));
            assert!(!authorizer.is_administrator(&Credentials::anonymous()));
        }
    }

    #[test]
    fn credentials_parse_bearer_header() {
        assert_eq!(
            Credentials::from_authorization(Some("Bearer abc123")),
            Credentials::bearer("abc123")
        );
        assert_eq!(
            Credentials::from_authorization(Some("Basic dXNlcjpwYXNz")),
            Credentials::anonymous()
        );
        assert_eq!(Credentials::from_authorization(Some("Bearer ")), Credentials::anonymous());
        assert_eq!(Credentials::from_authorization(None), Credentials::anonymous());
    }
}
