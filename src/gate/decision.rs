//! The redirect decision table.
//!
//! `decide` is a pure function of identity state, route class and profile
//! completeness. Rows are evaluated top to bottom, first match wins:
//!
//! ```text
//! identity   route                    complete  action
//! expired    any                      -         login (expired, redirectTo)
//! anonymous  auth                     -         pass
//! anonymous  protected | onboarding   -         login (redirectTo)
//! anonymous  public                   -         pass
//! signed in  onboarding               no        pass
//! signed in  onboarding               yes       dashboard
//! signed in  protected                no        onboarding
//! signed in  protected                yes       pass
//! signed in  auth                     -         dashboard
//! signed in  public                   -         pass
//! ```
//!
//! Incomplete users on the onboarding page always pass; sending them anywhere
//! else would bounce them between onboarding and the protected pages.

use url::form_urlencoded;

use crate::config::RoutesConfig;
use crate::gate::route::RouteClass;

/// What session resolution told us about the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityState {
    /// The refresh credential is gone; the user must sign in again.
    Expired,
    Anonymous,
    Authenticated,
}

/// Where a redirect sends the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    /// Login page carrying `redirectTo` (and `expired=true` if set).
    Login { expired: bool },
    Dashboard,
    Onboarding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PassThrough,
    Redirect(RedirectTarget),
}

impl Action {
    /// Metric/log label.
    pub fn label(self) -> &'static str {
        match self {
            Action::PassThrough => "pass",
            Action::Redirect(RedirectTarget::Login { expired: false }) => "login",
            Action::Redirect(RedirectTarget::Login { expired: true }) => "login_expired",
            Action::Redirect(RedirectTarget::Dashboard) => "dashboard",
            Action::Redirect(RedirectTarget::Onboarding) => "onboarding",
        }
    }
}

pub fn decide(identity: IdentityState, route: RouteClass, profile_complete: bool) -> Action {
    use Action::{PassThrough, Redirect};

    match (identity, route) {
        (IdentityState::Expired, _) => Redirect(RedirectTarget::Login { expired: true }),

        (IdentityState::Anonymous, RouteClass::Auth) => PassThrough,
        (IdentityState::Anonymous, RouteClass::Protected | RouteClass::Onboarding) => {
            Redirect(RedirectTarget::Login { expired: false })
        }
        (IdentityState::Anonymous, RouteClass::Public) => PassThrough,

        (IdentityState::Authenticated, RouteClass::Onboarding) if !profile_complete => PassThrough,
        (IdentityState::Authenticated, RouteClass::Onboarding) => {
            Redirect(RedirectTarget::Dashboard)
        }
        (IdentityState::Authenticated, RouteClass::Protected) if !profile_complete => {
            Redirect(RedirectTarget::Onboarding)
        }
        (IdentityState::Authenticated, RouteClass::Protected) => PassThrough,
        (IdentityState::Authenticated, RouteClass::Auth) => Redirect(RedirectTarget::Dashboard),
        (IdentityState::Authenticated, RouteClass::Public) => PassThrough,
    }
}

/// Concrete paths behind each redirect target.
#[derive(Debug, Clone)]
pub struct RedirectPaths {
    login: String,
    dashboard: String,
    onboarding: String,
}

impl RedirectPaths {
    pub fn from_config(config: &RoutesConfig) -> Self {
        Self {
            login: config.login_path.clone(),
            dashboard: config.dashboard_path.clone(),
            onboarding: config.onboarding_path.clone(),
        }
    }

    /// `Location` value for `target`; `original_path` feeds `redirectTo`.
    pub fn location(&self, target: RedirectTarget, original_path: &str) -> String {
        match target {
            RedirectTarget::Login { expired } => {
                let mut query = form_urlencoded::Serializer::new(String::new());
                if expired {
                    query.append_pair("expired", "true");
                }
                query.append_pair("redirectTo", original_path);
                format!("{}?{}", self.login, query.finish())
            }
            RedirectTarget::Dashboard => self.dashboard.clone(),
            RedirectTarget::Onboarding => self.onboarding.clone(),
        }
    }
}

impl Default for RedirectPaths {
    fn default() -> Self {
        Self::from_config(&RoutesConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Action::{PassThrough, Redirect};
    use IdentityState::{Anonymous, Authenticated, Expired};
    use RouteClass::{Auth, Onboarding, Protected, Public};

    const ALL_ROUTES: [RouteClass; 4] = [Auth, Onboarding, Protected, Public];

    #[test]
    fn test_expired_always_goes_to_login() {
        for route in ALL_ROUTES {
            for complete in [true, false] {
                assert_eq!(
                    decide(Expired, route, complete),
                    Redirect(RedirectTarget::Login { expired: true })
                );
            }
        }
    }

    #[test]
    fn test_anonymous_rows() {
        for complete in [true, false] {
            assert_eq!(decide(Anonymous, Auth, complete), PassThrough);
            assert_eq!(decide(Anonymous, Public, complete), PassThrough);
            assert_eq!(
                decide(Anonymous, Protected, complete),
                Redirect(RedirectTarget::Login { expired: false })
            );
            assert_eq!(
                decide(Anonymous, Onboarding, complete),
                Redirect(RedirectTarget::Login { expired: false })
            );
        }
    }

    #[test]
    fn test_authenticated_rows() {
        assert_eq!(decide(Authenticated, Onboarding, false), PassThrough);
        assert_eq!(
            decide(Authenticated, Onboarding, true),
            Redirect(RedirectTarget::Dashboard)
        );
        assert_eq!(
            decide(Authenticated, Protected, false),
            Redirect(RedirectTarget::Onboarding)
        );
        assert_eq!(decide(Authenticated, Protected, true), PassThrough);
        for complete in [true, false] {
            assert_eq!(
                decide(Authenticated, Auth, complete),
                Redirect(RedirectTarget::Dashboard)
            );
            assert_eq!(decide(Authenticated, Public, complete), PassThrough);
        }
    }

    #[test]
    fn test_incomplete_onboarding_never_redirects() {
        for _ in 0..10 {
            assert_eq!(decide(Authenticated, Onboarding, false), PassThrough);
        }
    }

    #[test]
    fn test_login_location_encoding() {
        let paths = RedirectPaths::default();
        assert_eq!(
            paths.location(RedirectTarget::Login { expired: false }, "/dashboard/x"),
            "/login?redirectTo=%2Fdashboard%2Fx"
        );
        assert_eq!(
            paths.location(RedirectTarget::Login { expired: true }, "/dashboard"),
            "/login?expired=true&redirectTo=%2Fdashboard"
        );
        assert_eq!(paths.location(RedirectTarget::Dashboard, "/login"), "/dashboard");
        assert_eq!(paths.location(RedirectTarget::Onboarding, "/search"), "/onboarding");
    }

    #[test]
    fn test_labels() {
        assert_eq!(PassThrough.label(), "pass");
        assert_eq!(Redirect(RedirectTarget::Login { expired: true }).label(), "login_expired");
    }
}
