//! Route table and session gate.
//!
//! Paths map to `Route`s; `resolve` applies the session gate. The gate only
//! looks at whether a token is held. It never calls the API.

use std::fmt;

use referral_contracts::{endpoint::Resource, entity::EntityId};

use crate::session::SessionState;

/// Every screen the front-ends can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Providers,
    ProviderNew,
    ProviderView(EntityId),
    ProviderEdit(EntityId),
    AddPractitioner(EntityId),
    SendReferral(EntityId),
    Practitioners,
    PractitionerNew,
    PractitionerView(EntityId),
    PractitionerEdit(EntityId),
    Patients,
    PatientNew,
    PatientView(EntityId),
    PatientEdit(EntityId),
    ReferralView(EntityId),
    ReferralEdit(EntityId),
}

/// Top-level sections listed in the navigation bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavSection {
    Providers,
    Practitioners,
    Patients,
}

impl NavSection {
    pub const ALL: [NavSection; 3] = [
        NavSection::Providers,
        NavSection::Practitioners,
        NavSection::Patients,
    ];

    pub fn label(self) -> &'static str {
        match self {
            NavSection::Providers => "Providers",
            NavSection::Practitioners => "Practitioners",
            NavSection::Patients => "Patients",
        }
    }

    /// The list route a section opens on.
    pub fn route(self) -> Route {
        match self {
            NavSection::Providers => Route::Providers,
            NavSection::Practitioners => Route::Practitioners,
            NavSection::Patients => Route::Patients,
        }
    }
}

impl Route {
    /// Parse a path such as `/providers/12/edit`.
    ///
    /// `/` and the empty path map to `Providers`. Unknown paths and
    /// non-numeric IDs return `None`.
    pub fn parse(path: &str) -> Option<Route> {
        let segments: Vec<&str> = path
            .trim()
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        fn id(s: &str) -> Option<EntityId> {
            s.parse().ok()
        }

        let route = match segments.as_slice() {
            [] => Route::Providers,
            ["login"] => Route::Login,

            ["providers"] => Route::Providers,
            ["providers", "new"] => Route::ProviderNew,
            ["providers", n] => Route::ProviderView(id(n)?),
            ["providers", n, "edit"] => Route::ProviderEdit(id(n)?),
            ["providers", n, "add_practitioner"] => Route::AddPractitioner(id(n)?),
            ["providers", n, "send_referral"] => Route::SendReferral(id(n)?),

            ["practitioners"] => Route::Practitioners,
            ["practitioners", "new"] => Route::PractitionerNew,
            ["practitioners", n] => Route::PractitionerView(id(n)?),
            ["practitioners", n, "edit"] => Route::PractitionerEdit(id(n)?),

            ["patients"] => Route::Patients,
            ["patients", "new"] => Route::PatientNew,
            ["patients", n] => Route::PatientView(id(n)?),
            ["patients", n, "edit"] => Route::PatientEdit(id(n)?),

            ["patientreferrals", n] => Route::ReferralView(id(n)?),
            ["patientreferrals", n, "edit"] => Route::ReferralEdit(id(n)?),

            _ => return None,
        };
        Some(route)
    }

    /// The canonical path of this route.
    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Providers => "/providers".to_string(),
            Route::ProviderNew => "/providers/new".to_string(),
            Route::ProviderView(id) => format!("/providers/{}", id),
            Route::ProviderEdit(id) => format!("/providers/{}/edit", id),
            Route::AddPractitioner(id) => format!("/providers/{}/add_practitioner", id),
            Route::SendReferral(id) => format!("/providers/{}/send_referral", id),
            Route::Practitioners => "/practitioners".to_string(),
            Route::PractitionerNew => "/practitioners/new".to_string(),
            Route::PractitionerView(id) => format!("/practitioners/{}", id),
            Route::PractitionerEdit(id) => format!("/practitioners/{}/edit", id),
            Route::Patients => "/patients".to_string(),
            Route::PatientNew => "/patients/new".to_string(),
            Route::PatientView(id) => format!("/patients/{}", id),
            Route::PatientEdit(id) => format!("/patients/{}/edit", id),
            Route::ReferralView(id) => format!("/patientreferrals/{}", id),
            Route::ReferralEdit(id) => format!("/patientreferrals/{}/edit", id),
        }
    }

    /// Everything except the login screen needs a token.
    pub fn is_protected(&self) -> bool {
        !matches!(self, Route::Login)
    }

    /// The navigation section this route belongs to, for highlighting.
    pub fn section(&self) -> Option<NavSection> {
        match self {
            Route::Login => None,
            Route::Providers
            | Route::ProviderNew
            | Route::ProviderView(_)
            | Route::ProviderEdit(_)
            | Route::AddPractitioner(_)
            | Route::SendReferral(_)
            | Route::ReferralView(_)
            | Route::ReferralEdit(_) => Some(NavSection::Providers),
            Route::Practitioners
            | Route::PractitionerNew
            | Route::PractitionerView(_)
            | Route::PractitionerEdit(_) => Some(NavSection::Practitioners),
            Route::Patients | Route::PatientNew | Route::PatientView(_) | Route::PatientEdit(_) => {
                Some(NavSection::Patients)
            }
        }
    }

    /// The list route for `resource`.
    pub fn list(resource: Resource) -> Route {
        match resource {
            Resource::Providers | Resource::PatientReferrals => Route::Providers,
            Resource::Practitioners => Route::Practitioners,
            Resource::Patients => Route::Patients,
        }
    }

    /// The view route for one record of `resource`.
    pub fn view(resource: Resource, id: EntityId) -> Route {
        match resource {
            Resource::Providers => Route::ProviderView(id),
            Resource::Practitioners => Route::PractitionerView(id),
            Resource::Patients => Route::PatientView(id),
            Resource::PatientReferrals => Route::ReferralView(id),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Apply the session gate to a requested route.
///
/// Protected routes show Login while unauthenticated; Login itself bounces
/// to Providers once a token is held.
pub fn resolve(route: Route, state: SessionState) -> Route {
    match (state, route) {
        (SessionState::Unauthenticated, r) if r.is_protected() => Route::Login,
        (SessionState::Authenticated, Route::Login) => Route::Providers,
        (_, r) => r,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use referral_contracts::entity::EntityId;

    use super::{resolve, NavSection, Route};
    use crate::{
        session::{Session, SessionState},
        testing::MemoryStore,
    };

    #[test]
    fn root_maps_to_providers() {
        assert_eq!(Route::parse("/"), Some(Route::Providers));
        assert_eq!(Route::parse(""), Some(Route::Providers));
    }

    #[test]
    fn parse_and_path_agree() {
        let routes = [
            Route::Login,
            Route::ProviderNew,
            Route::ProviderEdit(EntityId(3)),
            Route::AddPractitioner(EntityId(3)),
            Route::SendReferral(EntityId(3)),
            Route::PractitionerView(EntityId(8)),
            Route::PatientEdit(EntityId(5)),
            Route::ReferralEdit(EntityId(9)),
        ];
        for route in routes {
            assert_eq!(Route::parse(&route.path()), Some(route), "{}", route);
        }
    }

    #[test]
    fn unknown_or_non_numeric_paths_are_rejected() {
        assert_eq!(Route::parse("/providers/abc"), None);
        assert_eq!(Route::parse("/billing"), None);
        assert_eq!(Route::parse("/patientreferrals"), None);
    }

    #[test]
    fn protected_routes_gate_to_login() {
        assert_eq!(
            resolve(Route::PatientView(EntityId(1)), SessionState::Unauthenticated),
            Route::Login
        );
        assert_eq!(
            resolve(Route::Login, SessionState::Unauthenticated),
            Route::Login
        );
    }

    #[test]
    fn login_bounces_to_providers_when_authenticated() {
        assert_eq!(
            resolve(Route::Login, SessionState::Authenticated),
            Route::Providers
        );
        assert_eq!(
            resolve(Route::Patients, SessionState::Authenticated),
            Route::Patients
        );
    }

    #[test]
    fn logout_shows_login_for_any_route() {
        let session = Session::restore(Arc::new(MemoryStore::with_token("abc"))).unwrap();
        let here = Route::ProviderEdit(EntityId(2));
        assert_eq!(resolve(here, session.state()), here);

        session.logout().unwrap();

        for path in ["/", "/providers/2/edit", "/patients", "/patientreferrals/4"] {
            let route = Route::parse(path).unwrap();
            assert_eq!(resolve(route, session.state()), Route::Login);
        }
    }

    #[test]
    fn referral_screens_highlight_providers() {
        assert_eq!(
            Route::ReferralView(EntityId(1)).section(),
            Some(NavSection::Providers)
        );
        assert_eq!(Route::PatientNew.section(), Some(NavSection::Patients));
        assert_eq!(Route::Login.section(), None);
    }
}
