//! The REST endpoint table.
//!
//! Every path the client calls is built here, relative to the configured API
//! base URL. One spelling of "practitioner" is used for every path.

use std::fmt;

use crate::entity::EntityId;

/// A top-level REST resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Providers,
    Practitioners,
    Patients,
    PatientReferrals,
}

impl Resource {
    /// Path segment of the collection, without slashes.
    pub fn segment(self) -> &'static str {
        match self {
            Resource::Providers => "providers",
            Resource::Practitioners => "practitioners",
            Resource::Patients => "patients",
            Resource::PatientReferrals => "patientreferrals",
        }
    }

    /// Lower-case singular noun used in messages ("Failed to fetch provider").
    pub fn singular(self) -> &'static str {
        match self {
            Resource::Providers => "provider",
            Resource::Practitioners => "practitioner",
            Resource::Patients => "patient",
            Resource::PatientReferrals => "referral",
        }
    }

    /// Capitalised singular noun used in confirmations ("Provider created").
    pub fn title(self) -> &'static str {
        match self {
            Resource::Providers => "Provider",
            Resource::Practitioners => "Practitioner",
            Resource::Patients => "Patient",
            Resource::PatientReferrals => "Referral",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// HTTP verbs the API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        })
    }
}

/// Which side of a referral a listing is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Sent,
    Received,
}

/// One addressable endpoint of the referral API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `/{resource}`
    Collection(Resource),
    /// `/{resource}/{id}`
    Item(Resource, EntityId),
    /// `/providers/{id}/practitioners`
    ProviderPractitioners(EntityId),
    /// `/providers/{id}/add_practitioner`
    AddPractitioner(EntityId),
    /// `/providers/{id}/remove_practitioner`
    RemovePractitioner(EntityId),
    /// `/{providers|practitioners}/{id}/referrals_sent|referrals_received`
    Referrals {
        owner: Resource,
        id: EntityId,
        direction: Direction,
    },
    /// `/providers/{id}/send_referral`
    SendReferral(EntityId),
}

impl Endpoint {
    /// Path relative to the API base URL, always starting with `/`.
    pub fn path(&self) -> String {
        match self {
            Endpoint::Collection(resource) => format!("/{}", resource.segment()),
            Endpoint::Item(resource, id) => format!("/{}/{}", resource.segment(), id),
            Endpoint::ProviderPractitioners(id) => format!("/providers/{}/practitioners", id),
            Endpoint::AddPractitioner(id) => format!("/providers/{}/add_practitioner", id),
            Endpoint::RemovePractitioner(id) => format!("/providers/{}/remove_practitioner", id),
            Endpoint::Referrals {
                owner,
                id,
                direction,
            } => {
                let leaf = match direction {
                    Direction::Sent => "referrals_sent",
                    Direction::Received => "referrals_received",
                };
                format!("/{}/{}/{}", owner.segment(), id, leaf)
            }
            Endpoint::SendReferral(id) => format!("/providers/{}/send_referral", id),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
