//! # referral-core
//!
//! Front-end logic for the referral desk, independent of any terminal or
//! HTTP library.
//!
//! This crate provides:
//! - The two trait seams (`Transport`, `TokenStore`)
//! - `Session`, the explicitly passed bearer-token holder
//! - `ApiClient`, which maps HTTP statuses to `ReferralError`
//! - Referral enrichment (`resolve_labels`, `enrich_referral`)
//! - The route table and session gate
//! - List, view and form screen state used by both front-ends
//!
//! ## Usage
//!
//! ```rust,ignore
//! use referral_core::{ApiClient, Session, screens::list::ListScreen};
//!
//! let session = Session::restore(store)?;
//! let client = ApiClient::new(transport, session);
//! let mut providers = ListScreen::<Provider>::new(Resource::Providers);
//! providers.load(&client).await;
//! ```

pub mod client;
pub mod display;
pub mod enrich;
pub mod router;
pub mod screens;
pub mod session;
pub mod traits;

#[cfg(test)]
mod testing;

pub use client::ApiClient;
pub use router::{resolve, NavSection, Route};
pub use session::{Session, SessionState};
