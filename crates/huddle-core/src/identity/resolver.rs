//! Identity resolver: author id to display profile, cached.
//!
//! Resolution is always best-effort -- a store failure yields `None`, never
//! an error, so identity lookup can never block message display. The bot
//! sentinel resolves to its fixed profile without a store round-trip.

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use huddle_types::message::AuthorRef;
use huddle_types::profile::Profile;

use crate::chat::repository::ProfileRepository;

/// Resolves author references to display profiles.
///
/// The cache is process-local, keyed by profile id, read-many/write-many.
/// Entries are merged (never overwritten with worse data) whenever a
/// fresher profile is observed, e.g. one attached to an incoming message.
pub struct IdentityResolver<P: ProfileRepository> {
    profiles: P,
    cache: DashMap<Uuid, Profile>,
}

impl<P: ProfileRepository> IdentityResolver<P> {
    /// Create a resolver backed by the given profile store.
    pub fn new(profiles: P) -> Self {
        Self {
            profiles,
            cache: DashMap::new(),
        }
    }

    /// Resolve an author to a profile.
    ///
    /// - The bot sentinel returns the fixed constant profile.
    /// - Authorless rows resolve to `None`.
    /// - User ids hit the cache first, then the store; a store failure
    ///   resolves to `None`.
    pub async fn resolve(&self, author: AuthorRef) -> Option<Profile> {
        let id = match author {
            AuthorRef::Bot => return Some(Profile::bot()),
            AuthorRef::None => return None,
            AuthorRef::User(id) => id,
        };

        if let Some(cached) = self.cache.get(&id) {
            return Some(cached.clone());
        }

        match self.profiles.get(&id).await {
            Ok(Some(profile)) => {
                self.cache.insert(id, profile.clone());
                Some(profile)
            }
            Ok(None) => None,
            Err(err) => {
                debug!(author_id = %id, error = %err, "profile lookup failed, rendering without identity");
                None
            }
        }
    }

    /// Merge a freshly observed profile into the cache.
    ///
    /// Field-wise last-writer-wins; present fields are never replaced by
    /// absent ones.
    pub fn observe(&self, profile: &Profile) {
        let Some(id) = profile.id else { return };
        self.cache
            .entry(id)
            .and_modify(|cached| cached.merge_from(profile))
            .or_insert_with(|| profile.clone());
    }

    /// Number of cached profiles.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Access the underlying profile store.
    pub fn profiles(&self) -> &P {
        &self.profiles
    }
}
