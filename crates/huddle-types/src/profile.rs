//! Profile types.
//!
//! Profiles are owned by the external identity system; this core only reads
//! and caches them. The bot renders with a fixed profile regardless of what
//! the store holds for its id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved username of the assistant's profile row.
pub const BOT_USERNAME: &str = "huddle-bot";

/// Display name the bot always renders with.
pub const BOT_DISPLAY_NAME: &str = "Huddle Bot";

/// A user profile as read from the profile store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(rename = "full_name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Profile {
    /// The fixed profile the bot sentinel always resolves to.
    ///
    /// No store round-trip: the display identity is constant even when the
    /// profile store has a row for the bot's id.
    pub fn bot() -> Self {
        Self {
            id: None,
            username: Some(BOT_USERNAME.to_string()),
            display_name: Some(BOT_DISPLAY_NAME.to_string()),
            avatar_url: None,
            email: None,
        }
    }

    /// Merge a fresher observation into this profile.
    ///
    /// Field-wise last-writer-wins, but a present field is never replaced
    /// by an absent one.
    pub fn merge_from(&mut self, fresher: &Profile) {
        if fresher.id.is_some() {
            self.id = fresher.id;
        }
        if fresher.username.is_some() {
            self.username = fresher.username.clone();
        }
        if fresher.display_name.is_some() {
            self.display_name = fresher.display_name.clone();
        }
        if fresher.avatar_url.is_some() {
            self.avatar_url = fresher.avatar_url.clone();
        }
        if fresher.email.is_some() {
            self.email = fresher.email.clone();
        }
    }
}
