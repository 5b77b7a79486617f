//! Profile read and update.

use crate::service::ConferenceService;
use conference_core::error::Result;
use conference_core::model::{Caller, Profile, ProfileForm};
use tracing::instrument;

impl ConferenceService {
    /// The caller's profile, created with defaults on first access.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the store fails.
    #[instrument(skip(self, caller), fields(user = %caller.user_id))]
    pub async fn get_profile(&self, caller: &Caller) -> Result<Profile> {
        self.transact(vec![caller.profile_key()], |txn| Ok(txn.profile_mut(caller)?.clone()))
            .await
    }

    /// Apply the non-empty fields of `form` to the caller's profile.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the store fails.
    #[instrument(skip(self, caller, form), fields(user = %caller.user_id))]
    pub async fn save_profile(&self, caller: &Caller, form: ProfileForm) -> Result<Profile> {
        self.transact(vec![caller.profile_key()], |txn| {
            let profile = txn.profile_mut(caller)?;
            if let Some(name) = form.display_name.as_deref().filter(|n| !n.trim().is_empty()) {
                profile.display_name = name.to_string();
            }
            if let Some(size) = form.tee_shirt_size {
                profile.tee_shirt_size = size;
            }
            Ok(profile.clone())
        })
        .await
    }
}
