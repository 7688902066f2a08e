//! Process-wide member identity
//!
//! Read on every request to populate the identity header, written rarely
//! (sign-in, sign-out).

use backstop_domain::{is_valid_header_value, BackstopError, Result};
use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct SessionIdentity {
    member_id: RwLock<Option<String>>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// See [`Self::set_member_id`].
    pub fn with_member_id(member_id: impl Into<String>) -> Result<Self> {
        let identity = Self::new();
        identity.set_member_id(member_id)?;
        Ok(identity)
    }

    pub fn member_id(&self) -> Option<String> {
        self.member_id.read().clone()
    }

    /// Blank ids clear the identity.
    ///
    /// # Errors
    ///
    /// Returns [`BackstopError::InvalidInput`] when the id cannot be sent as
    /// a header value (control characters or non-ASCII); the previous id is
    /// kept.
    pub fn set_member_id(&self, member_id: impl Into<String>) -> Result<()> {
        let member_id = member_id.into();
        if !is_valid_header_value(&member_id) {
            return Err(BackstopError::InvalidInput(format!(
                "member id {member_id:?} is not a valid header value"
            )));
        }
        let next = if member_id.trim().is_empty() { None } else { Some(member_id) };
        *self.member_id.write() = next;
        Ok(())
    }

    pub fn clear(&self) {
        *self.member_id.write() = None;
    }
}
