//! services/api/src/adapters/auth.rs
//!
//! This module contains the admin-auth adapter, implementing the
//! `AuthValidator` port with a static token shared with the admin
//! frontend. Account management proper lives outside this service.

use async_trait::async_trait;

use cohort_core::ports::{AuthValidator, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `AuthValidator` port against a
/// configured shared token.
#[derive(Clone)]
pub struct StaticTokenAuth {
    admin_token: String,
}

impl StaticTokenAuth {
    /// Creates a new `StaticTokenAuth`.
    pub fn new(admin_token: String) -> Self {
        Self { admin_token }
    }
}

//=========================================================================================
// `AuthValidator` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthValidator for StaticTokenAuth {
    async fn validate_admin(&self, token: &str) -> PortResult<()> {
        if token == self.admin_token {
            Ok(())
        } else {
            Err(PortError::Unauthorized)
        }
    }
}
