//! Account provisioning: auth identity, profile row, role row.
//!
//! DESIGN
//! ======
//! Creating a console user touches three stores with no transaction across
//! them: the auth provider, then `profiles`, then `user_roles`. A failure
//! part-way is compensated in reverse order (profile, then identity) so a
//! failed creation leaves nothing behind. If compensation itself fails the
//! error says so (`orphaned`) and the leftover ids are logged.
//!
//! The admin-only path (`create_user`) re-reads the actor's roles right
//! before acting and asks the policy. Self sign-up (`register`) runs the
//! same sequence with the staff role and no admin check.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::forms::AfterSubmit;
use super::inflight::GuardError;
use super::notice::Notice;
use super::policy::{Action, Authorizer, Decision, Subject};
use super::validate::{FieldErrors, required_choice, required_email, text_between};
use crate::backend::{AuthProvider, BackendError, Identity, RecordStore, SignUp};
use crate::error::{ApiError, ErrorCode};
use crate::model::{NewProfileRow, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStep {
    RoleCheck,
    SignUp,
    Profile,
    Role,
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("{0}")]
    Invalid(FieldErrors),
    #[error("sign in required")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{source}")]
    Failed {
        step: ProvisionStep,
        source: BackendError,
        /// Compensation failed; part of the account is left in place.
        orphaned: bool,
    },
    #[error(transparent)]
    Guard(#[from] GuardError),
}

impl ErrorCode for ProvisionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid(e) => e.error_code(),
            Self::Unauthenticated => "E_UNAUTHENTICATED",
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::Failed { orphaned: true, .. } => "E_PARTIAL",
            Self::Failed { source, .. } => source.error_code(),
            Self::Guard(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Invalid(e) => e.status(),
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Failed { orphaned: true, .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Failed { source, .. } => source.status(),
            Self::Guard(e) => e.status(),
        }
    }
}

impl From<ProvisionError> for ApiError {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::Invalid(fields) => fields.into(),
            other => ApiError::from_code(&other),
        }
    }
}

// =============================================================================
// FORMS
// =============================================================================

/// Admin "new user" dialog fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

impl Default for NewUser {
    fn default() -> Self {
        Self { name: String::new(), email: String::new(), password: String::new(), role: Role::Staff.as_str().to_owned() }
    }
}

/// Self sign-up fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

fn validate_credentials(errors: &mut FieldErrors, name: &str, email: &str, password: &str) -> (String, String, String) {
    let name = text_between(errors, "name", "Nome", name, 3, 100);
    let email = required_email(errors, "email", email);
    let password_len = password.chars().count();
    if password_len < 6 {
        errors.add("password", "Senha deve ter no mínimo 6 caracteres");
    } else if password_len > 100 {
        errors.add("password", "Senha deve ter no máximo 100 caracteres");
    }
    (name, email, password.to_owned())
}

impl NewUser {
    /// # Errors
    ///
    /// Every failing field.
    pub fn validate(&self) -> Result<NewAccount, FieldErrors> {
        let mut errors = FieldErrors::new();
        let (name, email, password) = validate_credentials(&mut errors, &self.name, &self.email, &self.password);
        let role = required_choice(&mut errors, "role", &self.role, Role::parse, "Função inválida");
        errors.finish(|| NewAccount { name, email, password, role })
    }
}

impl Registration {
    /// # Errors
    ///
    /// Every failing field.
    pub fn validate(&self) -> Result<NewAccount, FieldErrors> {
        let mut errors = FieldErrors::new();
        let (name, email, password) = validate_credentials(&mut errors, &self.name, &self.email, &self.password);
        errors.finish(|| NewAccount { name, email, password, role: Role::Staff })
    }
}

// =============================================================================
// PROVISIONING
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Provisioned {
    pub identity: Identity,
    pub role: Role,
    pub reload: AfterSubmit,
    pub notice: Notice,
}

/// The collaborators one provisioning run needs.
pub struct Provisioner<'a> {
    pub records: &'a dyn RecordStore,
    pub auth: &'a dyn AuthProvider,
    /// Where the confirmation link sends the new user (console root).
    pub redirect_to: String,
}

impl Provisioner<'_> {
    /// Admin path: validate, re-check the actor's roles, then provision.
    ///
    /// # Errors
    ///
    /// See `ProvisionError`; nothing is created unless every check passes.
    pub async fn create_user(
        &self,
        actor: Option<&Identity>,
        form: &NewUser,
        policy: &dyn Authorizer,
    ) -> Result<Provisioned, ProvisionError> {
        let account = form.validate().map_err(ProvisionError::Invalid)?;
        let actor = actor.ok_or(ProvisionError::Unauthenticated)?;

        let roles = self.records.roles_for(actor.id).await.map_err(|source| ProvisionError::Failed {
            step: ProvisionStep::RoleCheck,
            source,
            orphaned: false,
        })?;
        let subject = Subject { user_id: actor.id, roles };
        if let Decision::Deny(reason) = policy.decide(&subject, Action::ManageUsers) {
            warn!(actor = %actor.id, "users: create refused");
            return Err(ProvisionError::Forbidden(reason));
        }

        let provisioned = self.provision(account).await?;
        info!(actor = %actor.id, user_id = %provisioned.identity.id, role = %provisioned.role, "users: created");
        Ok(provisioned)
    }

    /// Self sign-up: same sequence, staff role, no admin check.
    ///
    /// # Errors
    ///
    /// Validation or provisioning failure.
    pub async fn register(&self, form: &Registration) -> Result<Provisioned, ProvisionError> {
        let account = form.validate().map_err(ProvisionError::Invalid)?;
        self.provision(account).await
    }

    async fn provision(&self, account: NewAccount) -> Result<Provisioned, ProvisionError> {
        let role = account.role;
        let identity = self
            .auth
            .sign_up(SignUp {
                email: account.email.clone(),
                password: account.password,
                name: account.name.clone(),
                redirect_to: self.redirect_to.clone(),
            })
            .await
            .map_err(|source| ProvisionError::Failed { step: ProvisionStep::SignUp, source, orphaned: false })?;

        let profile = NewProfileRow { id: identity.id, name: account.name, email: identity.email.clone() };
        if let Err(source) = self.records.insert_profile(profile).await {
            let orphaned = !self.undo(identity.id, false).await;
            return Err(ProvisionError::Failed { step: ProvisionStep::Profile, source, orphaned });
        }

        if let Err(source) = self.records.insert_role(identity.id, role).await {
            let orphaned = !self.undo(identity.id, true).await;
            return Err(ProvisionError::Failed { step: ProvisionStep::Role, source, orphaned });
        }

        Ok(Provisioned {
            identity,
            role,
            reload: AfterSubmit::FullReload,
            notice: Notice::success("Usuário criado com sucesso! Um email de confirmação foi enviado."),
        })
    }

    /// Remove what a failed run created. Returns whether everything went.
    async fn undo(&self, user_id: Uuid, profile_created: bool) -> bool {
        let mut clean = true;
        if profile_created {
            if let Err(e) = self.records.delete_profile(user_id).await {
                error!(%user_id, error = %e, "users: compensation failed, profile left behind");
                clean = false;
            }
        }
        if let Err(e) = self.auth.delete_identity(user_id).await {
            error!(%user_id, error = %e, "users: compensation failed, auth identity left behind");
            clean = false;
        }
        if clean {
            warn!(%user_id, "users: partial account rolled back");
        }
        clean
    }
}

#[cfg(test)]
#[path = "users_test.rs"]
mod tests;
