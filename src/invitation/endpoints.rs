//! Route handlers for inviting people to a household.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::{UserID, get_user_by_id},
    db::lock_connection,
    email::{InvitationEmail, Mailer},
    extract::{Json, Path},
    household::{HouseholdId, HouseholdMembership, MemberRole, get_household, require_role},
    invitation::{
        Invitation, InvitationId, InvitationPreview, accept_invitation, create_invitation,
        get_invitations, preview_invitation, revoke_invitation,
    },
};

/// The state needed to manage invitations.
#[derive(Debug, Clone)]
pub struct InvitationState {
    /// The database connection for managing invitations.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Delivers the invitation emails.
    pub mailer: Arc<dyn Mailer>,
    /// The base URL of the web app, used for the accept link.
    pub app_url: String,
}

impl FromRef<AppState> for InvitationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            mailer: state.mailer.clone(),
            app_url: state.app_url.clone(),
        }
    }
}

/// The request body for inviting someone.
#[derive(Debug, Deserialize)]
pub struct InvitationForm {
    /// The invitee's email address.
    pub email: String,
    /// The role the invitee will have, one of OWNER, MEMBER or VIEWER.
    pub role: String,
}

/// A newly created invitation and whether its email went out.
#[derive(Debug, Serialize)]
pub struct CreatedInvitation {
    /// The invitation.
    #[serde(flatten)]
    pub invitation: Invitation,
    /// Whether the email provider accepted the invitation email.
    pub email_sent: bool,
}

/// A route handler for inviting someone to a household.
///
/// The invitation is kept when the email cannot be sent, the response says
/// so with `email_sent: false`.
pub async fn create_invitation_endpoint(
    State(state): State<InvitationState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
    Json(form): Json<InvitationForm>,
) -> Result<(StatusCode, Json<CreatedInvitation>), Error> {
    let (invitation, token, household_name, inviter_name) = {
        let connection = lock_connection(&state.db_connection)?;
        require_role(household_id, user_id, MemberRole::Owner, &connection)?;
        let role: MemberRole = form.role.parse()?;

        let (invitation, token) = create_invitation(
            household_id,
            user_id,
            &form.email,
            role,
            OffsetDateTime::now_utc(),
            &connection,
        )?;
        let household = get_household(household_id, &connection)?;
        let inviter = get_user_by_id(user_id, &connection)?;

        (invitation, token, household.name, inviter.name)
    };

    let accept_url = format!("{}/invitations/{token}", state.app_url);
    let message = InvitationEmail {
        household_name: &household_name,
        inviter_name: &inviter_name,
        role: invitation.role,
        accept_url: &accept_url,
        expires_on: invitation.expires_at.date(),
    }
    .to_message(&invitation.email);

    let email_sent = match state.mailer.send(&message).await {
        Ok(()) => true,
        Err(error) => {
            tracing::error!(
                "Could not send email for invitation {} of household {household_id}: {error}",
                invitation.id
            );
            false
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(CreatedInvitation {
            invitation,
            email_sent,
        }),
    ))
}

/// A route handler listing the invitations of a household.
pub async fn list_invitations_endpoint(
    State(state): State<InvitationState>,
    Extension(user_id): Extension<UserID>,
    Path(household_id): Path<HouseholdId>,
) -> Result<Json<Vec<Invitation>>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Owner, &connection)?;

    get_invitations(household_id, OffsetDateTime::now_utc(), &connection).map(Json)
}

/// A route handler for revoking a pending invitation.
pub async fn revoke_invitation_endpoint(
    State(state): State<InvitationState>,
    Extension(user_id): Extension<UserID>,
    Path((household_id, invitation_id)): Path<(HouseholdId, InvitationId)>,
) -> Result<Json<Invitation>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    require_role(household_id, user_id, MemberRole::Owner, &connection)?;

    revoke_invitation(
        household_id,
        invitation_id,
        OffsetDateTime::now_utc(),
        &connection,
    )
    .map(Json)
}

/// A route handler showing an invitation from its link, no log in needed.
pub async fn preview_invitation_endpoint(
    State(state): State<InvitationState>,
    Path(token): Path<String>,
) -> Result<Json<InvitationPreview>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    preview_invitation(&token, OffsetDateTime::now_utc(), &connection).map(Json)
}

/// A route handler for the logged in user to accept an invitation.
pub async fn accept_invitation_endpoint(
    State(state): State<InvitationState>,
    Extension(user_id): Extension<UserID>,
    Path(token): Path<String>,
) -> Result<Json<HouseholdMembership>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let user = get_user_by_id(user_id, &connection)?;

    accept_invitation(&token, &user, OffsetDateTime::now_utc(), &connection)
        .inspect_err(|error| tracing::debug!("User {user_id} could not accept invitation: {error}"))
        .map(Json)
}
