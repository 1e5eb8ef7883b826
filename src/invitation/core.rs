//! Invitations to join a household and the database queries for them.

use std::{fmt::Display, str::FromStr};

use rusqlite::{Connection, OptionalExtension, Row, types::Type};
use serde::Serialize;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    Error,
    auth::{User, UserID, normalize_email},
    database_id::DatabaseId,
    household::{
        Household, HouseholdId, HouseholdMembership, MemberRole, get_household, insert_membership,
        role_from_column,
    },
};

/// Alias for the integer type used for invitation IDs.
pub type InvitationId = DatabaseId;

/// How long an invitation can be accepted for after it is created.
pub const INVITATION_DURATION: Duration = Duration::days(7);

/// Where an invitation is in its lifecycle.
///
/// Only `Pending`, `Accepted` and `Revoked` are stored. `Expired` is derived
/// for pending invitations past their expiry time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvitationStatus {
    /// Waiting for the invitee to accept.
    Pending,
    /// The invitee joined the household.
    Accepted,
    /// An owner withdrew the invitation.
    Revoked,
    /// The invitation was not accepted in time.
    Expired,
}

impl InvitationStatus {
    /// The status as stored in the database and sent over the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "PENDING",
            InvitationStatus::Accepted => "ACCEPTED",
            InvitationStatus::Revoked => "REVOKED",
            InvitationStatus::Expired => "EXPIRED",
        }
    }
}

impl Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvitationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(InvitationStatus::Pending),
            "ACCEPTED" => Ok(InvitationStatus::Accepted),
            "REVOKED" => Ok(InvitationStatus::Revoked),
            "EXPIRED" => Ok(InvitationStatus::Expired),
            _ => Err(format!("\"{s}\" is not an invitation status")),
        }
    }
}

/// An invitation for an email address to join a household with a role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invitation {
    /// The ID of the invitation.
    pub id: InvitationId,
    /// The household the invitee will join.
    pub household_id: HouseholdId,
    /// The invitee's email address, always lowercase.
    pub email: String,
    /// The role the invitee will have.
    pub role: MemberRole,
    /// The status as of when the invitation was read.
    pub status: InvitationStatus,
    /// The owner who sent the invitation, if they still exist.
    pub invited_by: Option<UserID>,
    /// When the invitation was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the invitation stops being valid.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// What an invitee sees before accepting an invitation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvitationPreview {
    /// The name of the household.
    pub household_name: String,
    /// The role the invitee will have.
    pub role: MemberRole,
    /// The address the invitation was sent to.
    pub email: String,
    /// The status as of now.
    pub status: InvitationStatus,
    /// When the invitation stops being valid.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// Create the invitation table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_invitation_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS invitation (
                id INTEGER PRIMARY KEY,
                household_id INTEGER NOT NULL REFERENCES household(id) ON DELETE CASCADE,
                email TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('OWNER', 'MEMBER', 'VIEWER')),
                token_hash TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL CHECK (status IN ('PENDING', 'ACCEPTED', 'REVOKED')),
                invited_by INTEGER REFERENCES user(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_invitation_household_email
            ON invitation(household_id, email)",
        (),
    )?;

    Ok(())
}

const INVITATION_COLUMNS: &str =
    "id, household_id, email, role, status, invited_by, created_at, expires_at";

/// Map a row selected with [INVITATION_COLUMNS], deriving the expired status at `now`.
fn map_invitation_row(row: &Row, now: OffsetDateTime) -> Result<Invitation, rusqlite::Error> {
    let raw_status: String = row.get(4)?;
    let stored_status: InvitationStatus = raw_status.parse().map_err(|error: String| {
        rusqlite::Error::FromSqlConversionFailure(4, Type::Text, error.into())
    })?;
    let expires_at: OffsetDateTime = row.get(7)?;

    let status = match stored_status {
        InvitationStatus::Pending if expires_at <= now => InvitationStatus::Expired,
        status => status,
    };

    Ok(Invitation {
        id: row.get(0)?,
        household_id: row.get(1)?,
        email: row.get(2)?,
        role: role_from_column(row, 3)?,
        status,
        invited_by: row.get::<_, Option<i64>>(5)?.map(UserID::new),
        created_at: row.get(6)?,
        expires_at,
    })
}

/// Hash an invitation token for storage. Only the hash is ever stored.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

fn is_member_email(
    household_id: HouseholdId,
    email: &str,
    connection: &Connection,
) -> Result<bool, Error> {
    connection
        .prepare(
            "SELECT 1 FROM user_household
             INNER JOIN user ON user.id = user_household.user_id
             WHERE user_household.household_id = ?1 AND user.email = ?2",
        )?
        .query_row((household_id, email), |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
        .map_err(Error::from)
}

fn has_pending_invitation(
    household_id: HouseholdId,
    email: &str,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<bool, Error> {
    connection
        .prepare(
            "SELECT 1 FROM invitation
             WHERE household_id = ?1 AND email = ?2 AND status = 'PENDING' AND expires_at > ?3",
        )?
        .query_row((household_id, email, now), |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
        .map_err(Error::from)
}

/// Create an invitation for `email` to join `household_id` with `role`.
///
/// Returns the invitation together with the raw token for the accept link.
/// The token is not stored and cannot be recovered later.
///
/// # Errors
///
/// Returns [Error::InvalidEmail] for a malformed address, [Error::AlreadyMember]
/// if the address belongs to a member, [Error::DuplicateInvitation] if a
/// pending invitation for the address exists, or an SQL error.
pub fn create_invitation(
    household_id: HouseholdId,
    invited_by: UserID,
    email: &str,
    role: MemberRole,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(Invitation, String), Error> {
    let email = normalize_email(email)?;

    if is_member_email(household_id, &email, connection)? {
        return Err(Error::AlreadyMember);
    }

    if has_pending_invitation(household_id, &email, now, connection)? {
        return Err(Error::DuplicateInvitation(email));
    }

    let token = Uuid::new_v4().simple().to_string();

    let invitation = connection
        .prepare(&format!(
            "INSERT INTO invitation
                (household_id, email, role, token_hash, status, invited_by, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, 'PENDING', ?5, ?6, ?7)
             RETURNING {INVITATION_COLUMNS}"
        ))?
        .query_row(
            (
                household_id,
                &email,
                role.as_str(),
                hash_token(&token),
                invited_by.as_i64(),
                now,
                now + INVITATION_DURATION,
            ),
            |row| map_invitation_row(row, now),
        )?;

    tracing::info!(
        "User {invited_by} invited a new {role} to household {household_id} (invitation {})",
        invitation.id
    );

    Ok((invitation, token))
}

/// Get the invitations of a household, newest first.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn get_invitations(
    household_id: HouseholdId,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Vec<Invitation>, Error> {
    connection
        .prepare(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitation
             WHERE household_id = ?1 ORDER BY created_at DESC, id DESC"
        ))?
        .query_map([household_id], |row| map_invitation_row(row, now))?
        .map(|maybe_invitation| maybe_invitation.map_err(Error::from))
        .collect()
}

fn get_invitation(
    household_id: HouseholdId,
    invitation_id: InvitationId,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Invitation, Error> {
    connection
        .prepare(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitation WHERE id = ?1 AND household_id = ?2"
        ))?
        .query_row((invitation_id, household_id), |row| {
            map_invitation_row(row, now)
        })
        .map_err(Error::from)
}

/// Find the invitation for the raw `token` from an accept link.
///
/// # Errors
///
/// Returns [Error::NotFound] if no invitation has the token, or an SQL error.
pub fn get_invitation_by_token(
    token: &str,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Invitation, Error> {
    connection
        .prepare(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitation WHERE token_hash = ?1"
        ))?
        .query_row([hash_token(token)], |row| map_invitation_row(row, now))
        .map_err(Error::from)
}

/// Get what the invitee sees before accepting.
///
/// # Errors
///
/// Returns [Error::NotFound] if no invitation has the token, or an SQL error.
pub fn preview_invitation(
    token: &str,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<InvitationPreview, Error> {
    let invitation = get_invitation_by_token(token, now, connection)?;
    let Household { name, .. } = get_household(invitation.household_id, connection)?;

    Ok(InvitationPreview {
        household_name: name,
        role: invitation.role,
        email: invitation.email,
        status: invitation.status,
        expires_at: invitation.expires_at,
    })
}

/// Revoke a pending invitation.
///
/// # Errors
///
/// Returns [Error::NotFound] if the invitation is not in the household,
/// [Error::InvitationNotPending] if it is not pending, or an SQL error.
pub fn revoke_invitation(
    household_id: HouseholdId,
    invitation_id: InvitationId,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Invitation, Error> {
    let invitation = get_invitation(household_id, invitation_id, now, connection)?;

    if invitation.status != InvitationStatus::Pending {
        return Err(Error::InvitationNotPending(invitation.status));
    }

    connection.execute(
        "UPDATE invitation SET status = 'REVOKED' WHERE id = ?1",
        [invitation_id],
    )?;

    Ok(Invitation {
        status: InvitationStatus::Revoked,
        ..invitation
    })
}

/// Accept the invitation with `token` as `user`.
///
/// The membership is created and the invitation marked as accepted in one
/// SQL transaction.
///
/// # Errors
///
/// Returns:
/// - [Error::NotFound] if no invitation has the token.
/// - [Error::InvitationExpired] if the invitation has expired.
/// - [Error::InvitationNotPending] if it was already accepted or revoked.
/// - [Error::InvitationEmailMismatch] if it was sent to another address.
/// - [Error::AlreadyMember] if the user is already in the household.
pub fn accept_invitation(
    token: &str,
    user: &User,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<HouseholdMembership, Error> {
    let transaction = connection.unchecked_transaction()?;
    let invitation = get_invitation_by_token(token, now, &transaction)?;

    match invitation.status {
        InvitationStatus::Pending => {}
        InvitationStatus::Expired => return Err(Error::InvitationExpired),
        status => return Err(Error::InvitationNotPending(status)),
    }

    if invitation.email != user.email {
        return Err(Error::InvitationEmailMismatch);
    }

    insert_membership(invitation.household_id, user.id, invitation.role, &transaction)?;
    transaction.execute(
        "UPDATE invitation SET status = 'ACCEPTED' WHERE id = ?1",
        [invitation.id],
    )?;
    let household = get_household(invitation.household_id, &transaction)?;

    transaction.commit()?;

    tracing::info!(
        "User {} accepted invitation {} to household {}",
        user.id,
        invitation.id,
        household.id
    );

    Ok(HouseholdMembership {
        household,
        role: invitation.role,
    })
}

#[cfg(test)]
mod invitation_tests {
    use rusqlite::Connection;
    use time::OffsetDateTime;

    use crate::{
        Error,
        auth::{User, UserID, get_user_by_id},
        household::{HouseholdId, MemberRole, add_member, create_household, get_member_role},
        test_utils::{get_test_connection, insert_test_user},
    };

    use super::{
        INVITATION_DURATION, InvitationStatus, accept_invitation, create_invitation,
        get_invitation_by_token, get_invitations, hash_token, preview_invitation,
        revoke_invitation,
    };

    struct Fixture {
        connection: Connection,
        owner: UserID,
        household_id: HouseholdId,
    }

    fn fixture() -> Fixture {
        let connection = get_test_connection();
        let owner = insert_test_user("molly@burrow.com", &connection);
        let household_id = create_household("The Burrow", owner, &connection)
            .unwrap()
            .id;

        Fixture {
            connection,
            owner,
            household_id,
        }
    }

    fn invitee(fixture: &Fixture, email: &str) -> User {
        let user_id = insert_test_user(email, &fixture.connection);
        get_user_by_id(user_id, &fixture.connection).unwrap()
    }

    #[test]
    fn token_is_stored_hashed() {
        let fixture = fixture();
        let now = OffsetDateTime::now_utc();

        let (invitation, token) = create_invitation(
            fixture.household_id,
            fixture.owner,
            "Harry@Hogwarts.ac.uk",
            MemberRole::Member,
            now,
            &fixture.connection,
        )
        .unwrap();

        assert_eq!(invitation.email, "harry@hogwarts.ac.uk");
        assert_eq!(invitation.status, InvitationStatus::Pending);
        assert_eq!(invitation.invited_by, Some(fixture.owner));
        assert!(invitation.expires_at > now + time::Duration::days(6));

        let stored_hash: String = fixture
            .connection
            .query_row("SELECT token_hash FROM invitation", [], |row| row.get(0))
            .unwrap();
        assert_ne!(stored_hash, token);
        assert_eq!(stored_hash, hash_token(&token));
    }

    #[test]
    fn rejects_existing_member_and_pending_duplicate() {
        let fixture = fixture();
        let now = OffsetDateTime::now_utc();
        let ron = insert_test_user("ron@burrow.com", &fixture.connection);
        add_member(fixture.household_id, ron, MemberRole::Viewer, &fixture.connection).unwrap();

        let result = create_invitation(
            fixture.household_id,
            fixture.owner,
            "ron@burrow.com",
            MemberRole::Member,
            now,
            &fixture.connection,
        );
        assert_eq!(result, Err(Error::AlreadyMember));

        create_invitation(
            fixture.household_id,
            fixture.owner,
            "harry@hogwarts.ac.uk",
            MemberRole::Member,
            now,
            &fixture.connection,
        )
        .unwrap();
        let result = create_invitation(
            fixture.household_id,
            fixture.owner,
            "HARRY@hogwarts.ac.uk",
            MemberRole::Viewer,
            now,
            &fixture.connection,
        );
        assert_eq!(
            result,
            Err(Error::DuplicateInvitation("harry@hogwarts.ac.uk".to_owned()))
        );
    }

    #[test]
    fn expired_invitation_can_be_reissued() {
        let fixture = fixture();
        let then = OffsetDateTime::now_utc() - INVITATION_DURATION - time::Duration::days(1);
        let now = OffsetDateTime::now_utc();

        create_invitation(
            fixture.household_id,
            fixture.owner,
            "harry@hogwarts.ac.uk",
            MemberRole::Member,
            then,
            &fixture.connection,
        )
        .unwrap();

        let result = create_invitation(
            fixture.household_id,
            fixture.owner,
            "harry@hogwarts.ac.uk",
            MemberRole::Member,
            now,
            &fixture.connection,
        );
        assert!(result.is_ok(), "got {result:?}");

        let statuses: Vec<InvitationStatus> =
            get_invitations(fixture.household_id, now, &fixture.connection)
                .unwrap()
                .into_iter()
                .map(|invitation| invitation.status)
                .collect();
        assert_eq!(
            statuses,
            vec![InvitationStatus::Pending, InvitationStatus::Expired]
        );
    }

    #[test]
    fn accept_creates_membership() {
        let fixture = fixture();
        let now = OffsetDateTime::now_utc();
        let harry = invitee(&fixture, "harry@hogwarts.ac.uk");
        let (_, token) = create_invitation(
            fixture.household_id,
            fixture.owner,
            "harry@hogwarts.ac.uk",
            MemberRole::Member,
            now,
            &fixture.connection,
        )
        .unwrap();

        let membership = accept_invitation(&token, &harry, now, &fixture.connection).unwrap();

        assert_eq!(membership.household.id, fixture.household_id);
        assert_eq!(membership.role, MemberRole::Member);
        assert_eq!(
            get_member_role(fixture.household_id, harry.id, &fixture.connection).unwrap(),
            Some(MemberRole::Member)
        );
        let invitation = get_invitation_by_token(&token, now, &fixture.connection).unwrap();
        assert_eq!(invitation.status, InvitationStatus::Accepted);

        assert_eq!(
            accept_invitation(&token, &harry, now, &fixture.connection),
            Err(Error::InvitationNotPending(InvitationStatus::Accepted))
        );
    }

    #[test]
    fn accept_checks_expiry_and_email() {
        let fixture = fixture();
        let now = OffsetDateTime::now_utc();
        let harry = invitee(&fixture, "harry@hogwarts.ac.uk");
        let hermione = invitee(&fixture, "hermione@hogwarts.ac.uk");
        let (_, token) = create_invitation(
            fixture.household_id,
            fixture.owner,
            "harry@hogwarts.ac.uk",
            MemberRole::Viewer,
            now,
            &fixture.connection,
        )
        .unwrap();

        assert_eq!(
            accept_invitation(&token, &hermione, now, &fixture.connection),
            Err(Error::InvitationEmailMismatch)
        );
        assert_eq!(
            accept_invitation(
                &token,
                &harry,
                now + INVITATION_DURATION,
                &fixture.connection
            ),
            Err(Error::InvitationExpired)
        );
        assert_eq!(
            get_member_role(fixture.household_id, harry.id, &fixture.connection).unwrap(),
            None
        );
    }

    #[test]
    fn accept_fails_for_existing_member() {
        let fixture = fixture();
        let now = OffsetDateTime::now_utc();
        let harry = invitee(&fixture, "harry@hogwarts.ac.uk");
        let (_, token) = create_invitation(
            fixture.household_id,
            fixture.owner,
            "harry@hogwarts.ac.uk",
            MemberRole::Viewer,
            now,
            &fixture.connection,
        )
        .unwrap();
        add_member(fixture.household_id, harry.id, MemberRole::Member, &fixture.connection)
            .unwrap();

        assert_eq!(
            accept_invitation(&token, &harry, now, &fixture.connection),
            Err(Error::AlreadyMember)
        );
        let invitation = get_invitation_by_token(&token, now, &fixture.connection).unwrap();
        assert_eq!(invitation.status, InvitationStatus::Pending);
    }

    #[test]
    fn revoke_only_pending() {
        let fixture = fixture();
        let now = OffsetDateTime::now_utc();
        let (invitation, token) = create_invitation(
            fixture.household_id,
            fixture.owner,
            "harry@hogwarts.ac.uk",
            MemberRole::Viewer,
            now,
            &fixture.connection,
        )
        .unwrap();

        let revoked =
            revoke_invitation(fixture.household_id, invitation.id, now, &fixture.connection)
                .unwrap();
        assert_eq!(revoked.status, InvitationStatus::Revoked);

        assert_eq!(
            revoke_invitation(fixture.household_id, invitation.id, now, &fixture.connection),
            Err(Error::InvitationNotPending(InvitationStatus::Revoked))
        );
        let preview = preview_invitation(&token, now, &fixture.connection).unwrap();
        assert_eq!(preview.household_name, "The Burrow");
        assert_eq!(preview.status, InvitationStatus::Revoked);
    }

    #[test]
    fn unknown_token_is_not_found() {
        let fixture = fixture();

        assert_eq!(
            preview_invitation("nope", OffsetDateTime::now_utc(), &fixture.connection),
            Err(Error::NotFound)
        );
    }
}
