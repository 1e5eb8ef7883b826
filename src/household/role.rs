//! Member roles and the access checks built on them.

use std::{fmt::Display, str::FromStr};

use rusqlite::{Connection, OptionalExtension, types::Type};
use serde::{Deserialize, Serialize};

use crate::{Error, auth::UserID, household::HouseholdId};

/// The access tier of a member within a household.
///
/// Roles are ordered so that a higher role includes the permissions of the
/// lower ones: `Viewer < Member < Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemberRole {
    /// May read everything in the household.
    Viewer,
    /// May also create, change and delete accounts, categories, transaction
    /// types and transactions.
    Member,
    /// May also rename or delete the household and manage members and invitations.
    Owner,
}

impl MemberRole {
    /// The role as stored in the database and sent over the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Viewer => "VIEWER",
            MemberRole::Member => "MEMBER",
            MemberRole::Owner => "OWNER",
        }
    }

    /// A lowercase label for the role suitable for prose, e.g. "member".
    pub fn label(&self) -> &'static str {
        match self {
            MemberRole::Viewer => "viewer",
            MemberRole::Member => "member",
            MemberRole::Owner => "owner",
        }
    }
}

impl Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "VIEWER" => Ok(MemberRole::Viewer),
            "MEMBER" => Ok(MemberRole::Member),
            "OWNER" => Ok(MemberRole::Owner),
            _ => Err(Error::InvalidRole(s.to_owned())),
        }
    }
}

/// Read a [MemberRole] stored as text in column `index`.
pub(crate) fn role_from_column(
    row: &rusqlite::Row,
    index: usize,
) -> Result<MemberRole, rusqlite::Error> {
    let raw_role: String = row.get(index)?;

    raw_role.parse().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
    })
}

/// Get the role of `user_id` in `household_id`, or `None` if they are not a member.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn get_member_role(
    household_id: HouseholdId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Option<MemberRole>, Error> {
    connection
        .prepare("SELECT role FROM user_household WHERE household_id = ?1 AND user_id = ?2")?
        .query_row((household_id, user_id.as_i64()), |row| role_from_column(row, 0))
        .optional()
        .map_err(|error| error.into())
}

/// Check that `user_id` is a member of `household_id` with at least the role `minimum`.
///
/// Returns the user's actual role on success.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user is not a member, so the existence of
/// the household is not revealed, and [Error::Forbidden] if their role is
/// lower than `minimum`.
pub fn require_role(
    household_id: HouseholdId,
    user_id: UserID,
    minimum: MemberRole,
    connection: &Connection,
) -> Result<MemberRole, Error> {
    match get_member_role(household_id, user_id, connection)? {
        None => Err(Error::NotFound),
        Some(role) if role < minimum => Err(Error::Forbidden(minimum)),
        Some(role) => Ok(role),
    }
}


#[cfg(test)]
mod require_role_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        auth::UserID,
        household::{MemberRole, add_member, create_household, require_role},
        test_utils::insert_test_user,
    };

    fn setup() -> (Connection, i64, UserID, UserID) {
        let connection = Connection::open_in_memory().unwrap();
        crate::db::initialize(&connection).unwrap();
        let owner = insert_test_user("molly@burrow.com", &connection);
        let viewer = insert_test_user("ginny@burrow.com", &connection);
        let household = create_household("The Burrow", owner, &connection).unwrap();
        add_member(household.id, viewer, MemberRole::Viewer, &connection).unwrap();

        (connection, household.id, owner, viewer)
    }

    #[test]
    fn owner_passes_every_check() {
        let (connection, household_id, owner, _) = setup();

        for minimum in [MemberRole::Viewer, MemberRole::Member, MemberRole::Owner] {
            assert_eq!(
                require_role(household_id, owner, minimum, &connection),
                Ok(MemberRole::Owner)
            );
        }
    }

    #[test]
    fn viewer_is_forbidden_from_writing() {
        let (connection, household_id, _, viewer) = setup();

        assert_eq!(
            require_role(household_id, viewer, MemberRole::Member, &connection),
            Err(Error::Forbidden(MemberRole::Member))
        );
    }

    #[test]
    fn non_member_gets_not_found() {
        let (connection, household_id, _, _) = setup();
        let stranger = insert_test_user("draco@malfoy.com", &connection);

        assert_eq!(
            require_role(household_id, stranger, MemberRole::Viewer, &connection),
            Err(Error::NotFound)
        );
    }
}
