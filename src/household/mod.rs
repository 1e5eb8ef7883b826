//! Households, their members and the role checks that guard every
//! household-scoped route.

mod core;
mod endpoints;
mod members;
mod role;

pub use core::{
    Household, HouseholdId, HouseholdMembership, create_household, create_household_table,
    delete_household, get_all_households, get_household, get_households_for_user,
    rename_household,
};
pub use endpoints::{
    create_household_endpoint, delete_household_endpoint, get_household_endpoint,
    list_households_endpoint, rename_household_endpoint,
};
pub use members::{
    Member, add_member, create_membership_table, get_members, list_members_endpoint,
    remove_member_endpoint, update_member_role_endpoint,
};
pub(crate) use members::insert_membership;
pub use role::{MemberRole, get_member_role, require_role};
pub(crate) use role::role_from_column;
