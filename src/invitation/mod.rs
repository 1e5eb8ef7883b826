//! Invitations that let household owners bring new people in by email.

mod core;
mod endpoints;

pub use core::{
    Invitation, InvitationId, InvitationPreview, InvitationStatus, accept_invitation,
    create_invitation, create_invitation_table, get_invitations, preview_invitation,
    revoke_invitation,
};
pub use endpoints::{
    accept_invitation_endpoint, create_invitation_endpoint, list_invitations_endpoint,
    preview_invitation_endpoint, revoke_invitation_endpoint,
};
