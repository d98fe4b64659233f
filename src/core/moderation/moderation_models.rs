// Moderation domain models - enforcement levels, hierarchy checks and
// the action-to-case mapping.
//
// These are pure domain types with no Discord dependencies.

use thiserror::Error;

use crate::core::automod::Action;
use crate::core::modlog::{CaseType, ModlogError};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("member not found in guild")]
    MemberNotFound,

    #[error("member is already muted")]
    AlreadyMuted,

    /// Carries the locale key of the refusal so callers can show it.
    #[error("target is not moderatable ({0})")]
    NotModeratable(&'static str),

    #[error("failed to mute member: {0}")]
    MuteError(String),

    #[error("failed to unmute member: {0}")]
    UnmuteError(String),

    #[error("failed to kick member: {0}")]
    KickError(String),

    #[error("failed to softban member: {0}")]
    SoftbanError(String),

    #[error("failed to ban member: {0}")]
    BanError(String),

    #[error("failed to unban user: {0}")]
    UnbanError(String),

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error(transparent)]
    Modlog(#[from] ModlogError),
}

// ============================================================================
// ACTION MAPPING
// ============================================================================

/// The case record type a configured action produces. Total over the
/// action enum: a verbal action is the only one that never persists a
/// case.
pub fn case_type_for(action: Action) -> Option<CaseType> {
    match action {
        Action::Verbal => None,
        Action::Warn => Some(CaseType::Warn),
        Action::Mute => Some(CaseType::Mute),
        Action::Kick => Some(CaseType::Kick),
        Action::Softban => Some(CaseType::Softban),
        Action::Ban => Some(CaseType::Ban),
    }
}

// ============================================================================
// MEMBER STATE / HIERARCHY
// ============================================================================

/// Snapshot of a guild member for precondition and hierarchy checks.
#[derive(Debug, Clone)]
pub struct MemberState {
    pub user_id: u64,
    pub is_bot: bool,
    pub is_owner: bool,
    pub is_timed_out: bool,
    /// Position of the member's highest role; -1 with only @everyone.
    pub top_role_position: i64,
}

/// Role-hierarchy rule. Returns the locale key of the refusal, or `None`
/// when the actor may act on the target. The bot itself and the guild
/// owner can never be targeted; the owner as actor bypasses hierarchy;
/// otherwise the target's highest role must sit strictly below both the
/// actor's and the bot's.
pub fn is_moderatable(
    target: &MemberState,
    actor: &MemberState,
    bot: &MemberState,
) -> Option<&'static str> {
    if target.user_id == actor.user_id {
        return Some("mod.refuse.self");
    }
    if target.user_id == bot.user_id {
        return Some("mod.refuse.bot");
    }
    if target.is_owner {
        return Some("mod.refuse.owner");
    }
    if actor.is_owner {
        return None;
    }
    if target.top_role_position >= actor.top_role_position {
        return Some("mod.refuse.hierarchy");
    }
    if target.top_role_position >= bot.top_role_position {
        return Some("mod.refuse.hierarchy_bot");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(user_id: u64, top_role_position: i64) -> MemberState {
        MemberState {
            user_id,
            is_bot: false,
            is_owner: false,
            is_timed_out: false,
            top_role_position,
        }
    }

    #[test]
    fn verbal_maps_to_no_case() {
        assert_eq!(case_type_for(Action::Verbal), None);
        assert_eq!(case_type_for(Action::Warn), Some(CaseType::Warn));
        assert_eq!(case_type_for(Action::Mute), Some(CaseType::Mute));
        assert_eq!(case_type_for(Action::Softban), Some(CaseType::Softban));
        assert_eq!(case_type_for(Action::Ban), Some(CaseType::Ban));
    }

    #[test]
    fn the_bot_is_never_moderatable() {
        let bot = member(1, 50);
        let actor = member(2, 99);
        assert_eq!(is_moderatable(&bot, &actor, &bot), Some("mod.refuse.bot"));
    }

    #[test]
    fn the_owner_is_never_a_valid_target() {
        let mut owner = member(3, 0);
        owner.is_owner = true;
        let actor = member(2, 99);
        let bot = member(1, 50);
        assert_eq!(
            is_moderatable(&owner, &actor, &bot),
            Some("mod.refuse.owner")
        );
    }

    #[test]
    fn actors_cannot_target_themselves() {
        let actor = member(2, 99);
        let bot = member(1, 50);
        assert_eq!(
            is_moderatable(&actor, &actor, &bot),
            Some("mod.refuse.self")
        );
    }

    #[test]
    fn owner_as_actor_bypasses_hierarchy() {
        let target = member(4, 100);
        let mut owner = member(3, 0);
        owner.is_owner = true;
        let bot = member(1, 50);
        assert_eq!(is_moderatable(&target, &owner, &bot), None);
    }

    #[test]
    fn hierarchy_is_strict_against_both_actor_and_bot() {
        let bot = member(1, 50);
        let actor = member(2, 40);

        // Equal to the actor's top role: refused.
        assert_eq!(
            is_moderatable(&member(4, 40), &actor, &bot),
            Some("mod.refuse.hierarchy")
        );

        // Below the actor but not below the bot: refused.
        let strong_actor = member(2, 80);
        assert_eq!(
            is_moderatable(&member(4, 60), &strong_actor, &bot),
            Some("mod.refuse.hierarchy_bot")
        );

        // Below both: allowed.
        assert_eq!(is_moderatable(&member(4, 10), &actor, &bot), None);
    }
}
