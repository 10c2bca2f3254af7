//! Mandatory channel-subscription gate.
//!
//! One `getChatMember` lookup against the required channel per check.
//! Fail-closed: any lookup error (bot lacks admin rights in the channel,
//! misconfigured id, network failure) denies access for that request.

use teloxide::prelude::*;
use teloxide::types::{ChatMemberKind, InlineKeyboardButton, InlineKeyboardMarkup, UserId};
use url::Url;

use crate::core::config;

/// Maps a membership status to the gate decision.
///
/// {member, creator/owner, administrator} pass; anything else (restricted,
/// left, banned) does not.
pub fn is_status_subscribed(kind: &ChatMemberKind) -> bool {
    kind.is_owner() || kind.is_administrator() || kind.is_member()
}

/// Checks whether a user is currently subscribed to the required channel.
///
/// # Returns
///
/// `true` only when the lookup succeeds and the status passes the gate.
/// Errors are logged and resolve to `false`, never propagated and never
/// retried.
pub async fn is_subscribed(bot: &Bot, user_id: UserId) -> bool {
    is_subscribed_to(bot, *config::FORCE_SUB_CHANNEL_ID, user_id).await
}

async fn is_subscribed_to(bot: &Bot, channel: Option<i64>, user_id: UserId) -> bool {
    let channel_id = match channel {
        Some(id) => id,
        None => {
            log::error!("Subscription check denied: FORCE_SUB_CHANNEL_ID is not configured");
            return false;
        }
    };

    match bot.get_chat_member(ChatId(channel_id), user_id).await {
        Ok(member) => is_status_subscribed(&member.kind),
        Err(e) => {
            log::warn!("Error checking subscription for user {}: {}", user_id, e);
            false
        }
    }
}

/// Returns the join link advertised on the gate keyboard.
///
/// Prefers the configured invite link; otherwise derives a t.me/c/ link by
/// stripping the -100 supergroup prefix from the channel id.
pub fn join_channel_url() -> Option<Url> {
    if let Some(ref invite) = *config::FORCE_SUB_CHANNEL_INVITE {
        if let Ok(url) = Url::parse(invite) {
            return Some(url);
        }
        log::warn!("FORCE_SUB_CHANNEL_INVITE is not a valid URL: {}", invite);
    }

    let channel_id = (*config::FORCE_SUB_CHANNEL_ID)?;
    let id_str = channel_id.to_string();
    let internal = id_str.strip_prefix("-100").unwrap_or(&id_str);
    Url::parse(&format!("https://t.me/c/{}", internal)).ok()
}

/// Builds the inline keyboard with the single "join the channel" button.
pub fn join_channel_keyboard() -> InlineKeyboardMarkup {
    match join_channel_url() {
        Some(url) => InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url("Join the channel".to_string(), url)]]),
        None => InlineKeyboardMarkup::new(Vec::<Vec<InlineKeyboardButton>>::new()),
    }
}
