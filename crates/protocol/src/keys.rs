//! Reserved parameter keys shared with the legacy dictionary shape.
//!
//! `~` marks analytics fields, `+` marks SDK-generated fields. Keys are part of
//! the public contract and must be preserved verbatim.

pub const SESSION_ID: &str = "session_id";
pub const IDENTITY_ID: &str = "identity_id";
pub const DEVICE_FINGERPRINT_ID: &str = "device_fingerprint_id";
pub const USER_ID: &str = "user_id";
pub const IS_FIRST_SESSION: &str = "+is_first_session";
pub const CLICKED_BRANCH_LINK: &str = "+clicked_branch_link";
pub const MATCH_TYPE: &str = "+match_type";
pub const URL: &str = "+url";
pub const SIMULATED: &str = "+simulated";
pub const REFERRING_LINK: &str = "~referring_link";
pub const CAMPAIGN: &str = "~campaign";
pub const CHANNEL: &str = "~channel";
pub const FEATURE: &str = "~feature";
pub const STAGE: &str = "~stage";
pub const TAGS: &str = "~tags";

/// Returns `true` for keys the SDK owns rather than the link author.
pub fn is_reserved(key: &str) -> bool {
	key.starts_with('~') || key.starts_with('+') || key.starts_with('$')
}
