//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::registry::SESSION_ID_LENGTH;

/// Longest player id accepted from clients, in bytes.
pub const MAX_PLAYER_ID_LENGTH: usize = 64;

/// Validates that a session ID is exactly 8 lowercase hexadecimal characters.
///
/// # Examples
///
/// ```ignore
/// validate_session_id("deadbeef") // Ok
/// validate_session_id("DeadBeef") // Err - uppercase
/// validate_session_id("deadbee")  // Err - too short
/// ```
pub fn validate_session_id(id: &str) -> Result<(), ValidationError> {
    if id.len() != SESSION_ID_LENGTH {
        let mut err = ValidationError::new("session_id_length");
        err.message = Some(
            format!(
                "Session ID must be exactly {SESSION_ID_LENGTH} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    {
        let mut err = ValidationError::new("session_id_format");
        err.message = Some("Session ID must contain only lowercase hexadecimal characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a player ID is non-blank, contains no whitespace and is at
/// most [`MAX_PLAYER_ID_LENGTH`] bytes long.
pub fn validate_player_id(id: &str) -> Result<(), ValidationError> {
    if id.len() > MAX_PLAYER_ID_LENGTH {
        let mut err = ValidationError::new("player_id_length");
        err.message = Some(
            format!("Player ID must be at most {MAX_PLAYER_ID_LENGTH} characters").into(),
        );
        return Err(err);
    }

    if id.trim().is_empty() || id.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("player_id_format");
        err.message = Some("Player ID must be non-empty and contain no whitespace".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_session_id_valid() {
        assert!(validate_session_id("deadbeef").is_ok());
        assert!(validate_session_id("0123abcd").is_ok());
        assert!(validate_session_id("00000000").is_ok());
    }

    #[test]
    fn test_validate_session_id_invalid_length() {
        assert!(validate_session_id("deadbee").is_err()); // too short
        assert!(validate_session_id("deadbeef0").is_err()); // too long
        assert!(validate_session_id("").is_err()); // empty
    }

    #[test]
    fn test_validate_session_id_invalid_format() {
        assert!(validate_session_id("DeadBeef").is_err()); // uppercase
        assert!(validate_session_id("deadbeeg").is_err()); // invalid hex
        assert!(validate_session_id("dead bef").is_err()); // space
    }

    #[test]
    fn test_validate_player_id() {
        assert!(validate_player_id("5f0c2d9e-player").is_ok());
        assert!(validate_player_id("").is_err());
        assert!(validate_player_id("   ").is_err());
        assert!(validate_player_id("two words").is_err());
    }

    #[test]
    fn test_validate_player_id_length() {
        assert!(validate_player_id(&"a".repeat(MAX_PLAYER_ID_LENGTH)).is_ok());
        let err = validate_player_id(&"a".repeat(MAX_PLAYER_ID_LENGTH + 1)).unwrap_err();
        assert_eq!(err.code, "player_id_length");
    }
}
