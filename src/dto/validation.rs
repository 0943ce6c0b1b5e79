//! Validation helpers for DTOs.

use validator::ValidationError;

/// Maximum accepted length of a player name, in characters.
const MAX_NAME_LEN: usize = 24;

/// Validates that a player name is non-blank, at most 24 characters, and made
/// of letters, digits, spaces, hyphens, or underscores.
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("player_name_blank");
        err.message = Some("Player name must not be blank".into());
        return Err(err);
    }

    if trimmed.chars().count() > MAX_NAME_LEN {
        let mut err = ValidationError::new("player_name_length");
        err.message =
            Some(format!("Player name must be at most {MAX_NAME_LEN} characters").into());
        return Err(err);
    }

    if !trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("player_name_format");
        err.message = Some(
            "Player name may only contain letters, digits, spaces, hyphens, and underscores"
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates that a game title is non-blank and at most 64 characters.
pub fn validate_game_title(title: &str) -> Result<(), ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("game_title_blank");
        err.message = Some("Game title must not be blank".into());
        return Err(err);
    }
    if trimmed.chars().count() > 64 {
        let mut err = ValidationError::new("game_title_length");
        err.message = Some("Game title must be at most 64 characters".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_player_name_valid() {
        assert!(validate_player_name("Ada").is_ok());
        assert!(validate_player_name("player_1").is_ok());
        assert!(validate_player_name("  Grace Hopper  ").is_ok());
    }

    #[test]
    fn test_validate_player_name_blank() {
        assert!(validate_player_name("").is_err());
        assert!(validate_player_name("   ").is_err());
    }

    #[test]
    fn test_validate_player_name_too_long() {
        assert!(validate_player_name(&"a".repeat(25)).is_err());
        assert!(validate_player_name(&"a".repeat(24)).is_ok());
    }

    #[test]
    fn test_validate_player_name_format() {
        assert!(validate_player_name("ada@machine").is_err());
        assert!(validate_player_name("ada\nlovelace").is_err());
    }

    #[test]
    fn test_validate_game_title() {
        assert!(validate_game_title("Friday round").is_ok());
        assert!(validate_game_title("  ").is_err());
        assert!(validate_game_title(&"t".repeat(65)).is_err());
    }
}
