//! Validation helpers for DTOs.

use validator::ValidationError;

/// Length of a room join code.
pub const ROOM_CODE_LENGTH: usize = 6;

/// Validates that a room code is exactly 6 uppercase alphanumeric characters.
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != ROOM_CODE_LENGTH {
        let mut err = ValidationError::new("room_code_length");
        err.message = Some(
            format!(
                "Room code must be exactly {} characters (got {})",
                ROOM_CODE_LENGTH,
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code must contain only A-Z and 0-9".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a match id has the `r<round>m<position>` shape with a
/// non-zero round.
pub fn validate_match_id(id: &str) -> Result<(), ValidationError> {
    if id.parse::<crate::tournament::model::MatchId>().is_err() {
        let mut err = ValidationError::new("match_id_format");
        err.message = Some("Match id must look like `r1m0`".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_room_code_valid() {
        assert!(validate_room_code("ABC123").is_ok());
        assert!(validate_room_code("ZZZZZZ").is_ok());
        assert!(validate_room_code("000000").is_ok());
    }

    #[test]
    fn test_validate_room_code_invalid() {
        assert!(validate_room_code("ABC12").is_err()); // too short
        assert!(validate_room_code("ABC1234").is_err()); // too long
        assert!(validate_room_code("abc123").is_err()); // lowercase
        assert!(validate_room_code("ABC 23").is_err()); // space
        assert!(validate_room_code("").is_err()); // empty
    }

    #[test]
    fn test_validate_match_id() {
        assert!(validate_match_id("r1m0").is_ok());
        assert!(validate_match_id("r12m31").is_ok());
        assert!(validate_match_id("r0m0").is_err()); // rounds are one-based
        assert!(validate_match_id("m0r1").is_err());
        assert!(validate_match_id("match-1").is_err());
    }
}
