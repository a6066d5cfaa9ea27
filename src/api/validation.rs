use super::ApiError;

/// Longest query accepted from clients, in characters.
pub const MAX_QUERY_LENGTH: usize = 200;

pub fn validate_limit(limit: u64) -> Result<u64, ApiError> {
    const MAX_LIMIT: u64 = 100;
    const MIN_LIMIT: u64 = 1;

    if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::validation(format!(
            "Invalid limit: {limit}. Limit must be between {MIN_LIMIT} and {MAX_LIMIT}"
        )));
    }
    Ok(limit)
}

/// Queries may be empty (default listing) but not unbounded.
pub fn validate_query(query: &str) -> Result<&str, ApiError> {
    if query.chars().count() > MAX_QUERY_LENGTH {
        return Err(ApiError::validation(format!(
            "Search query must be {MAX_QUERY_LENGTH} characters or less"
        )));
    }
    Ok(query)
}

pub fn validate_session_id(id: &str) -> Result<uuid::Uuid, ApiError> {
    uuid::Uuid::parse_str(id)
        .map_err(|_| ApiError::validation(format!("Invalid session ID: {id}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_limit() {
        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(100).is_ok());
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(101).is_err());
    }

    #[test]
    fn test_validate_query() {
        assert_eq!(validate_query("").unwrap(), "");
        assert_eq!(validate_query("  dune ").unwrap(), "  dune ");
        assert!(validate_query(&"a".repeat(MAX_QUERY_LENGTH)).is_ok());
        assert!(validate_query(&"a".repeat(MAX_QUERY_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_session_id() {
        assert!(validate_session_id("not-a-uuid").is_err());
        let id = uuid::Uuid::new_v4();
        assert_eq!(validate_session_id(&id.to_string()).unwrap(), id);
    }
}
