//! Upstream endpoint paths and field selections.

/// Default base URL of the upstream social API.
pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com/2";

/// Fields requested for user lookups.
pub const USER_FIELDS: &str = "description,profile_image_url,public_metrics";

/// Fields requested for post lookups.
pub const POST_FIELDS: &str = "created_at,public_metrics";

/// Author fields requested alongside timeline posts.
pub const TIMELINE_USER_FIELDS: &str = "profile_image_url,username,name";

/// Path for looking up a user by username.
pub fn user_by_username(username: &str) -> String {
    format!("/users/by/username/{username}")
}

/// Path for a user's recent posts.
pub fn user_posts(user_id: &str) -> String {
    format!("/users/{user_id}/tweets")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(user_by_username("alice"), "/users/by/username/alice");
        assert_eq!(user_posts("123"), "/users/123/tweets");
    }
}
