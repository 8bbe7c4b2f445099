pub const AUTH_HEADER: &str = "Authorization";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const ACCEPT_HEADER: &str = "Accept";
pub const SNOWFLAKE_AUTH_HEADER: &str = "X-Snowflake-Authorization-Token-Type";
pub const USER_AGENT_HEADER: &str = "User-Agent";

pub const USER_AGENT: &str = "flurry";
/// Returned when an object doesn't exist or the current role can't see it.
pub const OBJECT_DOES_NOT_EXIST: &str = "002003";
