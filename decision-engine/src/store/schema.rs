//! Column family and key layout for the RocksDB session store

/// Column family for elimination sessions
pub const CF_SESSIONS: &str = "sessions";

/// Column family for completed decision results
pub const CF_RESULTS: &str = "results";

/// All column family names
pub const ALL_CFS: &[&str] = &[CF_SESSIONS, CF_RESULTS];

/// Key prefixes for compound keys
pub mod keys {
    pub const SESSION_PREFIX: &str = "sess:";
    pub const RESULT_PREFIX: &str = "result:";

    /// Create a session key
    pub fn session(session_id: &str) -> String {
        format!("{SESSION_PREFIX}{session_id}")
    }

    /// Create a result key
    pub fn result(session_id: &str) -> String {
        format!("{RESULT_PREFIX}{session_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_carry_prefix() {
        assert_eq!(keys::session("s-1"), "sess:s-1");
        assert_eq!(keys::result("s-1"), "result:s-1");
        assert_eq!(ALL_CFS.len(), 2);
    }
}
