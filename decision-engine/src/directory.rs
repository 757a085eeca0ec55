//! Group membership lookup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{DecisionError, EngineResult};
use crate::session::UserId;

/// Shared reference to a participant directory
pub type SharedDirectory = Arc<dyn ParticipantDirectory>;

/// Resolves a group to the participants who take turns.
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    async fn participants(&self, group_id: &str) -> EngineResult<Vec<UserId>>;
}

/// Fixed in-memory membership table.
#[derive(Default)]
pub struct StaticDirectory {
    groups: RwLock<HashMap<String, Vec<UserId>>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert_group`](Self::insert_group).
    pub fn with_group<I, S>(mut self, group_id: &str, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members = members.into_iter().map(Into::into).collect();
        self.groups.get_mut().insert(group_id.to_string(), members);
        self
    }

    pub async fn insert_group(&self, group_id: &str, members: Vec<UserId>) {
        self.groups.write().await.insert(group_id.to_string(), members);
    }

    /// Create a shared reference to this directory
    pub fn shared(self) -> SharedDirectory {
        Arc::new(self)
    }
}

#[async_trait]
impl ParticipantDirectory for StaticDirectory {
    async fn participants(&self, group_id: &str) -> EngineResult<Vec<UserId>> {
        let groups = self.groups.read().await;
        let members = groups
            .get(group_id)
            .ok_or_else(|| DecisionError::directory(format!("unknown group {group_id}")))?;
        if members.is_empty() {
            return Err(DecisionError::directory(format!("group {group_id} has no members")));
        }
        Ok(members.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup() {
        let dir = StaticDirectory::new().with_group("g-1", ["alice", "bob"]);
        assert_eq!(dir.participants("g-1").await.unwrap(), vec!["alice", "bob"]);

        let err = dir.participants("g-2").await.unwrap_err();
        assert_eq!(err.code(), "DIRECTORY_ERROR");
    }

    #[tokio::test]
    async fn test_empty_group_is_an_error() {
        let dir = StaticDirectory::new();
        dir.insert_group("g-1", Vec::new()).await;
        assert!(dir.participants("g-1").await.is_err());
    }
}
