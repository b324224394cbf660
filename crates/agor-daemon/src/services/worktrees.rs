use super::{CreateWorktree, Services};
use crate::error::Result;
use agor_types::{Worktree, WorktreeId, WorktreePatch, board_channel, channels};

impl Services {
    pub async fn create_worktree(&self, input: CreateWorktree) -> Result<Worktree> {
        let mut worktree = Worktree::new(input.repo_id, input.path, input.branch, input.created_by);
        worktree.board_id = input.board_id;
        {
            let store = self.store.lock().await;
            store.insert_worktree(&worktree)?;
        }
        self.emit_worktree(&worktree, channels::events::WORKTREE_CREATE)?;
        Ok(worktree)
    }

    pub async fn get_worktree(&self, worktree_id: WorktreeId) -> Result<Worktree> {
        let store = self.store.lock().await;
        Ok(store.get_worktree(worktree_id)?)
    }

    pub async fn patch_worktree(
        &self,
        worktree_id: WorktreeId,
        patch: WorktreePatch,
    ) -> Result<Worktree> {
        let mut worktree = {
            let store = self.store.lock().await;
            store.get_worktree(worktree_id)?
        };
        if let Some(branch) = patch.branch {
            worktree.branch = branch;
        }
        if let Some(path) = patch.path {
            worktree.path = path;
        }
        if let Some(archived) = patch.archived {
            worktree.archived = archived;
        }
        worktree.last_updated = chrono::Utc::now();
        {
            let store = self.store.lock().await;
            store.update_worktree(&worktree)?;
        }
        self.emit_worktree(&worktree, channels::events::WORKTREE_PATCH)?;
        Ok(worktree)
    }

    /// Archive keeps the record and hides it; remove deletes outright.
    /// An archived worktree can come back via `unarchive_worktree`.
    pub async fn archive_worktree(&self, worktree_id: WorktreeId) -> Result<Worktree> {
        self.patch_worktree(worktree_id, WorktreePatch {
            archived: Some(true),
            ..Default::default()
        })
        .await
    }

    pub async fn unarchive_worktree(&self, worktree_id: WorktreeId) -> Result<Worktree> {
        self.patch_worktree(worktree_id, WorktreePatch {
            archived: Some(false),
            ..Default::default()
        })
        .await
    }

    pub async fn remove_worktree(&self, worktree_id: WorktreeId) -> Result<()> {
        let worktree = {
            let store = self.store.lock().await;
            let worktree = store.get_worktree(worktree_id)?;
            store.delete_worktree(worktree_id)?;
            worktree
        };
        self.emit_worktree(&worktree, channels::events::WORKTREE_REMOVE)?;
        Ok(())
    }

    pub async fn list_worktree_owners(&self, worktree_id: WorktreeId) -> Result<Vec<String>> {
        let store = self.store.lock().await;
        Ok(store.list_worktree_owners(worktree_id)?)
    }

    pub async fn add_worktree_owner(
        &self,
        worktree_id: WorktreeId,
        user_id: &str,
    ) -> Result<Vec<String>> {
        let owners = {
            let store = self.store.lock().await;
            store.get_worktree(worktree_id)?;
            store.add_worktree_owner(worktree_id, user_id)?;
            store.list_worktree_owners(worktree_id)?
        };
        Ok(owners)
    }

    pub async fn remove_worktree_owner(
        &self,
        worktree_id: WorktreeId,
        user_id: &str,
    ) -> Result<Vec<String>> {
        let owners = {
            let store = self.store.lock().await;
            store.remove_worktree_owner(worktree_id, user_id)?;
            store.list_worktree_owners(worktree_id)?
        };
        Ok(owners)
    }

    fn emit_worktree(&self, worktree: &Worktree, event: &str) -> Result<()> {
        if let Some(board_id) = worktree.board_id {
            self.bus.emit(
                &board_channel(board_id),
                event,
                serde_json::to_value(worktree)?,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DaemonConfig;
    use agor_store::Database;
    use std::sync::Arc;

    fn services() -> Services {
        let store = Arc::new(tokio::sync::Mutex::new(Database::open_in_memory().unwrap()));
        Services::new(
            store,
            crate::bus::EventBus::new(),
            Arc::new(DaemonConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_archive_unarchive_cycle() {
        let services = services();
        let worktree = services
            .create_worktree(CreateWorktree {
                repo_id: "repo".into(),
                path: "/tmp/wt".into(),
                branch: "main".into(),
                board_id: None,
                created_by: "tester".into(),
            })
            .await
            .unwrap();

        let archived = services.archive_worktree(worktree.worktree_id).await.unwrap();
        assert!(archived.archived);
        let restored = services
            .unarchive_worktree(worktree.worktree_id)
            .await
            .unwrap();
        assert!(!restored.archived);
    }

    #[tokio::test]
    async fn test_owner_management() {
        let services = services();
        let worktree = services
            .create_worktree(CreateWorktree {
                repo_id: "repo".into(),
                path: "/tmp/wt".into(),
                branch: "main".into(),
                board_id: None,
                created_by: "tester".into(),
            })
            .await
            .unwrap();

        let owners = services
            .add_worktree_owner(worktree.worktree_id, "alice")
            .await
            .unwrap();
        assert_eq!(owners, vec!["alice"]);

        let owners = services
            .remove_worktree_owner(worktree.worktree_id, "alice")
            .await
            .unwrap();
        assert!(owners.is_empty());
    }
}
