use std::sync::Arc;

use futures_util::Stream;
use ta_db::Database;
use ta_types::{Group, Message, NewMessage, Table, models};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::observe::{blocking, observe};

/// Messages and groups.
#[derive(Clone)]
pub struct ChatRepository {
    db: Arc<Database>,
}

impl ChatRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // -- Messages --

    pub async fn messages_for_group(&self, group_id: i64) -> Result<Vec<Message>> {
        let db = self.db.clone();
        blocking(move || db.messages_for_group(group_id)).await
    }

    /// Live message list of a group, oldest first.
    pub fn observe_messages(&self, group_id: i64) -> impl Stream<Item = Result<Vec<Message>>> + Send + 'static {
        observe(self.db.clone(), &[Table::Messages], move |db| {
            db.messages_for_group(group_id)
        })
    }

    pub async fn send_message(&self, msg: NewMessage) -> Result<Message> {
        let db = self.db.clone();
        let (id, msg) = blocking(move || {
            let id = db.insert_message(&msg)?;
            Ok((id, msg))
        })
        .await?;

        debug!("Stored message {} in group {}", id, msg.group_id);

        Ok(Message {
            id,
            content: msg.content,
            timestamp: msg.timestamp,
            group_id: msg.group_id,
            kind: msg.kind,
            attachment_uri: msg.attachment_uri,
            is_edited: false,
            edited_timestamp: None,
            sender_id: msg.sender_id,
        })
    }

    pub async fn update_message(&self, msg: Message) -> Result<Message> {
        let db = self.db.clone();
        let id = msg.id;
        let (found, msg) = blocking(move || {
            let found = db.update_message(&msg)?;
            Ok((found, msg))
        })
        .await?;

        if !found {
            return Err(Error::NotFound { kind: "message", id });
        }
        Ok(msg)
    }

    /// Replaces the content and marks the message as edited now.
    pub async fn edit_message(&self, msg: &Message, new_content: &str) -> Result<Message> {
        let edited = Message {
            content: new_content.to_string(),
            is_edited: true,
            edited_timestamp: Some(models::now()),
            ..msg.clone()
        };
        self.update_message(edited).await
    }

    /// Deleting a message that no longer exists is not an error.
    pub async fn delete_message(&self, id: i64) -> Result<()> {
        let db = self.db.clone();
        let removed = blocking(move || db.delete_message(id)).await?;
        if !removed {
            debug!("Message {} was already gone", id);
        }
        Ok(())
    }

    pub async fn get_message(&self, id: i64) -> Result<Option<Message>> {
        let db = self.db.clone();
        blocking(move || db.get_message(id)).await
    }

    /// Substring search within a group, newest first.
    pub async fn search_messages(&self, group_id: i64, query: &str) -> Result<Vec<Message>> {
        let db = self.db.clone();
        let query = query.to_string();
        blocking(move || db.search_messages(group_id, &query)).await
    }

    pub fn observe_search(
        &self,
        group_id: i64,
        query: &str,
    ) -> impl Stream<Item = Result<Vec<Message>>> + Send + 'static {
        let query = query.to_string();
        observe(self.db.clone(), &[Table::Messages], move |db| {
            db.search_messages(group_id, &query)
        })
    }

    // -- Groups --

    /// All groups, newest first.
    pub async fn all_groups(&self) -> Result<Vec<Group>> {
        let db = self.db.clone();
        blocking(move || db.all_groups()).await
    }

    pub fn observe_groups(&self) -> impl Stream<Item = Result<Vec<Group>>> + Send + 'static {
        observe(self.db.clone(), &[Table::Groups], |db| db.all_groups())
    }

    pub async fn create_group(&self, name: &str) -> Result<i64> {
        let db = self.db.clone();
        let owned = name.to_string();
        let id = blocking(move || db.insert_group(&owned)).await?;
        info!("Created group {} ({})", id, name);
        Ok(id)
    }

    pub async fn get_group(&self, id: i64) -> Result<Option<Group>> {
        let db = self.db.clone();
        blocking(move || db.get_group(id)).await
    }

    /// Deletes the group and every message in it.
    pub async fn delete_group(&self, group: &Group) -> Result<()> {
        let db = self.db.clone();
        let id = group.id;
        if blocking(move || db.delete_group(id)).await? {
            info!("Deleted group {} ({})", id, group.name);
        }
        Ok(())
    }
}
