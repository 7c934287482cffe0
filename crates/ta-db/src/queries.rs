use crate::Database;
use crate::models::{
    GROUP_COLUMNS, GroupRow, MESSAGE_COLUMNS, MessageRow, USER_COLUMNS, UserRow, to_millis,
};
use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use ta_types::{Group, Message, NewMessage, Table, User};

impl Database {
    // -- Messages --

    pub fn insert_message(&self, msg: &NewMessage) -> Result<i64> {
        self.with_conn_mut(&[Table::Messages], |conn| {
            conn.execute(
                "INSERT INTO messages (content, timestamp, group_id, type, attachment_uri, sender_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    msg.content,
                    to_millis(msg.timestamp),
                    msg.group_id,
                    msg.kind.as_str(),
                    msg.attachment_uri,
                    msg.sender_id,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Overwrites every column of the stored message. Returns false when no
    /// message has that id.
    pub fn update_message(&self, msg: &Message) -> Result<bool> {
        self.with_conn_mut(&[Table::Messages], |conn| {
            let changed = conn.execute(
                "UPDATE messages
                 SET content = ?2, timestamp = ?3, group_id = ?4, type = ?5, attachment_uri = ?6,
                     is_edited = ?7, edited_timestamp = ?8, sender_id = ?9
                 WHERE id = ?1",
                params![
                    msg.id,
                    msg.content,
                    to_millis(msg.timestamp),
                    msg.group_id,
                    msg.kind.as_str(),
                    msg.attachment_uri,
                    msg.is_edited,
                    msg.edited_timestamp.map(to_millis),
                    msg.sender_id,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_message(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(&[Table::Messages], |conn| {
            Ok(conn.execute("DELETE FROM messages WHERE id = ?1", [id])? > 0)
        })
    }

    pub fn delete_messages_in_group(&self, group_id: i64) -> Result<usize> {
        self.with_conn_mut(&[Table::Messages], |conn| {
            Ok(conn.execute("DELETE FROM messages WHERE group_id = ?1", [group_id])?)
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<Message>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS);
            let row = conn
                .query_row(&sql, [id], MessageRow::from_row)
                .optional()?;
            Ok(row.map(Message::from))
        })
    }

    /// Messages of a group, oldest first.
    pub fn messages_for_group(&self, group_id: i64) -> Result<Vec<Message>> {
        self.with_conn(|conn| query_messages_for_group(conn, group_id))
    }

    /// Messages of a group whose content contains `query`, newest first.
    /// The match is a plain substring: LIKE wildcards in `query` are escaped.
    pub fn search_messages(&self, group_id: i64, query: &str) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let sql = format!(
                r"SELECT {} FROM messages
                  WHERE group_id = ?1 AND content LIKE '%' || ?2 || '%' ESCAPE '\'
                  ORDER BY timestamp DESC, id DESC",
                MESSAGE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![group_id, escape_like(query)], MessageRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows.into_iter().map(Message::from).collect())
        })
    }

    // -- Groups --

    pub fn insert_group(&self, name: &str) -> Result<i64> {
        self.with_conn_mut(&[Table::Groups], |conn| {
            conn.execute(
                r#"INSERT INTO "groups" (name, created_time) VALUES (?1, ?2)"#,
                params![name, to_millis(Utc::now())],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Deletes a group together with all of its messages. Returns false when
    /// the group did not exist.
    pub fn delete_group(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(&[Table::Messages, Table::Groups], |conn| {
            conn.execute("DELETE FROM messages WHERE group_id = ?1", [id])?;
            Ok(conn.execute(r#"DELETE FROM "groups" WHERE id = ?1"#, [id])? > 0)
        })
    }

    pub fn get_group(&self, id: i64) -> Result<Option<Group>> {
        self.with_conn(|conn| {
            let sql = format!(r#"SELECT {} FROM "groups" WHERE id = ?1"#, GROUP_COLUMNS);
            let row = conn.query_row(&sql, [id], GroupRow::from_row).optional()?;
            Ok(row.map(Group::from))
        })
    }

    /// All groups, newest first.
    pub fn all_groups(&self) -> Result<Vec<Group>> {
        self.with_conn(|conn| {
            let sql = format!(
                r#"SELECT {} FROM "groups" ORDER BY created_time DESC, id DESC"#,
                GROUP_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], GroupRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows.into_iter().map(Group::from).collect())
        })
    }

    // -- Users --

    pub fn insert_user(&self, name: &str, avatar_color: &str, is_default: bool) -> Result<i64> {
        self.with_conn_mut(&[Table::Users], |conn| {
            conn.execute(
                "INSERT INTO users (name, avatar_color, created_time, is_default) VALUES (?1, ?2, ?3, ?4)",
                params![name, avatar_color, to_millis(Utc::now()), is_default],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Updates name and avatar color. The default flag is left alone.
    pub fn update_user(&self, user: &User) -> Result<bool> {
        self.with_conn_mut(&[Table::Users], |conn| {
            let changed = conn.execute(
                "UPDATE users SET name = ?2, avatar_color = ?3 WHERE id = ?1",
                params![user.id, user.name, user.avatar_color],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_user(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(&[Table::Users], |conn| {
            Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])? > 0)
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
            let row = conn.query_row(&sql, [id], UserRow::from_row).optional()?;
            Ok(row.map(User::from))
        })
    }

    pub fn default_user(&self) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users WHERE is_default = 1 ORDER BY id LIMIT 1",
                USER_COLUMNS
            );
            let row = conn.query_row(&sql, [], UserRow::from_row).optional()?;
            Ok(row.map(User::from))
        })
    }

    /// All users, oldest first.
    pub fn all_users(&self) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users ORDER BY created_time ASC, id ASC",
                USER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], UserRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows.into_iter().map(User::from).collect())
        })
    }
}

fn query_messages_for_group(conn: &Connection, group_id: i64) -> Result<Vec<Message>> {
    let sql = format!(
        "SELECT {} FROM messages WHERE group_id = ?1 ORDER BY timestamp ASC, id ASC",
        MESSAGE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([group_id], MessageRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows.into_iter().map(Message::from).collect())
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
