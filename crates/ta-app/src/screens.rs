//! Text renderings of the app's screens. Everything here is pure: the
//! caller passes in a snapshot of view-model state.

use std::fmt::Write;

use chrono::Local;
use ta_types::models::{IMAGE_PLACEHOLDER, format_argb};
use ta_types::{Group, Message, MessageType, Settings, User};

pub struct ChatView<'a> {
    pub group: Option<&'a Group>,
    pub messages: &'a [Message],
    pub users: &'a [User],
    pub current_user: Option<&'a User>,
    pub search: Option<&'a str>,
    pub developer_mode: bool,
    pub schema_version: i64,
}

fn sender_label(msg: &Message, users: &[User], current: Option<&User>) -> String {
    let name = users
        .iter()
        .find(|u| u.id == msg.sender_id)
        .map(|u| u.name.as_str())
        .unwrap_or("unknown user");

    if current.is_some_and(|c| c.id == msg.sender_id) {
        format!("me ({})", name)
    } else {
        name.to_string()
    }
}

pub fn message_line(msg: &Message, users: &[User], current: Option<&User>, developer_mode: bool) -> String {
    let mut line = String::new();
    if developer_mode {
        let _ = write!(line, "#{} ", msg.id);
    }
    let _ = write!(
        line,
        "[{}] {}: ",
        msg.timestamp.with_timezone(&Local).format("%H:%M"),
        sender_label(msg, users, current)
    );

    match (msg.kind, msg.attachment_uri.as_deref()) {
        (MessageType::Image, Some(uri)) => {
            let _ = write!(line, "[image {}]", uri);
            if !msg.content.trim().is_empty() && msg.content != IMAGE_PLACEHOLDER {
                let _ = write!(line, " {}", msg.content);
            }
        }
        (MessageType::File, Some(uri)) => {
            let _ = write!(line, "[file {}]", uri);
            if !msg.content.trim().is_empty() {
                let _ = write!(line, " {}", msg.content);
            }
        }
        _ => line.push_str(&msg.content),
    }

    if msg.is_edited {
        line.push_str(" (edited)");
    }
    line
}

pub fn chat(view: &ChatView<'_>) -> String {
    let mut out = String::new();

    let title = view.group.map(|g| g.name.as_str()).unwrap_or("(no group)");
    let sender = view.current_user.map(|u| u.name.as_str()).unwrap_or("?");
    let _ = writeln!(out, "== {} == sending as {}", title, sender);

    if view.developer_mode {
        let _ = writeln!(
            out,
            "   group_id={} schema=v{} messages={}",
            view.group.map(|g| g.id).unwrap_or(0),
            view.schema_version,
            view.messages.len()
        );
    }
    if let Some(query) = view.search {
        let _ = writeln!(out, "   searching for \"{}\" ({} found)", query, view.messages.len());
    }

    if view.messages.is_empty() {
        out.push_str("   (no messages)\n");
    }
    for msg in view.messages {
        let _ = writeln!(
            out,
            "{}",
            message_line(msg, view.users, view.current_user, view.developer_mode)
        );
    }
    out
}

pub fn groups(groups: &[Group], current_id: i64) -> String {
    let mut out = String::from("Groups:\n");
    if groups.is_empty() {
        out.push_str("   (none, create one with /group new <name>)\n");
    }
    for g in groups {
        let marker = if g.id == current_id { '*' } else { ' ' };
        let _ = writeln!(
            out,
            " {} {:>3}  {}  (created {})",
            marker,
            g.id,
            g.name,
            g.created_time.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        );
    }
    out
}

pub fn users(users: &[User], current: Option<&User>) -> String {
    let mut out = String::from("Users:\n");
    for u in users {
        let marker = if current.is_some_and(|c| c.id == u.id) { '*' } else { ' ' };
        let _ = write!(out, " {} {:>3}  ({}) {}  {}", marker, u.id, u.initial(), u.name, u.avatar_color);
        if u.is_default {
            out.push_str("  [default]");
        }
        out.push('\n');
    }
    out
}

pub fn settings(s: &Settings) -> String {
    let on_off = |b: bool| if b { "on" } else { "off" };
    format!(
        "Settings:\n   dynamic color   {}\n   primary color   {}\n   developer mode  {}\n",
        on_off(s.use_dynamic_color),
        format_argb(s.custom_primary_color),
        on_off(s.developer_mode)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ta_types::models::now;

    fn user(id: i64, name: &str, is_default: bool) -> User {
        User {
            id,
            name: name.into(),
            avatar_color: "#FF6200EE".into(),
            created_time: now(),
            is_default,
        }
    }

    fn message(id: i64, sender_id: i64, content: &str) -> Message {
        Message {
            id,
            content: content.into(),
            timestamp: now(),
            group_id: 1,
            kind: MessageType::Text,
            attachment_uri: None,
            is_edited: false,
            edited_timestamp: None,
            sender_id,
        }
    }

    #[test]
    fn test_message_line_labels_sender() {
        let users = [user(1, "Me", true), user(2, "Work", false)];

        let mine = message_line(&message(1, 1, "hi"), &users, Some(&users[0]), false);
        assert!(mine.ends_with("me (Me): hi"), "{}", mine);

        let theirs = message_line(&message(2, 2, "yo"), &users, Some(&users[0]), false);
        assert!(theirs.ends_with("Work: yo"), "{}", theirs);

        let orphan = message_line(&message(3, 9, "?"), &users, Some(&users[0]), true);
        assert!(orphan.starts_with("#3 "));
        assert!(orphan.contains("unknown user: ?"));
    }

    #[test]
    fn test_message_line_attachments_and_edits() {
        let users = [user(1, "Me", true)];

        let mut img = message(1, 1, IMAGE_PLACEHOLDER);
        img.kind = MessageType::Image;
        img.attachment_uri = Some("file:///cat.png".into());
        let line = message_line(&img, &users, None, false);
        assert!(line.ends_with("[image file:///cat.png]"), "{}", line);

        let mut edited = message(2, 1, "fixed");
        edited.is_edited = true;
        assert!(message_line(&edited, &users, None, false).ends_with("fixed (edited)"));
    }

    #[test]
    fn test_chat_screen_header() {
        let group = Group { id: 4, name: "Diary".into(), created_time: now() };
        let users = [user(1, "Me", true)];
        let view = ChatView {
            group: Some(&group),
            messages: &[],
            users: &users,
            current_user: Some(&users[0]),
            search: Some("milk"),
            developer_mode: true,
            schema_version: 3,
        };

        let out = chat(&view);
        assert!(out.starts_with("== Diary == sending as Me"));
        assert!(out.contains("group_id=4 schema=v3"));
        assert!(out.contains("searching for \"milk\" (0 found)"));
        assert!(out.contains("(no messages)"));
    }

    #[test]
    fn test_lists_mark_current() {
        let g = [Group { id: 2, name: "B".into(), created_time: now() }];
        assert!(groups(&g, 2).contains(" *   2  B"));

        let u = [user(1, "Me", true), user(2, "Work", false)];
        let out = users(&u, Some(&u[1]));
        assert!(out.contains("[default]"));
        assert!(out.contains(" *   2  (W) Work"));

        assert!(settings(&Settings::default()).contains("#FFB186D6"));
    }
}
