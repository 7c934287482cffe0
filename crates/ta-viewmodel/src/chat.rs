use std::sync::{Arc, Mutex, MutexGuard};

use ta_db::Database;
use ta_repo::{ChatRepository, Error, Result, UserRepository};
use ta_types::models::{self, DEFAULT_GROUP_NAME, DEFAULT_USER_ID, IMAGE_PLACEHOLDER};
use ta_types::{Group, Message, MessageType, NewMessage, User};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::observers;

/// Observable state of the chat screens. Each field is the sending half of
/// a watch channel; the screens hold receivers.
pub(crate) struct State {
    pub(crate) chat: ChatRepository,
    pub(crate) users: UserRepository,

    /// 0 while no group is selected
    pub(crate) current_group_id: watch::Sender<i64>,
    /// What the chat screen shows: the group's messages, filtered while searching
    pub(crate) messages: watch::Sender<Vec<Message>>,
    /// Unfiltered messages of the current group, restored when search ends
    pub(crate) all_messages: watch::Sender<Vec<Message>>,
    pub(crate) groups: watch::Sender<Vec<Group>>,
    pub(crate) user_list: watch::Sender<Vec<User>>,
    pub(crate) current_user: watch::Sender<Option<User>>,
    pub(crate) search_query: watch::Sender<String>,
    pub(crate) is_searching: watch::Sender<bool>,
    /// Held while the search inputs or the unfiltered list change and
    /// `messages` is re-derived from them
    filter: Mutex<()>,
}

impl State {
    /// Replaces the unfiltered list and re-derives what is shown.
    pub(crate) fn apply_messages(&self, list: Vec<Message>) {
        let _guard = self.lock_filter();
        self.all_messages.send_replace(list);
        self.refilter();
    }

    /// Sets the search query. A blank query ends searching.
    fn set_search(&self, query: &str) {
        let _guard = self.lock_filter();
        self.search_query.send_replace(query.to_string());
        self.is_searching.send_replace(!query.trim().is_empty());
        self.refilter();
    }

    fn lock_filter(&self) -> MutexGuard<'_, ()> {
        self.filter.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Caller holds the filter lock.
    fn refilter(&self) {
        let query = self.search_query.borrow().clone();
        let shown: Vec<Message> = if *self.is_searching.borrow() && !query.trim().is_empty() {
            self.all_messages
                .borrow()
                .iter()
                .filter(|m| m.matches(&query))
                .cloned()
                .collect()
        } else {
            self.all_messages.borrow().clone()
        };
        self.messages.send_replace(shown);
    }
}

/// View-model behind the chat, group and user screens. Background
/// observers live as long as the view-model and are aborted by `close` or
/// on drop.
pub struct ChatViewModel {
    state: Arc<State>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ChatViewModel {
    /// Bootstraps the default user and group, then starts observing the
    /// store.
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        let state = Arc::new(State {
            chat: ChatRepository::new(db.clone()),
            users: UserRepository::new(db),
            current_group_id: watch::Sender::new(0),
            messages: watch::Sender::new(Vec::new()),
            all_messages: watch::Sender::new(Vec::new()),
            groups: watch::Sender::new(Vec::new()),
            user_list: watch::Sender::new(Vec::new()),
            current_user: watch::Sender::new(None),
            search_query: watch::Sender::new(String::new()),
            is_searching: watch::Sender::new(false),
            filter: Mutex::new(()),
        });

        let default_user = state.users.ensure_default_user().await?;
        debug!("Current user set to {}", default_user.name);
        state.current_user.send_replace(Some(default_user));

        ensure_default_group(&state).await?;

        let tasks = vec![
            tokio::spawn(observers::groups(state.clone())),
            tokio::spawn(observers::users(state.clone())),
            tokio::spawn(observers::current_group_messages(state.clone())),
        ];

        info!("Chat view-model ready (group {})", *state.current_group_id.borrow());
        Ok(Self {
            state,
            tasks: Mutex::new(tasks),
        })
    }

    /// Stops the background observers. State stays readable but no longer
    /// follows the store.
    pub fn close(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for task in tasks.drain(..) {
            task.abort();
        }
    }

    // -- State snapshots and subscriptions --

    pub fn current_group_id(&self) -> i64 {
        *self.state.current_group_id.borrow()
    }

    pub fn current_group_id_receiver(&self) -> watch::Receiver<i64> {
        self.state.current_group_id.subscribe()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.messages.borrow().clone()
    }

    pub fn messages_receiver(&self) -> watch::Receiver<Vec<Message>> {
        self.state.messages.subscribe()
    }

    pub fn groups(&self) -> Vec<Group> {
        self.state.groups.borrow().clone()
    }

    pub fn groups_receiver(&self) -> watch::Receiver<Vec<Group>> {
        self.state.groups.subscribe()
    }

    pub fn users(&self) -> Vec<User> {
        self.state.user_list.borrow().clone()
    }

    pub fn users_receiver(&self) -> watch::Receiver<Vec<User>> {
        self.state.user_list.subscribe()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.current_user.borrow().clone()
    }

    pub fn current_user_receiver(&self) -> watch::Receiver<Option<User>> {
        self.state.current_user.subscribe()
    }

    pub fn search_query(&self) -> String {
        self.state.search_query.borrow().clone()
    }

    pub fn is_searching(&self) -> bool {
        *self.state.is_searching.borrow()
    }

    pub fn is_searching_receiver(&self) -> watch::Receiver<bool> {
        self.state.is_searching.subscribe()
    }

    // -- Messages --

    /// Sends into the current group as the current user. Blank text and a
    /// missing group are rejected with `Ok(None)`.
    pub async fn send_message(
        &self,
        content: &str,
        kind: MessageType,
        attachment_uri: Option<String>,
    ) -> Result<Option<Message>> {
        if content.trim().is_empty() && kind == MessageType::Text {
            debug!("Rejected blank text message");
            return Ok(None);
        }

        let group_id = self.current_group_id();
        if group_id == 0 {
            debug!("Rejected message: no group selected");
            return Ok(None);
        }

        let sender_id = self.current_user().map(|u| u.id).unwrap_or(DEFAULT_USER_ID);
        let content = if content.trim().is_empty() && kind == MessageType::Image {
            IMAGE_PLACEHOLDER.to_string()
        } else {
            content.to_string()
        };

        let msg = NewMessage {
            content,
            timestamp: models::now(),
            group_id,
            kind,
            attachment_uri,
            sender_id,
        };
        self.state.chat.send_message(msg).await.map(Some)
    }

    pub async fn edit_message(&self, msg: &Message, new_content: &str) -> Result<Message> {
        self.state.chat.edit_message(msg, new_content).await
    }

    pub async fn delete_message(&self, id: i64) -> Result<()> {
        self.state.chat.delete_message(id).await
    }

    /// Looks a message up among the current group's messages.
    pub fn find_message(&self, id: i64) -> Option<Message> {
        self.state
            .all_messages
            .borrow()
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    // -- Search --

    /// Filters the current group's messages by substring, ignoring case.
    /// A blank query ends the search.
    pub fn search_messages(&self, query: &str) {
        self.state.set_search(query);
    }

    pub fn clear_search(&self) {
        self.state.set_search("");
    }

    // -- Groups --

    /// Creates a group and makes it current. Blank names are rejected with
    /// `Ok(None)`.
    pub async fn create_group(&self, name: &str) -> Result<Option<i64>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let id = self.state.chat.create_group(name).await?;
        self.state.current_group_id.send_replace(id);
        Ok(Some(id))
    }

    pub fn switch_group(&self, group_id: i64) {
        self.state.current_group_id.send_replace(group_id);
        self.clear_search();
    }

    /// Deletes the group and its messages. When it was the current group the
    /// newest remaining one takes its place.
    pub async fn delete_group(&self, group: &Group) -> Result<()> {
        self.state.chat.delete_group(group).await?;

        if self.current_group_id() == group.id {
            let next = self
                .state
                .chat
                .all_groups()
                .await?
                .first()
                .map(|g| g.id)
                .unwrap_or(0);
            self.switch_group(next);
        }
        Ok(())
    }

    // -- Users --

    pub fn switch_user(&self, user: User) {
        debug!("Switched to user {}", user.name);
        self.state.current_user.send_replace(Some(user));
    }

    /// Creates a user and makes it the current sender. Blank names are
    /// rejected with `Ok(None)`.
    pub async fn create_user(&self, name: &str, avatar_color: &str) -> Result<Option<User>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let id = self.state.users.create_user(name, avatar_color).await?;
        let user = self.state.users.get_user(id).await?;
        if let Some(user) = &user {
            self.state.current_user.send_replace(Some(user.clone()));
        }
        Ok(user)
    }

    pub async fn update_user(&self, user: &User) -> Result<()> {
        self.state.users.update_user(user).await?;
        self.state.current_user.send_if_modified(|current| match current {
            Some(c) if c.id == user.id => {
                *c = User {
                    is_default: c.is_default,
                    ..user.clone()
                };
                true
            }
            _ => false,
        });
        Ok(())
    }

    /// Deletes a user. The default user is never deleted; `Ok(false)` is
    /// returned instead. Deleting the current user falls back to the
    /// default one.
    pub async fn delete_user(&self, user: &User) -> Result<bool> {
        if user.is_default {
            return Ok(false);
        }
        match self.state.users.delete_user(user).await {
            Err(Error::DefaultUserProtected) => return Ok(false),
            other => other?,
        }

        if self.current_user().is_some_and(|c| c.id == user.id) {
            let fallback = self.state.users.default_user().await?;
            self.state.current_user.send_replace(fallback);
        }
        Ok(true)
    }

    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        self.state.users.get_user(id).await
    }
}

impl Drop for ChatViewModel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Creates the default group when there are none, otherwise selects the
/// newest group if nothing is selected yet.
async fn ensure_default_group(state: &State) -> Result<()> {
    let groups = state.chat.all_groups().await?;
    match groups.first() {
        None => {
            let id = state.chat.create_group(DEFAULT_GROUP_NAME).await?;
            info!("Created default group {}", id);
            state.current_group_id.send_replace(id);
        }
        Some(first) => {
            if *state.current_group_id.borrow() == 0 {
                state.current_group_id.send_replace(first.id);
            }
        }
    }
    Ok(())
}
