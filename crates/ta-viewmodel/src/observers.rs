use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use ta_repo::Result;
use ta_types::Message;
use tracing::{debug, warn};

use crate::chat::State;

pub(crate) async fn groups(state: Arc<State>) {
    let stream = state.chat.observe_groups();
    tokio::pin!(stream);

    while let Some(result) = stream.next().await {
        let list = match result {
            Ok(list) => list,
            Err(e) => {
                warn!("Group query failed: {}", e);
                continue;
            }
        };

        if *state.current_group_id.borrow() == 0 {
            if let Some(first) = list.first() {
                state.current_group_id.send_replace(first.id);
            }
        }
        state.groups.send_replace(list);
    }
}

pub(crate) async fn users(state: Arc<State>) {
    let stream = state.users.observe_users();
    tokio::pin!(stream);

    while let Some(result) = stream.next().await {
        let list = match result {
            Ok(list) => list,
            Err(e) => {
                warn!("User query failed: {}", e);
                continue;
            }
        };

        // Keep the current sender in step with edits made elsewhere
        state.current_user.send_if_modified(|current| {
            let Some(c) = current else { return false };
            match list.iter().find(|u| u.id == c.id) {
                Some(fresh) if *fresh != *c => {
                    *c = fresh.clone();
                    true
                }
                _ => false,
            }
        });
        state.user_list.send_replace(list);
    }
}

type MessageStream = Pin<Box<dyn Stream<Item = Result<Vec<Message>>> + Send>>;

enum Step {
    GroupChanged,
    Messages(Option<Result<Vec<Message>>>),
    Shutdown,
}

/// Follows the current group: whenever it changes, the previous group's
/// query is dropped and the new group's one takes over.
pub(crate) async fn current_group_messages(state: Arc<State>) {
    let mut group_rx = state.current_group_id.subscribe();

    loop {
        let group_id = *group_rx.borrow_and_update();
        debug!("Observing messages of group {}", group_id);

        let mut stream: Option<MessageStream> = if group_id == 0 {
            state.apply_messages(Vec::new());
            None
        } else {
            Some(Box::pin(state.chat.observe_messages(group_id)))
        };

        loop {
            let step = tokio::select! {
                changed = group_rx.changed() => match changed {
                    Ok(()) => Step::GroupChanged,
                    Err(_) => Step::Shutdown,
                },
                item = next_item(&mut stream) => Step::Messages(item),
            };

            match step {
                Step::GroupChanged => break,
                Step::Shutdown => return,
                Step::Messages(Some(Ok(list))) => {
                    debug!("Group {} has {} messages", group_id, list.len());
                    state.apply_messages(list);
                }
                Step::Messages(Some(Err(e))) => warn!("Message query failed: {}", e),
                Step::Messages(None) => stream = None,
            }
        }
    }
}

async fn next_item(stream: &mut Option<MessageStream>) -> Option<Result<Vec<Message>>> {
    match stream {
        Some(s) => s.next().await,
        None => std::future::pending().await,
    }
}
