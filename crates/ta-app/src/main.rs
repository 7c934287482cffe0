mod commands;
mod screens;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

use ta_db::Database;
use ta_repo::SettingsRepository;
use ta_types::MessageType;
use ta_viewmodel::ChatViewModel;

use crate::commands::{Command, HELP};
use crate::screens::ChatView;

/// How long to wait for the message list to catch up with a write before
/// redrawing anyway.
const SETTLE_TIMEOUT: Duration = Duration::from_millis(500);

struct App {
    db: Arc<Database>,
    vm: ChatViewModel,
    settings: SettingsRepository,
}

enum Flow {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so they stay out of the screens
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ta_app=info,ta_db=warn,ta_repo=warn,ta_viewmodel=warn,rusqlite=off".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("TA_DB_PATH").unwrap_or_else(|_| "ta.db".into());
    let settings_path =
        std::env::var("TA_SETTINGS_PATH").unwrap_or_else(|_| "ta-settings.json".into());
    let ephemeral = std::env::var("TA_EPHEMERAL")
        .map(|v| matches!(v.as_str(), "1" | "true"))
        .unwrap_or(false);

    // Init storage
    let (db, settings) = if ephemeral {
        info!("Ephemeral mode: nothing will be saved");
        (Database::open_in_memory()?, SettingsRepository::in_memory())
    } else {
        (
            Database::open(&PathBuf::from(&db_path))?,
            SettingsRepository::open(&PathBuf::from(&settings_path)).await?,
        )
    };
    let db = Arc::new(db);
    let vm = ChatViewModel::new(db.clone()).await?;

    let app = App { db, vm, settings };
    app.run().await?;

    info!("Bye");
    Ok(())
}

impl App {
    async fn run(&self) -> anyhow::Result<()> {
        // Let the first query land before drawing
        settle(self.vm.messages_receiver()).await;
        self.print_chat()?;
        println!("Type a message, or /help.");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let command = match commands::parse(&line) {
                Ok(command) => command,
                Err(e) => {
                    println!("{}", e);
                    continue;
                }
            };

            match self.dispatch(command).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(e) => {
                    warn!("Command failed: {:#}", e);
                    println!("error: {:#}", e);
                }
            }
        }

        self.vm.close();
        Ok(())
    }

    async fn dispatch(&self, command: Command) -> anyhow::Result<Flow> {
        let vm = &self.vm;

        match command {
            Command::Help => println!("{}", HELP),
            Command::Show => self.print_chat()?,
            Command::Quit => return Ok(Flow::Quit),

            Command::Send(text) => {
                let rx = vm.messages_receiver();
                if vm.send_message(&text, MessageType::Text, None).await?.is_none() {
                    println!("nothing sent");
                    return Ok(Flow::Continue);
                }
                settle(rx).await;
                self.print_chat()?;
            }
            Command::SendAttachment { image, uri, caption } => {
                let kind = if image { MessageType::Image } else { MessageType::File };
                let rx = vm.messages_receiver();
                if vm.send_message(&caption, kind, Some(uri)).await?.is_none() {
                    println!("nothing sent");
                    return Ok(Flow::Continue);
                }
                settle(rx).await;
                self.print_chat()?;
            }
            Command::Edit { id, text } => {
                let Some(msg) = vm.find_message(id) else {
                    println!("no message {} in this group", id);
                    return Ok(Flow::Continue);
                };
                let rx = vm.messages_receiver();
                vm.edit_message(&msg, &text).await?;
                settle(rx).await;
                self.print_chat()?;
            }
            Command::Delete(id) => {
                if vm.find_message(id).is_none() {
                    println!("no message {} in this group", id);
                    return Ok(Flow::Continue);
                }
                let rx = vm.messages_receiver();
                vm.delete_message(id).await?;
                settle(rx).await;
                self.print_chat()?;
            }
            Command::Search(query) => {
                vm.search_messages(&query);
                self.print_chat()?;
            }
            Command::ClearSearch => {
                vm.clear_search();
                self.print_chat()?;
            }

            Command::Groups => print!("{}", screens::groups(&vm.groups(), vm.current_group_id())),
            Command::CreateGroup(name) => {
                let rx = vm.messages_receiver();
                if vm.create_group(&name).await?.is_some() {
                    settle(rx).await;
                    self.print_chat()?;
                }
            }
            Command::SwitchGroup(id) => {
                if !vm.groups().iter().any(|g| g.id == id) {
                    println!("no group {}", id);
                    return Ok(Flow::Continue);
                }
                let rx = vm.messages_receiver();
                vm.switch_group(id);
                settle(rx).await;
                self.print_chat()?;
            }
            Command::DeleteGroup(id) => {
                let Some(group) = vm.groups().into_iter().find(|g| g.id == id) else {
                    println!("no group {}", id);
                    return Ok(Flow::Continue);
                };
                let rx = vm.messages_receiver();
                vm.delete_group(&group).await?;
                println!("deleted group {} and its messages", group.name);
                settle(rx).await;
                self.print_chat()?;
            }

            Command::Users => {
                print!("{}", screens::users(&vm.users(), vm.current_user().as_ref()))
            }
            Command::CreateUser { name, color } => {
                if let Some(user) = vm.create_user(&name, &color).await? {
                    println!("now sending as {}", user.name);
                }
            }
            Command::SwitchUser(id) => match vm.get_user_by_id(id).await? {
                Some(user) => {
                    println!("now sending as {}", user.name);
                    vm.switch_user(user);
                }
                None => println!("no user {}", id),
            },
            Command::RenameUser { id, name } => {
                let Some(mut user) = vm.get_user_by_id(id).await? else {
                    println!("no user {}", id);
                    return Ok(Flow::Continue);
                };
                if name.trim().is_empty() {
                    println!("name cannot be blank");
                    return Ok(Flow::Continue);
                }
                user.name = name.trim().to_string();
                vm.update_user(&user).await?;
                println!("renamed user {} to {}", id, user.name);
            }
            Command::RecolorUser { id, color } => {
                let Some(mut user) = vm.get_user_by_id(id).await? else {
                    println!("no user {}", id);
                    return Ok(Flow::Continue);
                };
                user.avatar_color = color;
                vm.update_user(&user).await?;
                println!("user {} is now {}", user.name, user.avatar_color);
            }
            Command::DeleteUser(id) => {
                let Some(user) = vm.get_user_by_id(id).await? else {
                    println!("no user {}", id);
                    return Ok(Flow::Continue);
                };
                if vm.delete_user(&user).await? {
                    println!("deleted user {}", user.name);
                } else {
                    println!("the default user cannot be deleted");
                }
            }

            Command::Settings => print!("{}", screens::settings(&self.settings.settings())),
            Command::SetDynamicColor(on) => {
                self.settings.set_use_dynamic_color(on).await?;
                print!("{}", screens::settings(&self.settings.settings()));
            }
            Command::SetPrimaryColor(color) => {
                self.settings.set_custom_primary_color(color).await?;
                print!("{}", screens::settings(&self.settings.settings()));
            }
            Command::SetDeveloperMode(on) => {
                self.settings.set_developer_mode(on).await?;
                print!("{}", screens::settings(&self.settings.settings()));
            }
        }

        Ok(Flow::Continue)
    }

    fn print_chat(&self) -> anyhow::Result<()> {
        let vm = &self.vm;
        let groups = vm.groups();
        let current_id = vm.current_group_id();
        let messages = vm.messages();
        let users = vm.users();
        let current_user = vm.current_user();
        let query = vm.search_query();
        let developer_mode = self.settings.settings().developer_mode;
        let schema_version = if developer_mode { self.db.schema_version()? } else { 0 };

        let view = ChatView {
            group: groups.iter().find(|g| g.id == current_id),
            messages: &messages,
            users: &users,
            current_user: current_user.as_ref(),
            search: vm.is_searching().then_some(query.as_str()),
            developer_mode,
            schema_version,
        };
        print!("{}", screens::chat(&view));
        Ok(())
    }
}

/// Waits briefly for the next change of a watched value.
async fn settle<T>(mut rx: watch::Receiver<T>) {
    let _ = tokio::time::timeout(SETTLE_TIMEOUT, rx.changed()).await;
}
