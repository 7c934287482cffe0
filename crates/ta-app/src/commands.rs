use std::fmt;

use ta_types::models::{AVATAR_PALETTE, parse_argb};

/// An intent typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Show,
    Send(String),
    SendAttachment {
        image: bool,
        uri: String,
        caption: String,
    },
    Edit { id: i64, text: String },
    Delete(i64),
    Search(String),
    ClearSearch,
    Groups,
    CreateGroup(String),
    SwitchGroup(i64),
    DeleteGroup(i64),
    Users,
    CreateUser { name: String, color: String },
    SwitchUser(i64),
    RenameUser { id: i64, name: String },
    RecolorUser { id: i64, color: String },
    DeleteUser(i64),
    Settings,
    SetDynamicColor(bool),
    SetPrimaryColor(u32),
    SetDeveloperMode(bool),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (try /help)", self.0)
    }
}

impl std::error::Error for ParseError {}

pub const HELP: &str = "\
Commands:
  <text>                         send a text message
  /image <uri> [caption]         send an image
  /file <uri> [caption]          send a file
  /edit <id> <text>              edit a message
  /delete <id>                   delete a message
  /search <query>                filter messages, /clear to stop
  /show                          redraw the chat
  /groups                        list groups
  /group new|switch|delete ...   manage groups
  /users                         list users
  /user new <name> [color]       create a user and send as them
  /user switch|delete <id>       pick or remove a sender
  /user rename <id> <name>       rename a user
  /user color <id> <#AARRGGBB>   change a user's avatar color
  /settings                      show settings
  /set dynamic-color on|off
  /set primary-color <#AARRGGBB>
  /set developer on|off
  /quit";

/// Splits off the first whitespace-separated word.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn parse_id(word: &str) -> Result<i64, ParseError> {
    word.parse()
        .map_err(|_| ParseError(format!("'{}' is not an id", word)))
}

fn parse_switch(word: &str) -> Result<bool, ParseError> {
    match word {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => Err(ParseError(format!("expected on or off, got '{}'", other))),
    }
}

fn parse_color(word: &str) -> Result<u32, ParseError> {
    parse_argb(word).ok_or_else(|| ParseError(format!("'{}' is not a #AARRGGBB color", word)))
}

fn require<'a>(value: &'a str, what: &str) -> Result<&'a str, ParseError> {
    if value.is_empty() {
        Err(ParseError(format!("missing {}", what)))
    } else {
        Ok(value)
    }
}

pub fn parse(line: &str) -> Result<Command, ParseError> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Send(line.to_string()));
    };

    let (name, args) = split_word(rest);
    match name {
        "help" | "?" => Ok(Command::Help),
        "show" => Ok(Command::Show),
        "quit" | "exit" => Ok(Command::Quit),
        "image" | "file" => {
            let (uri, caption) = split_word(args);
            Ok(Command::SendAttachment {
                image: name == "image",
                uri: require(uri, "attachment uri")?.to_string(),
                caption: caption.to_string(),
            })
        }
        "edit" => {
            let (id, text) = split_word(args);
            Ok(Command::Edit {
                id: parse_id(require(id, "message id")?)?,
                text: require(text, "new text")?.to_string(),
            })
        }
        "delete" => Ok(Command::Delete(parse_id(require(args, "message id")?)?)),
        "search" => Ok(Command::Search(args.to_string())),
        "clear" => Ok(Command::ClearSearch),
        "groups" => Ok(Command::Groups),
        "group" => {
            let (action, arg) = split_word(args);
            match action {
                "new" => Ok(Command::CreateGroup(require(arg, "group name")?.to_string())),
                "switch" => Ok(Command::SwitchGroup(parse_id(require(arg, "group id")?)?)),
                "delete" => Ok(Command::DeleteGroup(parse_id(require(arg, "group id")?)?)),
                "" => Ok(Command::Groups),
                other => Err(ParseError(format!("unknown group action '{}'", other))),
            }
        }
        "users" => Ok(Command::Users),
        "user" => {
            let (action, arg) = split_word(args);
            match action {
                "new" => {
                    let arg = require(arg, "user name")?;
                    // A trailing color is optional; everything before it is the name
                    let (name, color) = match arg.rsplit_once(char::is_whitespace) {
                        Some((name, color)) if parse_argb(color).is_some() => {
                            (name.trim_end(), color.to_string())
                        }
                        _ => (arg, AVATAR_PALETTE[0].to_string()),
                    };
                    Ok(Command::CreateUser {
                        name: name.to_string(),
                        color,
                    })
                }
                "switch" => Ok(Command::SwitchUser(parse_id(require(arg, "user id")?)?)),
                "delete" => Ok(Command::DeleteUser(parse_id(require(arg, "user id")?)?)),
                "rename" => {
                    let (id, name) = split_word(arg);
                    Ok(Command::RenameUser {
                        id: parse_id(require(id, "user id")?)?,
                        name: require(name, "user name")?.to_string(),
                    })
                }
                "color" => {
                    let (id, color) = split_word(arg);
                    let id = parse_id(require(id, "user id")?)?;
                    parse_color(require(color, "color")?)?;
                    Ok(Command::RecolorUser {
                        id,
                        color: color.to_uppercase(),
                    })
                }
                "" => Ok(Command::Users),
                other => Err(ParseError(format!("unknown user action '{}'", other))),
            }
        }
        "settings" => Ok(Command::Settings),
        "set" => {
            let (key, value) = split_word(args);
            let value = require(value, "value")?;
            match key {
                "dynamic-color" => Ok(Command::SetDynamicColor(parse_switch(value)?)),
                "primary-color" => Ok(Command::SetPrimaryColor(parse_color(value)?)),
                "developer" => Ok(Command::SetDeveloperMode(parse_switch(value)?)),
                other => Err(ParseError(format!("unknown setting '{}'", other))),
            }
        }
        other => Err(ParseError(format!("unknown command '/{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_sent() {
        assert_eq!(parse("  hello there "), Ok(Command::Send("hello there".into())));
        assert_eq!(parse(""), Ok(Command::Send(String::new())));
    }

    #[test]
    fn test_attachments() {
        assert_eq!(
            parse("/image file:///cat.png my cat"),
            Ok(Command::SendAttachment {
                image: true,
                uri: "file:///cat.png".into(),
                caption: "my cat".into(),
            })
        );
        assert_eq!(
            parse("/file /tmp/a.pdf"),
            Ok(Command::SendAttachment {
                image: false,
                uri: "/tmp/a.pdf".into(),
                caption: String::new(),
            })
        );
        assert!(parse("/image").is_err());
    }

    #[test]
    fn test_edit_and_delete() {
        assert_eq!(
            parse("/edit 12 new words here"),
            Ok(Command::Edit { id: 12, text: "new words here".into() })
        );
        assert!(parse("/edit 12").is_err());
        assert!(parse("/edit x hi").is_err());
        assert_eq!(parse("/delete 3"), Ok(Command::Delete(3)));
    }

    #[test]
    fn test_groups() {
        assert_eq!(parse("/group new Work log"), Ok(Command::CreateGroup("Work log".into())));
        assert_eq!(parse("/group switch 2"), Ok(Command::SwitchGroup(2)));
        assert_eq!(parse("/group delete 2"), Ok(Command::DeleteGroup(2)));
        assert_eq!(parse("/group"), Ok(Command::Groups));
        assert!(parse("/group rename 2").is_err());
    }

    #[test]
    fn test_user_new_with_optional_color() {
        assert_eq!(
            parse("/user new Night Owl #FF9C27B0"),
            Ok(Command::CreateUser {
                name: "Night Owl".into(),
                color: "#FF9C27B0".into(),
            })
        );
        assert_eq!(
            parse("/user new Night Owl"),
            Ok(Command::CreateUser {
                name: "Night Owl".into(),
                color: AVATAR_PALETTE[0].into(),
            })
        );
        assert_eq!(
            parse("/user color 2 #ff4caf50"),
            Ok(Command::RecolorUser { id: 2, color: "#FF4CAF50".into() })
        );
        assert!(parse("/user color 2 green").is_err());
    }

    #[test]
    fn test_settings() {
        assert_eq!(parse("/set developer on"), Ok(Command::SetDeveloperMode(true)));
        assert_eq!(parse("/set dynamic-color off"), Ok(Command::SetDynamicColor(false)));
        assert_eq!(parse("/set primary-color #FFB186D6"), Ok(Command::SetPrimaryColor(0xFFB186D6)));
        assert!(parse("/set developer maybe").is_err());
        assert!(parse("/set font big").is_err());
    }

    #[test]
    fn test_search() {
        assert_eq!(parse("/search milk and eggs"), Ok(Command::Search("milk and eggs".into())));
        assert_eq!(parse("/clear"), Ok(Command::ClearSearch));
        assert!(parse("/frobnicate").is_err());
    }
}
