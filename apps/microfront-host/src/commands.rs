use anyhow::{bail, Context};

pub const HELP: &str = "\
commands:
  open-chat                  dispatch open-chat from the host
  email-send                 dispatch email-send from the host
  emit <topic> [json]        dispatch any topic with a JSON detail
  chat <send <text>|to-email|random>
  email <open-chat|select <id>|read <id>|delete <id>|random>
  show                       render every remote
  status                     list remotes and bus listeners
  help
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    OpenChat,
    EmailSend,
    Emit {
        topic: String,
        detail: serde_json::Value,
    },
    Remote {
        name: String,
        input: String,
    },
    Show,
    Status,
    Help,
    Quit,
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> anyhow::Result<Option<Command>> {
    let line = line.trim();
    let Some((head, rest)) = split_word(line) else {
        return Ok(None);
    };
    let cmd = match head {
        "open-chat" => Command::OpenChat,
        "email-send" => Command::EmailSend,
        "emit" => {
            let Some((topic, detail)) = split_word(rest) else {
                bail!("usage: emit <topic> [json]");
            };
            let detail = if detail.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::from_str(detail).context("detail is not valid JSON")?
            };
            Command::Emit {
                topic: topic.to_string(),
                detail,
            }
        }
        "show" => Command::Show,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        name => Command::Remote {
            name: name.to_string(),
            input: rest.to_string(),
        },
    };
    Ok(Some(cmd))
}

fn split_word(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.split_once(char::is_whitespace) {
        Some((head, rest)) => Some((head, rest.trim())),
        None => Some((input, "")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_line_is_nothing() {
        assert_eq!(parse("   ").expect("parse"), None);
    }

    #[test]
    fn control_panel_commands() {
        assert_eq!(parse("open-chat").expect("parse"), Some(Command::OpenChat));
        assert_eq!(parse(" email-send ").expect("parse"), Some(Command::EmailSend));
        assert_eq!(parse("exit").expect("parse"), Some(Command::Quit));
    }

    #[test]
    fn emit_takes_optional_json() {
        assert_eq!(
            parse(r#"emit open-chat {"message": "hi there"}"#).expect("parse"),
            Some(Command::Emit {
                topic: "open-chat".to_string(),
                detail: json!({"message": "hi there"}),
            })
        );
        assert_eq!(
            parse("emit theme-change").expect("parse"),
            Some(Command::Emit {
                topic: "theme-change".to_string(),
                detail: serde_json::Value::Null,
            })
        );
        assert!(parse("emit").is_err());
        assert!(parse("emit open-chat {oops").is_err());
    }

    #[test]
    fn anything_else_goes_to_a_remote() {
        assert_eq!(
            parse("chat send hello   world").expect("parse"),
            Some(Command::Remote {
                name: "chat".to_string(),
                input: "send hello   world".to_string(),
            })
        );
    }
}
