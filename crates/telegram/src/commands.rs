/// A `/command[@bot] [args]` message as the Bot API delivers it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotCommand {
    pub name: String,
    pub bot_username: Option<String>,
    pub args: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntakeCommand {
    /// Opens a new order, optionally carrying a deep-link payload.
    Start { payload: Option<String> },
    Other { name: String },
}

/// Returns `None` for text that is not a bot command.
pub fn parse_bot_command(text: &str) -> Option<BotCommand> {
    let trimmed = text.trim_start();
    let rest = trimmed.strip_prefix('/')?;

    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let (name, bot_username) = match head.split_once('@') {
        Some((name, bot)) => (name, Some(bot.to_owned()).filter(|bot| !bot.is_empty())),
        None => (head, None),
    };
    if name.is_empty() || !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return None;
    }

    Some(BotCommand { name: name.to_ascii_lowercase(), bot_username, args: args.to_owned() })
}

pub fn classify_command(command: &BotCommand) -> IntakeCommand {
    match command.name.as_str() {
        "start" => IntakeCommand::Start {
            payload: Some(command.args.clone()).filter(|args| !args.is_empty()),
        },
        other => IntakeCommand::Other { name: other.to_owned() },
    }
}
