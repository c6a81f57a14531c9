//! Bot API wire types and their translation into chat events.

use serde::{Deserialize, Serialize};

use crate::commands::{classify_command, parse_bot_command, IntakeCommand};
use crate::events::{ChatEnvelope, ChatEvent, MessageEvent, StartEvent};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_message: Option<Message>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Update {
    /// `/start` opens an order; every other message (text or not) is a turn.
    pub fn into_envelope(self) -> ChatEnvelope {
        let update_id = self.update_id;
        let event = match self.message {
            Some(message) => message_event(message),
            None if self.edited_message.is_some() => {
                ChatEvent::Unsupported { kind: "edited_message".to_owned() }
            }
            None => ChatEvent::Unsupported { kind: "update".to_owned() },
        };
        ChatEnvelope { update_id, event }
    }
}

fn message_event(message: Message) -> ChatEvent {
    let chat_id = message.chat.id;
    let text = message.text.unwrap_or_default();

    if let Some(command) = parse_bot_command(&text) {
        if let IntakeCommand::Start { payload } = classify_command(&command) {
            return ChatEvent::Start(StartEvent { chat_id, payload });
        }
    }

    ChatEvent::Message(MessageEvent { chat_id, message_id: message.message_id, text })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::Update;
    use crate::events::{ChatEvent, ChatEventType, MessageEvent, StartEvent};

    fn decode(value: serde_json::Value) -> ChatEvent {
        serde_json::from_value::<Update>(value).expect("decode update").into_envelope().event
    }

    #[test]
    fn start_command_variants_become_start_events() {
        for text in ["/start", "/start@stamp_bot", "/start from-site"] {
            let event = decode(json!({
                "update_id": 1,
                "message": {"message_id": 10, "chat": {"id": 77, "type": "private"}, "text": text}
            }));
            assert_eq!(event.event_type(), ChatEventType::Start, "{text}");
        }

        let event = decode(json!({
            "update_id": 1,
            "message": {"message_id": 10, "chat": {"id": 77}, "text": "/start from-site"}
        }));
        assert_eq!(
            event,
            ChatEvent::Start(StartEvent { chat_id: 77, payload: Some("from-site".to_owned()) })
        );
    }

    #[test]
    fn text_and_other_commands_become_messages() {
        let event = decode(json!({
            "update_id": 2,
            "message": {
                "message_id": 11,
                "chat": {"id": 77},
                "from": {"id": 5, "is_bot": false, "first_name": "Ivan"},
                "text": "Нужна печать для ООО"
            }
        }));
        assert_eq!(
            event,
            ChatEvent::Message(MessageEvent {
                chat_id: 77,
                message_id: 11,
                text: "Нужна печать для ООО".to_owned()
            })
        );

        let help = decode(json!({
            "update_id": 3,
            "message": {"message_id": 12, "chat": {"id": 77}, "text": "/help"}
        }));
        assert_eq!(help.event_type(), ChatEventType::Message);
    }

    #[test]
    fn non_text_messages_are_empty_turns() {
        let event = decode(json!({
            "update_id": 4,
            "message": {"message_id": 13, "chat": {"id": 77}, "sticker": {"file_id": "x"}}
        }));
        assert_eq!(
            event,
            ChatEvent::Message(MessageEvent { chat_id: 77, message_id: 13, text: String::new() })
        );
    }

    #[test]
    fn updates_without_messages_are_unsupported() {
        let edited = decode(json!({
            "update_id": 5,
            "edited_message": {"message_id": 14, "chat": {"id": 77}, "text": "fix"}
        }));
        assert_eq!(edited.event_type(), ChatEventType::Unsupported);
        assert_eq!(edited.chat_id(), None);

        let callback = decode(json!({"update_id": 6, "callback_query": {"id": "q"}}));
        assert_eq!(callback, ChatEvent::Unsupported { kind: "update".to_owned() });
    }
}
