use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use microfront_bus::{BusEvent, BusResult, Delivery, EmailSend, Listener, OPEN_CHAT};

use crate::context::{AppContext, MicroApp, NotificationSlot, Subscriptions};

pub const CHAT_APP: &str = "chat";

const WELCOME: &str = "Welcome to Chat! 👋";
const RECEIVED_NOTICE: &str = "✨ New message received!";
const EMAIL_SUBJECT: &str = "💬 Message from Chat";
const EMAIL_SENT: &str = "✅ Email sent successfully!";
const RANDOM_MESSAGE: &str = "🎲 Random test message!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    System,
    Host,
    You,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::System => write!(f, "System"),
            Sender::Host => write!(f, "Host"),
            Sender::You => write!(f, "You"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: u64,
    pub text: String,
    pub sender: Sender,
    pub time: DateTime<Local>,
}

#[derive(Default)]
struct ChatState {
    messages: Vec<ChatMessage>,
    next_id: u64,
    notification: NotificationSlot,
}

impl ChatState {
    fn push(&mut self, text: &str, sender: Sender) {
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id: self.next_id,
            text: text.to_string(),
            sender,
            time: Local::now(),
        });
    }
}

/// Chat remote: appends a message on every `open-chat` and forwards to the
/// inbox through `email-send`.
pub struct ChatApp {
    state: Arc<Mutex<ChatState>>,
    ctx: Option<AppContext>,
    subscriptions: Subscriptions,
}

impl ChatApp {
    pub fn new() -> Self {
        let mut state = ChatState::default();
        state.push(WELCOME, Sender::System);
        Self {
            state: Arc::new(Mutex::new(state)),
            ctx: None,
            subscriptions: Subscriptions::default(),
        }
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().messages.clone()
    }

    pub fn notification(&self, now: Instant) -> Option<String> {
        self.state.lock().notification.active(now).map(str::to_string)
    }

    /// Appends a message typed by the user. Blank input is ignored.
    pub fn send_message(&mut self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        self.state.lock().push(text, Sender::You);
        true
    }

    /// Emits `email-send` and records the confirmation once every listener
    /// has accepted it.
    pub fn send_to_email(&mut self) -> anyhow::Result<Delivery> {
        let ctx = self.context()?;
        let now = Local::now();
        let detail = EmailSend::new(
            EMAIL_SUBJECT,
            format!("Email sent from Chat at {}", now.format("%H:%M:%S")),
        );
        let delivery = ctx.emit(&BusEvent::EmailSend(detail))?;
        self.state.lock().push(EMAIL_SENT, Sender::System);
        Ok(delivery)
    }

    pub fn add_random(&mut self) {
        self.state.lock().push(RANDOM_MESSAGE, Sender::System);
    }

    fn context(&self) -> anyhow::Result<&AppContext> {
        self.ctx
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("{} is not mounted", CHAT_APP))
    }
}

impl Default for ChatApp {
    fn default() -> Self {
        Self::new()
    }
}

impl MicroApp for ChatApp {
    fn name(&self) -> &str {
        CHAT_APP
    }

    fn mount(&mut self, ctx: AppContext) -> BusResult<()> {
        self.unmount();

        let state = self.state.clone();
        let ttl = ctx.notification_ttl();
        let listener = Listener::new(move |event| {
            if let BusEvent::OpenChat(detail) = event {
                let mut state = state.lock();
                state.push(detail.message_or_default(), Sender::Host);
                state.notification.raise(RECEIVED_NOTICE, ttl, Instant::now());
            }
            Ok(())
        });
        ctx.on(OPEN_CHAT, listener, &mut self.subscriptions)?;
        tracing::info!(app = CHAT_APP, "mounted");
        self.ctx = Some(ctx);
        Ok(())
    }

    fn unmount(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.subscriptions.clear(ctx.bus());
            tracing::info!(app = CHAT_APP, "unmounted");
        }
    }

    fn render(&self, now: Instant) -> String {
        let state = self.state.lock();
        let mut out = String::new();
        let _ = writeln!(out, "💬 Chat Application");
        if let Some(text) = state.notification.active(now) {
            let _ = writeln!(out, "  [{}]", text);
        }
        for msg in &state.messages {
            let _ = writeln!(
                out,
                "  {} {:<6} {}",
                msg.time.format("%H:%M:%S"),
                msg.sender,
                msg.text
            );
        }
        let _ = write!(out, "  listening: {}", OPEN_CHAT);
        out
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn handle_command(&mut self, input: &str) -> anyhow::Result<()> {
        let input = input.trim();
        let (verb, rest) = input
            .split_once(char::is_whitespace)
            .unwrap_or((input, ""));
        match (verb, rest.trim()) {
            ("send", text) => {
                if !self.send_message(text) {
                    tracing::debug!(app = CHAT_APP, "ignoring empty message");
                }
            }
            ("to-email", "") => {
                self.send_to_email()?;
            }
            ("random", "") => self.add_random(),
            _ => anyhow::bail!("usage: chat send <text> | to-email | random"),
        }
        Ok(())
    }
}

impl Drop for ChatApp {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::TopicPermissions;
    use microfront_bus::{EventBus, OpenChat, EMAIL_SEND};

    fn mounted(bus: &Arc<EventBus>) -> ChatApp {
        let mut app = ChatApp::new();
        app.mount(AppContext::new(
            CHAT_APP,
            bus.clone(),
            TopicPermissions::new(&[EMAIL_SEND], &[OPEN_CHAT]),
        ))
        .expect("mount");
        app
    }

    #[test]
    fn starts_with_welcome_message() {
        let app = ChatApp::new();
        let messages = app.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, Sender::System);
        assert_eq!(messages[0].text, WELCOME);
    }

    #[test]
    fn open_chat_appends_host_message() {
        let bus = Arc::new(EventBus::new());
        let app = mounted(&bus);

        bus.emit(&BusEvent::OpenChat(OpenChat::message("hi")))
            .expect("emit");
        bus.emit(&BusEvent::OpenChat(OpenChat::default()))
            .expect("emit");

        let messages = app.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].text, "hi");
        assert_eq!(messages[1].sender, Sender::Host);
        assert_eq!(messages[2].text, "Chat opened from Host");
        assert_eq!(
            app.notification(Instant::now()).as_deref(),
            Some(RECEIVED_NOTICE)
        );
    }

    #[test]
    fn blank_input_is_ignored() {
        let mut app = ChatApp::new();
        assert!(!app.send_message("   "));
        assert!(app.send_message("hello"));
        let messages = app.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].sender, Sender::You);
    }

    #[test]
    fn to_email_requires_mount() {
        let mut app = ChatApp::new();
        assert!(app.send_to_email().is_err());
    }

    #[test]
    fn unmount_stops_listening() {
        let bus = Arc::new(EventBus::new());
        let mut app = mounted(&bus);
        assert_eq!(bus.listener_count(OPEN_CHAT), 1);

        app.unmount();
        bus.emit(&BusEvent::OpenChat(OpenChat::message("late")))
            .expect("emit");

        assert_eq!(bus.listener_count(OPEN_CHAT), 0);
        assert_eq!(app.messages().len(), 1);
    }

    #[test]
    fn remount_does_not_duplicate_listeners() {
        let bus = Arc::new(EventBus::new());
        let mut app = mounted(&bus);
        app.mount(AppContext::new(
            CHAT_APP,
            bus.clone(),
            TopicPermissions::new(&[EMAIL_SEND], &[OPEN_CHAT]),
        ))
        .expect("remount");
        assert_eq!(bus.listener_count(OPEN_CHAT), 1);
    }

    #[test]
    fn commands_drive_the_app() {
        let mut app = ChatApp::new();
        app.handle_command("send hello   there").expect("send");
        app.handle_command("random").expect("random");
        assert!(app.handle_command("dance").is_err());
        assert!(app.handle_command("random twice").is_err());

        let texts: Vec<_> = app.messages().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec![WELCOME, "hello   there", RANDOM_MESSAGE]);
    }

    #[test]
    fn untyped_open_chat_is_still_shown() {
        let bus = Arc::new(EventBus::new());
        let app = mounted(&bus);

        let delivery = bus
            .emit(&BusEvent::Custom {
                topic: OPEN_CHAT.to_string(),
                detail: serde_json::json!({"message": "hi"}),
            })
            .expect("emit");

        assert_eq!(delivery.delivered, 1);
        let messages = app.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text, "hi");
        assert_eq!(messages[1].sender, Sender::Host);
    }
}
