use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use microfront_bus::{BusEvent, BusResult, Delivery, Listener, OpenChat, EMAIL_SEND};

use crate::context::{AppContext, MicroApp, NotificationSlot, Subscriptions};

pub const EMAIL_APP: &str = "email";

const RECEIVED_NOTICE: &str = "✨ New email just arrived!";
const CHAT_OPENED_NOTICE: &str = "🚀 Chat opened successfully!";
const INBOUND_SENDER: &str = "Chat App";

#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub id: u64,
    pub subject: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub sender: String,
}

#[derive(Default)]
struct Inbox {
    emails: Vec<Email>,
    next_id: u64,
    selected: Option<u64>,
    notification: NotificationSlot,
}

impl Inbox {
    /// Newest first.
    fn prepend(
        &mut self,
        subject: &str,
        body: &str,
        timestamp: DateTime<Utc>,
        sender: &str,
    ) -> u64 {
        self.next_id += 1;
        self.emails.insert(
            0,
            Email {
                id: self.next_id,
                subject: subject.to_string(),
                body: body.to_string(),
                timestamp,
                read: false,
                sender: sender.to_string(),
            },
        );
        self.next_id
    }

    fn find_mut(&mut self, id: u64) -> anyhow::Result<&mut Email> {
        self.emails
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| anyhow::anyhow!("no email with id {}", id))
    }
}

/// Inbox remote: every `email-send` lands on top of the list, unread.
pub struct EmailApp {
    inbox: Arc<Mutex<Inbox>>,
    ctx: Option<AppContext>,
    subscriptions: Subscriptions,
}

impl EmailApp {
    pub fn new() -> Self {
        let mut inbox = Inbox::default();
        inbox.prepend(
            "🎉 Welcome to Email App",
            "Your inbox is ready! Start receiving messages from Chat.",
            Utc::now(),
            "System",
        );
        Self {
            inbox: Arc::new(Mutex::new(inbox)),
            ctx: None,
            subscriptions: Subscriptions::default(),
        }
    }

    pub fn emails(&self) -> Vec<Email> {
        self.inbox.lock().emails.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.inbox.lock().emails.iter().filter(|e| !e.read).count()
    }

    pub fn selected(&self) -> Option<Email> {
        let inbox = self.inbox.lock();
        let id = inbox.selected?;
        inbox.emails.iter().find(|e| e.id == id).cloned()
    }

    pub fn notification(&self, now: Instant) -> Option<String> {
        self.inbox.lock().notification.active(now).map(str::to_string)
    }

    /// Opens `id` in the detail pane and marks it read.
    pub fn select(&mut self, id: u64) -> anyhow::Result<()> {
        let mut inbox = self.inbox.lock();
        inbox.find_mut(id)?.read = true;
        inbox.selected = Some(id);
        Ok(())
    }

    pub fn mark_as_read(&mut self, id: u64) -> anyhow::Result<()> {
        self.inbox.lock().find_mut(id)?.read = true;
        Ok(())
    }

    /// Deleting an unknown id is a no-op. The selection is cleared when it
    /// pointed at the deleted email.
    pub fn delete(&mut self, id: u64) {
        let mut inbox = self.inbox.lock();
        inbox.emails.retain(|e| e.id != id);
        if inbox.selected == Some(id) {
            inbox.selected = None;
        }
    }

    pub fn add_random(&mut self) -> u64 {
        self.inbox.lock().prepend(
            "🎲 Test Email",
            "This is a randomly generated test email to demonstrate the inbox functionality.",
            Utc::now(),
            "Test Bot",
        )
    }

    /// Asks the chat remote to show a message through `open-chat`.
    pub fn open_chat(&mut self) -> anyhow::Result<Delivery> {
        let ctx = self
            .ctx
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("{} is not mounted", EMAIL_APP))?;
        let detail = OpenChat {
            message: Some(format!(
                "👋 Chat opened from Email at {}",
                Local::now().format("%H:%M:%S")
            )),
            timestamp: None,
            source: Some(EMAIL_APP.to_string()),
        };
        let delivery = ctx.emit(&BusEvent::OpenChat(detail))?;
        self.inbox
            .lock()
            .notification
            .raise(CHAT_OPENED_NOTICE, ctx.notification_ttl(), Instant::now());
        Ok(delivery)
    }
}

impl Default for EmailApp {
    fn default() -> Self {
        Self::new()
    }
}

impl MicroApp for EmailApp {
    fn name(&self) -> &str {
        EMAIL_APP
    }

    fn mount(&mut self, ctx: AppContext) -> BusResult<()> {
        self.unmount();

        let inbox = self.inbox.clone();
        let ttl = ctx.notification_ttl();
        let listener = Listener::new(move |event| {
            if let BusEvent::EmailSend(detail) = event {
                let mut inbox = inbox.lock();
                inbox.prepend(
                    detail.subject_or_default(),
                    detail.body_or_default(),
                    detail.timestamp_or(Utc::now()),
                    INBOUND_SENDER,
                );
                inbox.notification.raise(RECEIVED_NOTICE, ttl, Instant::now());
            }
            Ok(())
        });
        ctx.on(EMAIL_SEND, listener, &mut self.subscriptions)?;
        tracing::info!(app = EMAIL_APP, "mounted");
        self.ctx = Some(ctx);
        Ok(())
    }

    fn unmount(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.subscriptions.clear(ctx.bus());
            tracing::info!(app = EMAIL_APP, "unmounted");
        }
    }

    fn render(&self, now: Instant) -> String {
        let inbox = self.inbox.lock();
        let unread = inbox.emails.iter().filter(|e| !e.read).count();
        let mut out = String::new();
        let _ = writeln!(out, "📧 Email Application ({} unread)", unread);
        if let Some(text) = inbox.notification.active(now) {
            let _ = writeln!(out, "  [{}]", text);
        }
        if inbox.emails.is_empty() {
            let _ = writeln!(out, "  No emails yet");
        }
        for email in &inbox.emails {
            let marker = if inbox.selected == Some(email.id) {
                '>'
            } else if email.read {
                ' '
            } else {
                '*'
            };
            let _ = writeln!(
                out,
                "  {}#{:<3} {} {} ({})",
                marker,
                email.id,
                email.timestamp.with_timezone(&Local).format("%H:%M"),
                email.subject,
                email.sender
            );
        }
        if let Some(email) = inbox
            .selected
            .and_then(|id| inbox.emails.iter().find(|e| e.id == id))
        {
            let _ = writeln!(out, "  ── {} ──", email.subject);
            let _ = writeln!(out, "  From: {}", email.sender);
            let _ = writeln!(out, "  {}", email.body);
        }
        let _ = write!(out, "  listening: {}", EMAIL_SEND);
        out
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn handle_command(&mut self, input: &str) -> anyhow::Result<()> {
        let args: Vec<&str> = input.split_whitespace().collect();
        match args.as_slice() {
            ["open-chat"] => {
                self.open_chat()?;
            }
            ["select", id] => self.select(id.parse()?)?,
            ["read", id] => self.mark_as_read(id.parse()?)?,
            ["delete", id] => self.delete(id.parse()?),
            ["random"] => {
                self.add_random();
            }
            _ => anyhow::bail!(
                "usage: email open-chat | select <id> | read <id> | delete <id> | random"
            ),
        }
        Ok(())
    }
}

impl Drop for EmailApp {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::TopicPermissions;
    use microfront_bus::{EmailSend, EventBus, OPEN_CHAT};

    fn mounted(bus: &Arc<EventBus>) -> EmailApp {
        let mut app = EmailApp::new();
        app.mount(AppContext::new(
            EMAIL_APP,
            bus.clone(),
            TopicPermissions::new(&[OPEN_CHAT], &[EMAIL_SEND]),
        ))
        .expect("mount");
        app
    }

    #[test]
    fn email_send_prepends_unread_email() {
        let bus = Arc::new(EventBus::new());
        let app = mounted(&bus);

        bus.emit(&BusEvent::EmailSend(EmailSend::new("Hello", "Body")))
            .expect("emit");

        let emails = app.emails();
        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0].subject, "Hello");
        assert_eq!(emails[0].sender, INBOUND_SENDER);
        assert!(!emails[0].read);
        assert_eq!(app.unread_count(), 2);
        assert_eq!(
            app.notification(Instant::now()).as_deref(),
            Some(RECEIVED_NOTICE)
        );
    }

    #[test]
    fn missing_fields_get_placeholders() {
        let bus = Arc::new(EventBus::new());
        let app = mounted(&bus);

        bus.emit_json(EMAIL_SEND, serde_json::json!({})).expect("emit");

        let newest = &app.emails()[0];
        assert_eq!(newest.subject, "📨 New Email");
        assert_eq!(newest.body, "Email received from Chat");
    }

    #[test]
    fn timestamp_without_offset_is_delivered() {
        let bus = Arc::new(EventBus::new());
        let app = mounted(&bus);

        bus.emit_json(
            EMAIL_SEND,
            serde_json::json!({"subject": "s", "timestamp": "2024-05-01T10:00:00"}),
        )
        .expect("naive timestamp");
        bus.emit_json(
            EMAIL_SEND,
            serde_json::json!({"subject": "d", "timestamp": "2024-05-01"}),
        )
        .expect("bare date");

        let emails = app.emails();
        assert_eq!(emails.len(), 3);
        assert_eq!(emails[0].subject, "d");
        assert_eq!(emails[0].timestamp.to_rfc3339(), "2024-05-01T00:00:00+00:00");
        assert_eq!(emails[1].subject, "s");
    }

    #[test]
    fn select_marks_read_and_delete_clears_selection() {
        let mut app = EmailApp::new();
        let id = app.add_random();
        assert_eq!(app.unread_count(), 2);

        app.select(id).expect("select");
        assert_eq!(app.unread_count(), 1);
        assert_eq!(app.selected().map(|e| e.id), Some(id));

        app.delete(id);
        assert!(app.selected().is_none());
        assert_eq!(app.emails().len(), 1);

        app.delete(999);
        assert_eq!(app.emails().len(), 1);
    }

    #[test]
    fn unknown_ids_are_errors_for_read() {
        let mut app = EmailApp::new();
        assert!(app.mark_as_read(42).is_err());
        assert!(app.select(42).is_err());
    }

    #[test]
    fn open_chat_emits_with_email_source() {
        let bus = Arc::new(EventBus::new());
        let mut app = mounted(&bus);
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        bus.on(
            OPEN_CHAT,
            &Listener::new(move |event| {
                if let BusEvent::OpenChat(detail) = event {
                    *sink.lock() = detail.source.clone();
                }
                Ok(())
            }),
        );

        let delivery = app.open_chat().expect("open chat");
        assert_eq!(delivery.delivered, 1);
        assert_eq!(seen.lock().as_deref(), Some(EMAIL_APP));
        assert_eq!(
            app.notification(Instant::now()).as_deref(),
            Some(CHAT_OPENED_NOTICE)
        );
    }

    #[test]
    fn commands_parse_ids() {
        let mut app = EmailApp::new();
        app.handle_command(" read  1 ").expect("read welcome");
        assert_eq!(app.unread_count(), 0);
        assert!(app.handle_command("read one").is_err());
    }
}
