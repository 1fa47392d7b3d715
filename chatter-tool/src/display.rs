use chatter_core::Message;
use chrono::Local;

/// One-line rendering of a message's content.
pub fn describe(message: &Message) -> String {
    let mut parts = Vec::new();
    if let Some(text) = &message.text {
        parts.push(text.clone());
    }
    if let Some(image) = &message.image {
        parts.push(format!("[Image] {}", image));
    }
    if let Some(location) = &message.location {
        parts.push(format!("[Location] {:.5}, {:.5}", location.latitude, location.longitude));
    }
    parts.join(" ")
}

pub fn timestamp(message: &Message) -> String {
    message
        .created_at
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}
