use std::path::PathBuf;
use std::sync::Arc;

use chatter_core::media::{share_image, share_location, FixedLocation};
use chatter_core::{
    Connectivity, Content, Location, MemoryMessageStore, SendOutcome, Session, ViewHandle, SIGNED_IN_NOTICE,
};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::devices::{DirMediaStore, FileImageSource};

/// What a line of input asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Text(String),
    Image(PathBuf),
    Location,
}

/// Interprets the input line. `None` for blank input.
pub fn parse_input(input: &str) -> Option<Action> {
    let line = input.trim();
    if line.is_empty() {
        return None;
    }
    if line == "/location" {
        return Some(Action::Location);
    }
    if let Some(path) = line.strip_prefix("/image ") {
        let path = path.trim();
        if !path.is_empty() {
            return Some(Action::Image(PathBuf::from(path)));
        }
    }
    Some(Action::Text(line.to_string()))
}

fn describe_outcome(outcome: &SendOutcome) -> Option<String> {
    match outcome {
        SendOutcome::Delivered(_) => None,
        SendOutcome::QueuedOffline(_) => {
            Some("Offline: the message will be delivered when the connection returns.".to_string())
        }
        SendOutcome::Failed(reason) => Some(format!("Message not sent: {}", reason)),
    }
}

pub struct ChatApp {
    pub should_quit: bool,
    pub session: Session,
    pub view: ViewHandle,
    pub input: String,
    pub cursor_pos: usize,
    pub messages_scroll: u16,
    pub last_notice: Option<String>,
    connectivity: watch::Sender<Connectivity>,
    remote: Arc<MemoryMessageStore>,
    media: Arc<DirMediaStore>,
    location: FixedLocation,
    notices_tx: mpsc::UnboundedSender<String>,
    notices_rx: mpsc::UnboundedReceiver<String>,
}

impl ChatApp {
    pub fn new(
        session: Session,
        view: ViewHandle,
        connectivity: watch::Sender<Connectivity>,
        remote: Arc<MemoryMessageStore>,
        media: Arc<DirMediaStore>,
        location: Option<Location>,
    ) -> Self {
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        Self {
            should_quit: false,
            session,
            view,
            input: String::new(),
            cursor_pos: 0,
            messages_scroll: 0,
            last_notice: Some(SIGNED_IN_NOTICE.to_string()),
            connectivity,
            remote,
            media,
            location: FixedLocation(location),
            notices_tx,
            notices_rx,
        }
    }

    pub fn connectivity(&self) -> Connectivity {
        *self.connectivity.borrow()
    }

    /// Sends whatever the input line asks for, in the background.
    pub fn submit(&mut self) {
        let Some(action) = parse_input(&self.input) else {
            return;
        };

        self.input.clear();
        self.cursor_pos = 0;
        self.messages_scroll = 0;
        self.last_notice = None;

        let view = self.view.clone();
        let media = Arc::clone(&self.media);
        let location = self.location;
        let author_id = self.session.author.id.clone();
        let notices = self.notices_tx.clone();

        tokio::spawn(async move {
            let content = match action {
                Action::Text(text) => Ok(Content::Text(text)),
                Action::Image(path) => share_image(&FileImageSource::new(path), media.as_ref(), &author_id).await,
                Action::Location => share_location(&location).await,
            };

            let notice = match content {
                Ok(content) => describe_outcome(&view.send(content).await),
                Err(e) => Some(e.to_string()),
            };
            if let Some(notice) = notice {
                let _ = notices.send(notice);
            }
        });
    }

    /// Flips reported reachability, taking the store along with it.
    pub fn toggle_connectivity(&mut self) {
        let next = match self.connectivity() {
            Connectivity::Online => Connectivity::Offline,
            Connectivity::Offline | Connectivity::Unknown => Connectivity::Online,
        };
        debug!(%next, "connectivity toggled");
        self.remote.set_reachable(next == Connectivity::Online);
        self.connectivity.send_replace(next);
    }

    pub fn poll_notices(&mut self) {
        while let Ok(notice) = self.notices_rx.try_recv() {
            self.last_notice = Some(notice);
        }
    }

    pub fn scroll_up(&mut self) {
        self.messages_scroll = self.messages_scroll.saturating_add(1);
    }

    pub fn scroll_down(&mut self) {
        self.messages_scroll = self.messages_scroll.saturating_sub(1);
    }

    pub fn input_char(&mut self, c: char) {
        self.input.insert(self.cursor_pos, c);
        self.cursor_pos += c.len_utf8();
    }

    pub fn input_backspace(&mut self) {
        if self.cursor_pos > 0 {
            let prev_char_boundary = self.input[..self.cursor_pos]
                .char_indices()
                .next_back()
                .map(|(i, _)| i)
                .unwrap_or(0);
            self.input.remove(prev_char_boundary);
            self.cursor_pos = prev_char_boundary;
        }
    }

    pub fn input_delete(&mut self) {
        if self.cursor_pos < self.input.len() {
            self.input.remove(self.cursor_pos);
        }
    }

    pub fn input_left(&mut self) {
        if self.cursor_pos > 0 {
            self.cursor_pos = self.input[..self.cursor_pos]
                .char_indices()
                .next_back()
                .map(|(i, _)| i)
                .unwrap_or(0);
        }
    }

    pub fn input_right(&mut self) {
        if self.cursor_pos < self.input.len() {
            self.cursor_pos = self.input[self.cursor_pos..]
                .char_indices()
                .nth(1)
                .map(|(i, _)| self.cursor_pos + i)
                .unwrap_or(self.input.len());
        }
    }

    pub fn input_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn input_end(&mut self) {
        self.cursor_pos = self.input.len();
    }
}
