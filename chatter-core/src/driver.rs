//! Runs a [`MessageSyncView`] on its own task.
//!
//! The task is the view's only mutator: connectivity changes, snapshot
//! deliveries and commands are handled one at a time, each to completion.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::Cache;
use crate::connectivity::Connectivity;
use crate::message::{Content, Message};
use crate::remote::RemoteMessageStore;
use crate::view::{MessageSyncView, SendOutcome, ViewState};

const COMMAND_BUFFER: usize = 32;

/// Command sent to the view task.
pub enum ViewCommand {
    Send {
        content: Content,
        reply: oneshot::Sender<SendOutcome>,
    },
    Unmount,
}

/// Cloneable handle to a running view.
#[derive(Clone)]
pub struct ViewHandle {
    commands: mpsc::Sender<ViewCommand>,
    messages: watch::Receiver<Vec<Message>>,
    state: watch::Receiver<ViewState>,
}

impl ViewHandle {
    /// Sends content and waits for the store's answer.
    pub async fn send(&self, content: Content) -> SendOutcome {
        let (reply, rx) = oneshot::channel();
        if self
            .commands
            .send(ViewCommand::Send { content, reply })
            .await
            .is_err()
        {
            return SendOutcome::Failed("view closed".to_string());
        }
        rx.await
            .unwrap_or_else(|_| SendOutcome::Failed("view closed".to_string()))
    }

    pub async fn unmount(&self) {
        let _ = self.commands.send(ViewCommand::Unmount).await;
    }

    /// The presented list, newest first.
    pub fn messages(&self) -> Vec<Message> {
        self.messages.borrow().clone()
    }

    pub fn watch_messages(&self) -> watch::Receiver<Vec<Message>> {
        self.messages.clone()
    }

    pub fn state(&self) -> ViewState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ViewState> {
        self.state.clone()
    }
}

/// Spawns the view task on the current runtime.
pub fn spawn<R, C>(
    view: MessageSyncView<R, C>,
    connectivity: watch::Receiver<Connectivity>,
) -> (ViewHandle, JoinHandle<()>)
where
    R: RemoteMessageStore + 'static,
    C: Cache + Send + Sync + 'static,
{
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (state_tx, state_rx) = watch::channel(view.state());
    let handle = ViewHandle {
        commands: command_tx,
        messages: view.watch(),
        state: state_rx,
    };

    let task = tokio::spawn(run(view, connectivity, command_rx, state_tx));
    (handle, task)
}

/// Drives the view until it is unmounted or every handle is dropped.
///
/// Mounts with the signal's current value; later values are applied as
/// they change. If the signal's sender goes away the last value stands.
pub async fn run<R, C>(
    mut view: MessageSyncView<R, C>,
    mut connectivity: watch::Receiver<Connectivity>,
    mut command_rx: mpsc::Receiver<ViewCommand>,
    state_tx: watch::Sender<ViewState>,
) where
    R: RemoteMessageStore,
    C: Cache + Sync,
{
    let initial = *connectivity.borrow_and_update();
    view.mount(initial);
    state_tx.send_replace(view.state());

    let mut signal_open = true;

    loop {
        tokio::select! {
            changed = connectivity.changed(), if signal_open => {
                match changed {
                    Ok(()) => {
                        let value = *connectivity.borrow_and_update();
                        view.set_connectivity(value);
                    }
                    Err(_) => {
                        debug!("connectivity signal closed");
                        signal_open = false;
                    }
                }
            }

            delivery = view.next_delivery() => {
                match delivery {
                    Some(snapshot) => view.receive_snapshot(snapshot),
                    None => view.subscription_closed(),
                }
            }

            command = command_rx.recv() => {
                match command {
                    Some(ViewCommand::Send { content, reply }) => {
                        let outcome = view.send(content).await;
                        let _ = reply.send(outcome);
                    }
                    Some(ViewCommand::Unmount) | None => {
                        view.unmount();
                        state_tx.send_replace(view.state());
                        break;
                    }
                }
            }
        }

        state_tx.send_replace(view.state());
    }
}
