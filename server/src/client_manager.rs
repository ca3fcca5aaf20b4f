//! Connection bookkeeping for the tick loop
//!
//! This module is the tick loop's only view of the network. Each connected
//! player has:
//! - a bounded inbound queue fed by that connection's reader task
//! - a bounded outbound queue drained by that connection's writer task
//! - an outbox of feed events and chat lines not yet delivered
//!
//! The tick loop never awaits on a client. Inbound queues are drained with
//! `try_recv`, and snapshots are offered with `try_send`; a full outbound
//! queue skips the frame and keeps the outbox for the next one.

use crate::game::{QueuedCommand, TickReport};
use log::{debug, info};
use shared::{ChatMessage, Command, FeedEvent, Packet, PlayerId, Snapshot};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// Inbound capacity per connection
pub const INPUT_QUEUE_CAPACITY: usize = 64;
/// Outbound capacity per connection
pub const OUTBOUND_QUEUE_CAPACITY: usize = 8;

/// What a connection's reader task forwards to the tick loop
#[derive(Debug, Clone, PartialEq)]
pub enum ClientInput {
    Command {
        sequence: u32,
        /// Position in the global order of arrival across all connections
        arrival: u64,
        command: Command,
    },
    Heartbeat,
}

/// Why a client was dropped from the roster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The reader task ended: clean disconnect, I/O error or bad frame
    Closed,
    /// Nothing received within the idle timeout
    TimedOut,
}

/// A connected player and the channels to their connection tasks
#[derive(Debug)]
pub struct Client {
    /// Player id assigned at join
    pub id: PlayerId,
    pub addr: SocketAddr,
    /// Last time any input or heartbeat was drained for this client
    pub last_seen: Instant,
    /// Highest input sequence the simulation has handled
    pub last_processed_input: u32,
    /// Snapshots skipped because the outbound queue was full
    pub dropped_frames: u64,
    inputs: mpsc::Receiver<ClientInput>,
    outbound: mpsc::Sender<Packet>,
    feed_outbox: Vec<FeedEvent>,
    chat_outbox: Vec<ChatMessage>,
    input_closed: bool,
}

impl Client {
    /// Creates a client around the channels of a freshly admitted connection
    ///
    /// `inputs` is fed by the connection's reader task and `outbound` is
    /// drained by its writer task. The client starts as recently seen, with
    /// no processed inputs and an empty outbox.
    pub fn new(
        id: PlayerId,
        addr: SocketAddr,
        inputs: mpsc::Receiver<ClientInput>,
        outbound: mpsc::Sender<Packet>,
    ) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            last_processed_input: 0,
            dropped_frames: 0,
            inputs,
            outbound,
            feed_outbox: Vec::new(),
            chat_outbox: Vec::new(),
            input_closed: false,
        }
    }

    /// Checks if the client has been silent longer than `timeout`
    ///
    /// Any drained command or heartbeat counts as activity, so a player who
    /// only sends heartbeats while idle stays connected.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// Moves everything queued by the reader task into `out`
    fn drain_inputs(&mut self, out: &mut Vec<QueuedCommand>) {
        loop {
            match self.inputs.try_recv() {
                Ok(input) => {
                    self.last_seen = Instant::now();
                    if let ClientInput::Command {
                        sequence,
                        arrival,
                        command,
                    } = input
                    {
                        out.push(QueuedCommand {
                            player: self.id,
                            sequence,
                            arrival,
                            command,
                        });
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.input_closed = true;
                    break;
                }
            }
        }
    }

    /// Offers a snapshot carrying the pending outbox to the writer task.
    ///
    /// Returns false if the frame was skipped; the outbox is then kept.
    fn offer_snapshot(&mut self, mut snapshot: Snapshot) -> bool {
        snapshot.last_processed_input = self.last_processed_input;
        snapshot.feed_events = std::mem::take(&mut self.feed_outbox);
        snapshot.chat_messages = std::mem::take(&mut self.chat_outbox);

        match self.outbound.try_send(Packet::Snapshot(Box::new(snapshot))) {
            Ok(()) => true,
            Err(TrySendError::Full(Packet::Snapshot(snapshot))) => {
                let snapshot = *snapshot;
                self.feed_outbox = snapshot.feed_events;
                self.chat_outbox = snapshot.chat_messages;
                self.dropped_frames += 1;
                false
            }
            Err(_) => false,
        }
    }
}

/// All connected players, keyed by player id
pub struct ClientManager {
    clients: BTreeMap<PlayerId, Client>,
    idle_timeout: Duration,
}

impl ClientManager {
    /// Creates an empty roster that drops clients silent for `idle_timeout`
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            clients: BTreeMap::new(),
            idle_timeout,
        }
    }

    pub fn add_client(&mut self, client: Client) {
        info!("Client {} connected from {}", client.id, client.addr);
        self.clients.insert(client.id, client);
    }

    /// Removes a client from the roster
    ///
    /// Dropping the client drops its outbound sender, so the writer task
    /// flushes what is queued and finishes. Returns true if the client was
    /// found, false if it was already gone.
    pub fn remove_client(&mut self, client_id: &PlayerId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!(
                "Client {} disconnected ({} frames skipped)",
                client.id, client.dropped_frames
            );
            true
        } else {
            false
        }
    }

    /// Drains every inbound queue and returns the commands in arrival order
    ///
    /// Arrival stamps come from one counter shared by all reader tasks, so
    /// sorting on them restores the order in which commands reached the
    /// server regardless of which connection they came through. Heartbeats
    /// only refresh `last_seen` and are not returned.
    pub fn drain_chronological_inputs(&mut self) -> Vec<QueuedCommand> {
        let mut commands = Vec::new();
        for client in self.clients.values_mut() {
            client.drain_inputs(&mut commands);
        }
        commands.sort_by_key(|c| c.arrival);
        commands
    }

    /// Removes clients whose connection ended or went quiet
    ///
    /// A client whose reader or writer task has finished is dropped as
    /// `Closed`. One that sent nothing within the idle timeout is told it
    /// timed out first. The caller marks each returned player disconnected
    /// in the game.
    pub fn check_disconnects(&mut self) -> Vec<(PlayerId, DropReason)> {
        let dropped: Vec<(PlayerId, DropReason)> = self
            .clients
            .values()
            .filter_map(|client| {
                if client.input_closed || client.outbound.is_closed() {
                    Some((client.id, DropReason::Closed))
                } else if client.is_timed_out(self.idle_timeout) {
                    Some((client.id, DropReason::TimedOut))
                } else {
                    None
                }
            })
            .collect();

        for (client_id, reason) in &dropped {
            if *reason == DropReason::TimedOut {
                self.send_to(
                    *client_id,
                    Packet::Disconnected {
                        reason: "timed out".to_string(),
                    },
                );
            }
            self.remove_client(client_id);
        }
        dropped
    }

    /// Queues a tick's feed and chat for every client and acknowledges inputs.
    ///
    /// Rejections are sent right away to the player who issued the command.
    pub fn queue_report(&mut self, report: &TickReport) {
        for client in self.clients.values_mut() {
            client.feed_outbox.extend(report.feed.iter().cloned());
            client.chat_outbox.extend(report.chat.iter().cloned());
            if let Some(&sequence) = report.processed.get(&client.id) {
                client.last_processed_input = client.last_processed_input.max(sequence);
            }
        }

        for rejection in &report.rejections {
            self.send_to(
                rejection.player,
                Packet::CommandRejected {
                    sequence: rejection.sequence,
                    reason: rejection.error.to_string(),
                },
            );
        }
    }

    /// Offers each player their snapshot without waiting on any socket
    ///
    /// Snapshots for players no longer on the roster are ignored. A client
    /// whose outbound queue is full misses this frame but keeps its feed and
    /// chat backlog for the next one. Returns how many frames were skipped.
    pub fn deliver_snapshots(&mut self, snapshots: Vec<(PlayerId, Snapshot)>) -> usize {
        let mut skipped = 0;
        for (player, snapshot) in snapshots {
            let Some(client) = self.clients.get_mut(&player) else {
                continue;
            };
            if !client.offer_snapshot(snapshot) {
                debug!("Client {} is behind, snapshot skipped", player);
                skipped += 1;
            }
        }
        skipped
    }

    /// Sends a packet without waiting; false if the client is gone or backed up.
    pub fn send_to(&self, client_id: PlayerId, packet: Packet) -> bool {
        self.clients
            .get(&client_id)
            .is_some_and(|client| client.outbound.try_send(packet).is_ok())
    }

    /// Tells every client the match is over and drops them all
    ///
    /// The `Disconnected` packet is queued before each client is removed, so
    /// the writer task delivers it before shutting the socket.
    pub fn close_all(&mut self, reason: &str) -> Vec<PlayerId> {
        let ids = self.ids();
        for &id in &ids {
            self.send_to(
                id,
                Packet::Disconnected {
                    reason: reason.to_string(),
                },
            );
            self.remove_client(&id);
        }
        ids
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.clients.keys().copied().collect()
    }

    pub fn get(&self, client_id: &PlayerId) -> Option<&Client> {
        self.clients.get(client_id)
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
