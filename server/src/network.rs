//! Server network layer handling TCP sessions and game loop coordination

use crate::client_manager::{
    Client, ClientInput, ClientManager, INPUT_QUEUE_CAPACITY, OUTBOUND_QUEUE_CAPACITY,
};
use crate::config::{validate_tick_rate, MatchConfig};
use crate::error::{BoxError, FrameError, JoinError};
use crate::game::GameState;
use log::{debug, error, info, warn};
use shared::{
    decode_payload, encode_frame, Packet, PlayerId, FRAME_HEADER_LEN, MAX_FRAME_LEN,
    MAX_NAME_LEN, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout, MissedTickBehavior};

/// How long a new connection has to send its `Join`
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_NAME: &str = "Tank";

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerEvent {
    Join {
        name: String,
        addr: SocketAddr,
        inputs: mpsc::Receiver<ClientInput>,
        outbound: mpsc::Sender<Packet>,
        reply: oneshot::Sender<Result<PlayerId, JoinError>>,
    },
}

/// Main server coordinating networking and game simulation
pub struct Server {
    listener: TcpListener,
    game: GameState,
    clients: ClientManager,
    tick_rate: u32,
    started: Instant,
    /// Global arrival counter shared by every connection's reader
    arrivals: Arc<AtomicU64>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerEvent>,
    server_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Server {
    pub async fn new(addr: &str, tick_rate: u32, config: MatchConfig) -> Result<Self, BoxError> {
        config.validate()?;
        validate_tick_rate(tick_rate)?;

        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let idle_timeout = Duration::from_secs_f64(config.idle_timeout);

        Ok(Server {
            listener,
            game: GameState::new(config),
            clients: ClientManager::new(idle_timeout),
            tick_rate,
            started: Instant::now(),
            arrivals: Arc::new(AtomicU64::new(0)),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Seconds on the simulation clock
    fn now(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Main server loop: accepts connections, admits players and ticks the match.
    pub async fn run(mut self) -> Result<(), BoxError> {
        let mut tick_interval = interval(Duration::from_secs_f64(1.0 / f64::from(self.tick_rate)));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started at {} ticks per second", self.tick_rate);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let server_tx = self.server_tx.clone();
                            let arrivals = Arc::clone(&self.arrivals);
                            tokio::spawn(handle_connection(stream, addr, server_tx, arrivals));
                        }
                        Err(e) => warn!("Failed to accept connection: {}", e),
                    }
                },

                event = self.server_rx.recv() => {
                    if let Some(event) = event {
                        self.handle_event(event);
                    }
                },

                _ = tick_interval.tick() => self.tick(),
            }
        }
    }

    fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Join {
                name,
                addr,
                inputs,
                outbound,
                reply,
            } => {
                let now = self.now();
                let result = self.game.add_player(name, now);
                match &result {
                    Ok(player_id) => {
                        let joined = Packet::Joined {
                            player_id: *player_id,
                            map_radius: self.game.config.map_radius,
                            tick_rate: self.tick_rate,
                            upgrade_costs: self.game.config.upgrade_costs.clone(),
                        };
                        // Fresh queue, so the welcome is always first in line
                        let _ = outbound.try_send(joined);
                        self.clients
                            .add_client(Client::new(*player_id, addr, inputs, outbound));
                    }
                    Err(e) => info!("Rejected join from {}: {}", addr, e),
                }
                if reply.send(result).is_err() {
                    debug!("Connection from {} went away during join", addr);
                }
            }
        }
    }

    /// Runs one simulation step and broadcasts the results
    fn tick(&mut self) {
        let now = self.now();

        let commands = self.clients.drain_chronological_inputs();
        for (player, reason) in self.clients.check_disconnects() {
            info!("Player {} dropped: {:?}", player, reason);
            self.game.mark_disconnected(player, now);
        }

        let report = self.game.step(now, commands);
        self.clients.queue_report(&report);

        if report.closed {
            let closed = self.clients.close_all("match closed");
            info!("Match closed, disconnected {} clients", closed.len());
            return;
        }

        let skipped = self.clients.deliver_snapshots(self.game.snapshots(timestamp_ms()));

        // Periodic performance monitoring
        let tick = self.game.world.tick;
        if tick % u64::from(self.tick_rate) == 0 && !self.clients.is_empty() {
            debug!(
                "Tick {}: {} clients, phase {:?}, {:.1}s left, {} frames skipped",
                tick,
                self.clients.len(),
                self.game.world.phase,
                self.game.world.remaining(&self.game.config),
                skipped
            );
        }
    }
}

/// Server wall-clock milliseconds for snapshot timestamps
fn timestamp_ms() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    millis.min(u64::MAX as u128) as u64
}

/// Trims a requested display name to something printable
pub fn sanitize_name(name: &str) -> String {
    let clean: String = name
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_LEN)
        .collect();
    if clean.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        clean
    }
}

/// Reads one length-prefixed packet.
///
/// A frame whose payload fails to decode has still been consumed in full, so
/// the caller may keep reading after a [`FrameError::Decode`].
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Packet, FrameError> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    reader.read_exact(&mut header).await?;
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(decode_payload(&payload)?)
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    packet: &Packet,
) -> Result<(), FrameError> {
    let frame = encode_frame(packet).map_err(FrameError::Encode)?;
    writer.write_all(&frame).await?;
    Ok(())
}

/// Drives one TCP connection from handshake to close
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerEvent>,
    arrivals: Arc<AtomicU64>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for {}: {}", addr, e);
    }
    let (mut reader, mut writer) = stream.into_split();

    let name = match timeout(JOIN_TIMEOUT, read_frame(&mut reader)).await {
        Ok(Ok(Packet::Join {
            client_version,
            name,
        })) => {
            if client_version != PROTOCOL_VERSION {
                let error = JoinError::VersionMismatch {
                    client: client_version,
                    server: PROTOCOL_VERSION,
                };
                reject(&mut writer, addr, error.to_string()).await;
                return;
            }
            sanitize_name(&name)
        }
        Ok(Ok(other)) => {
            warn!("Expected Join from {}, got {:?}", addr, other);
            reject(&mut writer, addr, "expected Join".to_string()).await;
            return;
        }
        Ok(Err(e)) => {
            warn!("Handshake with {} failed: {}", addr, e);
            return;
        }
        Err(_) => {
            warn!("Client at {} never sent Join", addr);
            return;
        }
    };

    let (input_tx, input_rx) = mpsc::channel(INPUT_QUEUE_CAPACITY);
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
    let (reply_tx, reply_rx) = oneshot::channel();
    let join = ServerEvent::Join {
        name,
        addr,
        inputs: input_rx,
        outbound: outbound_tx,
        reply: reply_tx,
    };
    if server_tx.send(join).is_err() {
        error!("Server loop is gone, dropping {}", addr);
        return;
    }

    let player_id = match reply_rx.await {
        Ok(Ok(player_id)) => player_id,
        Ok(Err(e)) => {
            reject(&mut writer, addr, e.to_string()).await;
            return;
        }
        Err(_) => return,
    };

    tokio::spawn(run_writer(writer, outbound_rx, player_id));
    run_reader(reader, input_tx, arrivals, player_id).await;
}

async fn reject(writer: &mut OwnedWriteHalf, addr: SocketAddr, reason: String) {
    if let Err(e) = write_frame(writer, &Packet::Disconnected { reason }).await {
        debug!("Could not notify {}: {}", addr, e);
    }
    let _ = writer.shutdown().await;
}

/// Forwards a player's packets to the tick loop until the connection ends.
///
/// Dropping `inputs` on return is what tells the tick loop the player left.
async fn run_reader(
    mut reader: OwnedReadHalf,
    inputs: mpsc::Sender<ClientInput>,
    arrivals: Arc<AtomicU64>,
    player_id: PlayerId,
) {
    loop {
        let input = match read_frame(&mut reader).await {
            Ok(Packet::Input { sequence, command }) => ClientInput::Command {
                sequence,
                arrival: arrivals.fetch_add(1, Ordering::Relaxed),
                command,
            },
            Ok(Packet::Heartbeat { .. }) => ClientInput::Heartbeat,
            Ok(Packet::Disconnect) => {
                info!("Player {} said goodbye", player_id);
                break;
            }
            Ok(other) => {
                warn!("Unexpected packet from player {}: {:?}", player_id, other);
                continue;
            }
            Err(e) if e.is_recoverable() => {
                warn!("Malformed frame from player {}: {}", player_id, e);
                continue;
            }
            Err(e) => {
                debug!("Connection of player {} ended: {}", player_id, e);
                break;
            }
        };

        match inputs.try_send(input) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Input queue of player {} is full, command dropped", player_id);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }
    }
}

/// Writes queued packets until the tick loop drops the sender or the socket fails
async fn run_writer(mut writer: OwnedWriteHalf, mut outbound: mpsc::Receiver<Packet>, player_id: PlayerId) {
    while let Some(packet) = outbound.recv().await {
        if let Err(e) = write_frame(&mut writer, &packet).await {
            debug!("Write to player {} failed: {}", player_id, e);
            return;
        }
    }
    let _ = writer.shutdown().await;
}
