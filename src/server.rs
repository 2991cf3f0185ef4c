use futures::{SinkExt, StreamExt};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, instrument};

use crate::codec::FrameCodec;
use crate::commands::executable::Executable;
use crate::commands::Command;
use crate::frame::Frame;
use crate::persistence;
use crate::pubsub::Broker;
use crate::session::Session;
use crate::store::DEFAULT_DATABASES;
use crate::Error;

pub struct Config {
    pub port: u16,
    pub databases: usize,
    pub snapshot_path: PathBuf,
    pub snapshot_interval: Duration,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            port: 6379,
            databases: DEFAULT_DATABASES,
            snapshot_path: PathBuf::from("redlite.snapshot"),
            snapshot_interval: Duration::from_secs(60),
        }
    }
}

pub async fn run(config: Config) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    // A corrupt snapshot must abort startup instead of serving garbled state.
    let store = persistence::load(&config.snapshot_path, config.databases)?;
    let broker = Broker::new();

    let listener = TcpListener::bind(("127.0.0.1", config.port)).await?;
    info!("Server listening on {}", listener.local_addr()?);

    tokio::spawn(snapshot_loop(
        store.clone(),
        config.snapshot_path.clone(),
        config.snapshot_interval,
    ));

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, client_address) = result?;
                info!("Accepted connection from {:?}", client_address);

                let store = store.clone();
                let broker = broker.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(socket, store, broker).await {
                        error!("Connection error: {}", e);
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                persistence::save(&store, &config.snapshot_path)?;
                return Ok(());
            }
        }
    }
}

async fn snapshot_loop(store: crate::store::Store, path: PathBuf, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        if let Err(e) = persistence::save(&store, &path) {
            error!("Snapshot failed: {}", e);
        }
    }
}

#[instrument(name = "connection", skip(stream, store, broker), fields(session_id))]
async fn handle_connection(
    stream: TcpStream,
    store: crate::store::Store,
    broker: Broker,
) -> Result<(), Error> {
    let mut framed = Framed::new(stream, FrameCodec);
    let (push, mut push_rx) = mpsc::unbounded_channel();
    let mut session = Session::new(store, broker, push);

    tracing::Span::current().record("session_id", session.id.to_string());

    // Break instead of `?` so broker cleanup below always runs.
    let result = loop {
        tokio::select! {
            incoming = framed.next() => {
                match incoming {
                    Some(Ok(frame)) => {
                        debug!("Received frame: {:?}", frame);
                        let res = dispatch(frame, &mut session);
                        debug!("Sending response: {:?}", res);
                        if let Err(e) = framed.send(res).await {
                            break Err(e);
                        }
                    }
                    // A malformed byte stream cannot be resynchronized; reply
                    // once and drop the connection.
                    Some(Err(e)) => {
                        let reply = Frame::Error(format!("ERR protocol error; {}", e));
                        let _ = framed.send(reply).await;
                        break Ok(());
                    }
                    None => break Ok(()),
                }
            }
            Some(frame) = push_rx.recv() => {
                if let Err(e) = framed.send(frame).await {
                    break Err(e);
                }
            }
        }
    };

    session.broker.unsubscribe_all(session.id);
    info!("Connection closed");
    result
}

/// Turn one request frame into one reply frame. Request-level failures
/// (unknown commands, bad arguments, out-of-range database indexes) become
/// error replies and leave the connection usable.
fn dispatch(frame: Frame, session: &mut Session) -> Frame {
    let cmd = match Command::try_from(frame) {
        Ok(cmd) => cmd,
        Err(e) => return Frame::Error(e.to_string()),
    };

    if session.is_subscribed() && !cmd.allowed_in_subscribe_mode() {
        return Frame::Error(format!(
            "ERR Can't execute '{}': only SUBSCRIBE / UNSUBSCRIBE / PUBLISH / PING are allowed in this context",
            cmd.name()
        ));
    }

    match cmd.exec(session) {
        Ok(frame) => frame,
        Err(e) => Frame::Error(e.to_string()),
    }
}
