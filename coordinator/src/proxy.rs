use std::{net::SocketAddr, sync::Arc};

use client::{Client, FitResult};
use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
    specs::federated::{EvalConfig, EvalResult, TrainingConfig},
};
use log::debug;
use machine_learning::WeightVector;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex, MutexGuard},
};

use crate::error::{CoordinatorErr, Result};

/// The coordinator's handle on a federation participant, wherever it runs.
#[async_trait::async_trait]
pub trait ClientProxy: Send + Sync {
    /// The id of the client behind this proxy.
    fn id(&self) -> &str;

    /// Asks the client to train `weights` on its local data.
    ///
    /// # Arguments
    /// * `weights` - The client's own copy of the global weights.
    /// * `config` - The round's hyperparameters.
    async fn fit(&self, weights: WeightVector, config: TrainingConfig) -> Result<FitResult>;

    /// Asks the client to measure `weights` on its local data.
    ///
    /// # Arguments
    /// * `weights` - The client's own copy of the global weights.
    /// * `config` - Which partition to read and how to batch it.
    async fn evaluate(&self, weights: WeightVector, config: EvalConfig) -> Result<EvalResult>;

    /// Tells the client the session is over.
    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}

/// A client running in the coordinator's own process.
///
/// Requests run on tokio's blocking pool since local training is CPU bound.
#[derive(Debug, Clone)]
pub struct LocalProxy {
    client: Arc<Client>,
}

impl LocalProxy {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

#[async_trait::async_trait]
impl ClientProxy for LocalProxy {
    fn id(&self) -> &str {
        self.client.id()
    }

    async fn fit(&self, weights: WeightVector, config: TrainingConfig) -> Result<FitResult> {
        let client = Arc::clone(&self.client);
        let fit = tokio::task::spawn_blocking(move || client.fit(&weights, &config))
            .await
            .map_err(std::io::Error::other)??;

        Ok(fit)
    }

    async fn evaluate(&self, weights: WeightVector, config: EvalConfig) -> Result<EvalResult> {
        let client = Arc::clone(&self.client);
        let eval = tokio::task::spawn_blocking(move || client.evaluate(&weights, &config))
            .await
            .map_err(std::io::Error::other)??;

        Ok(eval)
    }
}

struct Channel<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    rx: OnoReceiver<R>,
    tx: OnoSender<W>,
    /// Set while an exchange is half done. A request dropped midway (e.g. on a round timeout)
    /// leaves it set, since its answer may still be in the stream.
    in_flight: bool,
}

/// A client reached through a framed channel, one request at a time.
pub struct RemoteProxy<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    id: String,
    channel: Mutex<Channel<R, W>>,
}

impl RemoteProxy<OwnedReadHalf, OwnedWriteHalf> {
    /// Connects to a client listening at `addr`.
    ///
    /// # Arguments
    /// * `id` - The id the client was started with.
    /// * `addr` - The client's network address.
    ///
    /// # Returns
    /// The proxy or `ConnectionFailed`.
    pub async fn connect(id: impl Into<String>, addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| CoordinatorErr::ConnectionFailed {
                addr: addr.to_string(),
                source,
            })?;

        let (rx, tx) = stream.into_split();
        let (rx, tx) = comms::channel(rx, tx);
        Ok(Self::new(id, rx, tx))
    }
}

impl<R, W> RemoteProxy<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a new `RemoteProxy` over an already open channel.
    ///
    /// # Arguments
    /// * `id` - The id of the client at the other end.
    /// * `rx` - The receiving end of the communication.
    /// * `tx` - The sending end of the communication.
    pub fn new(id: impl Into<String>, rx: OnoReceiver<R>, tx: OnoSender<W>) -> Self {
        Self {
            id: id.into(),
            channel: Mutex::new(Channel {
                rx,
                tx,
                in_flight: false,
            }),
        }
    }

    fn unexpected(&self, got: &'static str) -> CoordinatorErr {
        CoordinatorErr::UnexpectedMessage {
            client_id: self.id.clone(),
            got,
        }
    }

    /// Locks the channel for a new exchange.
    async fn begin(&self) -> Result<MutexGuard<'_, Channel<R, W>>> {
        let mut channel = self.channel.lock().await;
        if channel.in_flight {
            return Err(self.failed("the channel is out of sync after an abandoned request"));
        }

        channel.in_flight = true;
        Ok(channel)
    }

    fn failed(&self, reason: &str) -> CoordinatorErr {
        CoordinatorErr::ClientFailed {
            client_id: self.id.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl<R, W> ClientProxy for RemoteProxy<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn id(&self) -> &str {
        &self.id
    }

    async fn fit(&self, weights: WeightVector, config: TrainingConfig) -> Result<FitResult> {
        let mut channel = self.begin().await?;
        let Channel { rx, tx, .. } = &mut *channel;

        let flat = weights.to_flat();
        let cmd = Msg::Control(Command::Fit {
            config,
            shapes: weights.shapes(),
        });
        tx.send(&cmd).await?;
        tx.send(&Msg::Data(Payload::Weights(&flat))).await?;
        debug!(client_id = self.id.as_str(); "fit request sent");

        let mut buf: Vec<u32> = Vec::new();
        let (num_examples, duration, shapes, epoch_losses) = match rx.recv_into(&mut buf).await? {
            Msg::Control(Command::FitDone {
                num_examples,
                duration,
                shapes,
                epoch_losses,
            }) => (num_examples, duration, shapes, epoch_losses),
            Msg::Err(reason) => {
                channel.in_flight = false;
                return Err(self.failed(&reason));
            }
            other => return Err(self.unexpected(other.kind())),
        };

        let weights = match rx.recv_into(&mut buf).await? {
            Msg::Data(Payload::Weights(flat)) => WeightVector::from_flat(flat, &shapes),
            other => return Err(self.unexpected(other.kind())),
        };
        channel.in_flight = false;

        Ok(FitResult {
            weights: weights?,
            num_examples,
            duration,
            epoch_losses,
        })
    }

    async fn evaluate(&self, weights: WeightVector, config: EvalConfig) -> Result<EvalResult> {
        let mut channel = self.begin().await?;
        let Channel { rx, tx, .. } = &mut *channel;

        let flat = weights.to_flat();
        let cmd = Msg::Control(Command::Evaluate {
            config,
            shapes: weights.shapes(),
        });
        tx.send(&cmd).await?;
        tx.send(&Msg::Data(Payload::Weights(&flat))).await?;
        debug!(client_id = self.id.as_str(); "evaluate request sent");

        let mut buf: Vec<u32> = Vec::new();
        let result = match rx.recv_into(&mut buf).await? {
            Msg::Control(Command::EvaluateDone(result)) => Ok(result),
            Msg::Err(reason) => Err(self.failed(&reason)),
            other => return Err(self.unexpected(other.kind())),
        };
        channel.in_flight = false;

        result
    }

    async fn disconnect(&self) -> Result<()> {
        let mut channel = self.channel.lock().await;
        channel.tx.send(&Msg::Control(Command::Disconnect)).await?;
        channel.tx.shutdown().await?;
        Ok(())
    }
}
