use std::sync::Arc;

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
};
use log::{debug, info, warn};
use machine_learning::WeightVector;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    client::Client,
    error::{ClientErr, Result},
};

/// Answers the coordinator's requests on a framed channel until it disconnects.
///
/// Request-local failures (a missing partition, mismatched weights, ...) are answered with an
/// error frame and the session continues; I/O and protocol failures end it.
///
/// # Arguments
/// * `client` - The client serving the requests.
/// * `rx` - Receiving end of the coordinator channel.
/// * `tx` - Sending end of the coordinator channel.
pub async fn serve<R, W>(client: Arc<Client>, mut rx: OnoReceiver<R>, mut tx: OnoSender<W>) -> Result<()>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let mut rx_buf: Vec<u32> = Vec::new();
    let client_id = client.id().to_string();

    loop {
        debug!(client_id = client_id.as_str(); "waiting for message");

        let cmd = match rx.recv_into(&mut rx_buf).await? {
            Msg::Control(cmd) => cmd,
            other => {
                warn!(client_id = client_id.as_str(), got = other.kind(); "unexpected message");
                return Err(ClientErr::UnexpectedMessage { got: other.kind() });
            }
        };

        match cmd {
            Command::Fit { config, shapes } => {
                let weights = recv_weights(&mut rx, &mut rx_buf, &shapes).await?;
                let client = Arc::clone(&client);
                let result = tokio::task::spawn_blocking(move || {
                    weights.and_then(|weights| client.fit(&weights, &config))
                })
                .await
                .map_err(std::io::Error::other)?;

                match result {
                    Ok(fit) => {
                        let flat = fit.weights.to_flat();
                        let done = Msg::Control(Command::FitDone {
                            num_examples: fit.num_examples,
                            duration: fit.duration,
                            shapes: fit.weights.shapes(),
                            epoch_losses: fit.epoch_losses,
                        });
                        tx.send(&done).await?;
                        tx.send(&Msg::Data(Payload::Weights(&flat))).await?;
                    }
                    Err(e) => reply_err(&mut tx, &client_id, e).await?,
                }
            }
            Command::Evaluate { config, shapes } => {
                let weights = recv_weights(&mut rx, &mut rx_buf, &shapes).await?;
                let client = Arc::clone(&client);
                let result = tokio::task::spawn_blocking(move || {
                    weights.and_then(|weights| client.evaluate(&weights, &config))
                })
                .await
                .map_err(std::io::Error::other)?;

                match result {
                    Ok(eval) => {
                        tx.send(&Msg::Control(Command::EvaluateDone(eval))).await?;
                    }
                    Err(e) => reply_err(&mut tx, &client_id, e).await?,
                }
            }
            Command::Disconnect => {
                info!(client_id = client_id.as_str(); "disconnect received from coordinator");
                return Ok(());
            }
            other => {
                let got = Msg::Control(other).kind();
                warn!(client_id = client_id.as_str(), got = got; "unexpected command");
                return Err(ClientErr::UnexpectedMessage { got });
            }
        }
    }
}

/// Reads the weights frame that follows a request.
///
/// The outer result fails the session, the inner one only the request.
async fn recv_weights<R>(
    rx: &mut OnoReceiver<R>,
    rx_buf: &mut Vec<u32>,
    shapes: &[Vec<usize>],
) -> Result<Result<WeightVector>>
where
    R: AsyncRead + Unpin + Send,
{
    match rx.recv_into(rx_buf).await? {
        Msg::Data(Payload::Weights(flat)) => {
            Ok(WeightVector::from_flat(flat, shapes).map_err(ClientErr::from))
        }
        other => Err(ClientErr::UnexpectedMessage { got: other.kind() }),
    }
}

async fn reply_err<W>(tx: &mut OnoSender<W>, client_id: &str, err: ClientErr) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    if !err.is_request_local() {
        return Err(err);
    }

    warn!(client_id = client_id, error = err.to_string().as_str(); "request failed");
    tx.send(&Msg::Err(err.to_string().into())).await?;
    Ok(())
}
