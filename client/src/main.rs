use std::{env, io, sync::Arc};

use client::{Client, TaskRegistry, server};
use log::info;
use tokio::{net::TcpListener, signal};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_DATA_ROOT: &str = "./data";

fn required(name: &str) -> io::Result<String> {
    env::var(name).map_err(|e| io::Error::other(format!("{name}: {e}")))
}

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let addr = format!(
        "{}:{}",
        env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
        required("PORT")?,
    );
    let data_root = env::var("DATA_ROOT").unwrap_or_else(|_| DEFAULT_DATA_ROOT.to_string());
    let task = required("TASK")?;
    let client_id = required("CLIENT_ID")?;

    let mut client = Client::new(client_id, task, data_root, &TaskRegistry::with_builtin())?;
    if let Ok(seed) = env::var("SEED") {
        let seed = seed
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("SEED: {e}")))?;
        client = client.with_seed(seed);
    }
    let client = Arc::new(client);

    let list = TcpListener::bind(&addr).await?;
    info!("listening at {addr}");

    let (stream, addr) = list.accept().await?;
    let (rx, tx) = stream.into_split();
    let (rx, tx) = comms::channel(rx, tx);
    info!("coordinator connected from {addr}");

    tokio::select! {
        ret = server::serve(client, rx, tx) => {
            ret?;
            info!("wrapping up, disconnecting...");
        }
        _ = signal::ctrl_c() => {
            info!("received SIGTERM");
        }
    }

    Ok(())
}
