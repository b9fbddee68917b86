use std::future::Future;
use std::io::Write;

use tokio::net::UdpSocket;
use tracing::{info, warn};

use crate::config::Config;
use crate::datagram::Datagram;

/// Bind the UDP socket described by `config`.
///
/// A receive buffer size the kernel refuses is logged and otherwise ignored.
pub async fn bind(config: &Config) -> std::io::Result<UdpSocket> {
    let socket = UdpSocket::bind(config.listen).await?;

    if let Some(size) = config.receive_buffer_bytes
        && let Err(err) = set_receive_buffer_size(&socket, size)
    {
        warn!(
            message = "Set receive buffer size failed",
            addr = %config.listen,
            %err,
        );
    }

    Ok(socket)
}

// tokio does not expose SO_RCVBUF on its sockets yet
fn set_receive_buffer_size(socket: &UdpSocket, size: usize) -> std::io::Result<()> {
    socket2::SockRef::from(socket).set_recv_buffer_size(size)
}

/// Decode every datagram received on `socket` and write it to `output` as one
/// JSON document per line, until `shutdown` completes.
///
/// Datagrams that fail to decode are logged and dropped, only a failure to
/// receive or to write ends the loop early.
pub async fn serve<W: Write>(
    socket: UdpSocket,
    pretty: bool,
    mut output: W,
    shutdown: impl Future<Output = ()>,
) -> std::io::Result<()> {
    let mut buf = vec![0u8; u16::MAX as usize];
    tokio::pin!(shutdown);

    if let Ok(addr) = socket.local_addr() {
        info!(message = "Start listening", %addr);
    }

    loop {
        let (size, peer) = tokio::select! {
            biased;

            result = socket.recv_from(&mut buf) => match result {
                Ok(received) => received,
                Err(err) => {
                    warn!(message = "Receive datagram failed", %err);

                    return Err(err);
                }
            },
            _ = &mut shutdown => break,
        };

        let datagram = match Datagram::decode(&buf[..size]) {
            Ok(datagram) => datagram,
            Err(err) => {
                warn!(message = "Decode datagram failed", %err, %peer, size);
                continue;
            }
        };

        let result = if pretty {
            serde_json::to_writer_pretty(&mut output, &datagram)
        } else {
            serde_json::to_writer(&mut output, &datagram)
        };
        result.map_err(std::io::Error::other)?;
        output.write_all(b"\n")?;
        output.flush()?;
    }

    info!(message = "Stop listening");

    Ok(())
}
