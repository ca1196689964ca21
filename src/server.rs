//! HTTP server module
//!
//! Accepts one TCP connection at a time and runs parse → dispatch → respond
//! → close on it before accepting the next.

use crate::http::{HttpResponse, read_request};
use crate::router::Router;
use crate::sampler::LightSensor;
use crate::{NodeError, config};
use embassy_net::Stack;
use embassy_net::tcp::TcpSocket;
use embassy_time::{Duration, Timer};
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_io_async::{Read, Write};
use log::{debug, info, warn};

const RX_BUFFER_SIZE: usize = 1536;
const TX_BUFFER_SIZE: usize = 2560;

/// Serves the node's HTTP API on one port
pub struct HttpServer<'a> {
    stack: Stack<'a>,
    port: u16,
    is_bound: bool,
}

impl<'a> HttpServer<'a> {
    /// Create a new HTTP server instance
    pub fn new(stack: Stack<'a>) -> Self {
        Self {
            stack,
            port: 0,
            is_bound: false,
        }
    }

    /// Select the port to listen on
    pub fn bind(&mut self, port: u16) -> Result<(), NodeError> {
        if port == 0 {
            warn!("[HTTP] Refusing to bind port 0");
            return Err(NodeError::ServerError);
        }

        // Sockets are created per connection; binding only fixes the port
        self.port = port;
        self.is_bound = true;
        info!("[HTTP] Server bound to port {}", port);
        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Accept and answer connections forever. Only fails if never bound.
    pub async fn serve<S, T, L>(
        &mut self,
        router: &mut Router<'_, S, T, L>,
    ) -> Result<(), NodeError>
    where
        S: LightSensor,
        T: InputPin,
        L: OutputPin,
    {
        if !self.is_bound {
            return Err(NodeError::ServerError);
        }

        let mut rx_buffer = [0u8; RX_BUFFER_SIZE];
        let mut tx_buffer = [0u8; TX_BUFFER_SIZE];
        let mut request_buffer = [0u8; config::REQUEST_BUFFER_SIZE];

        loop {
            // No point accepting before DHCP has given us an address
            self.stack.wait_config_up().await;

            let mut socket = TcpSocket::new(self.stack, &mut rx_buffer, &mut tx_buffer);
            socket.set_timeout(Some(config::SOCKET_TIMEOUT));

            match socket.accept(self.port).await {
                Ok(()) => {
                    debug!("[HTTP] Connection from {:?}", socket.remote_endpoint());
                    if let Err(e) =
                        handle_connection(&mut socket, router, &mut request_buffer).await
                    {
                        warn!("[HTTP] Connection error: {:?}", e);
                    }
                    socket.close();
                    socket.flush().await.ok(); // Silent error handling
                }
                Err(e) => {
                    warn!("[HTTP] Accept error: {:?}", e);
                    Timer::after(Duration::from_millis(200)).await;
                }
            }

            socket.abort();
        }
    }
}

/// Answer the single request carried by `conn`.
///
/// A request that cannot be parsed gets `400` with an empty body; a peer
/// that sent nothing gets no answer at all.
pub async fn handle_connection<C, S, T, L>(
    conn: &mut C,
    router: &mut Router<'_, S, T, L>,
    buf: &mut [u8],
) -> Result<(), C::Error>
where
    C: Read + Write,
    S: LightSensor,
    T: InputPin,
    L: OutputPin,
{
    let response = match read_request(conn, buf).await {
        Ok(request) => router.dispatch(&request).await,
        Err(e) => match e.response_status() {
            Some(status) => {
                warn!("[HTTP] Bad request: {:?}", e);
                HttpResponse::empty(status)
            }
            None => {
                debug!("[HTTP] Nothing to answer: {:?}", e);
                return Ok(());
            }
        },
    };

    info!(
        "[HTTP] {} {} ({} bytes)",
        response.status.code(),
        response.status.reason(),
        response.body.len()
    );
    response.write_to(conn).await?;
    conn.flush().await
}
