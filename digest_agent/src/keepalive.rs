//! Keep-alive HTTP endpoint for external uptime monitors.
//!
//! Not an HTTP server: whatever arrives (or nothing, within `READ_TIMEOUT`) is
//! answered with `200 OK` and `READINESS_MESSAGE`, one thread per connection.
use digest_common::Result;
use log::{debug, error, info};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

/// Body of every keep-alive answer.
pub const READINESS_MESSAGE: &str = "Crypto Bot is running! 🚀\n";

/// How long to wait for the request before answering anyway.
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Minimal HTTP listener polled by external uptime monitors.
///
/// Every request, whatever its method or path, gets `200 OK` with
/// `READINESS_MESSAGE` as plain text, then the connection is closed.
pub struct KeepAliveListener;

impl KeepAliveListener {
    /// Bind `bind_addr` (e.g., `0.0.0.0:3000`) and serve it from a background thread.
    pub fn start(bind_addr: &str) -> Result<TcpListener> {
        let listener = TcpListener::bind(bind_addr)?;
        let serving = listener.try_clone()?;
        info!("Keep-alive server running on {}", listener.local_addr()?);

        thread::spawn(move || {
            for stream in serving.incoming() {
                match stream {
                    Ok(stream) => {
                        thread::spawn(move || {
                            if let Err(e) = Self::respond(stream) {
                                debug!("Keep-alive response failed: {}", e);
                            }
                        });
                    }
                    Err(e) => error!("Keep-alive connection error: {}", e),
                }
            }
        });
        Ok(listener)
    }

    fn respond(mut stream: TcpStream) -> std::io::Result<()> {
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        let mut buf = [0u8; 1024];
        // request content is irrelevant; read it so closing doesn't reset the peer
        if let Err(e) = stream.read(&mut buf) {
            debug!("Keep-alive request not read: {}", e);
        }

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            READINESS_MESSAGE.len(),
            READINESS_MESSAGE
        );
        stream.write_all(response.as_bytes())?;
        stream.flush()
    }
}
