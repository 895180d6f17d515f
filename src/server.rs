//! Connection handling for the gate.
//!
//! One thread per accepted connection, one request per connection. The
//! shared [`Gate`] is read-only, so connection threads never coordinate.
//! Threads are not pooled or capped; a connection's thread lives at most
//! for the head deadline plus the write of one small response.

use crate::client_ip::ClientIpResolver;
use crate::gate::{Decision, Gate, GateRequest};
use crate::parsers::{HttpRequest, HttpResponse};
use crate::routing::{self, Route};
use std::io::{self, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// State shared by every connection thread.
#[derive(Debug)]
pub struct Server {
    gate: Gate,
    resolver: ClientIpResolver,
    timeout: Duration,
}

impl Server {
    pub fn new(gate: Gate) -> Self {
        Self::with_resolver(gate, ClientIpResolver::default())
    }

    pub fn with_resolver(gate: Gate, resolver: ClientIpResolver) -> Self {
        let timeout = Duration::from_secs(gate.config().timeout_seconds);
        Self {
            gate,
            resolver,
            timeout,
        }
    }

    /// Accept connections forever, handing each one to its own thread.
    ///
    /// Returns only if the listener itself can't report its address.
    pub fn run(self: Arc<Self>, listener: TcpListener) -> Result<(), std::io::Error> {
        info!(
            address = %listener.local_addr()?,
            user_agent_rules = self.gate.config().forbidden_user_agents.len(),
            network_rules = self.gate.config().forbidden_networks.len(),
            redirect = %self.gate.config().redirect_url,
            "Gate listening"
        );

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let server = Arc::clone(&self);
                    thread::spawn(move || {
                        if let Err(e) = server.handle_connection(stream) {
                            warn!(error = %e, "Error handling connection");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                }
            }
        }

        Ok(())
    }

    /// Read one request, answer it and close.
    pub fn handle_connection(&self, stream: TcpStream) -> Result<(), std::io::Error> {
        let started = Instant::now();
        let peer_addr = stream.peer_addr()?;
        debug!(%peer_addr, "New connection");

        stream.set_write_timeout(Some(self.timeout))?;

        // The timeout bounds the whole head, not each read, so a client
        // dripping one byte at a time can't hold the thread indefinitely.
        let mut reader = BufReader::new(DeadlineReader {
            stream: stream.try_clone()?,
            deadline: started + self.timeout,
        });
        let mut writer = stream;

        let request = match HttpRequest::parse(&mut reader) {
            Ok(req) => req,
            Err(e) => {
                warn!(%peer_addr, error = %e, "Failed to parse request");
                writer.write_all(&HttpResponse::bad_request().to_bytes())?;
                return writer.flush();
            }
        };

        let client_ip = self.resolver.resolve(peer_addr, &request.headers);
        let response = self.respond(&request, &client_ip);

        writer.write_all(&response.to_bytes())?;
        writer.flush()?;

        info!(
            status = response.status_code,
            latency_us = started.elapsed().as_micros() as u64,
            %client_ip,
            method = %request.method,
            path = %request.path,
            version = %request.version,
            "Request served"
        );
        Ok(())
    }

    /// Route the request and, for the root, ask the gate.
    fn respond(&self, request: &HttpRequest, client_ip: &str) -> HttpResponse {
        match routing::match_route(&request.method, &request.path) {
            Route::Root => {
                let decision = self.gate.evaluate(&GateRequest {
                    user_agent: request.user_agent(),
                    client_ip,
                });
                if let Decision::Blocked { reason, .. } = &decision {
                    info!(%client_ip, user_agent = request.user_agent(), %reason, "Blocked request");
                }
                HttpResponse::from_decision(&decision)
            }
            Route::NotFound => HttpResponse::not_found(),
        }
    }
}

/// Client socket reader that fails once its deadline has passed.
struct DeadlineReader {
    stream: TcpStream,
    deadline: Instant,
}

impl Read for DeadlineReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "request head deadline exceeded",
            ));
        }
        self.stream.set_read_timeout(Some(remaining))?;
        self.stream.read(buf)
    }
}
