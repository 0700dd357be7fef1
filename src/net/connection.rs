//! Client connections handed to the request handler.
//!
//! # Responsibilities
//! - Wrap an accepted TCP stream (standalone) or the process's standard
//!   input/output (inetd, CGI) behind one type
//! - Carry the client address for access logging

use std::net::IpAddr;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

pub type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;
pub type BoxedWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// A single client connection.
#[derive(Debug)]
pub enum Connection {
    /// Accepted by one of the daemon's own listeners.
    Tcp { stream: TcpStream, client: IpAddr },
    /// Standard input/output, set up by inetd or the web server.
    Stdio { client: Option<IpAddr> },
}

impl Connection {
    pub fn tcp(stream: TcpStream, client: IpAddr) -> Self {
        Connection::Tcp { stream, client }
    }

    pub fn stdio(client: Option<IpAddr>) -> Self {
        Connection::Stdio { client }
    }

    pub fn client(&self) -> Option<IpAddr> {
        match self {
            Connection::Tcp { client, .. } => Some(*client),
            Connection::Stdio { client } => *client,
        }
    }

    /// Split into independently owned read and write halves.
    pub fn into_split(self) -> (BoxedReader, BoxedWriter) {
        match self {
            Connection::Tcp { stream, .. } => {
                let (reader, writer) = stream.into_split();
                (Box::pin(reader), Box::pin(writer))
            }
            Connection::Stdio { .. } => (Box::pin(tokio::io::stdin()), Box::pin(tokio::io::stdout())),
        }
    }
}
