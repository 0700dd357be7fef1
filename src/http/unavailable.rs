//! Handler linked into the binary when no cache backend is available.
//!
//! Answers every request with `503 Service Unavailable` and records a `MISS`
//! so the access log still shows what clients asked for.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::io::AsyncWriteExt;

use crate::http::handler::{CacheStatus, HandlerContext, HandlerError, RequestHandler};
use crate::http::request::{read_head, RequestLine};
use crate::lifecycle::Mode;
use crate::net::Connection;

const BODY: &str = "No cache backend is configured for this daemon.\n";

#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableHandler;

impl UnavailableHandler {
    /// Response bytes for `mode`. CGI responses use a `Status:` header
    /// instead of a status line.
    pub fn response(mode: Mode) -> String {
        let status = match mode {
            Mode::Cgi => "Status: 503 Service Unavailable".to_string(),
            _ => "HTTP/1.1 503 Service Unavailable".to_string(),
        };
        format!(
            "{status}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{BODY}",
            BODY.len()
        )
    }

    async fn serve(conn: Connection, ctx: HandlerContext) -> Result<(), HandlerError> {
        let (mut reader, mut writer) = conn.into_split();

        let path = if ctx.mode() == Mode::Cgi {
            std::env::var("PATH_INFO").unwrap_or_else(|_| "/".to_string())
        } else {
            let head = read_head(&mut reader).await?;
            let line = head.lines().next().unwrap_or_default();
            match RequestLine::parse(line) {
                Some(request) => request.path,
                None => {
                    ctx.logs().debug(&format!("unparsable request line {line:?}"))?;
                    "-".to_string()
                }
            }
        };

        let filename = match ctx.path_map().resolve(&path) {
            Some((targets, rest)) => format!("{}/{}", targets[0].trim_end_matches('/'), rest),
            None => path.trim_start_matches('/').to_string(),
        };

        writer.write_all(Self::response(ctx.mode()).as_bytes()).await?;
        writer.flush().await?;

        ctx.logs()
            .write_access(CacheStatus::Miss, &filename, 0, ctx.client())?;
        Ok(())
    }
}

impl RequestHandler for UnavailableHandler {
    fn handle(&self, conn: Connection, ctx: HandlerContext) -> BoxFuture<'_, Result<(), HandlerError>> {
        Self::serve(conn, ctx).boxed()
    }
}
