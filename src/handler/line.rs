//! Minimal line protocol over the default partition.
//!
//! One command per line, space separated:
//!
//! | Command           | Reply                 |
//! |-------------------|-----------------------|
//! | `PING`            | `PONG`                |
//! | `GET key`         | value, or `(nil)`     |
//! | `SET key value`   | `OK`                  |
//! | `DEL key`         | `1` or `0`            |
//! | `QUIT`            | `BYE`, then close     |
//!
//! Anything else gets `ERR ...`. Used by the reference binary and tests.

use async_trait::async_trait;
use fjall::PartitionHandle;
use std::sync::Arc;

use crate::bootstrap::ServiceContext;
use crate::error::BoxError;
use crate::handler::{HandlerFactory, RequestHandler};
use crate::net::connection::Connection;
use crate::storage::DEFAULT_PARTITION;

const MAX_LINE: usize = 64 * 1024;

/// Stateless handler; safe to share across connections.
pub struct LineHandler {
    data: PartitionHandle,
}

impl LineHandler {
    pub fn new(data: PartitionHandle) -> Self {
        Self { data }
    }

    /// Factory binding the handler to the `default` partition.
    pub fn factory() -> HandlerFactory {
        Arc::new(|context: &ServiceContext| -> Result<Arc<dyn RequestHandler>, BoxError> {
            let data = context.try_partition(DEFAULT_PARTITION)?;
            Ok(Arc::new(LineHandler::new(data)))
        })
    }

    fn execute(&self, line: &str) -> Reply {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            return Reply::Line("ERR empty command".into());
        };
        let args: Vec<&str> = parts.collect();

        let result = match (command.to_ascii_uppercase().as_str(), args.as_slice()) {
            ("PING", []) => Ok("PONG".to_string()),
            ("GET", [key]) => self.data.get(*key).map(|value| match value {
                Some(value) => String::from_utf8_lossy(&value).into_owned(),
                None => "(nil)".to_string(),
            }),
            ("SET", [key, value]) => self.data.insert(*key, *value).map(|_| "OK".to_string()),
            ("DEL", [key]) => self.data.contains_key(*key).and_then(|existed| {
                self.data.remove(*key)?;
                Ok(if existed { "1" } else { "0" }.to_string())
            }),
            ("QUIT", []) => return Reply::Close("BYE".into()),
            (name, _) => return Reply::Line(format!("ERR unknown command or arity '{name}'")),
        };

        match result {
            Ok(reply) => Reply::Line(reply),
            Err(e) => {
                tracing::warn!(error = %e, "Storage error serving command");
                Reply::Line(format!("ERR {e}"))
            }
        }
    }
}

enum Reply {
    Line(String),
    Close(String),
}

#[async_trait]
impl RequestHandler for LineHandler {
    async fn handle_connection(&self, connection: &mut Connection) -> Result<(), BoxError> {
        let mut pending = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            let read = connection.read(&mut buf).await?;
            if read == 0 {
                return Ok(());
            }
            pending.extend_from_slice(&buf[..read]);

            while let Some(end) = pending.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = pending.drain(..=end).collect();
                let line = String::from_utf8_lossy(&raw);
                let line = line.trim_end_matches(['\r', '\n']);
                match self.execute(line) {
                    Reply::Line(reply) => {
                        connection.write_all(format!("{reply}\r\n").as_bytes()).await?;
                    }
                    Reply::Close(reply) => {
                        connection.write_all(format!("{reply}\r\n").as_bytes()).await?;
                        return Ok(());
                    }
                }
            }

            if pending.len() > MAX_LINE {
                connection.write_all(b"ERR line too long\r\n").await?;
                return Err("line exceeds maximum length".into());
            }
        }
    }
}
