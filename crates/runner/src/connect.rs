// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport seam between the job runner and its agents.
//!
//! A connector dials one agent and yields a bidirectional message
//! stream. The default [`TcpConnector`] speaks the `convoy-wire` framing
//! over TCP; tests substitute the scripted connector from
//! [`crate::test_support`].

use async_trait::async_trait;
use convoy_core::AgentRef;
use convoy_wire::{read_message, write_message, AgentMsg, ControllerMsg, ProtocolError};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Errors from dialing an agent or using its stream.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("{0}")]
    Stream(String),
}

/// One open bidirectional stream to one agent, for one job.
#[async_trait]
pub trait AgentStream: Send {
    async fn send(&mut self, msg: ControllerMsg) -> Result<(), TransportError>;

    /// Receive the next message. `None` means the agent closed its side
    /// of the stream (the job-done signal).
    async fn recv(&mut self) -> Option<Result<AgentMsg, TransportError>>;

    /// Half-close the send direction. The receive direction stays usable.
    async fn close_send(&mut self) -> Result<(), TransportError>;
}

/// Dials agents. One `connect` call per job.
#[async_trait]
pub trait AgentConnector: Send + Sync {
    async fn connect(&self, agent: &AgentRef) -> Result<Box<dyn AgentStream>, TransportError>;
}

/// Production connector: TCP with a bounded connect deadline.
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl AgentConnector for TcpConnector {
    async fn connect(&self, agent: &AgentRef) -> Result<Box<dyn AgentStream>, TransportError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&agent.address))
            .await
            .map_err(|_| TransportError::ConnectTimeout(self.connect_timeout))??;
        let (read, write) = stream.into_split();
        Ok(Box::new(TcpAgentStream { reader: BufReader::new(read), writer: write }))
    }
}

struct TcpAgentStream {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

#[async_trait]
impl AgentStream for TcpAgentStream {
    async fn send(&mut self, msg: ControllerMsg) -> Result<(), TransportError> {
        write_message(&mut self.writer, &msg).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<AgentMsg, TransportError>> {
        match read_message(&mut self.reader).await {
            Ok(Some(msg)) => Some(Ok(msg)),
            Ok(None) => None,
            Err(e) => Some(Err(e.into())),
        }
    }

    async fn close_send(&mut self) -> Result<(), TransportError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
