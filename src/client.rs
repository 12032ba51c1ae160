use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::error::{Error, Result};
use crate::rpc::{decode_frame, encode_frame, CallId, RpcRequest, RpcResponse, MAX_FRAME_LEN};
use crate::schema::{MethodSignature, ServiceDescriptor};
use crate::value::Value;

pub(crate) fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LEN)
        .new_codec()
}

/// A single framed TCP connection to a service host.
pub struct Connection {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    peer: String,
}

impl Connection {
    /// Connect to `host:port`, giving up after `connect_timeout`.
    pub async fn open(host: &str, port: u16, connect_timeout: Duration) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let connect = TcpStream::connect(addr.clone());
        let stream = match tokio::time::timeout(connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(Error::Connect {
                    addr,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(Error::Connect {
                    addr,
                    reason: format!("timed out after {}ms", connect_timeout.as_millis()),
                })
            }
        };
        stream.set_nodelay(true)?;
        log::info!("Connected to {addr}");

        Ok(Self {
            framed: Framed::new(stream, frame_codec()),
            peer: addr,
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Send one request and wait for its response.
    pub async fn request(&mut self, req: &RpcRequest) -> Result<RpcResponse> {
        self.framed.send(encode_frame(req)?).await?;

        match self.framed.next().await {
            Some(Ok(frame)) => decode_frame(&frame),
            Some(Err(e)) => Err(e.into()),
            None => Err(Error::Protocol(format!(
                "connection to {} closed before a response arrived",
                self.peer
            ))),
        }
    }
}

/// A remote service whose methods can be called with dynamically built
/// arguments.
#[async_trait]
pub trait RemoteService: Send {
    /// Declared methods of the service.
    fn descriptor(&self) -> &ServiceDescriptor;

    /// Call `method` with positional arguments.
    async fn call(
        &mut self,
        method: &MethodSignature,
        args: Vec<Option<Value>>,
    ) -> Result<Option<Value>>;
}

/// Client side of a service: a connection plus the service's descriptor.
pub struct ServiceStub {
    conn: Connection,
    descriptor: ServiceDescriptor,
}

impl ServiceStub {
    pub fn new(conn: Connection, descriptor: ServiceDescriptor) -> Self {
        Self { conn, descriptor }
    }
}

#[async_trait]
impl RemoteService for ServiceStub {
    fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    async fn call(
        &mut self,
        method: &MethodSignature,
        args: Vec<Option<Value>>,
    ) -> Result<Option<Value>> {
        let call_id = CallId::new();
        let req = RpcRequest::Call {
            call_id,
            service: self.descriptor.name.clone(),
            method: method.name.clone(),
            args,
        };
        log::debug!("Sending call {call_id:?} to {}", self.conn.peer());

        match self.conn.request(&req).await? {
            RpcResponse::Result { call_id: id, .. }
            | RpcResponse::Error {
                call_id: Some(id), ..
            } if id != call_id => Err(Error::Protocol(format!(
                "expected a response to {call_id:?}, got one for {id:?}"
            ))),
            RpcResponse::Result { value, .. } => Ok(value),
            RpcResponse::Error { message, .. } => Err(Error::RemoteCall {
                service: self.descriptor.name.clone(),
                method: method.name.clone(),
                message,
            }),
        }
    }
}
