use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;

use crate::client::frame_codec;
use crate::error::Result;
use crate::rpc::{decode_frame, encode_frame, RpcRequest, RpcResponse};
use crate::value::Value;

/// Trait for a service that can be served to `dyncall` clients.
///
/// A `ServiceHandler` receives every call addressed to the name it was
/// registered under:
///
/// - `method` is the remote method name.
/// - `args` are the positional arguments; `None` is an argument the caller
///   left blank.
///
/// Returning `Err` sends an application error back to the caller.
///
/// Handlers must be thread-safe (`Send + Sync`) since connections are
/// served on separate tasks.
#[async_trait]
pub trait ServiceHandler: Send + Sync {
    async fn call(
        &self,
        method: &str,
        args: Vec<Option<Value>>,
    ) -> std::result::Result<Option<Value>, String>;
}

type Services = Arc<HashMap<String, Arc<dyn ServiceHandler>>>;

/// Builder pattern for registering services and binding a listener.
///
/// # Example
/// ```ignore
/// struct Echo;
///
/// #[async_trait]
/// impl ServiceHandler for Echo {
///     async fn call(&self, method: &str, args: Vec<Option<Value>>) -> Result<Option<Value>, String> {
///         match method {
///             "ping" => Ok(args.into_iter().next().flatten()),
///             _ => Err(format!("unknown method {method}")),
///         }
///     }
/// }
///
/// ServerBuilder::new()
///     .add("Echo", Echo)
///     .bind("127.0.0.1:9090")
///     .await?
///     .run()
///     .await?;
/// ```
pub struct ServerBuilder {
    services: HashMap<String, Arc<dyn ServiceHandler>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Register `handler` under service `name`. A later registration with
    /// the same name replaces the earlier one.
    pub fn add<T>(mut self, name: &str, handler: T) -> Self
    where
        T: ServiceHandler + 'static,
    {
        self.services.insert(name.to_string(), Arc::new(handler));
        self
    }

    pub async fn bind<A: ToSocketAddrs>(self, addr: A) -> std::io::Result<Server> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Server {
            listener,
            services: Arc::new(self.services),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound service host. Each accepted connection is served on its own
/// task until the peer hangs up.
pub struct Server {
    listener: TcpListener,
    services: Services,
}

impl Server {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) -> std::io::Result<()> {
        log::info!("Serving {} service(s) on {}", self.services.len(), self.local_addr()?);
        loop {
            let (stream, peer) = self.listener.accept().await?;
            log::debug!("New connection from {peer}");
            let services = self.services.clone();
            tokio::spawn(async move {
                if let Err(err) = serve_connection(stream, services).await {
                    log::warn!("Connection from {peer} ended with error: {err}");
                }
            });
        }
    }
}

async fn serve_connection(stream: TcpStream, services: Services) -> Result<()> {
    let mut framed = Framed::new(stream, frame_codec());

    while let Some(frame) = framed.next().await {
        let frame = frame?;
        let resp = match decode_frame::<RpcRequest>(&frame) {
            Ok(RpcRequest::Call {
                call_id,
                service,
                method,
                args,
            }) => match services.get(&service) {
                Some(handler) => {
                    log::info!("Handling {service}.{method} with {} argument(s)", args.len());
                    match handler.call(&method, args).await {
                        Ok(value) => RpcResponse::Result { call_id, value },
                        Err(message) => RpcResponse::Error {
                            call_id: Some(call_id),
                            message,
                        },
                    }
                }
                None => {
                    log::warn!("Unknown service: {service}");
                    RpcResponse::Error {
                        call_id: Some(call_id),
                        message: format!("unknown service `{service}`"),
                    }
                }
            },
            Err(err) => RpcResponse::Error {
                call_id: None,
                message: err.to_string(),
            },
        };
        framed.send(encode_frame(&resp)?).await?;
    }
    Ok(())
}
