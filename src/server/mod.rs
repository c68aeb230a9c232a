//! HTTP server
//!
//! Built directly on `hyper` http1 with `tokio`: one task per connection,
//! each request dispatched through [`Route::parse`].
//!
//! # Example
//!
//! ```no_run
//! use r2_uploader::config::Config;
//! use r2_uploader::server::{AppState, Server};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::default();
//! config.server.address = "127.0.0.1:0".to_string();
//!
//! let state = AppState::new(config)?;
//! let server = Server::new(state).await?;
//! println!("Listening on {}", server.local_addr());
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod handlers;
pub mod response;

use crate::auth::{Authenticator, BearerAuthenticator};
use crate::config::Config;
use crate::fetch::BoundedFetcher;
use crate::router::{Route, RouterError};
use crate::token::{FileTokenStore, TokenAuthority};
use crate::upload::{IngestService, R2Uploader};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn, Instrument};

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    RuntimeError(String),
}

/// Shared per-process state handed to every request
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: Arc<TokenAuthority>,
    pub authenticator: Arc<dyn Authenticator>,
    pub ingest: Arc<IngestService>,
}

impl AppState {
    /// Wire production components from configuration
    pub fn new(config: Config) -> Result<Self, ServerError> {
        let store = FileTokenStore::resolve(config.token.token_file_path.as_deref());
        info!(path = %store.path().display(), "Using token file");

        let tokens = Arc::new(TokenAuthority::new(
            Arc::new(store),
            config.token.api_token.clone(),
        ));

        let fetcher = BoundedFetcher::new(
            config.upload.max_file_size,
            Duration::from_secs(config.upload.fetch_timeout_secs),
        )
        .map_err(|e| ServerError::ConfigError(e.to_string()))?;
        let ingest = Arc::new(IngestService::new(fetcher, Arc::new(R2Uploader::new())));

        Ok(Self::with_parts(config, tokens, ingest))
    }

    /// Assemble state from pre-built components
    pub fn with_parts(
        config: Config,
        tokens: Arc<TokenAuthority>,
        ingest: Arc<IngestService>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            authenticator: Arc::new(BearerAuthenticator::new(Arc::clone(&tokens))),
            tokens,
            ingest,
        }
    }

    /// Make sure a token exists before the first upload arrives
    ///
    /// A storage failure is logged and left for `POST /R2api/init-token` to
    /// report; the server still starts.
    pub async fn bootstrap_token(&self) -> bool {
        match self.tokens.issue_default().await {
            Ok(_) if self.tokens.has_override() => {
                info!("Using API token from configuration");
                true
            }
            Ok(_) => {
                info!("API token ready; retrieve it from GET /R2api/token");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to generate default API token");
                false
            }
        }
    }
}

/// HTTP server bound to its listener
pub struct Server {
    state: Arc<AppState>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Bind to `config.server.address`; port 0 picks a free port
    pub async fn new(state: AppState) -> Result<Self, ServerError> {
        let addr: SocketAddr = state
            .config
            .server
            .address
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!("Server bound to {}", local_addr);

        Ok(Self {
            state: Arc::new(state),
            listener,
            local_addr,
        })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until the process exits
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves
    ///
    /// In-flight connections keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!("Starting server on {}", self.local_addr);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down server");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };

                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { handle_request(req, state).await }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            debug!("Error serving connection from {}: {}", peer_addr, e);
                        }
                    });
                }
            }
        }
    }
}

/// Dispatch one request
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<String>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let span = tracing::info_span!(
        "http.request",
        http.method = %method,
        http.path = %path,
        http.route = tracing::field::Empty,
        http.status = tracing::field::Empty
    );

    async move {
        let start = Instant::now();

        let response = match Route::parse(&method, &path) {
            Ok(route) => {
                tracing::Span::current().record("http.route", route.name());
                dispatch(route, req, &state).await
            }
            Err(e @ RouterError::NotFound(_)) => {
                response::error(StatusCode::NOT_FOUND, e.to_string())
            }
            Err(e @ RouterError::MethodNotAllowed { .. }) => {
                response::error(StatusCode::METHOD_NOT_ALLOWED, e.to_string())
            }
        };

        let status = response.status().as_u16();
        tracing::Span::current().record("http.status", status);
        info!(
            status,
            duration_ms = start.elapsed().as_millis(),
            "Handled {} {}",
            method,
            path
        );
        Ok(response)
    }
    .instrument(span)
    .await
}

async fn dispatch(route: Route, req: Request<Incoming>, state: &AppState) -> Response<String> {
    let (parts, body) = req.into_parts();

    if route.requires_auth() {
        if let Err(rejection) = handlers::authorize(state, &parts).await {
            return rejection;
        }
    }

    match route {
        Route::Health => handlers::health(),
        Route::Root => handlers::root(),
        Route::GetToken => handlers::get_token(state).await,
        Route::InitToken => handlers::init_token(state).await,
        Route::ResetToken => handlers::reset_token(state).await,
        Route::Upload => handlers::upload(state, body).await,
        Route::UploadDirect => handlers::upload_direct(state, &parts, body).await,
        Route::Preflight => response::preflight(),
    }
}
