//! Plugin server
//!
//! Reads requests from the host line by line and serves each one on its own
//! task so that a slow `apply` never blocks `cancel` or other resources.
//! Responses go through a single writer task, one line per response.

use crate::protocol::*;
use anyhow::{Context, Result};
use danubedata_config::{ConfigOverrides, ProviderConfig};
use danubedata_core::{
    ApplyContext, Deployment, ErrorKind, ProviderError, Registry, ResourceProvider,
};
use danubedata_provider::{Reconciler, planner};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Shared state of a running plugin
pub struct PluginServer {
    registry: Arc<Registry>,
    config: RwLock<ProviderConfig>,
    provider: RwLock<Option<Arc<Reconciler>>>,
    cancel: watch::Sender<bool>,
}

type Outcome = std::result::Result<Value, ErrorBody>;

impl PluginServer {
    /// Server with an initial configuration
    ///
    /// If the configuration already carries an API token the provider is
    /// usable before the host sends `configure`.
    pub fn new(config: ProviderConfig) -> Self {
        let registry = Arc::new(Registry::builtin());
        let provider = match build_provider(&config) {
            Ok(provider) => Some(provider),
            Err(e) => {
                debug!("Provider not configured yet: {}", e);
                None
            }
        };
        let (cancel, _) = watch::channel(false);

        Self {
            registry,
            config: RwLock::new(config),
            provider: RwLock::new(provider),
            cancel,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Serve one request
    pub async fn handle(&self, request: Request) -> Response {
        debug!("-> {} (id {})", request.method, request.id);
        let outcome = match request.method.as_str() {
            METHOD_GET_SCHEMA => Ok(self.registry.package_schema(env!("CARGO_PKG_VERSION"))),
            METHOD_CONFIGURE => self.configure(request.params),
            METHOD_CHECK => self.check(request.params),
            METHOD_DIFF => self.diff(request.params),
            METHOD_APPLY => self.apply(request.params).await,
            METHOD_READ => self.read(request.params).await,
            METHOD_INVOKE => self.invoke(request.params).await,
            METHOD_VALIDATE_DEPLOYMENT => self.validate_deployment(request.params),
            METHOD_CANCEL => {
                self.cancel();
                Ok(json!({}))
            }
            other => Err(ErrorBody::new(
                ErrorKind::Validation,
                format!("unknown method '{}'", other),
            )),
        };

        match outcome {
            Ok(result) => Response::ok(request.id, result),
            Err(error) => {
                warn!("{} (id {}) failed: {}", request.method, request.id, error.message);
                Response::err(request.id, error)
            }
        }
    }

    /// Abort in-flight applies
    ///
    /// Cancellation is final: every later apply fails with `Cancelled` too.
    pub fn cancel(&self) {
        info!("Cancelling in-flight operations");
        self.cancel.send_replace(true);
    }

    fn configure(&self, params: Value) -> Outcome {
        let overrides: ConfigOverrides = parse_params(params)?;

        let mut current = self
            .config
            .write()
            .map_err(|_| internal("configuration lock poisoned"))?;

        // a rejected configuration leaves the previous one in place
        let mut config = current.clone();
        config.merge(overrides);
        let provider = build_provider(&config).map_err(|e| ErrorBody::from(&e))?;

        *self
            .provider
            .write()
            .map_err(|_| internal("provider lock poisoned"))? = Some(provider);
        info!("Configured provider for {}", config.base_url);
        let result = json!({ "base_url": config.base_url });
        *current = config;
        Ok(result)
    }

    fn check(&self, params: Value) -> Outcome {
        let (spec, prior) = parse_params::<CheckParams>(params)?.into_spec();
        let checked = planner::check(&self.registry, spec, prior.as_ref()).map_err(|e| ErrorBody::from(&e))?;
        to_value(&checked)
    }

    fn diff(&self, params: Value) -> Outcome {
        let params: DiffParams = parse_params(params)?;
        let plan = planner::diff(&self.registry, params.desired.as_ref(), params.prior.as_ref())
            .map_err(|e| ErrorBody::from(&e))?;
        to_value(&plan)
    }

    async fn apply(&self, params: Value) -> Outcome {
        let params: ApplyParams = parse_params(params)?;
        let provider = self.provider()?;

        let mut ctx = ApplyContext::new(self.cancel.subscribe());
        if let Some(secs) = params.timeout_secs {
            ctx = ctx.with_timeout(Duration::from_secs(secs));
        }

        info!("{}", params.plan.description());
        let state = provider
            .apply(&params.plan, &ctx)
            .await
            .map_err(|e| ErrorBody::from(&e))?;
        Ok(json!({ "state": state }))
    }

    async fn read(&self, params: Value) -> Outcome {
        let params: ReadParams = parse_params(params)?;
        let provider = self.provider()?;

        let ctx = ApplyContext::new(self.cancel.subscribe());
        let state = provider
            .read(&params.state, &ctx)
            .await
            .map_err(|e| ErrorBody::from(&e))?;
        Ok(json!({ "state": state }))
    }

    async fn invoke(&self, params: Value) -> Outcome {
        let params: InvokeParams = parse_params(params)?;
        let provider = self.provider()?;

        let ctx = ApplyContext::new(self.cancel.subscribe());
        provider
            .invoke(&params.function, &params.args, &ctx)
            .await
            .map_err(|e| ErrorBody::from(&e))
    }

    fn validate_deployment(&self, params: Value) -> Outcome {
        let params: ValidateDeploymentParams = parse_params(params)?;
        let deployment: Deployment = params.resources.into_iter().collect();
        deployment
            .validate(&self.registry)
            .map_err(|e| ErrorBody::from(&e))?;
        Ok(json!({ "resources": deployment.len() }))
    }

    fn provider(&self) -> std::result::Result<Arc<Reconciler>, ErrorBody> {
        self.provider
            .read()
            .map_err(|_| internal("provider lock poisoned"))?
            .clone()
            .ok_or_else(|| {
                ErrorBody::from(&ProviderError::Config(
                    "provider is not configured: send 'configure' with an api_token".to_string(),
                ))
            })
    }
}

fn build_provider(config: &ProviderConfig) -> danubedata_core::Result<Arc<Reconciler>> {
    Reconciler::new(config).map(Arc::new)
}

fn parse_params<T: DeserializeOwned>(params: Value) -> std::result::Result<T, ErrorBody> {
    serde_json::from_value(params)
        .map_err(|e| ErrorBody::new(ErrorKind::Validation, format!("invalid params: {}", e)))
}

fn to_value<T: serde::Serialize>(value: &T) -> Outcome {
    serde_json::to_value(value).map_err(|e| internal(e.to_string()))
}

fn internal(message: impl Into<String>) -> ErrorBody {
    ErrorBody::new(ErrorKind::Permanent, message)
}

/// Serve requests from `reader` until EOF, writing responses to `writer`
pub async fn serve<R, W>(server: Arc<PluginServer>, reader: R, writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Response>(64);
    let writer_task = tokio::spawn(write_responses(writer, rx));

    let mut tasks = JoinSet::new();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await.context("reading request")? {
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<Request>(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Malformed request: {}", e);
                let id = request_id(&line);
                let body = ErrorBody::new(ErrorKind::Validation, format!("malformed request: {}", e));
                if tx.send(Response::err(id, body)).await.is_err() {
                    break;
                }
                continue;
            }
        };

        let server = server.clone();
        let tx = tx.clone();
        tasks.spawn(async move {
            let response = server.handle(request).await;
            if tx.send(response).await.is_err() {
                error!("Response writer closed");
            }
        });

        // reap finished handlers
        while tasks.try_join_next().is_some() {}
    }

    debug!("Input closed, waiting for {} in-flight requests", tasks.len());
    while tasks.join_next().await.is_some() {}
    drop(tx);

    writer_task.await.context("response writer panicked")?
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::Receiver<Response>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response).context("encoding response")?;
        line.push(b'\n');
        writer.write_all(&line).await.context("writing response")?;
        writer.flush().await.context("flushing response")?;
    }
    Ok(())
}

/// Best-effort ID of a request that failed to parse
fn request_id(line: &str) -> u64 {
    serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|v| v.get("id").and_then(Value::as_u64))
        .unwrap_or(0)
}

/// Run the plugin on stdin/stdout
pub async fn run_server(config: ProviderConfig) -> Result<()> {
    let server = Arc::new(PluginServer::new(config));
    info!(
        "DanubeData provider {} serving {} resource types",
        env!("CARGO_PKG_VERSION"),
        server.registry().types().count()
    );
    serve(server, tokio::io::stdin(), tokio::io::stdout()).await
}
