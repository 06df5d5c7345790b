//! Subcommand implementations.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use reqwest::Method;
use url::Url;

use shellcache_client::{
    APP_SHELL_MANIFEST, Destination, FetchOutcome, HttpNetwork, InterceptedRequest, NetworkConfig, OfflineController,
    Registration, resolve,
};
use shellcache_core::{AppConfig, CacheDb, CacheStorage};

type Controller = OfflineController<HttpNetwork, CacheDb>;

/// Arguments of the `fetch` subcommand.
pub struct FetchOptions {
    pub target: String,
    pub navigate: bool,
    pub destination: Option<String>,
    pub range: Option<String>,
    pub method: String,
    pub body: bool,
}

struct Runtime {
    origin: Url,
    version: String,
    network: Arc<HttpNetwork>,
    storage: Arc<CacheDb>,
}

impl Runtime {
    async fn open(config: &AppConfig, version: Option<String>) -> Result<Self> {
        let origin = Url::parse(&config.origin).with_context(|| format!("invalid origin {}", config.origin))?;
        let version = version.unwrap_or_else(|| config.version_tag(env!("CARGO_PKG_VERSION"), APP_SHELL_MANIFEST));
        let network = Arc::new(HttpNetwork::new(NetworkConfig::from(config))?);
        let storage = Arc::new(
            CacheDb::open(&config.db_path)
                .await
                .with_context(|| format!("opening cache storage at {}", config.db_path.display()))?,
        );
        Ok(Self { origin, version, network, storage })
    }

    fn controller(&self) -> Controller {
        OfflineController::new(&self.version, self.origin.clone(), self.network.clone(), self.storage.clone())
    }
}

pub async fn install(config: &AppConfig, version: Option<String>) -> Result<()> {
    let runtime = Runtime::open(config, version).await?;
    let registration = Registration::new();

    let controller = registration.register(runtime.controller()).await?;
    let names = controller.generations();
    println!("installed {}", controller.version());
    println!("  static:  {}", names.static_name);
    println!("  runtime: {}", names.runtime_name);
    if controller.scope().is_development() {
        println!("  development origin: requests are not intercepted");
    }
    Ok(())
}

pub async fn fetch(config: &AppConfig, options: FetchOptions) -> Result<()> {
    let runtime = Runtime::open(config, None).await?;
    let registration = Registration::new();

    let controller = match registration.restore(runtime.controller()).await {
        Ok(controller) => controller,
        Err(err) => {
            tracing::info!(error = %err, "no installed version, installing");
            registration.register(runtime.controller()).await?
        }
    };

    let request = build_request(&runtime.origin, &options)?;
    let outcome = registration.handle_fetch(&request).await;
    controller.settle().await;

    match outcome? {
        FetchOutcome::Unhandled => println!("unhandled: default network handling applies"),
        FetchOutcome::Responded { route, source, response } => {
            println!("route:  {}", route.name());
            println!("source: {source:?}");
            println!("status: {} {}", response.status, response.status_text);
            println!("kind:   {}", response.kind);
            println!("bytes:  {}", response.body.len());
            if options.body {
                std::io::stdout().write_all(&response.body)?;
            }
        }
    }
    Ok(())
}

fn build_request(origin: &Url, options: &FetchOptions) -> Result<InterceptedRequest> {
    let url = resolve(origin, &options.target)?;
    let method: Method = options
        .method
        .to_ascii_uppercase()
        .parse()
        .map_err(|_| anyhow!("invalid method {}", options.method))?;

    let mut request = if options.navigate {
        InterceptedRequest::navigate(url)
    } else {
        InterceptedRequest::get(url)
    };
    request.method = method;

    if let Some(destination) = &options.destination {
        request = request.with_destination(destination.parse::<Destination>().map_err(|e| anyhow!(e))?);
    }
    if let Some(range) = &options.range {
        request = request.with_header("Range", range.as_str());
    }
    Ok(request)
}

pub async fn generations(config: &AppConfig) -> Result<()> {
    let storage = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache storage at {}", config.db_path.display()))?;

    let names = storage.names().await?;
    if names.is_empty() {
        println!("no cache generations");
        return Ok(());
    }
    for name in names {
        let count = storage.keys(&name).await?.len();
        println!("{name}\t{count} entries");
    }
    Ok(())
}
