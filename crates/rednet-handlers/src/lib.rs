//! Content Handlers (C8): dispatch by URL scheme/host, fetch bytes from the
//! local filesystem or a remote node, and process the result into markup,
//! a dynamic (sandboxed) page, or plain text.

pub mod config;
pub mod content_type;
pub mod error;
pub mod fs;
pub mod markup;
mod remote;
pub mod templates;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::collections::HashMap;

use async_trait::async_trait;
use rednet_dns::DnsCore;
use rednet_net_optimizer::NetOptimizer;
use rednet_sandbox::{Sandbox, SandboxRequest};
use rednet_transport::Transport;
use rednet_types::lifecycle::WithStartAndShutdown;
use tokio::sync::Notify;
use tracing::debug;

pub use config::Config;
pub use content_type::ContentType;
pub use error::HandlerError;
pub use markup::{MarkupDocument, MarkupParser, SimpleMarkupParser};
pub use templates::{BuiltinTemplates, StaticTemplates};

/// The outcome of processing a fetched page, handed back to Tab State (C6).
#[derive(Debug, Clone)]
pub enum ProcessedContent {
    Markup(MarkupDocument),
    Text(String),
}

impl ProcessedContent {
    pub fn title(&self) -> Option<&str> {
        match self {
            ProcessedContent::Markup(doc) => doc.title.as_deref(),
            ProcessedContent::Text(_) => None,
        }
    }
}

pub struct Handlers {
    config: Config,
    optimizer: Arc<NetOptimizer>,
    transport: Transport,
    dns: Arc<DnsCore>,
    sandbox: Arc<Sandbox>,
    markup_parser: Arc<dyn MarkupParser>,
    templates: Arc<dyn BuiltinTemplates>,
    pending_pages: remote::PendingPages,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl Handlers {
    pub fn new(
        config: Config,
        transport: Transport,
        dns: Arc<DnsCore>,
        sandbox: Arc<Sandbox>,
        markup_parser: Arc<dyn MarkupParser>,
        templates: Arc<dyn BuiltinTemplates>,
    ) -> Self {
        let optimizer = Arc::new(NetOptimizer::new(transport.clone(), rednet_net_optimizer::Config::default()));
        Self {
            config,
            optimizer,
            transport,
            dns,
            sandbox,
            markup_parser,
            templates,
            pending_pages: Arc::new(dashmap::DashMap::new()),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Fetch and process `url`, producing `(content, content_type)` per the
    /// dispatch-by-scheme-and-host contract.
    pub async fn fetch(&self, url: &str) -> Result<ProcessedContent, HandlerError> {
        let (bytes, content_type) = self.fetch_bytes(url).await?;
        self.process(bytes, content_type, url).await
    }

    async fn fetch_bytes(&self, url: &str) -> Result<(Vec<u8>, ContentType), HandlerError> {
        if let Some(rest) = url.strip_prefix("rdnt://") {
            let mut parts = rest.splitn(2, '/');
            let builtin = parts.next().unwrap_or("");
            let path = parts.next().unwrap_or("");
            let bytes = self.templates.render(builtin, path)?;
            return Ok((bytes, content_type::infer(path)));
        }

        if let Some((host, path)) = split_host_path(url) {
            if host.contains(".comp") && host.ends_with(".rednet") {
                let resolution = self.dns.lookup(host).await?;
                if resolution.owner_id == self.transport.node_id() {
                    let (bytes, _) = fs::read(&self.config.root_dir, &self.config.index_extensions, path)?;
                    return Ok((bytes, content_type::infer(path)));
                }
                let (bytes, content_type) = remote::fetch(
                    &self.optimizer,
                    &self.pending_pages,
                    resolution.owner_id,
                    path,
                    self.config.fetch_timeout,
                )
                .await?;
                return Ok((bytes, content_type));
            }
        }

        let (bytes, path) = fs::read(&self.config.root_dir, &self.config.index_extensions, url)?;
        let path_str = path.to_string_lossy().to_string();
        Ok((bytes, content_type::infer(&path_str)))
    }

    async fn process(
        &self,
        bytes: Vec<u8>,
        content_type: ContentType,
        url: &str,
    ) -> Result<ProcessedContent, HandlerError> {
        match content_type {
            ContentType::Markup | ContentType::MarkupLike => {
                let doc = self.markup_parser.parse(&bytes)?;
                Ok(ProcessedContent::Markup(doc))
            },
            ContentType::Dynamic => {
                let code = std::str::from_utf8(&bytes).map_err(|e| HandlerError::Parse(e.to_string()))?;
                let request = SandboxRequest {
                    url: url.to_string(),
                    method: "GET".to_string(),
                    params: HashMap::new(),
                    headers: HashMap::new(),
                    cookies: HashMap::new(),
                    body: None,
                };
                let output = self.sandbox.execute(code, request).await?;
                match self.markup_parser.parse(output.output.as_bytes()) {
                    Ok(doc) => Ok(ProcessedContent::Markup(doc)),
                    Err(_) => Ok(ProcessedContent::Text(output.output)),
                }
            },
            ContentType::Text => {
                let text = String::from_utf8_lossy(&bytes).to_string();
                Ok(ProcessedContent::Text(text))
            },
        }
    }
}

fn split_host_path(url: &str) -> Option<(&str, &str)> {
    let url = url.strip_prefix("//").unwrap_or(url);
    match url.split_once('/') {
        Some((host, path)) => Some((host, path)),
        None => Some((url, "")),
    }
}

#[async_trait]
impl WithStartAndShutdown for Handlers {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn start(&self) {
        if self.is_running() {
            return;
        }
        remote::spawn(
            self.transport.clone(),
            self.optimizer.clone(),
            self.config.root_dir.clone(),
            self.config.index_extensions.clone(),
            self.pending_pages.clone(),
            self.running.clone(),
            self.shutdown.clone(),
        );
        tokio::task::yield_now().await;
    }

    async fn shutdown(&self) {
        debug!("shutting down content handlers");
        self.shutdown.notify_waiters();
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rednet_transport::Network;
    use rednet_types::peers::PeerDirectory;

    use super::*;

    fn handlers_over(root_dir: std::path::PathBuf, transport: Transport, dns: Arc<DnsCore>) -> Handlers {
        let sandbox = Arc::new(Sandbox::new(rednet_sandbox::Config::default()));
        let mut templates = StaticTemplates::new();
        templates.register("home", b"<title>Home</title>welcome".to_vec());
        let mut config = Config::default();
        config.root_dir = root_dir;
        Handlers::new(
            config,
            transport,
            dns,
            sandbox,
            Arc::new(SimpleMarkupParser),
            Arc::new(templates),
        )
    }

    #[tokio::test]
    async fn serves_a_builtin_template() {
        let net = Network::new();
        let dns = Arc::new(DnsCore::new(1, rednet_dns::Config::default(), net.transport(1), PeerDirectory::new()));
        let handlers = handlers_over(std::env::temp_dir(), net.transport(1), dns);
        let content = handlers.fetch("rdnt://home/").await.unwrap();
        assert_eq!(content.title(), Some("Home"));
    }

    #[tokio::test]
    async fn reads_a_local_markup_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.rwml"), b"<title>Local</title>body").unwrap();
        let net = Network::new();
        let dns = Arc::new(DnsCore::new(1, rednet_dns::Config::default(), net.transport(1), PeerDirectory::new()));
        let handlers = handlers_over(dir.path().to_path_buf(), net.transport(1), dns);
        let content = handlers.fetch("page.rwml").await.unwrap();
        assert_eq!(content.title(), Some("Local"));
    }

    #[tokio::test]
    async fn missing_local_file_is_page_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let net = Network::new();
        let dns = Arc::new(DnsCore::new(1, rednet_dns::Config::default(), net.transport(1), PeerDirectory::new()));
        let handlers = handlers_over(dir.path().to_path_buf(), net.transport(1), dns);
        let err = handlers.fetch("missing.rwml").await.unwrap_err();
        assert!(matches!(err, HandlerError::NotFound));
    }

    #[tokio::test]
    async fn runs_dynamic_content_in_the_sandbox() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("greet.lua"), b"print concat(\"hi \", request.url)").unwrap();
        let net = Network::new();
        let dns = Arc::new(DnsCore::new(1, rednet_dns::Config::default(), net.transport(1), PeerDirectory::new()));
        let handlers = handlers_over(dir.path().to_path_buf(), net.transport(1), dns);
        let content = handlers.fetch("greet.lua").await.unwrap();
        match content {
            ProcessedContent::Text(text) => assert!(text.starts_with("hi greet.lua")),
            ProcessedContent::Markup(_) => panic!("expected text output"),
        }
    }

    #[tokio::test]
    async fn fetches_a_remote_node_domain_over_the_network() {
        let net = Network::new();
        let peers = PeerDirectory::new();
        peers.set_kind(2, rednet_types::peers::PeerKind::Server);

        let owner_dir = tempfile::tempdir().unwrap();
        std::fs::write(owner_dir.path().join("about.txt"), b"about this node").unwrap();
        let owner_dns = Arc::new(DnsCore::new(2, rednet_dns::Config::default(), net.transport(2), peers.clone()));
        owner_dns.start().await;
        owner_dns.register("shop.comp2.rednet", None).await.unwrap();
        let owner_handlers = handlers_over(owner_dir.path().to_path_buf(), net.transport(2), owner_dns.clone());
        owner_handlers.start().await;

        let requester_dns = Arc::new(DnsCore::new(1, rednet_dns::Config::default(), net.transport(1), peers));
        requester_dns.start().await;
        let requester_dir = tempfile::tempdir().unwrap();
        let requester = handlers_over(requester_dir.path().to_path_buf(), net.transport(1), requester_dns);

        let content = requester.fetch("shop.comp2.rednet/about.txt").await.unwrap();
        match content {
            ProcessedContent::Text(text) => assert_eq!(text, "about this node"),
            ProcessedContent::Markup(_) => panic!("expected text output"),
        }
    }
}
