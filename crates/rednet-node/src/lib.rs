//! Node wiring (C0): assembles one instance of every C1-C11 component
//! behind `Arc`, built from a single [`NodeConfig`], and fans `start`/
//! `shutdown` out to whichever of them own a background task.
//!
//! This is where spec.md's informal data-flow description ("browser
//! creates a tab -> asks the loader to fetch a url -> ...") actually lives:
//! an embedding host holds one [`Node`] and calls into its accessor methods
//! rather than reaching for global mutable state.

use std::sync::Arc;

use async_trait::async_trait;
use rednet_dns::DnsCore;
use rednet_handlers::{BuiltinTemplates, Handlers, MarkupParser};
use rednet_loader::Loader;
use rednet_net_optimizer::NetOptimizer;
use rednet_resolver::Resolver;
use rednet_sandbox::Sandbox;
use rednet_search::SearchEngine;
use rednet_shared::SharedResources;
use rednet_tabs::TabRegistry;
use rednet_transport::{Network, Transport};
use rednet_types::config::ConfigError;
use rednet_types::lifecycle::WithStartAndShutdown;
use rednet_types::peers::PeerDirectory;
use rednet_types::NodeId;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    pub net_optimizer: rednet_net_optimizer::Config,
    pub dns: rednet_dns::Config,
    pub resolver: rednet_resolver::Config,
    pub shared: rednet_shared::Config,
    pub loader: rednet_loader::Config,
    pub handlers: rednet_handlers::Config,
    pub sandbox: rednet_sandbox::Config,
    pub search: rednet_search::Config,
}

impl NodeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.net_optimizer.validate()?;
        self.dns.validate()?;
        self.resolver.validate()?;
        self.shared.validate()?;
        self.loader.validate()?;
        self.handlers.validate()?;
        self.sandbox.validate()?;
        self.search.validate()?;
        Ok(())
    }
}

pub struct Node {
    self_id: NodeId,
    transport: Transport,
    net_optimizer: Arc<NetOptimizer>,
    dns: Arc<DnsCore>,
    resolver: Arc<Resolver>,
    shared: Arc<SharedResources>,
    tabs: Arc<TabRegistry>,
    loader: Arc<Loader>,
    handlers: Arc<Handlers>,
    sandbox: Arc<Sandbox>,
    search: Arc<SearchEngine>,
}

impl Node {
    /// Builds every component for `self_id` on top of the shared simulated
    /// [`Network`]. `markup_parser`/`templates` are the out-of-scope
    /// external collaborators Content Handlers delegates to.
    pub fn new(
        self_id: NodeId,
        network: &Network,
        peers: PeerDirectory,
        config: NodeConfig,
        markup_parser: Arc<dyn MarkupParser>,
        templates: Arc<dyn BuiltinTemplates>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let transport = network.transport(self_id);
        let net_optimizer = Arc::new(NetOptimizer::new(transport.clone(), config.net_optimizer));
        let dns = Arc::new(DnsCore::new(self_id, config.dns, transport.clone(), peers.clone()));
        let resolver = Arc::new(Resolver::new(self_id, config.resolver, transport.clone(), net_optimizer.clone(), peers));
        let shared = Arc::new(SharedResources::new(config.shared));
        let tabs = Arc::new(TabRegistry::new());
        let sandbox = Arc::new(Sandbox::new(config.sandbox));
        let handlers = Arc::new(Handlers::new(config.handlers, transport.clone(), dns.clone(), sandbox.clone(), markup_parser, templates));
        let loader = Arc::new(Loader::new(config.loader, handlers.clone(), tabs.clone()));
        let search = Arc::new(SearchEngine::new(config.search));

        Ok(Self {
            self_id,
            transport,
            net_optimizer,
            dns,
            resolver,
            shared,
            tabs,
            loader,
            handlers,
            sandbox,
            search,
        })
    }

    pub fn self_id(&self) -> NodeId {
        self.self_id
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn net_optimizer(&self) -> Arc<NetOptimizer> {
        self.net_optimizer.clone()
    }

    pub fn dns(&self) -> Arc<DnsCore> {
        self.dns.clone()
    }

    pub fn resolver(&self) -> Arc<Resolver> {
        self.resolver.clone()
    }

    pub fn shared(&self) -> Arc<SharedResources> {
        self.shared.clone()
    }

    pub fn tabs(&self) -> Arc<TabRegistry> {
        self.tabs.clone()
    }

    pub fn loader(&self) -> Arc<Loader> {
        self.loader.clone()
    }

    pub fn handlers(&self) -> Arc<Handlers> {
        self.handlers.clone()
    }

    pub fn sandbox(&self) -> Arc<Sandbox> {
        self.sandbox.clone()
    }

    pub fn search(&self) -> Arc<SearchEngine> {
        self.search.clone()
    }

    /// Starts every component that owns a background task. Idempotent per
    /// component (each `start` no-ops if already running).
    pub async fn start(&self) {
        info!(self_id = self.self_id, "starting node");
        self.dns.start().await;
        self.resolver.start().await;
        self.shared.start().await;
        self.handlers.start().await;
        self.loader.start().await;
        self.search.start().await;
    }

    /// Signals every background task to stop. Does not block on any of
    /// them finishing.
    pub async fn shutdown(&self) {
        info!(self_id = self.self_id, "shutting down node");
        self.search.shutdown().await;
        self.loader.shutdown().await;
        self.handlers.shutdown().await;
        self.shared.shutdown().await;
        self.resolver.shutdown().await;
        self.dns.shutdown().await;
    }
}
