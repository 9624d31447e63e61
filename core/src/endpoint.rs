//! Shared defaults for a family of requests.
//!
//! # Design
//! An `Endpoint` is built once per API root and shared as `Arc<Endpoint>`.
//! Every [`Request`] keeps its own strong handle, so an endpoint outlives the
//! calls made from it. Only the plugin list and the stubbing toggle can
//! change after construction; requests copy both when they are created, so
//! changes apply to requests created afterwards.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::Handle;

use crate::config::{ConfigError, EndpointConfig};
use crate::encoding::ParameterEncoding;
use crate::executor::{Executor, Spawn};
use crate::headers::{DefaultHeaders, HeaderComposer, RequestAdapter};
use crate::http::{Headers, HttpMethod};
use crate::multipart::MultipartForm;
use crate::plugin::Plugin;
use crate::request::Request;
use crate::stub::DEFAULT_STUB_DELAY;
use crate::transport::Transport;
use crate::url_builder::{UrlBehavior, UrlBuilder};

pub struct Endpoint {
    url_builder: UrlBuilder,
    header_composer: Arc<dyn HeaderComposer>,
    encoding: ParameterEncoding,
    transport: Arc<dyn Transport>,
    executor: Arc<dyn Executor>,
    adapter: Option<Arc<dyn RequestAdapter>>,
    runtime: Option<Handle>,
    stub_delay: Duration,
    plugins: RwLock<Vec<Arc<dyn Plugin>>>,
    stubbing: AtomicBool,
}

impl Endpoint {
    pub fn builder(base_url: impl Into<String>) -> EndpointBuilder {
        EndpointBuilder::new(base_url)
    }

    /// Build an endpoint from configuration. `transport` overrides the
    /// default transport when given.
    pub fn from_config(
        config: &EndpointConfig,
        transport: Option<Arc<dyn Transport>>,
    ) -> Result<Arc<Endpoint>, ConfigError> {
        let mut builder = EndpointBuilder::new(config.base_url.clone())
            .default_headers(config.headers.iter().collect())
            .encoding(config.encoding)
            .url_behavior(config.url_behavior.into())
            .stubbing_enabled(config.stubbing_enabled)
            .stub_delay(config.stub_delay());
        if let Some(transport) = transport {
            builder = builder.transport(transport);
        }
        builder.build()
    }

    pub fn base_url(&self) -> &str {
        self.url_builder.base()
    }

    pub fn url_builder(&self) -> &UrlBuilder {
        &self.url_builder
    }

    pub fn header_composer(&self) -> &dyn HeaderComposer {
        self.header_composer.as_ref()
    }

    pub fn encoding(&self) -> ParameterEncoding {
        self.encoding
    }

    pub fn stub_delay(&self) -> Duration {
        self.stub_delay
    }

    pub(crate) fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    pub(crate) fn executor(&self) -> Arc<dyn Executor> {
        self.executor.clone()
    }

    pub(crate) fn adapter(&self) -> Option<&dyn RequestAdapter> {
        self.adapter.as_deref()
    }

    pub(crate) fn runtime(&self) -> Option<Handle> {
        self.runtime.clone()
    }

    pub fn add_plugin(&self, plugin: Arc<dyn Plugin>) {
        self.plugins.write().unwrap_or_else(PoisonError::into_inner).push(plugin);
    }

    pub fn set_plugins(&self, plugins: Vec<Arc<dyn Plugin>>) {
        *self.plugins.write().unwrap_or_else(PoisonError::into_inner) = plugins;
    }

    /// Snapshot of the global plugin list.
    pub fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.plugins.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_stubbing_enabled(&self, enabled: bool) {
        self.stubbing.store(enabled, Ordering::SeqCst);
    }

    pub fn stubbing_enabled(&self) -> bool {
        self.stubbing.load(Ordering::SeqCst)
    }

    /// A GET request for `path` whose model is the raw body.
    pub fn request(self: &Arc<Self>, path: impl Into<String>) -> Request<Bytes> {
        Request::new(self.clone(), path.into())
    }

    pub fn get(self: &Arc<Self>, path: impl Into<String>) -> Request<Bytes> {
        self.request(path)
    }

    pub fn post(self: &Arc<Self>, path: impl Into<String>) -> Request<Bytes> {
        self.request(path).method(HttpMethod::Post)
    }

    pub fn put(self: &Arc<Self>, path: impl Into<String>) -> Request<Bytes> {
        self.request(path).method(HttpMethod::Put)
    }

    pub fn patch(self: &Arc<Self>, path: impl Into<String>) -> Request<Bytes> {
        self.request(path).method(HttpMethod::Patch)
    }

    pub fn delete(self: &Arc<Self>, path: impl Into<String>) -> Request<Bytes> {
        self.request(path).method(HttpMethod::Delete)
    }

    /// A multipart POST carrying `form`.
    pub fn upload(self: &Arc<Self>, path: impl Into<String>, form: MultipartForm) -> Request<Bytes> {
        self.post(path).multipart(form)
    }

    /// A GET whose body is written to `destination`; the model is the path.
    pub fn download(
        self: &Arc<Self>,
        path: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> Request<PathBuf> {
        self.request(path).download_to(destination)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("url_builder", &self.url_builder)
            .field("encoding", &self.encoding)
            .field("stub_delay", &self.stub_delay)
            .field("stubbing", &self.stubbing_enabled())
            .finish_non_exhaustive()
    }
}

pub struct EndpointBuilder {
    base_url: String,
    url_behavior: UrlBehavior,
    default_headers: Headers,
    header_composer: Option<Arc<dyn HeaderComposer>>,
    encoding: ParameterEncoding,
    transport: Option<Arc<dyn Transport>>,
    executor: Option<Arc<dyn Executor>>,
    adapter: Option<Arc<dyn RequestAdapter>>,
    runtime: Option<Handle>,
    stub_delay: Duration,
    plugins: Vec<Arc<dyn Plugin>>,
    stubbing: bool,
}

impl EndpointBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            url_behavior: UrlBehavior::default(),
            default_headers: Headers::new(),
            header_composer: None,
            encoding: ParameterEncoding::default(),
            transport: None,
            executor: None,
            adapter: None,
            runtime: None,
            stub_delay: DEFAULT_STUB_DELAY,
            plugins: Vec::new(),
            stubbing: false,
        }
    }

    pub fn url_behavior(mut self, behavior: UrlBehavior) -> Self {
        self.url_behavior = behavior;
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    pub fn default_headers(mut self, headers: Headers) -> Self {
        self.default_headers.merge(&headers);
        self
    }

    /// Replace the default composer. Default headers set on the builder are
    /// ignored when a custom composer is installed.
    pub fn header_composer(mut self, composer: Arc<dyn HeaderComposer>) -> Self {
        self.header_composer = Some(composer);
        self
    }

    pub fn encoding(mut self, encoding: ParameterEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Where callback-style completions run. Defaults to [`Spawn`].
    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn adapter(mut self, adapter: Arc<dyn RequestAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Runtime that drives dispatched calls. Defaults to the runtime current
    /// at dispatch time.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn stub_delay(mut self, delay: Duration) -> Self {
        self.stub_delay = delay;
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn stubbing_enabled(mut self, enabled: bool) -> Self {
        self.stubbing = enabled;
        self
    }

    pub fn build(self) -> Result<Arc<Endpoint>, ConfigError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };
        let header_composer = self
            .header_composer
            .unwrap_or_else(|| Arc::new(DefaultHeaders::new(self.default_headers)));
        let executor = self.executor.unwrap_or_else(|| Arc::new(Spawn::new()));

        Ok(Arc::new(Endpoint {
            url_builder: UrlBuilder::new(self.base_url, self.url_behavior),
            header_composer,
            encoding: self.encoding,
            transport,
            executor,
            adapter: self.adapter,
            runtime: self.runtime,
            stub_delay: self.stub_delay,
            plugins: RwLock::new(self.plugins),
            stubbing: AtomicBool::new(self.stubbing),
        }))
    }
}

impl fmt::Debug for EndpointBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointBuilder")
            .field("base_url", &self.base_url)
            .field("url_behavior", &self.url_behavior)
            .field("default_headers", &self.default_headers)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "reqwest")]
fn default_transport() -> Result<Arc<dyn Transport>, ConfigError> {
    Ok(Arc::new(crate::transport::ReqwestTransport::new()))
}

#[cfg(not(feature = "reqwest"))]
fn default_transport() -> Result<Arc<dyn Transport>, ConfigError> {
    Err(ConfigError::MissingTransport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;
    use crate::plugin::TracingPlugin;
    use crate::testing::CannedTransport;

    fn endpoint() -> Arc<Endpoint> {
        Endpoint::builder("https://example.com/api")
            .transport(Arc::new(CannedTransport::ok(200, "{}")))
            .build()
            .unwrap()
    }

    #[test]
    fn shortcuts_set_the_method() {
        let endpoint = endpoint();
        assert_eq!(endpoint.get("a").http_method(), HttpMethod::Get);
        assert_eq!(endpoint.post("a").http_method(), HttpMethod::Post);
        assert_eq!(endpoint.put("a").http_method(), HttpMethod::Put);
        assert_eq!(endpoint.patch("a").http_method(), HttpMethod::Patch);
        assert_eq!(endpoint.delete("a").http_method(), HttpMethod::Delete);
        assert_eq!(endpoint.request("a").path(), "a");
    }

    #[test]
    fn plugin_changes_apply_to_later_requests_only() {
        let endpoint = endpoint();
        let before = endpoint.request("a");
        endpoint.add_plugin(Arc::new(TracingPlugin));
        let after = endpoint.request("a");

        assert_eq!(before.global_plugin_count(), 0);
        assert_eq!(after.global_plugin_count(), 1);
        assert_eq!(endpoint.plugins().len(), 1);

        endpoint.set_plugins(Vec::new());
        assert_eq!(endpoint.request("a").global_plugin_count(), 0);
    }

    #[test]
    fn stubbing_toggle_is_snapshotted() {
        let endpoint = endpoint();
        let before = endpoint.request("a");
        endpoint.set_stubbing_enabled(true);
        let after = endpoint.request("a");

        assert!(!before.is_stubbing());
        assert!(after.is_stubbing());
    }

    #[test]
    fn from_config_applies_every_field() {
        let mut config = EndpointConfig::new("https://example.com/api/");
        config.headers.insert("Accept".to_string(), "application/json".to_string());
        config.encoding = ParameterEncoding::Json;
        config.url_behavior = crate::url_builder::UrlMode::RelativeMerge;
        config.stubbing_enabled = true;
        config.stub_delay_ms = 7;

        let endpoint = Endpoint::from_config(&config, Some(Arc::new(CannedTransport::ok(200, "")))).unwrap();
        assert_eq!(endpoint.base_url(), "https://example.com/api/");
        assert_eq!(endpoint.encoding(), ParameterEncoding::Json);
        assert!(endpoint.stubbing_enabled());
        assert_eq!(endpoint.stub_delay(), Duration::from_millis(7));
        assert_eq!(endpoint.url_builder().build("x").as_str(), "https://example.com/api/x");
        let headers = endpoint
            .header_composer()
            .compose(crate::headers::AuthRequirement::None, &Headers::new());
        assert_eq!(headers.get("accept"), Some("application/json"));
    }

    #[cfg(feature = "reqwest")]
    #[test]
    fn builder_defaults_to_reqwest_transport() {
        assert!(Endpoint::builder("https://example.com").build().is_ok());
    }
}
