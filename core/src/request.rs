//! The request descriptor and its fluent configuration surface.
//!
//! # Design
//! A `Request` is a plain value describing one planned call. Configuration
//! methods consume and return it, so nothing can be changed once a
//! dispatch method has taken it. Cloning a request and dispatching the
//! clone performs a second, independent call.
//!
//! The model type `M` and error type `E` are fixed by the serializers the
//! request carries; [`Request::serializer`] and [`Request::error_serializer`]
//! swap them and change the type parameters accordingly.

use std::fmt;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::encoding::{self, ParameterEncoding, Parameters};
use crate::endpoint::Endpoint;
use crate::error::{ResponseError, TransportError};
use crate::executor::Executor;
use crate::headers::AuthRequirement;
use crate::http::{Headers, HttpMethod, HttpRequest};
use crate::multipart::{MultipartForm, Part};
use crate::plugin::Plugin;
use crate::serializer::{self, Empty, ErrorSerializer, ResponseSerializer};
use crate::stub::Stub;
use crate::url_builder::RequestUrl;
use crate::validation::Validation;

pub struct Request<M, E = ResponseError> {
    pub(crate) endpoint: Arc<Endpoint>,
    pub(crate) path: String,
    pub(crate) method: HttpMethod,
    pub(crate) parameters: Parameters,
    pub(crate) headers: Headers,
    pub(crate) auth: AuthRequirement,
    pub(crate) encoding: ParameterEncoding,
    pub(crate) multipart: Option<MultipartForm>,
    pub(crate) plugins: Vec<Arc<dyn Plugin>>,
    pub(crate) global_plugins: Vec<Arc<dyn Plugin>>,
    pub(crate) stub: Option<Stub>,
    pub(crate) stubbing: bool,
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) validation: Validation,
    pub(crate) destination: Option<PathBuf>,
    pub(crate) serializer: ResponseSerializer<M>,
    pub(crate) error_serializer: ErrorSerializer<E>,
}

impl Request<Bytes> {
    pub(crate) fn new(endpoint: Arc<Endpoint>, path: String) -> Self {
        Self {
            path,
            method: HttpMethod::Get,
            parameters: Parameters::new(),
            headers: Headers::new(),
            auth: AuthRequirement::None,
            encoding: endpoint.encoding(),
            multipart: None,
            plugins: Vec::new(),
            global_plugins: endpoint.plugins(),
            stub: None,
            stubbing: endpoint.stubbing_enabled(),
            executor: endpoint.executor(),
            validation: Validation::default(),
            destination: None,
            serializer: serializer::bytes(),
            error_serializer: serializer::response_error(),
            endpoint,
        }
    }
}

impl<M, E> Request<M, E> {
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Merge `parameters` into the request's parameters.
    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers.merge(&headers);
        self
    }

    pub fn auth(mut self, auth: AuthRequirement) -> Self {
        self.auth = auth;
        self
    }

    pub fn encoding(mut self, encoding: ParameterEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Send a `multipart/form-data` body. Parameters become leading text
    /// fields of the form.
    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.multipart = Some(form);
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn stub(mut self, stub: Stub) -> Self {
        self.stub = Some(stub);
        self
    }

    /// Override the endpoint's stubbing toggle for this request.
    pub fn stubbing(mut self, enabled: bool) -> Self {
        self.stubbing = enabled;
        self
    }

    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn validate_status(mut self, statuses: Range<u16>) -> Self {
        self.validation = self.validation.statuses(statuses);
        self
    }

    pub fn serializer<N>(self, serializer: ResponseSerializer<N>) -> Request<N, E> {
        Request {
            endpoint: self.endpoint,
            path: self.path,
            method: self.method,
            parameters: self.parameters,
            headers: self.headers,
            auth: self.auth,
            encoding: self.encoding,
            multipart: self.multipart,
            plugins: self.plugins,
            global_plugins: self.global_plugins,
            stub: self.stub,
            stubbing: self.stubbing,
            executor: self.executor,
            validation: self.validation,
            destination: self.destination,
            serializer,
            error_serializer: self.error_serializer,
        }
    }

    pub fn error_serializer<F>(self, error_serializer: ErrorSerializer<F>) -> Request<M, F> {
        Request {
            endpoint: self.endpoint,
            path: self.path,
            method: self.method,
            parameters: self.parameters,
            headers: self.headers,
            auth: self.auth,
            encoding: self.encoding,
            multipart: self.multipart,
            plugins: self.plugins,
            global_plugins: self.global_plugins,
            stub: self.stub,
            stubbing: self.stubbing,
            executor: self.executor,
            validation: self.validation,
            destination: self.destination,
            serializer: self.serializer,
            error_serializer,
        }
    }

    pub fn json<T: DeserializeOwned + 'static>(self) -> Request<T, E> {
        self.serializer(serializer::json())
    }

    pub fn text(self) -> Request<String, E> {
        self.serializer(serializer::text())
    }

    pub fn empty(self) -> Request<Empty, E> {
        self.serializer(serializer::empty())
    }

    /// Write the response body to `destination`; the model is the path.
    pub fn download_to(mut self, destination: impl Into<PathBuf>) -> Request<PathBuf, E> {
        self.destination = Some(destination.into());
        self.serializer(serializer::file())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn http_method(&self) -> HttpMethod {
        self.method
    }

    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    pub fn is_stubbing(&self) -> bool {
        self.stubbing
    }

    pub fn global_plugin_count(&self) -> usize {
        self.global_plugins.len()
    }

    /// The stub this request will use, if stubbing applies to it.
    pub(crate) fn active_stub(&self) -> Option<&Stub> {
        self.stub.as_ref().filter(|stub| self.stubbing && stub.is_enabled())
    }

    pub fn url(&self) -> RequestUrl {
        self.endpoint.url_builder().build(&self.path)
    }

    /// Resolve URL, headers and body into a concrete [`HttpRequest`].
    pub fn materialize(&self) -> Result<HttpRequest, TransportError> {
        let url = self
            .url()
            .into_url()
            .ok_or_else(|| TransportError::InvalidUrl(self.path.clone()))?;
        let mut headers = self.endpoint.header_composer().compose(self.auth, &self.headers);

        let (url, body) = match &self.multipart {
            Some(form) => {
                let mut form = form.clone();
                form.prepend(
                    encoding::pairs(&self.parameters)
                        .into_iter()
                        .map(|(name, value)| Part::text(name, value)),
                );
                headers.insert("Content-Type", form.content_type());
                (url, Some(form.encode()))
            }
            None => encoding::encode(self.encoding, self.method, url, &self.parameters, &mut headers)?,
        };

        let mut request = HttpRequest {
            method: self.method,
            url: url.into(),
            headers,
            body,
        };
        if let Some(adapter) = self.endpoint.adapter() {
            adapter.adapt(&mut request, self.auth)?;
        }
        Ok(request)
    }
}

impl<M, E> Clone for Request<M, E> {
    fn clone(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            path: self.path.clone(),
            method: self.method,
            parameters: self.parameters.clone(),
            headers: self.headers.clone(),
            auth: self.auth,
            encoding: self.encoding,
            multipart: self.multipart.clone(),
            plugins: self.plugins.clone(),
            global_plugins: self.global_plugins.clone(),
            stub: self.stub.clone(),
            stubbing: self.stubbing,
            executor: self.executor.clone(),
            validation: self.validation.clone(),
            destination: self.destination.clone(),
            serializer: self.serializer.clone(),
            error_serializer: self.error_serializer.clone(),
        }
    }
}

impl<M, E> fmt::Debug for Request<M, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("parameters", &self.parameters)
            .field("headers", &self.headers)
            .field("auth", &self.auth)
            .field("encoding", &self.encoding)
            .field("stub", &self.stub)
            .field("stubbing", &self.stubbing)
            .finish_non_exhaustive()
    }
}
