//! Byte-level forwarding to backends over a pooled hyper client.
//!
//! `http://` backends are reached in plain text, `https://` ones over rustls
//! with the webpki root store. The server name comes from the backend URL.

use std::future::Future;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::schema::TimeoutConfig;
use crate::http::{request::prepare_outbound, response::from_upstream};
use crate::load_balancer::{Backend, Forward, ForwardError};

/// Production [`Forward`] implementation.
#[derive(Debug, Clone)]
pub struct HyperForwarder {
    client: Client<HttpsConnector<HttpConnector>, Body>,
}

impl HyperForwarder {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));

        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }
}

impl Forward for HyperForwarder {
    fn forward(
        &self,
        backend: &Backend,
        request: Request<Body>,
    ) -> impl Future<Output = Result<Response<Body>, ForwardError>> + Send {
        let outbound = prepare_outbound(backend, request);
        let client = self.client.clone();

        async move {
            let response = client
                .request(outbound?)
                .await
                .map_err(|e| ForwardError::Upstream(Box::new(e)))?;
            Ok(from_upstream(response))
        }
    }
}
