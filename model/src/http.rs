/*!

HTTP probes used to check that workloads exposed by the cluster answer.

Every request goes through one of two clients: a lenient one that accepts any certificate, for
probing services by address or through self-signed ingress, and a verifying one for checking
that issued certificates are trusted. A response with a non-success status is returned like any
other response; only transport failures are errors.

!*/

use crate::configuration::Config;
use crate::error::{self, Result};
use log::{debug, trace, warn};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Certificate, Method};
use serde::de::DeserializeOwned;
use snafu::ResultExt;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// What came back from a probe.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    /// `true` for a 2xx status.
    pub fn success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn json<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_str(&self.body).context(error::HttpDecodeSnafu { url: &self.url })
    }
}

#[derive(Debug, Clone)]
pub struct HttpProbe {
    lenient: Client,
    verifying: Client,
}

impl HttpProbe {
    /// Build the probe clients. When the configuration targets the Let's Encrypt staging
    /// directory, its root certificate (if configured) is trusted by [`HttpProbe::https_get`].
    pub fn new(config: &Config) -> Result<Self> {
        let lenient = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()
            .context(error::HttpClientSnafu)?;

        let mut verifying = Client::builder().timeout(REQUEST_TIMEOUT);
        if config.lets_encrypt_staging() {
            match config.lets_encrypt_staging_ca() {
                Some(path) => {
                    let pem = std::fs::read(path).context(error::CaReadSnafu { path })?;
                    let certificate =
                        Certificate::from_pem(&pem).context(error::CaParseSnafu { path })?;
                    verifying = verifying.add_root_certificate(certificate);
                }
                None => warn!(
                    "Let's Encrypt staging is configured without a staging CA, \
                     HTTPS probes will reject its certificates"
                ),
            }
        }
        let verifying = verifying.build().context(error::HttpClientSnafu)?;

        Ok(Self { lenient, verifying })
    }

    pub fn head(&self, url: &str) -> Result<HttpResponse> {
        send(&self.lenient, Method::HEAD, url, None)
    }

    /// `GET` without certificate verification.
    pub fn get(&self, url: &str) -> Result<HttpResponse> {
        send(&self.lenient, Method::GET, url, None)
    }

    /// `GET` with certificate verification.
    pub fn https_get(&self, url: &str) -> Result<HttpResponse> {
        send(&self.verifying, Method::GET, url, None)
    }

    pub fn delete(&self, url: &str) -> Result<HttpResponse> {
        send(&self.lenient, Method::DELETE, url, None)
    }

    pub fn post<B>(&self, url: &str, body: B) -> Result<HttpResponse>
    where
        B: Into<String>,
    {
        send(&self.lenient, Method::POST, url, Some(body.into()))
    }

    pub fn put<B>(&self, url: &str, body: B) -> Result<HttpResponse>
    where
        B: Into<String>,
    {
        send(&self.lenient, Method::PUT, url, Some(body.into()))
    }
}

fn send(client: &Client, method: Method, url: &str, body: Option<String>) -> Result<HttpResponse> {
    debug!("{} {}", method, url);
    let mut request = client.request(method.clone(), url);
    if let Some(body) = body {
        request = request.body(body);
    }
    let response = request.send().context(error::HttpSnafu {
        method: method.as_str(),
        url,
    })?;

    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    let body = response.text().context(error::HttpSnafu {
        method: method.as_str(),
        url,
    })?;

    if (200..300).contains(&status) {
        trace!("{} {} returned {}:\n{}", method, url, status, body);
    } else {
        warn!("{} {} returned {}:\n{}", method, url, status, body);
    }

    Ok(HttpResponse {
        url: url.to_string(),
        status,
        content_type,
        body,
    })
}
