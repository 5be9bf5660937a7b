use std::future::Future;
use std::time::Duration;

/// Ordered query string parameters. Order is significant to the controller.
pub type Query = [(String, String)];

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("the controller did not respond in time")]
    Timeout,
    #[error("HTTP request failed")]
    Http(#[source] reqwest::Error),
    #[error("the controller responded with HTTP status {0}")]
    Status(u16),
}

impl TransportError {
    fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() { Self::Timeout } else { Self::Http(error) }
    }
}

/// Something that can perform a `GET` against the chamber controller.
pub trait Transport: Send + Sync {
    /// `GET url?query`, returning the response body.
    ///
    /// Must report exceeding `timeout` as [`TransportError::Timeout`].
    fn get(
        &self,
        url: &str,
        query: &Query,
        timeout: Duration,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;
}

#[derive(Clone, Default)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Transport for HttpTransport {
    async fn get(
        &self,
        url: &str,
        query: &Query,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .timeout(timeout)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        response.text().await.map_err(TransportError::from_reqwest)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct RecordedRequest {
        pub url: String,
        pub query: Vec<(String, String)>,
        pub timeout: Duration,
    }

    impl RecordedRequest {
        pub fn query_pairs(&self) -> Vec<(&str, &str)> {
            self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
        }
    }

    /// Replays canned replies in order and records every request made.
    #[derive(Default)]
    pub(crate) struct MockTransport {
        replies: Mutex<VecDeque<Result<String, TransportError>>>,
        requests: Mutex<Vec<RecordedRequest>>,
    }

    impl MockTransport {
        pub fn replying(replies: impl IntoIterator<Item = Result<String, TransportError>>) -> Self {
            Self { replies: Mutex::new(replies.into_iter().collect()), ..Default::default() }
        }

        pub fn with_body(body: &str) -> Self {
            Self::replying([Ok(body.to_string())])
        }

        pub fn timing_out() -> Self {
            Self::replying([Err(TransportError::Timeout)])
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for MockTransport {
        async fn get(
            &self,
            url: &str,
            query: &Query,
            timeout: Duration,
        ) -> Result<String, TransportError> {
            self.requests.lock().unwrap().push(RecordedRequest {
                url: url.to_string(),
                query: query.to_vec(),
                timeout,
            });
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("<Req/>".to_string()))
        }
    }
}
