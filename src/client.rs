use std::time::Duration;

use tracing::{debug, warn};

use crate::decode::{DecodeError, decode_response};
use crate::record::{Outcome, StateRecord};
use crate::tags;
use crate::transport::{HttpTransport, Transport, TransportError};
use crate::value::Value;

pub const DEFAULT_HOST_TEMPLATE: &str = "env-gc-{}.agron.iastate.edu";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
const DATA_ENDPOINT: &str = "read_data.xml";
const RAMPING_ENDPOINT: &str = "ramping.xml";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("request to chamber {1} failed")]
    Transport(#[source] TransportError, u32),
    #[error("could not decode the response of chamber {1}")]
    Decode(#[source] DecodeError, u32),
    #[error("lighting level {0} is outside of the 0..=1 range")]
    LightingLevelOutOfRange(f64),
    #[error("set point {0} is not a finite number")]
    NonFiniteSetPoint(f64),
}

#[derive(clap::Parser, Clone, Debug)]
#[group(id = "client::Args")]
pub struct Args {
    /// Host name of the chamber controllers. `{}` is replaced with the chamber ID.
    #[arg(long, default_value = DEFAULT_HOST_TEMPLATE)]
    host_template: String,

    /// URL scheme used to reach the controllers.
    #[arg(long, default_value = "http")]
    scheme: String,

    /// Consider the chamber unreachable if it does not respond in this amount of time.
    #[arg(long, default_value = "3s")]
    timeout: humantime::Duration,
}

impl Args {
    pub fn to_config(&self) -> ClientConfig {
        ClientConfig {
            scheme: self.scheme.clone(),
            host_template: self.host_template.clone(),
            timeout: *self.timeout,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    pub scheme: String,
    pub host_template: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host_template: DEFAULT_HOST_TEMPLATE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// A handle to a single growth chamber controller.
///
/// Holds no connection; every operation is a single request awaited to completion.
pub struct ChamberClient<T = HttpTransport> {
    chamber_id: u32,
    config: ClientConfig,
    transport: T,
}

impl ChamberClient<HttpTransport> {
    pub fn new(chamber_id: u32) -> Self {
        Self::with_config(chamber_id, ClientConfig::default(), HttpTransport::default())
    }
}

impl<T: Transport> ChamberClient<T> {
    pub fn with_config(chamber_id: u32, config: ClientConfig, transport: T) -> Self {
        Self { chamber_id, config, transport }
    }

    pub fn chamber_id(&self) -> u32 {
        self.chamber_id
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn host(&self) -> String {
        self.config.host_template.replace("{}", &self.chamber_id.to_string())
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}://{}/{}", self.config.scheme, self.host(), endpoint)
    }

    /// Read the given parameters (or raw controller tags).
    pub async fn read<S: AsRef<str>>(&self, parameters: &[S]) -> Result<Outcome, Error> {
        let query = read_query(parameters);
        let Some(body) = self.request(DATA_ENDPOINT, &query).await? else {
            return Ok(Outcome::ConnectionError);
        };
        self.decode(&body).map(Outcome::Reply)
    }

    /// Write values to the given parameters (or raw controller tags), in the order given.
    ///
    /// The controller echoes back the values it accepted.
    pub async fn write<S: AsRef<str>>(&self, values: &[(S, Value)]) -> Result<Outcome, Error> {
        let query = write_query(values);
        let Some(body) = self.request(DATA_ENDPOINT, &query).await? else {
            return Ok(Outcome::ConnectionError);
        };
        self.decode(&body).map(Outcome::Reply)
    }

    /// Switch the controller to another operating mode (`nr_manual`, `ramping_manual`,
    /// `nr_diurnal`, `ramping_daily_light_integral`, ...).
    ///
    /// This goes through the ramping endpoint, whose reply is returned verbatim.
    pub async fn set_mode(&self, mode: &str) -> Result<Outcome<String>, Error> {
        let query = [("Cmd".to_string(), "run".to_string()), ("Item".to_string(), mode.to_string())];
        let body = self.request(RAMPING_ENDPOINT, &query).await?;
        debug!(chamber_id = self.chamber_id, mode, reply = ?body, "requested a mode change");
        Ok(body.map_or(Outcome::ConnectionError, Outcome::Reply))
    }

    /// `None` if the controller did not respond in time.
    async fn request(&self, endpoint: &str, query: &[(String, String)]) -> Result<Option<String>, Error> {
        let url = self.endpoint_url(endpoint);
        debug!(chamber_id = self.chamber_id, url = %url, ?query, "sending a request");
        match self.transport.get(&url, query, self.config.timeout).await {
            Ok(body) => Ok(Some(body)),
            Err(TransportError::Timeout) => {
                warn!(
                    chamber_id = self.chamber_id,
                    url = %url,
                    timeout = ?self.config.timeout,
                    "chamber did not respond in time"
                );
                Ok(None)
            }
            Err(e) => Err(Error::Transport(e, self.chamber_id)),
        }
    }

    fn decode(&self, body: &str) -> Result<StateRecord, Error> {
        decode_response(body, self.chamber_id).map_err(|e| Error::Decode(e, self.chamber_id))
    }
}

/// `Cmd=read` followed by a `Tag` per requested parameter.
pub fn read_query<S: AsRef<str>>(parameters: &[S]) -> Vec<(String, String)> {
    let mut query = Vec::with_capacity(parameters.len() + 1);
    query.push(("Cmd".to_string(), "read".to_string()));
    for parameter in parameters {
        let tag = tags::denormalize_or_passthrough(parameter.as_ref());
        query.push(("Tag".to_string(), tag.to_string()));
    }
    query
}

/// `Cmd=write` followed by the `tag=value` pairs. The controller requires `Cmd` to come first.
pub fn write_query<S: AsRef<str>>(values: &[(S, Value)]) -> Vec<(String, String)> {
    let mut query = Vec::with_capacity(values.len() + 1);
    query.push(("Cmd".to_string(), "write".to_string()));
    for (parameter, value) in values {
        let tag = tags::denormalize_or_passthrough(parameter.as_ref());
        query.push((tag.to_string(), value.to_string()));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    fn client(transport: MockTransport) -> ChamberClient<MockTransport> {
        ChamberClient::with_config(8, ClientConfig::default(), transport)
    }

    #[test]
    fn construction_fills_in_the_host() {
        let client = ChamberClient::new(8);
        assert_eq!(client.host(), "env-gc-8.agron.iastate.edu");
        assert_eq!(client.endpoint_url(DATA_ENDPOINT), "http://env-gc-8.agron.iastate.edu/read_data.xml");
    }

    #[tokio::test]
    async fn read_decodes_the_reply() {
        let body = "<Req><PV_1>22.5 C</PV_1><CM_SP_1_Manual>23.0 C</CM_SP_1_Manual></Req>";
        let client = client(MockTransport::with_body(body));
        let outcome = client.read(&["temperature_actual", "temperature_target"]).await.unwrap();
        let record = outcome.reply().unwrap();
        let keys = record.values.keys().map(String::as_str).collect::<Vec<_>>();
        assert_eq!(keys, ["temperature_actual", "temperature_target"]);
        assert_eq!(record.chamber_id, 8);

        let requests = client.transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "http://env-gc-8.agron.iastate.edu/read_data.xml");
        assert_eq!(
            requests[0].query_pairs(),
            [("Cmd", "read"), ("Tag", "PV_1"), ("Tag", "CM_SP_1_Manual")]
        );
        assert_eq!(requests[0].timeout, DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn read_passes_unknown_names_through() {
        let client = client(MockTransport::with_body("<Req><SP_4>0</SP_4></Req>"));
        client.read(&["SP_4"]).await.unwrap();
        assert_eq!(client.transport.requests()[0].query_pairs(), [("Cmd", "read"), ("Tag", "SP_4")]);
    }

    #[tokio::test]
    async fn read_timeout_is_a_connection_error() {
        let client = client(MockTransport::timing_out());
        let outcome = client.read(&["door_state"]).await.unwrap();
        assert_eq!(outcome, Outcome::ConnectionError);
    }

    #[tokio::test]
    async fn write_timeout_is_a_connection_error() {
        let client = client(MockTransport::timing_out());
        let outcome = client.write(&[("door_state", Value::from("On"))]).await.unwrap();
        assert!(outcome.is_connection_error());
    }

    #[tokio::test]
    async fn write_puts_the_command_first() {
        let client = client(MockTransport::with_body("<Req><EO_13_On_Off>On</EO_13_On_Off></Req>"));
        let values = [("door_state", Value::from("On")), ("CLC_Enable_Rh_1", Value::from("No"))];
        let outcome = client.write(&values).await.unwrap();
        let requests = client.transport.requests();
        assert_eq!(
            requests[0].query_pairs(),
            [("Cmd", "write"), ("EO_13_On_Off", "On"), ("CLC_Enable_Rh_1", "No")]
        );
        let record = outcome.reply().unwrap();
        assert_eq!(record.env_var.as_deref(), Some("door"));
        assert_eq!(record.env_val, Some(Value::Bool(true)));
    }

    #[tokio::test]
    async fn other_transport_failures_are_errors() {
        let client = client(MockTransport::replying([Err(TransportError::Status(500))]));
        let result = client.read(&["door_state"]).await;
        assert!(matches!(result, Err(Error::Transport(TransportError::Status(500), 8))));
    }

    #[tokio::test]
    async fn malformed_replies_are_errors() {
        let client = client(MockTransport::with_body("<html><body>oops"));
        let result = client.read(&["door_state"]).await;
        assert!(matches!(result, Err(Error::Decode(_, 8))));
    }

    #[tokio::test]
    async fn mode_change_uses_the_ramping_endpoint() {
        let client = client(MockTransport::with_body("OK"));
        let outcome = client.set_mode("nr_diurnal").await.unwrap();
        assert_eq!(outcome, Outcome::Reply("OK".to_string()));
        let request = &client.transport.requests()[0];
        assert_eq!(request.url, "http://env-gc-8.agron.iastate.edu/ramping.xml");
        assert_eq!(request.query_pairs(), [("Cmd", "run"), ("Item", "nr_diurnal")]);
    }

    #[test]
    fn custom_host_template() {
        let config = ClientConfig {
            scheme: "https".into(),
            host_template: "chamber{}.local:8080".into(),
            timeout: Duration::from_millis(500),
        };
        let client = ChamberClient::with_config(2, config, MockTransport::default());
        assert_eq!(client.endpoint_url(RAMPING_ENDPOINT), "https://chamber2.local:8080/ramping.xml");
    }
}
