use crate::client::{self, ChamberClient};
use crate::output;
use crate::record::Outcome;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not start the async runtime")]
    Runtime(#[source] std::io::Error),
    #[error("chamber request failed")]
    Client(#[source] client::Error),
    #[error("could not output the results")]
    Output(#[source] output::Error),
    #[error("`{0}` is not of the form `name=value`")]
    MalformedAssignment(String),
    #[error("could not load the logger configuration")]
    Config(#[source] crate::config::Error),
    #[error("could not create the log directory at {1:?}")]
    CreateLogDirectory(#[source] std::io::Error, std::path::PathBuf),
    #[error("polling or logging {0} of the chambers failed")]
    PollFailed(usize),
}

/// Options shared by the commands talking to a single chamber.
#[derive(clap::Parser)]
#[group(id = "commands::ChamberArgs")]
pub struct ChamberArgs {
    /// The chamber ID.
    #[arg(long, short = 'c')]
    chamber: u32,
    #[clap(flatten)]
    client: client::Args,
    #[clap(flatten)]
    output: output::Args,
}

impl ChamberArgs {
    fn client(&self) -> ChamberClient {
        let transport = Default::default();
        ChamberClient::with_config(self.chamber, self.client.to_config(), transport)
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, Error> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(Error::Runtime)
}

fn print_outcome(args: output::Args, outcome: &Outcome) -> Result<(), Error> {
    let mut output = args.to_output().map_err(Error::Output)?;
    output.table_headers(vec!["Parameter", "Value"]).map_err(Error::Output)?;
    let rows = || match outcome {
        Outcome::Reply(record) => record.rows(),
        Outcome::ConnectionError => vec![vec!["type".to_string(), "ConnectionError".to_string()]],
    };
    output.record(rows, || outcome).map_err(Error::Output)?;
    output.commit().map_err(Error::Output)
}

pub mod tags {
    use crate::output;
    use crate::tags::{Encoding, Mode, TagIndex};

    /// Search and output the known controller tags.
    #[derive(clap::Parser)]
    pub struct Args {
        /// Only list tags whose tag, parameter name or description contain this.
        filter: Option<String>,
        #[clap(flatten)]
        output: output::Args,
    }

    #[derive(serde::Serialize)]
    pub struct TagSchema {
        pub tag: &'static str,
        pub parameter: &'static str,
        pub mode: Mode,
        pub encoding: Encoding,
        pub description: &'static str,
    }

    impl TagSchema {
        pub fn all_tags() -> impl Iterator<Item = Self> {
            TagIndex::all().map(|index| TagSchema {
                tag: index.tag(),
                parameter: index.parameter(),
                mode: index.mode(),
                encoding: index.encoding(),
                description: index.description(),
            })
        }

        pub fn is_match(&self, pattern: &str) -> bool {
            let pattern = pattern.to_lowercase();
            self.tag.to_lowercase().contains(&pattern)
                || self.parameter.contains(&pattern)
                || self.description.to_lowercase().contains(&pattern)
        }
    }

    pub fn run(args: Args) -> Result<(), super::Error> {
        let mut output = args.output.to_output().map_err(super::Error::Output)?;
        output
            .table_headers(vec!["Tag", "Parameter", "Mode", "Encoding", "Description"])
            .map_err(super::Error::Output)?;
        for schema in TagSchema::all_tags() {
            if let Some(pattern) = &args.filter {
                if !schema.is_match(pattern) {
                    continue;
                }
            }
            output
                .record(
                    || {
                        vec![vec![
                            schema.tag.to_string(),
                            schema.parameter.to_string(),
                            schema.mode.to_string(),
                            schema.encoding.to_string(),
                            schema.description.to_string(),
                        ]]
                    },
                    || &schema,
                )
                .map_err(super::Error::Output)?;
        }
        output.commit().map_err(super::Error::Output)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn filter_matches_any_column() {
            let door = TagSchema::all_tags().find(|s| s.tag == "EO_13_On_Off").unwrap();
            assert!(door.is_match("door"));
            assert!(door.is_match("eo_13"));
            assert!(door.is_match("OPEN"));
            assert!(!door.is_match("lighting"));
        }
    }
}

pub mod get {
    use crate::operations::Subsystem;

    /// Read a group of parameters from a chamber.
    #[derive(clap::Parser)]
    pub struct Args {
        #[arg(value_enum)]
        subsystem: Subsystem,
        #[clap(flatten)]
        chamber: super::ChamberArgs,
    }

    pub fn run(args: Args) -> Result<(), super::Error> {
        let client = args.chamber.client();
        let outcome =
            super::runtime()?.block_on(client.get(args.subsystem)).map_err(super::Error::Client)?;
        super::print_outcome(args.chamber.output, &outcome)
    }
}

pub mod set {
    use crate::operations::{SetPoint, Switch, Toggle};
    use crate::record::{Outcome, StateRecord};
    use crate::value::Value;

    #[derive(clap::Subcommand)]
    pub enum Setting {
        /// Change the set point of a control loop (°C, %RH, PPM or %WC).
        SetPoint {
            #[arg(value_enum)]
            control: SetPoint,
            value: f64,
        },
        /// Set all lighting channels to a level between 0 and 1.
        Lighting { level: f64 },
        /// Open/close the door or curtain, engage the air diverter.
        Switch {
            #[arg(value_enum)]
            switch: Switch,
            #[arg(value_enum)]
            state: Toggle,
        },
        /// Enable or disable both humidification and dehumidification.
        HumidityControl {
            #[arg(value_enum)]
            state: Toggle,
        },
        /// Switch the controller's operating mode (e.g. `nr_manual`, `nr_diurnal`).
        Mode { mode: String },
        /// Set the controller clock to the local time.
        Clock,
    }

    /// Change a setting of a chamber.
    #[derive(clap::Parser)]
    pub struct Args {
        #[command(subcommand)]
        setting: Setting,
        #[clap(flatten)]
        chamber: super::ChamberArgs,
    }

    pub fn run(args: Args) -> Result<(), super::Error> {
        let Args { setting, chamber } = args;
        let client = chamber.client();
        let outcome = super::runtime()?.block_on(async move {
            match setting {
                Setting::SetPoint { control, value } => client.set_point(control, value).await,
                Setting::Lighting { level } => client.set_lighting(level).await,
                Setting::Switch { switch, state } => client.switch(switch, state).await,
                Setting::HumidityControl { state: Toggle::On } => client.enable_humidity().await,
                Setting::HumidityControl { state: Toggle::Off } => client.disable_humidity().await,
                Setting::Mode { mode } => {
                    // The ramping endpoint does not reply with tags, show its reply as-is.
                    let chamber_id = client.chamber_id();
                    client.set_mode(&mode).await.map(|reply| {
                        reply.map(|text| {
                            let mut record = StateRecord::new(chamber_id);
                            record.values.insert("reply".to_string(), Value::from(text.as_str()));
                            record
                        })
                    })
                }
                Setting::Clock => client.set_time().await,
            }
        });
        let outcome: Outcome = outcome.map_err(super::Error::Client)?;
        super::print_outcome(chamber.output, &outcome)
    }
}

pub mod read {
    /// Read parameters (or raw controller tags) from a chamber.
    #[derive(clap::Parser)]
    pub struct Args {
        #[arg(required = true)]
        parameters: Vec<String>,
        #[clap(flatten)]
        chamber: super::ChamberArgs,
    }

    pub fn run(args: Args) -> Result<(), super::Error> {
        let client = args.chamber.client();
        let outcome = super::runtime()?
            .block_on(client.read(args.parameters.as_slice()))
            .map_err(super::Error::Client)?;
        super::print_outcome(args.chamber.output, &outcome)
    }
}

pub mod write {
    use crate::value::Value;

    /// Write values to parameters (or raw controller tags) of a chamber, in the order given.
    #[derive(clap::Parser)]
    pub struct Args {
        /// `name=value` pairs. Values are sent verbatim.
        #[arg(required = true)]
        assignments: Vec<String>,
        #[clap(flatten)]
        chamber: super::ChamberArgs,
    }

    pub(super) fn parse_assignment(assignment: &str) -> Result<(String, Value), super::Error> {
        match assignment.split_once('=') {
            Some((name, value)) if !name.is_empty() => Ok((name.to_string(), Value::from(value))),
            _ => Err(super::Error::MalformedAssignment(assignment.to_string())),
        }
    }

    pub fn run(args: Args) -> Result<(), super::Error> {
        let values = args
            .assignments
            .iter()
            .map(|a| parse_assignment(a))
            .collect::<Result<Vec<_>, _>>()?;
        let client = args.chamber.client();
        let outcome =
            super::runtime()?.block_on(client.write(values.as_slice())).map_err(super::Error::Client)?;
        super::print_outcome(args.chamber.output, &outcome)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn assignments() {
            let (name, value) = parse_assignment("EO_13_On_Off=On").unwrap();
            assert_eq!(name, "EO_13_On_Off");
            assert_eq!(value, Value::from("On"));
            let (_, value) = parse_assignment("CM_SP_1_Manual=22000").unwrap();
            assert_eq!(value.to_string(), "22000");
            assert!(parse_assignment("door_state").is_err());
            assert!(parse_assignment("=On").is_err());
        }
    }
}

pub mod log {
    use std::path::{Path, PathBuf};

    use futures::future::join_all;
    use tracing::{error, info};

    use crate::client::{self, ChamberClient};
    use crate::config::LoggerConfig;
    use crate::logger::{EnvironmentLog, Level};
    use crate::record::Outcome;

    /// Poll the state of every configured chamber and append it to the chamber's environment log.
    #[derive(clap::Parser)]
    pub struct Args {
        /// YAML file with `chamber_ids` and `log_directory`.
        config: Option<PathBuf>,
        #[clap(flatten)]
        client: client::Args,
    }

    pub fn run(args: Args) -> Result<(), super::Error> {
        let config = match &args.config {
            Some(path) => LoggerConfig::from_file(path).map_err(super::Error::Config)?,
            None => LoggerConfig::default(),
        };
        std::fs::create_dir_all(&config.log_directory)
            .map_err(|e| super::Error::CreateLogDirectory(e, config.log_directory.clone()))?;
        let transport = crate::transport::HttpTransport::default();
        let clients = config
            .chamber_ids
            .iter()
            .map(|&id| ChamberClient::with_config(id, args.client.to_config(), transport.clone()))
            .collect::<Vec<_>>();
        let outcomes = super::runtime()?
            .block_on(join_all(clients.iter().map(|client| client.get_state())));

        let polled = clients.iter().map(|client| client.chamber_id()).zip(outcomes);
        let failures = record_outcomes(&config.log_directory, polled);
        if failures > 0 {
            return Err(super::Error::PollFailed(failures));
        }
        Ok(())
    }

    /// Append every polled outcome to its chamber's log. Returns the number of chambers that
    /// could not be polled or logged; one failing chamber does not stop the others.
    pub(super) fn record_outcomes(
        directory: &Path,
        polled: impl IntoIterator<Item = (u32, Result<Outcome, client::Error>)>,
    ) -> usize {
        let mut failures = 0;
        for (chamber_id, outcome) in polled {
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(chamber_id, error = (&e as &dyn std::error::Error), "polling failed");
                    failures += 1;
                    continue;
                }
            };
            let level = EnvironmentLog::open(directory, chamber_id)
                .and_then(|mut log| log.append(chamber_id, &outcome));
            match level {
                Ok(Level::Info) => info!(chamber_id, "logged chamber state"),
                Ok(Level::Error) => error!(chamber_id, "chamber did not respond, logged the error"),
                Err(e) => {
                    error!(chamber_id, error = (&e as &dyn std::error::Error), "could not log");
                    failures += 1;
                }
            }
        }
        failures
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::record::StateRecord;
        use crate::transport::TransportError;

        #[test]
        fn one_failing_chamber_does_not_stop_the_others() {
            let directory =
                std::env::temp_dir().join(format!("chamber-poll-{}", std::process::id()));
            std::fs::create_dir_all(&directory).unwrap();
            // A directory in place of the log file makes opening it fail.
            std::fs::create_dir_all(EnvironmentLog::path_for(&directory, 1)).unwrap();
            let polled = vec![
                (1, Ok(Outcome::Reply(StateRecord::new(1)))),
                (2, Err(client::Error::Transport(TransportError::Status(500), 2))),
                (3, Ok(Outcome::ConnectionError)),
                (4, Ok(Outcome::Reply(StateRecord::new(4)))),
            ];
            assert_eq!(record_outcomes(&directory, polled), 2);
            let logged = |id| std::fs::read_to_string(EnvironmentLog::path_for(&directory, id));
            assert!(logged(3).unwrap().contains(r#""level":"ERROR""#));
            assert!(logged(4).unwrap().contains(r#""level":"INFO""#));
            assert!(!EnvironmentLog::path_for(&directory, 2).exists());
            std::fs::remove_dir_all(&directory).unwrap();
        }
    }
}
