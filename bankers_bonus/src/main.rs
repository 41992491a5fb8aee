use std::{path::PathBuf, process::ExitCode};

use argh::FromArgs;
use spdz_client::{run_session, setup, ConfigError, RoundControl, SessionConfig};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// SPDZ external client for the bankers bonus program: every client submits a
/// private bonus, and all of them learn the ID of the client with the highest one.
#[derive(FromArgs, Debug)]
struct Options {
    /// client identifier, unique in the round and starting with 0
    #[argh(positional)]
    client_id: u32,

    /// number of SPDZ parties
    #[argh(positional)]
    parties: usize,

    /// bonus to compare
    #[argh(positional)]
    value: i64,

    /// finish the round after this client (0 false, 1 true)
    #[argh(positional)]
    finish: RoundControl,

    /// optional host name of the SPDZ parties (default localhost), followed by
    /// optional port of party 0 (party i listens on port base + i, default 14000)
    #[argh(positional)]
    endpoint: Vec<String>,

    /// directory with preprocessing data of the parties
    #[argh(option, default = "String::from(setup::DEFAULT_PREP_ROOT)")]
    prep_dir: String,

    /// path to the field parameters file, overrides the preprocessing directory
    #[argh(option)]
    params: Option<PathBuf>,
}

impl Options {
    fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let mut config = SessionConfig::new(self.client_id, self.parties, self.finish)?;
        match self.endpoint.as_slice() {
            [] => {}
            [host] => config.endpoints.host = host.clone(),
            [host, port_base] => {
                config.endpoints.host = host.clone();
                config.endpoints.port_base = port_base.parse().map_err(|_| {
                    ConfigError::Malformed(format!("invalid port base {}", port_base))
                })?;
            }
            [_, _, extra @ ..] => {
                return Err(ConfigError::Malformed(format!(
                    "unexpected arguments {:?}",
                    extra
                )))
            }
        }
        config.params_path = match &self.params {
            Some(path) => path.clone(),
            None => setup::params_path(&self.prep_dir, self.parties),
        };
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let options: Options = argh::from_env();

    let config = match options.session_config() {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    match run_session(&config, options.value).await {
        Ok(winner) => {
            println!("Winning client id is : {}", winner);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn parse(args: &[&str]) -> Options {
        match Options::from_args(&["bankers_bonus"], args) {
            Ok(options) => options,
            Err(exit) => panic!("{}", exit.output),
        }
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["1", "2", "200", "0"]).session_config().unwrap();
        assert_eq!(config.client_id, 1);
        assert_eq!(config.round, RoundControl::Continue);
        assert_eq!(config.endpoints.host, "localhost");
        assert_eq!(config.endpoints.port_base, 14000);
        assert_eq!(config.endpoints.num_parties, 2);
        assert_eq!(
            config.params_path,
            Path::new("Player-Data/2-128-128/Params-Data")
        );
    }

    #[test]
    fn test_overrides() {
        let options = parse(&[
            "2",
            "3",
            "50",
            "1",
            "spdz.example",
            "15000",
            "--params",
            "/tmp/Params-Data",
        ]);
        let config = options.session_config().unwrap();
        assert_eq!(config.round, RoundControl::Finish);
        assert_eq!(config.endpoints.host, "spdz.example");
        assert_eq!(config.endpoints.port_base, 15000);
        assert_eq!(config.params_path, Path::new("/tmp/Params-Data"));
    }

    #[test]
    fn test_host_without_port_base() {
        let config = parse(&["0", "2", "100", "1", "10.0.0.5"])
            .session_config()
            .unwrap();
        assert_eq!(config.endpoints.host, "10.0.0.5");
        assert_eq!(config.endpoints.port_base, 14000);
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            parse(&["0", "2", "100", "1", "localhost", "70000"]).session_config(),
            Err(ConfigError::Malformed(_))
        ));
        assert!(matches!(
            parse(&["0", "2", "100", "1", "localhost", "14000", "extra"]).session_config(),
            Err(ConfigError::Malformed(_))
        ));
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(Options::from_args(&["bankers_bonus"], &["0", "2", "100", "2"]).is_err());
        assert!(Options::from_args(&["bankers_bonus"], &["0", "2"]).is_err());
        assert!(matches!(
            parse(&["0", "0", "100", "1"]).session_config(),
            Err(ConfigError::NoParties)
        ));
    }
}
