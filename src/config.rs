use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::container::NamePolicy;
use crate::fsutil;

/// Counts kernel OOM kills per container and publishes them for a Prometheus textfile
/// collector.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Kernel log to follow.
    #[arg(long, env = "OOM_EXPORTER_INPUT", default_value = "/var/log/kern.log")]
    pub input: PathBuf,

    /// Metrics file to publish.
    #[arg(
        long,
        env = "OOM_EXPORTER_OUTPUT",
        default_value = "/var/lib/node_exporter/textfile_collector/oom.prom"
    )]
    pub output: PathBuf,

    /// Directory for temporary files; must be on the same filesystem as the output.
    /// Defaults to the directory of the output file.
    #[arg(long, env = "OOM_EXPORTER_TMP_DIR")]
    pub tmp_dir: Option<PathBuf>,

    /// Docker daemon socket.
    #[arg(long, env = "DOCKER_SOCKET", default_value = "/var/run/docker.sock")]
    pub docker_socket: PathBuf,

    /// Seconds between zero-fill passes over running containers.
    #[arg(long, env = "OOM_EXPORTER_INTERVAL", default_value_t = 10)]
    pub interval: u64,

    /// Seconds to wait for a single container runtime request.
    #[arg(long, env = "OOM_EXPORTER_TIMEOUT", default_value_t = 5)]
    pub timeout: u64,

    /// Ignore containers whose names do not follow the
    /// `<prefix>-<index>-<name>-<hex suffix>` convention instead of using the raw name.
    #[arg(long, env = "OOM_EXPORTER_STRICT_NAMES")]
    pub strict_names: bool,

    /// Milliseconds between checks for new input at end of file.
    #[arg(long, env = "OOM_EXPORTER_POLL_INTERVAL", default_value_t = 250)]
    pub poll_interval: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`--{0}` must be greater than zero")]
    Zero(&'static str),
}

/// Validated exporter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub input: PathBuf,
    pub output: PathBuf,
    pub tmp_dir: PathBuf,
    pub docker_socket: PathBuf,
    pub interval: Duration,
    pub timeout: Duration,
    pub name_policy: NamePolicy,
    pub poll_interval: Duration,
}

impl TryFrom<Args> for Config {
    type Error = Error;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let non_zero = |value: u64, flag: &'static str| {
            if value == 0 {
                Err(Error::Zero(flag))
            } else {
                Ok(value)
            }
        };

        Ok(Config {
            tmp_dir: args
                .tmp_dir
                .unwrap_or_else(|| fsutil::parent_dir(&args.output)),
            interval: Duration::from_secs(non_zero(args.interval, "interval")?),
            timeout: Duration::from_secs(non_zero(args.timeout, "timeout")?),
            poll_interval: Duration::from_millis(non_zero(args.poll_interval, "poll-interval")?),
            name_policy: if args.strict_names {
                NamePolicy::Strict
            } else {
                NamePolicy::Fallback
            },
            input: args.input,
            output: args.output,
            docker_socket: args.docker_socket,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, Error> {
        let args = Args::try_parse_from(std::iter::once("oom-exporter").chain(args.iter().copied()))
            .expect("valid arguments");
        Config::try_from(args)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.input, PathBuf::from("/var/log/kern.log"));
        assert_eq!(
            config.tmp_dir,
            PathBuf::from("/var/lib/node_exporter/textfile_collector")
        );
        assert_eq!(config.interval, Duration::from_secs(10));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.name_policy, NamePolicy::Fallback);
    }

    #[test]
    fn test_overrides() {
        let config = parse(&[
            "--input",
            "/tmp/kern.log",
            "--output",
            "/srv/metrics/oom.prom",
            "--tmp-dir",
            "/srv/tmp",
            "--interval",
            "30",
            "--strict-names",
        ])
        .unwrap();
        assert_eq!(config.input, PathBuf::from("/tmp/kern.log"));
        assert_eq!(config.output, PathBuf::from("/srv/metrics/oom.prom"));
        assert_eq!(config.tmp_dir, PathBuf::from("/srv/tmp"));
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.name_policy, NamePolicy::Strict);
    }

    #[test]
    fn test_rejects_zero_interval() {
        assert!(matches!(
            parse(&["--interval", "0"]),
            Err(Error::Zero("interval"))
        ));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        assert!(matches!(
            parse(&["--timeout", "0"]),
            Err(Error::Zero("timeout"))
        ));
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        assert!(matches!(
            parse(&["--poll-interval", "0"]),
            Err(Error::Zero("poll-interval"))
        ));
    }
}
