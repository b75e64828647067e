use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Args, Subcommand, ValueEnum};
use mxbridge_codec::LocalArray;
use mxbridge_remote::{ClientConfig, EngineClient, HandshakeConfig, RemoteError};

use crate::exit::{codec_error, remote_error, CliError, CliResult, TIMEOUT, USAGE};
use crate::output::OutputFormat;

pub mod order;
pub mod roundtrip;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the reference matrix engine on a Unix socket.
    Serve(ServeArgs),
    /// Send a matrix to an engine and read it back.
    Roundtrip(RoundtripArgs),
    /// Send a matrix and sort its rows by one column on the engine.
    Order(OrderArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Roundtrip(args) => roundtrip::run(args, format),
        Command::Order(args) => order::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    #[arg(env = "MXBRIDGE_SOCKET")]
    pub path: PathBuf,
    /// Largest frame payload in bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_payload: Option<usize>,
}

/// Element type the input values are sent as.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Dtype {
    F64,
    F32,
    I32,
    U8,
    /// Not a wire type; widened to FP64 before sending.
    I64,
}

/// The matrix to send, given on the command line.
#[derive(Args, Debug)]
pub struct MatrixArgs {
    /// Row-major values (comma-separated).
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub values: Vec<f64>,
    /// Number of columns. Without it the values form a 1-D array.
    #[arg(long)]
    pub cols: Option<usize>,
    /// Element type of the local array.
    #[arg(long, value_enum, default_value = "f64")]
    pub dtype: Dtype,
}

#[derive(Args, Debug)]
pub struct RoundtripArgs {
    /// Socket path of a running engine.
    #[arg(env = "MXBRIDGE_SOCKET")]
    pub path: PathBuf,
    #[command(flatten)]
    pub matrix: MatrixArgs,
    /// Connect and request timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct OrderArgs {
    /// Socket path of a running engine.
    #[arg(env = "MXBRIDGE_SOCKET")]
    pub path: PathBuf,
    #[command(flatten)]
    pub matrix: MatrixArgs,
    /// 1-based column to sort by.
    #[arg(long, default_value = "1")]
    pub by: u64,
    /// Sort in decreasing order.
    #[arg(long)]
    pub decreasing: bool,
    /// Return 1-based row positions instead of the sorted rows.
    #[arg(long)]
    pub index_return: bool,
    /// Connect and request timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

impl MatrixArgs {
    /// Build the local array described by the flags.
    pub fn to_array(&self) -> CliResult<LocalArray> {
        match self.dtype {
            Dtype::F64 => self.shaped(self.values.clone()),
            Dtype::F32 => self.shaped(self.values.iter().map(|&v| v as f32).collect()),
            Dtype::I32 => self.shaped(integers::<i32>(&self.values)?),
            Dtype::U8 => self.shaped(integers::<u8>(&self.values)?),
            Dtype::I64 => self.shaped(integers::<i64>(&self.values)?),
        }
    }

    fn shaped<T: mxbridge_codec::Element>(&self, values: Vec<T>) -> CliResult<LocalArray> {
        let Some(cols) = self.cols else {
            return Ok(LocalArray::from_vec(values));
        };
        if cols == 0 {
            return Err(CliError::new(USAGE, "--cols must be greater than zero"));
        }
        if values.len() % cols != 0 {
            return Err(CliError::new(
                USAGE,
                format!("{} values do not fill rows of {cols} columns", values.len()),
            ));
        }
        LocalArray::from_shape_vec(values.len() / cols, cols, values)
            .map_err(|err| codec_error("invalid matrix", err))
    }
}

fn integers<T: TryFrom<i64>>(values: &[f64]) -> CliResult<Vec<T>> {
    values
        .iter()
        .map(|&v| {
            let out_of_range =
                || CliError::new(USAGE, format!("value {v} does not fit the chosen --dtype"));
            // 2^63 is the first f64 past i64::MAX; `as` would saturate to it.
            let representable = (i64::MIN as f64..i64::MAX as f64).contains(&v);
            if !representable || v.fract() != 0.0 {
                return Err(out_of_range());
            }
            T::try_from(v as i64).map_err(|_| out_of_range())
        })
        .collect()
}

/// Connect, retrying while the socket is not up yet.
pub fn connect_with_timeout(path: &Path, timeout: Duration) -> CliResult<EngineClient> {
    let config = ClientConfig::default()
        .with_timeouts(Some(timeout), Some(timeout))
        .with_handshake(HandshakeConfig {
            timeout,
            ..HandshakeConfig::default()
        });

    let start = Instant::now();
    loop {
        match EngineClient::connect_with_config(path, &config) {
            Ok(client) => return Ok(client),
            Err(err) => {
                if !is_retryable_connect_error(&err) {
                    return Err(remote_error("connect failed", err));
                }
                if start.elapsed() >= timeout {
                    return Err(CliError::new(
                        TIMEOUT,
                        format!("connect timed out after {timeout:?}"),
                    ));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

fn is_retryable_connect_error(err: &RemoteError) -> bool {
    match err {
        RemoteError::Connect { source, .. } => {
            source.kind() == std::io::ErrorKind::NotFound
                || source.kind() == std::io::ErrorKind::ConnectionRefused
        }
        _ => false,
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use mxbridge_codec::ElementType;

    use super::*;

    fn matrix(values: &[f64], cols: Option<usize>, dtype: Dtype) -> MatrixArgs {
        MatrixArgs {
            values: values.to_vec(),
            cols,
            dtype,
        }
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn values_without_cols_are_one_dimensional() {
        let array = matrix(&[1.0, 2.0, 3.0], None, Dtype::F64).to_array().unwrap();
        assert_eq!(array.shape(), &[3]);
    }

    #[test]
    fn cols_shape_the_matrix() {
        let array = matrix(&[1.0, 2.0, 3.0, 4.0], Some(2), Dtype::I32)
            .to_array()
            .unwrap();
        assert_eq!(array.shape(), &[2, 2]);
        assert_eq!(array.element_type(), ElementType::I32);
    }

    #[test]
    fn ragged_values_are_a_usage_error() {
        let err = matrix(&[1.0, 2.0, 3.0], Some(2), Dtype::F64)
            .to_array()
            .unwrap_err();
        assert_eq!(err.code, USAGE);
        assert!(matrix(&[1.0], Some(0), Dtype::F64).to_array().is_err());
    }

    #[test]
    fn integer_dtypes_check_range() {
        assert!(matrix(&[256.0], None, Dtype::U8).to_array().is_err());
        assert!(matrix(&[-1.0], None, Dtype::U8).to_array().is_err());
        assert!(matrix(&[1.5], None, Dtype::I32).to_array().is_err());
        let array = matrix(&[255.0, 0.0], None, Dtype::U8).to_array().unwrap();
        assert_eq!(array.element_type(), ElementType::U8);
    }

    #[test]
    fn i64_rejects_values_past_its_range() {
        for v in [1e19, 9.223372036854775807e18, -1e19, f64::INFINITY, f64::NAN] {
            let err = matrix(&[v], None, Dtype::I64).to_array().unwrap_err();
            assert_eq!(err.code, USAGE, "{v}");
        }

        let array = matrix(&[i64::MIN as f64, -1.0, 9.0e18], None, Dtype::I64)
            .to_array()
            .unwrap();
        assert_eq!(array.element_type(), ElementType::I64);
        assert_eq!(array.to_f64_vec(), vec![i64::MIN as f64, -1.0, 9.0e18]);
    }
}
