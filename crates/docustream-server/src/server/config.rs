use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use docustream_core::types::CHUNK_SIZE;
use std::path::PathBuf;

/// gRPC messages above this size are rejected by default decoders, so a single
/// response chunk must stay well below it.
const MAX_CHUNK_BYTES: usize = 2 * 1024 * 1024;

/// Runtime configuration for the `docustream-server` binary.
///
/// These settings control conversion concurrency, upload limits, response
/// chunking and the external converter. All values are parsed from CLI
/// arguments or environment variables.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "docustream-server",
    version,
    about = "A gRPC service that converts streamed documents to PDF"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix
    /// socket).
    ///
    /// Example: "0.0.0.0:4014" or "/tmp/docustream.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:4014"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a
    /// file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Number of conversion workers. Each worker runs one conversion at a time
    /// with its own office profile. Defaults to the number of CPUs.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS")]
    pub num_workers: Option<usize>,

    /// Maximum payload size of a single response chunk.
    ///
    /// Environment variable: `CHUNK_BYTES`
    #[arg(long, env = "CHUNK_BYTES", default_value_t = CHUNK_SIZE)]
    pub chunk_bytes: usize,

    /// Largest accepted upload. Larger uploads are rejected before conversion.
    ///
    /// Environment variable: `MAX_UPLOAD_BYTES`
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 64 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Capacity of the response buffer between the conversion task and the
    /// gRPC stream.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,

    /// Office executable used for conversions.
    ///
    /// Environment variable: `OFFICE_BIN`
    #[arg(long, env = "OFFICE_BIN", default_value = "libreoffice")]
    pub office_bin: PathBuf,

    /// Directory holding worker profiles and per-conversion scratch
    /// directories. Defaults to `docustream` under the system temp directory.
    ///
    /// Environment variable: `WORK_DIR`
    #[arg(long, env = "WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// Extension given to uploaded documents before conversion. The office
    /// suite picks its import filter from it.
    ///
    /// Environment variable: `INPUT_EXTENSION`
    #[arg(long, env = "INPUT_EXTENSION", default_value = "docx")]
    pub input_extension: String,

    /// Seconds a single conversion may take before the converter is killed.
    ///
    /// Environment variable: `CONVERT_TIMEOUT_SECS`
    #[arg(long, env = "CONVERT_TIMEOUT_SECS", default_value_t = 120)]
    pub convert_timeout_secs: u64,

    /// Seconds to wait for in-flight conversions during shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 30)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub num_workers: usize,
    pub chunk_bytes: usize,
    pub max_upload_bytes: usize,
    pub stream_buffer_size: usize,
    pub office_bin: PathBuf,
    pub work_dir: PathBuf,
    pub input_extension: String,
    pub convert_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let num_workers = args.num_workers.unwrap_or_else(num_cpus::get);
        if num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        if args.chunk_bytes == 0 || args.chunk_bytes > MAX_CHUNK_BYTES {
            bail!(
                "CHUNK_BYTES ({}) must be between 1 and {}",
                args.chunk_bytes,
                MAX_CHUNK_BYTES
            );
        }

        if args.max_upload_bytes == 0 {
            bail!("MAX_UPLOAD_BYTES must be greater than 0");
        }

        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        if args.convert_timeout_secs == 0 {
            bail!("CONVERT_TIMEOUT_SECS must be greater than 0");
        }

        let input_extension = args.input_extension.trim_start_matches('.').to_string();
        if input_extension.is_empty() || !input_extension.chars().all(|c| c.is_ascii_alphanumeric())
        {
            bail!(
                "INPUT_EXTENSION ({}) must be a plain alphanumeric file extension",
                args.input_extension
            );
        }

        // Profiles are passed to the office suite as `file://` URLs, which
        // only hold absolute paths.
        let work_dir = args
            .work_dir
            .unwrap_or_else(|| std::env::temp_dir().join("docustream"));
        let work_dir = std::path::absolute(&work_dir)
            .with_context(|| format!("WORK_DIR ({}) cannot be resolved", work_dir.display()))?;

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            num_workers,
            chunk_bytes: args.chunk_bytes,
            max_upload_bytes: args.max_upload_bytes,
            stream_buffer_size: args.stream_buffer_size,
            office_bin: args.office_bin,
            work_dir,
            input_extension,
            convert_timeout: Duration::from_secs(args.convert_timeout_secs),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
        })
    }
}

impl ServerConfig {
    /// Parses `args` as if they were passed on the command line, after the
    /// binary name.
    pub fn from_args<I, T>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let args = CliArgs::try_parse_from(
            std::iter::once(std::ffi::OsString::from("docustream-server"))
                .chain(args.into_iter().map(Into::into)),
        )?;
        Self::try_from(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::from_args(["--num-workers", "2"]).unwrap();
        assert_eq!(config.num_workers, 2);
        assert_eq!(config.chunk_bytes, CHUNK_SIZE);
        assert_eq!(config.input_extension, "docx");
        assert_eq!(config.convert_timeout, Duration::from_secs(120));
        assert!(config.work_dir.ends_with("docustream"));
    }

    #[test]
    fn relative_work_dir_is_made_absolute() {
        let config =
            ServerConfig::from_args(["--num-workers", "1", "--work-dir", "scratch"]).unwrap();
        assert!(config.work_dir.is_absolute());
        assert!(config.work_dir.ends_with("scratch"));
        assert_eq!(
            config.work_dir,
            std::env::current_dir().unwrap().join("scratch")
        );
    }

    #[test]
    fn leading_dot_is_stripped_from_extension() {
        let config =
            ServerConfig::from_args(["--num-workers", "1", "--input-extension", ".odt"]).unwrap();
        assert_eq!(config.input_extension, "odt");
    }

    #[test]
    fn rejects_invalid_values() {
        for args in [
            &["--num-workers", "0"][..],
            &["--chunk-bytes", "0"][..],
            &["--chunk-bytes", "4194304"][..],
            &["--max-upload-bytes", "0"][..],
            &["--stream-buffer-size", "0"][..],
            &["--convert-timeout-secs", "0"][..],
            &["--input-extension", "../docx"][..],
        ] {
            assert!(ServerConfig::from_args(args.iter().copied()).is_err(), "{args:?}");
        }
    }
}
