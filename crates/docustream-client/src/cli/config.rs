use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use docustream_client::{ConnectOptions, TransferMode, client::DEFAULT_REQUEST_BUFFER};
use std::path::PathBuf;
use tonic::codec::CompressionEncoding;

/// Message compression negotiated with the service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Compression {
    #[default]
    None,
    Zstd,
    Gzip,
    Deflate,
}

impl From<Compression> for Option<CompressionEncoding> {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => None,
            Compression::Zstd => Some(CompressionEncoding::Zstd),
            Compression::Gzip => Some(CompressionEncoding::Gzip),
            Compression::Deflate => Some(CompressionEncoding::Deflate),
        }
    }
}

/// Converts a word-processor document to PDF through a docustream server.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file in the working directory is loaded first).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "docustream",
    version,
    about = "Streams a document to a docustream server and saves the converted PDF"
)]
pub struct CliArgs {
    /// Address of the conversion service, as `host:port` or a full URI.
    ///
    /// Environment variable: `DOCUSTREAM_SERVER_ADDR`
    #[arg(long, env = "DOCUSTREAM_SERVER_ADDR", default_value_t = String::from("localhost:4014"))]
    pub server_addr: String,

    /// Document to convert.
    ///
    /// Environment variable: `DOCUSTREAM_INPUT`
    #[arg(short, long, env = "DOCUSTREAM_INPUT")]
    pub input: PathBuf,

    /// Where to write the converted PDF. Defaults to the input path with a
    /// `pdf` extension.
    ///
    /// Environment variable: `DOCUSTREAM_OUTPUT`
    #[arg(short, long, env = "DOCUSTREAM_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Receive converted chunks while the upload is still in flight.
    ///
    /// Environment variable: `DOCUSTREAM_PIPELINED`
    #[arg(long, env = "DOCUSTREAM_PIPELINED", default_value_t = false)]
    pub pipelined: bool,

    /// Compression for requests and responses.
    ///
    /// Environment variable: `DOCUSTREAM_COMPRESSION`
    #[arg(long, env = "DOCUSTREAM_COMPRESSION", value_enum, default_value_t = Compression::None)]
    pub compression: Compression,

    /// Seconds to wait for the connection to be established. `0` waits
    /// indefinitely.
    ///
    /// Environment variable: `DOCUSTREAM_CONNECT_TIMEOUT_SECS`
    #[arg(long, env = "DOCUSTREAM_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    pub connect_timeout_secs: u64,

    /// Number of request frames queued ahead of the transport.
    ///
    /// Environment variable: `DOCUSTREAM_REQUEST_BUFFER`
    #[arg(long, env = "DOCUSTREAM_REQUEST_BUFFER", default_value_t = DEFAULT_REQUEST_BUFFER)]
    pub request_buffer: usize,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connect: ConnectOptions,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl TryFrom<CliArgs> for ClientConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.server_addr.trim().is_empty() {
            bail!("DOCUSTREAM_SERVER_ADDR must not be empty");
        }

        if args.request_buffer == 0 {
            bail!("DOCUSTREAM_REQUEST_BUFFER must be greater than 0");
        }

        let output = args
            .output
            .unwrap_or_else(|| args.input.with_extension("pdf"));

        if output == args.input {
            bail!(
                "Output path {} would overwrite the input document",
                output.display()
            );
        }

        let mut connect = ConnectOptions::new(args.server_addr);
        connect.connect_timeout =
            (args.connect_timeout_secs > 0).then(|| Duration::from_secs(args.connect_timeout_secs));
        connect.compression = args.compression.into();
        connect.mode = if args.pipelined {
            TransferMode::Pipelined
        } else {
            TransferMode::Sequential
        };
        connect.request_buffer = args.request_buffer;

        Ok(Self {
            connect,
            input: args.input,
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ClientConfig> {
        let args = CliArgs::try_parse_from(std::iter::once("docustream").chain(args.iter().copied()))?;
        ClientConfig::try_from(args)
    }

    #[test]
    fn output_defaults_to_pdf_next_to_input() {
        let config = parse(&["--input", "letters/Template.docx"]).unwrap();
        assert_eq!(config.output, PathBuf::from("letters/Template.pdf"));
        assert_eq!(config.connect.mode, TransferMode::Sequential);
        assert_eq!(config.connect.compression, None);
        assert_eq!(
            config.connect.connect_timeout,
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn flags_map_onto_connect_options() {
        let config = parse(&[
            "--input",
            "a.docx",
            "--output",
            "b.pdf",
            "--server-addr",
            "convert:9000",
            "--pipelined",
            "--compression",
            "zstd",
            "--connect-timeout-secs",
            "0",
        ])
        .unwrap();

        assert_eq!(config.connect.uri(), "http://convert:9000");
        assert_eq!(config.connect.mode, TransferMode::Pipelined);
        assert_eq!(config.connect.compression, Some(CompressionEncoding::Zstd));
        assert_eq!(config.connect.connect_timeout, None);
        assert_eq!(config.output, PathBuf::from("b.pdf"));
    }

    #[test]
    fn refuses_to_overwrite_a_pdf_input() {
        assert!(parse(&["--input", "already.pdf"]).is_err());
    }

    #[test]
    fn zero_request_buffer_is_rejected() {
        assert!(parse(&["--input", "a.docx", "--request-buffer", "0"]).is_err());
    }
}
