/// Builds the gRPC client and server code for the `convert.proto` and
/// `word.proto` definitions using `tonic-prost-build`.
///
/// # Byte Field Optimization
///
/// The `chunks` field in the `DocuChunk` message is explicitly marked with
/// `.bytes(...)` so every chunk is decoded as a `Bytes` value (from the `bytes`
/// crate) instead of a `Vec<u8>`. Chunks are appended to output buffers or
/// forwarded as-is, so keeping them reference counted avoids a copy per frame.
///
/// # Files and Paths
///
/// - Proto files: `proto/convert.proto`, `proto/word.proto`
/// - Includes: `proto/`
///
/// # Output
///
/// Generated code will be accessible in Rust via:
///
/// ```rust
/// pub mod word {
///     tonic::include_proto!("word");
/// }
/// pub mod convert {
///     tonic::include_proto!("convert");
/// }
/// ```
///
/// A file descriptor set (`docustream_descriptor.bin`) is also emitted for
/// server reflection.
use std::env;
use std::path::PathBuf;
fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("docustream_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();

    config
        .bytes([".word.DocuChunk.chunks"])
        .file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(
            config,
            &["proto/convert.proto", "proto/word.proto"],
            &["proto"],
        )
        .unwrap();
}
