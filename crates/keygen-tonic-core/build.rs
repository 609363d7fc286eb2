/// Builds the gRPC client and server code for `proto/keys.proto`.
///
/// Also writes the encoded file descriptor set to
/// `$OUT_DIR/keys_descriptor.bin` so the server can register it with
/// `tonic-reflection`.
///
/// # Panics
///
/// Panics if `OUT_DIR` is unset or code generation fails.
use std::env;
use std::path::PathBuf;
fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("keys_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/keys.proto"], &["proto"])
        .unwrap();
}
