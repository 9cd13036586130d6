fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto_file = "../../proto/wgsync.proto";
    let proto_dir = "../../proto";

    println!("cargo:rerun-if-changed={}", proto_file);

    // Fall back to the vendored protoc when the host has none configured.
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile(&[proto_file], &[proto_dir])?;

    Ok(())
}
