fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }
    tonic_build::configure()
        .build_server(true)
        .compile(&["proto/store.proto"], &["proto"])
        .unwrap_or_else(|e| panic!("Failed to compile protos {e:?}"));
    Ok(())
}
