// alife-proto: Build script
// Compiles the committed proto contract with a vendored protoc so the build
// does not depend on a system protobuf installation.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .type_attribute(".alife", "#[derive(serde::Serialize, serde::Deserialize)]")
        .type_attribute(".alife", "#[serde(default)]")
        .compile(&["proto/alife.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/alife.proto");
    Ok(())
}
