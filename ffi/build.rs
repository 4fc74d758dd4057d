use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=src/types.rs");

    let crate_dir = env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let out_dir = env::var("OUT_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."));

    let config = cbindgen::Config {
        language: cbindgen::Language::C,
        include_guard: Some("REQKIT_H".to_string()),
        ..Default::default()
    };

    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(out_dir.join("reqkit.h"));
        }
        Err(e) => println!("cargo:warning=cbindgen failed: {e}"),
    }
}
