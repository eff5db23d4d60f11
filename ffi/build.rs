//! Generates the C header (`include/ajax.h`) with cbindgen.

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=src/types.rs");

    let Ok(crate_dir) = env::var("CARGO_MANIFEST_DIR") else {
        return;
    };
    let include_dir = PathBuf::from(&crate_dir).join("include");
    if let Err(e) = std::fs::create_dir_all(&include_dir) {
        println!("cargo:warning=could not create {}: {e}", include_dir.display());
        return;
    }

    let result = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("AJAX_H")
        .generate();

    match result {
        Ok(bindings) => {
            bindings.write_to_file(include_dir.join("ajax.h"));
        }
        // Header generation is best effort; the library still builds.
        Err(e) => println!("cargo:warning=cbindgen failed, ajax.h not generated: {e}"),
    }
}
