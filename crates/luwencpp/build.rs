// SPDX-FileCopyrightText: © 2023 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

fn main() {
    println!("cargo:rerun-if-changed=src");

    let (Ok(crate_dir), Ok(out_dir)) = (
        std::env::var("CARGO_MANIFEST_DIR"),
        std::env::var("OUT_DIR"),
    ) else {
        return;
    };

    let result = cbindgen::Builder::new()
        .with_pragma_once(true)
        .with_namespace("luwen")
        .with_language(cbindgen::Language::Cxx)
        .with_crate(crate_dir)
        .generate();

    match result {
        Ok(bindings) => {
            bindings.write_to_file(std::path::Path::new(&out_dir).join("luwen.h"));
        }
        Err(err) => println!("cargo:warning=unable to generate luwen.h: {err}"),
    }
}
