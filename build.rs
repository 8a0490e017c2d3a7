//! Build script to copy the default config.ini next to the built binary.

use std::env;
use std::fs;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=config.ini");

    let out_dir = env::var("OUT_DIR").unwrap_or_default();

    // OUT_DIR is target/<profile>/build/<pkg>/out; the binary lives in target/<profile>/.
    let out_path = Path::new(&out_dir);
    let Some(profile_dir) = out_path
        .parent()
        .and_then(|p| p.parent())
        .and_then(|p| p.parent())
    else {
        return;
    };

    let config_src = Path::new("config.ini");
    if config_src.exists() {
        if let Err(e) = fs::copy(config_src, profile_dir.join("config.ini")) {
            println!("cargo:warning=Failed to copy config.ini: {}", e);
        }
    }
}
