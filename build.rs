// build.rs

use chrono::Utc;
use std::env;
use std::fs;
use std::path::Path;

fn main() -> std::io::Result<()> {
    let out_dir = env::var("OUT_DIR").map_err(std::io::Error::other)?;
    let dest_path = Path::new(&out_dir).join("build_info.rs");

    // logged by the binary at startup
    let build_date = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    fs::write(&dest_path, format!("pub const BUILD_DATE: &str = \"{build_date}\";\n"))?;

    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
