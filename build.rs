use std::env;
use std::fs;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=src/static/");

    // Copy pages to target/{profile}/static for runtime access
    let profile = env::var("PROFILE").unwrap_or_else(|_| "debug".to_string());
    let target_static_dir = Path::new("target").join(&profile).join("static");

    if fs::create_dir_all(&target_static_dir).is_err() {
        return;
    }

    let Ok(entries) = fs::read_dir("src/static") else {
        return;
    };

    for path in entries.flatten().map(|entry| entry.path()) {
        let Some(file_name) = path.file_name().filter(|_| path.is_file()) else {
            continue;
        };
        if fs::copy(&path, target_static_dir.join(file_name)).is_ok() {
            println!("Copied {} to target static", path.display());
        }
    }
}
