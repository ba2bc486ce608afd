// build.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_DIR: &str = "shaders";

fn main() {
    println!("cargo::rerun-if-changed={}", SHADER_DIR);

    let mut sources = Vec::new();
    collect_sources(Path::new(SHADER_DIR), &mut sources);

    for source in sources {
        println!("cargo::rerun-if-changed={}", source.display());

        let mut output = source.clone().into_os_string();
        output.push(".spv");

        match Command::new("glslc").arg(&source).arg("-o").arg(&output).status() {
            Err(err) => {
                // Shaders are loaded at runtime, a missing compiler only breaks running.
                println!("cargo::warning=glslc unavailable ({}), {} not compiled", err, source.display());
                return;
            }
            Ok(status) if !status.success() => {
                panic!("glslc failed on {}: {}", source.display(), status);
            }
            Ok(_) => {}
        }
    }
}

fn collect_sources(dir: &Path, sources: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_sources(&path, sources);
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("vert") | Some("frag")
        ) {
            sources.push(path);
        }
    }
}
