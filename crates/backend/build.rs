use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Files copied from the workspace root next to the built binary
const RUNTIME_FILES: &[&str] = &["config.toml", "data/statistics.json"];

fn main() {
    let workspace_root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("backend crate must live in <workspace>/crates/backend");

    // OUT_DIR is target/<profile>/build/backend-xxx/out; the binary goes to target/<profile>
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));
    let profile = env::var("PROFILE").expect("PROFILE not set");
    let target_dir = out_dir
        .ancestors()
        .find(|p| p.ends_with(&profile))
        .expect("Could not find target profile directory");

    for file in RUNTIME_FILES {
        let source = workspace_root.join(file);
        println!("cargo:rerun-if-changed={}", source.display());

        if !source.exists() {
            println!("cargo:warning={} not found, using defaults", source.display());
            continue;
        }

        let dest = target_dir.join(file);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .unwrap_or_else(|e| panic!("Failed to create {}: {}", parent.display(), e));
        }
        fs::copy(&source, &dest)
            .unwrap_or_else(|e| panic!("Failed to copy {}: {}", source.display(), e));
    }
}
