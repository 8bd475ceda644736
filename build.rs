// Compiles the bundled GLSL sources to SPIR-V next to them.
//
// Only the sources are watched: the .spv outputs live in the same directory
// and must not retrigger the script.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SOURCES: [&str; 2] = ["shaders/triangle.vert", "shaders/triangle.frag"];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=GLSLC");

    let glslc = env::var_os("GLSLC")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("glslc"));

    for source in SOURCES {
        println!("cargo:rerun-if-changed={}", source);

        let source = Path::new(source);
        let mut binary = source.as_os_str().to_owned();
        binary.push(".spv");
        let binary = PathBuf::from(binary);

        if is_up_to_date(source, &binary) {
            continue;
        }
        if !compile(&glslc, source, &binary) {
            // The loader reports the missing binary at startup
            break;
        }
    }
}

fn is_up_to_date(source: &Path, binary: &Path) -> bool {
    let modified = |path: &Path| path.metadata().and_then(|m| m.modified()).ok();
    match (modified(source), modified(binary)) {
        (Some(src), Some(bin)) => bin >= src,
        _ => false,
    }
}

/// Returns false when the compiler itself is unavailable
fn compile(glslc: &Path, source: &Path, binary: &Path) -> bool {
    match Command::new(glslc).arg(source).arg("-o").arg(binary).status() {
        Ok(status) if status.success() => true,
        Ok(status) => panic!(
            "glslc rejected {}: exit code {:?}",
            source.display(),
            status.code()
        ),
        Err(e) => {
            println!(
                "cargo:warning={} unavailable ({}), shaders left uncompiled",
                glslc.display(),
                e
            );
            println!("cargo:warning=Set GLSLC or install the Vulkan SDK");
            false
        }
    }
}
