// build.rs
// Compiles the GLSL sources in ../shaders into the SPIR-V blobs the renderer loads

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Source file and the SPIR-V name the renderer expects for it
const SHADERS: [(&str, &str); 2] = [("shader.vert", "vert.spv"), ("shader.frag", "frag.spv")];

fn needs_compile(source: &Path, output: &Path) -> bool {
    match (
        std::fs::metadata(source).and_then(|m| m.modified()),
        std::fs::metadata(output).and_then(|m| m.modified()),
    ) {
        (Ok(src), Ok(dst)) => src > dst,
        _ => true,
    }
}

fn main() {
    println!("cargo:rerun-if-changed=../shaders/shader.vert");
    println!("cargo:rerun-if-changed=../shaders/shader.frag");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let vulkan_sdk = match env::var("VULKAN_SDK") {
        Ok(sdk) => sdk,
        Err(_) => {
            println!("cargo:warning=VULKAN_SDK not set, shader compilation skipped");
            return;
        }
    };

    let glslc = if cfg!(target_os = "windows") {
        format!("{}\\Bin\\glslc.exe", vulkan_sdk)
    } else {
        format!("{}/bin/glslc", vulkan_sdk)
    };

    if !Path::new(&glslc).exists() {
        eprintln!("error: glslc not found at: {}", glslc);
        eprintln!("hint: Ensure Vulkan SDK is properly installed");
        panic!("Shader compiler not found");
    }

    let shader_dir = PathBuf::from("../shaders");
    let mut compiled_count = 0;

    for (source_name, output_name) in SHADERS {
        let source = shader_dir.join(source_name);
        let output = shader_dir.join(output_name);

        if !source.exists() {
            println!("cargo:warning=Shader source {} not found", source.display());
            continue;
        }
        if !needs_compile(&source, &output) {
            eprintln!("info: Shader {} is up to date", source_name);
            continue;
        }

        match Command::new(&glslc).arg(&source).arg("-o").arg(&output).status() {
            Ok(s) if s.success() => {
                eprintln!("info: Compiled {} -> {}", source_name, output_name);
                compiled_count += 1;
            }
            Ok(s) => {
                eprintln!("error: glslc failed for {} with exit code: {}", source_name, s.code().unwrap_or(-1));
                panic!("Shader compilation failed");
            }
            Err(e) => {
                eprintln!("error: Failed to run glslc for {}: {}", source_name, e);
                panic!("Failed to execute shader compiler");
            }
        }
    }

    if compiled_count > 0 {
        eprintln!("info: Successfully compiled {} shader(s)", compiled_count);
    }
}
