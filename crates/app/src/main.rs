//! Entry point for the cottage camera viewer.
//! Logging + CLI backend/asset flags.

use std::path::PathBuf;

use anyhow::Result;
use platform::ViewerConfig;

fn parse_backend_arg<I: IntoIterator<Item = String>>(args: I) -> wgpu::Backends {
    // Accept: --gpu-backend=auto|vulkan|dx12|metal|gl
    let mut backends = wgpu::Backends::all(); // default = auto
    for arg in args {
        if let Some(val) = arg.strip_prefix("--gpu-backend=") {
            backends = match val.to_ascii_lowercase().as_str() {
                "auto" => wgpu::Backends::all(),
                "vulkan" | "vk" => wgpu::Backends::VULKAN,
                "dx12" | "d3d12" => wgpu::Backends::DX12,
                "metal" | "mtl" => wgpu::Backends::METAL,
                "gl" | "opengl" | "gles" => wgpu::Backends::GL,
                other => {
                    log::warn!("Unknown backend '{}', falling back to auto.", other);
                    wgpu::Backends::all()
                }
            };
        }
    }
    backends
}

fn parse_assets_arg<I: IntoIterator<Item = String>>(args: I) -> Option<PathBuf> {
    // --assets=<dir>, directory holding shaders/ and assets/
    args.into_iter()
        .filter_map(|arg| arg.strip_prefix("--assets=").map(PathBuf::from))
        .last()
}

fn config_from_args(args: &[String]) -> ViewerConfig {
    let mut config = ViewerConfig {
        backends: parse_backend_arg(args.iter().cloned()),
        ..ViewerConfig::default()
    };
    if let Some(root) = parse_assets_arg(args.iter().cloned()) {
        config.asset_root = root;
    }
    config
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = config_from_args(&args);
    log::info!(
        "Starting cottage camera. Backend: {:?}, assets: {:?}",
        config.backends,
        config.asset_root
    );

    platform::run_viewer(config)?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}
