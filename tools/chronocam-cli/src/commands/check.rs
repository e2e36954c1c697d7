//! Check that the encoder is available.

use std::path::PathBuf;

use chronocam_common::config::{config_file_path, AppConfig};
use chronocam_render_engine::{command_exists, encoder_version};

pub async fn run(config: &AppConfig, ffmpeg: Option<PathBuf>) -> anyhow::Result<()> {
    println!("Chronocam System Check");
    println!("{}", "=".repeat(50));

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[OK] Config: defaults ({} not found)", config_path.display());
    }

    let program = ffmpeg.unwrap_or_else(|| PathBuf::from(&config.render.ffmpeg_path));
    if !command_exists(&program) {
        println!("[FAIL] Encoder not found: {}", program.display());
        println!();
        println!("Install ffmpeg or set render.ffmpeg_path in the config file.");
        anyhow::bail!("encoder {} is not available", program.display());
    }

    let version = encoder_version(&program).await?;
    println!("[OK] Encoder: {}", program.display());
    println!("     {version}");

    println!();
    println!("The encoder is available. Chronocam is ready.");
    Ok(())
}
