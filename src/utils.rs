use async_compression::tokio::bufread::GzipDecoder;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

const DATA_DIR_NAME: &str = "aqicast";

/// Default root of the local blob store, under the platform data directory.
pub fn default_data_dir() -> anyhow::Result<PathBuf> {
    dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine system data directory"))
        .map(|p| p.join(DATA_DIR_NAME))
}

pub async fn gunzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzipDecoder::new(bytes);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed).await?;
    Ok(decompressed)
}
