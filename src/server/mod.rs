pub mod api;

use anyhow::Result;
use std::path::PathBuf;

pub async fn start(port: u16, ui: Option<PathBuf>) -> Result<()> {
    api::serve(port, ui).await
}
