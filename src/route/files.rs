use std::path::PathBuf;

use rocket::fs::NamedFile;
use rocket::State;

use crate::config::Config;

async fn app_index_file(c: &Config) -> Option<NamedFile> {
    let index = c.public_content.join("index.html");
    match NamedFile::open(&index).await {
        Ok(file) => Some(file),
        Err(e) => {
            tracing::warn!("Unable to open '{}': {}", index.display(), e);
            None
        }
    }
}

/// Serves the operator web app
#[get("/")]
pub async fn app(c: &State<Config>) -> Option<NamedFile> {
    app_index_file(c).await
}

/// Static assets; unknown paths fall back to the app entry page so client
/// side routes survive a reload.
#[get("/<path..>", rank = 10)]
pub async fn app_path(path: PathBuf, c: &State<Config>) -> Option<NamedFile> {
    match NamedFile::open(c.public_content.join(path)).await {
        Ok(file) => Some(file),
        Err(_) => app_index_file(c).await,
    }
}
