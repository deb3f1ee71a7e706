use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum_template::engine::Engine;
use derive_new::new;
use snafu::ResultExt;
use tera::Tera;
use url::Url;

use crate::config::Config;
use crate::error::{ApplicationError, CreateScratchSnafu, OpenMetadataSnafu, TemplatesSnafu};
use crate::model::RecordingId;
use crate::service::encoder::Ffmpeg;
use crate::service::metadata::MetadataStore;
use crate::service::storage::Storage;

pub type Templates = Engine<Tera>;

#[derive(Clone, new)]
pub struct App {
    pub metadata: MetadataStore,
    pub storage: Arc<Storage>,
    pub encoder: Ffmpeg,
    pub templates: Templates,
    pub settings: Arc<Settings>,
}

/// Request handling knobs taken from [Config].
#[derive(Debug, Clone, new)]
pub struct Settings {
    pub tmp_dir: PathBuf,
    pub signed_url_ttl: Duration,
    pub max_upload_size: usize,
    pub public_url: Option<Url>,
}

impl Settings {
    /// Resolve a site path against `PUBLIC_URL`, leaving it relative when none is configured.
    ///
    /// The path lands below the base URL's own path, so `https://host/app` serves `/share/..`
    /// as `https://host/app/share/..`.
    pub fn absolute(&self, path: &str) -> String {
        let resolved = self.public_url.as_ref().map(|base| {
            let mut base = base.clone();
            if !base.path().ends_with('/') {
                base.set_path(&format!("{}/", base.path()));
            }
            base.join(path.trim_start_matches('/'))
        });

        match resolved {
            Some(Ok(url)) => url.to_string(),
            Some(Err(error)) => {
                tracing::warn!(%error, path, "could not resolve path against the public url");
                path.to_owned()
            }
            None => path.to_owned(),
        }
    }

    pub fn share_url(&self, id: &RecordingId) -> String {
        self.absolute(&id.share_path())
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Settings::new(
            config.tmp_dir.clone(),
            config.signed_url_ttl,
            config.max_upload_size,
            config.public_url.clone(),
        )
    }
}

pub fn templates() -> Result<Templates, ApplicationError> {
    let mut tera = Tera::default();
    tera.add_raw_template("share.html", include_str!("../../templates/share.html"))
        .context(TemplatesSnafu)?;

    Ok(Engine::from(tera))
}

pub async fn create_app(config: &Config) -> Result<App, ApplicationError> {
    let metadata = MetadataStore::open(&config.data_dir)
        .await
        .context(OpenMetadataSnafu)?;

    tokio::fs::create_dir_all(&config.tmp_dir)
        .await
        .context(CreateScratchSnafu {
            path: config.tmp_dir.clone(),
        })?;

    let storage = Storage::connect(&config.storage()).await;

    Ok(App {
        metadata,
        storage: Arc::new(storage),
        encoder: config.encoder(),
        templates: templates()?,
        settings: Arc::new(Settings::from(config)),
    })
}
