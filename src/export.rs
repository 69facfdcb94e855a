// src/export.rs
//
// JSON file sink. Every file is wrapped in the same run envelope: {id, creationTime, data}.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::crosschain_map::CrosschainMap;
use crate::settings::Output;

/// One id and timestamp per process, shared by every file written in the run.
static RUN_META: Lazy<ExportMeta> = Lazy::new(ExportMeta::generate);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExportMeta {
    pub id: Uuid,
    #[serde(rename = "creationTime")]
    pub creation_time: DateTime<Utc>,
}

impl ExportMeta {
    pub fn generate() -> Self {
        Self {
            id: Uuid::new_v4(),
            creation_time: Utc::now(),
        }
    }

    pub fn current() -> Self {
        *RUN_META
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    #[serde(flatten)]
    meta: ExportMeta,
    data: &'a T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folder {
    Debug,
    Lists,
}

/// Parts of the map `export_map` writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapExport {
    CrosschainMap,
    TokenMapByChain,
    ErrorLog,
    Stats,
}

impl MapExport {
    pub const ALL: [MapExport; 4] = [
        MapExport::CrosschainMap,
        MapExport::TokenMapByChain,
        MapExport::ErrorLog,
        MapExport::Stats,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            MapExport::CrosschainMap => "crosschainMap",
            MapExport::TokenMapByChain => "tokenMapByChain",
            MapExport::ErrorLog => "errorLog",
            MapExport::Stats => "stats",
        }
    }
}

pub struct ExportWriter {
    debug_dir: PathBuf,
    lists_dir: PathBuf,
    meta: ExportMeta,
}

impl ExportWriter {
    pub fn new(output: &Output) -> Self {
        Self::with_meta(output, ExportMeta::current())
    }

    pub fn with_meta(output: &Output, meta: ExportMeta) -> Self {
        Self {
            debug_dir: PathBuf::from(&output.debug_dir),
            lists_dir: PathBuf::from(&output.lists_dir),
            meta,
        }
    }

    pub fn meta(&self) -> ExportMeta {
        self.meta
    }

    pub fn folder_path(&self, folder: Folder) -> &Path {
        match folder {
            Folder::Debug => &self.debug_dir,
            Folder::Lists => &self.lists_dir,
        }
    }

    /// Removes both output folders. Missing folders are fine.
    pub async fn clear_folders(&self) -> Result<()> {
        for dir in [&self.debug_dir, &self.lists_dir] {
            match fs::remove_dir_all(dir).await {
                Ok(()) => debug!("Removed {}", dir.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e).with_context(|| format!("Failed to remove {}", dir.display())),
            }
        }
        Ok(())
    }

    /// Writes `<folder>/<name>.json` and returns its path.
    pub async fn write_json<T: Serialize>(&self, name: &str, data: &T, folder: Folder) -> Result<PathBuf> {
        let dir = self.folder_path(folder);
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let path = dir.join(format!("{}.json", name));
        let body = serde_json::to_vec_pretty(&Envelope { meta: self.meta, data })
            .with_context(|| format!("Failed to serialize {}", name))?;

        let mut file = fs::File::create(&path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(&body).await?;
        file.flush().await?;

        debug!("Wrote {} ({} bytes)", path.display(), body.len());
        Ok(path)
    }

    /// Dumps the selected parts of the map into the debug folder.
    pub async fn export_map(&self, map: &CrosschainMap, scope: &[MapExport]) -> Result<()> {
        for part in scope {
            match part {
                MapExport::CrosschainMap => {
                    self.write_json(part.file_name(), map.store().identity_map(), Folder::Debug)
                        .await?;
                }
                MapExport::TokenMapByChain => {
                    self.write_json(part.file_name(), map.store().index(), Folder::Debug)
                        .await?;
                }
                MapExport::ErrorLog => {
                    self.write_json(part.file_name(), map.log(), Folder::Debug).await?;
                }
                MapExport::Stats => {
                    let stats = map.stats();
                    info!(
                        "Stats: {} tokens, {} mapped, {} orphans, {} errors, {} warnings",
                        stats.token_count,
                        stats.mapped_token_count,
                        stats.orphan_token_count,
                        stats.error_count,
                        stats.warning_count
                    );
                    self.write_json(part.file_name(), &stats, Folder::Debug).await?;
                }
            }
        }
        Ok(())
    }
}
