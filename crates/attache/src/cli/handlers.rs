//! Command handlers.

use super::commands::Commands;
use super::mime::guess_mime_type;
use attache::{
    AttacheResult, FileStorage, JsonError, PassthroughProcessor, StorageError, StorageErrorKind,
    StorageFactory, Upload, Uploader,
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Run one command against the factory's backend.
pub async fn handle_command(command: Commands, factory: &StorageFactory) -> AttacheResult<()> {
    match command {
        Commands::Put {
            file,
            name,
            mime,
            path,
            meta,
        } => put(factory, &file, name, mime, path, meta).await,
        Commands::Get { id, output } => get(factory, &id, output).await,
        Commands::Exists { id } => {
            let storage = factory.get().await?;
            println!("{}", storage.exists(&id).await?);
            Ok(())
        }
        Commands::Rm { id } => {
            let storage = factory.get().await?;
            if storage.delete(&id).await? {
                println!("Removed {}", id);
            } else {
                println!("Nothing stored under {}", id);
            }
            Ok(())
        }
        Commands::Config => print_json(factory.settings()),
    }
}

/// Store a file through the upload pipeline.
async fn put(
    factory: &StorageFactory,
    file: &Path,
    name: Option<String>,
    mime: Option<String>,
    path: Option<String>,
    meta: Vec<(String, String)>,
) -> AttacheResult<()> {
    let data = tokio::fs::read(file).await.map_err(|e| {
        StorageError::from_io(
            &e,
            format!("Failed to read {}", file.display()),
            StorageErrorKind::FileRead,
        )
    })?;

    let file_name = name.unwrap_or_else(|| {
        file.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string())
    });
    let mime_type = mime.unwrap_or_else(|| guess_mime_type(file).to_string());

    let mut builder = Upload::builder();
    builder.data(data).file_name(file_name).mime_type(mime_type);
    if let Some(path) = path {
        builder.path(path);
    }
    for (key, value) in meta {
        builder.metadata_entry(key, JsonValue::String(value));
    }
    let upload = builder.build()?;

    let uploader = Uploader::new(factory.get().await?, PassthroughProcessor);
    let outcome = uploader.upload(upload).await?;
    print_json(&outcome)
}

/// Write a stored file to stdout or `output`.
async fn get(factory: &StorageFactory, id: &str, output: Option<PathBuf>) -> AttacheResult<()> {
    let storage = factory.get().await?;
    let Some(fetched) = storage.fetch(id).await? else {
        println!("Nothing stored under {}", id);
        return Ok(());
    };

    match output {
        Some(target) => {
            tokio::fs::write(&target, &fetched.data).await.map_err(|e| {
                StorageError::from_io(
                    &e,
                    format!("Failed to write {}", target.display()),
                    StorageErrorKind::FileWrite,
                )
            })?;
            tracing::info!(id, target = %target.display(), size = fetched.data.len(), "Wrote file");
            print_json(&fetched.file)
        }
        None => std::io::stdout().write_all(&fetched.data).map_err(|e| {
            StorageError::from_io(&e, "Failed to write to stdout", StorageErrorKind::FileWrite)
                .into()
        }),
    }
}

fn print_json(value: &impl Serialize) -> AttacheResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| JsonError::new(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
