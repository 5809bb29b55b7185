//! Ingesta de un directorio de novelas en el almacén de evidencia:
//! lectura de ficheros, segmentación en chunks anotados y envío al índice.

use std::{fs, path::Path};

use anyhow::{anyhow, Result};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::chunker;
use crate::evidence_store::EvidenceStoreClient;

/// Resumen de los resultados de una operación de ingesta.
#[derive(Debug, Default)]
pub struct IngestionSummary {
    pub files_scanned: u32,
    pub files_ingested: u32,
    pub files_skipped: u32,
    pub chunks_created: usize,
}

/// Implementa cómo se mostrará el resumen como texto.
impl std::fmt::Display for IngestionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Resumen: {} ficheros escaneados, {} ingeridos, {} omitidos. {} chunks indexados.",
            self.files_scanned, self.files_ingested, self.files_skipped, self.chunks_created
        )
    }
}

/// Recorre recursivamente un directorio de novelas, segmenta cada libro y
/// envía sus chunks al almacén de evidencia. Un fallo en un fichero lo
/// omite y la ingesta continúa con el resto.
pub async fn ingest_directory(
    store: &EvidenceStoreClient,
    root: &Path,
) -> Result<IngestionSummary> {
    if !root.is_dir() {
        return Err(anyhow!("La ruta no es un directorio: {}", root.display()));
    }

    let mut summary = IngestionSummary::default();
    let file_entries: Vec<_> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .collect();

    let total_files = file_entries.len();

    for (index, entry) in file_entries.iter().enumerate() {
        summary.files_scanned += 1;
        let path = entry.path();
        info!(
            "[{}/{}] Procesando: {}...",
            index + 1,
            total_files,
            path.display()
        );

        match ingest_file(store, path).await {
            Ok(Some(chunks_count)) => {
                summary.files_ingested += 1;
                summary.chunks_created += chunks_count;
            }
            Ok(None) => {
                summary.files_skipped += 1;
            }
            Err(err) => {
                summary.files_skipped += 1;
                error!("Error ingiriendo {}: {err}", path.display());
            }
        }
    }

    Ok(summary)
}

/// Ingesta un fichero: `None` si se omite, `Some(n)` con el número de
/// chunks indexados.
async fn ingest_file(store: &EvidenceStoreClient, path: &Path) -> Result<Option<usize>> {
    let extension = path
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("");

    let text = match extension.to_lowercase().as_str() {
        "pdf" => match pdf_extract::extract_text(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "No se pudo extraer texto del PDF {}: {}. Saltando fichero.",
                    path.display(),
                    e
                );
                return Ok(None);
            }
        },
        "txt" => match fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                warn!("Saltando fichero no-UTF8: {}", path.display());
                return Ok(None);
            }
        },
        _ => {
            info!(
                "Saltando fichero con extensión no soportada ('.{}'): {}",
                extension,
                path.display()
            );
            return Ok(None);
        }
    };

    // El identificador de libro es el nombre del fichero sin extensión;
    // es la clave de filtrado de todas las consultas posteriores.
    let book_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("Fichero sin nombre: {}", path.display()))?;

    let chunks = chunker::chunk_document(&book_name, &text);
    if chunks.is_empty() {
        warn!("Fichero vacío o sin texto útil: {}", path.display());
        return Ok(None);
    }

    let indexed = store.ingest_chunks(&chunks).await?;
    info!("Ingerido {} con {} chunks.", path.display(), indexed);
    Ok(Some(indexed))
}
