//! Lectura del CSV de claims y escritura del CSV de veredictos.
//!
//! La entrada lleva las columnas `id, book_name, character, claim, caption`
//! (caption opcional); la salida `id, prediction, rationale`, una fila por
//! claim de entrada. La ausencia del CSV de entrada es la única condición
//! fatal de toda la aplicación.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::models::{ClaimRecord, VerdictRecord};

pub fn read_claims(path: &Path) -> Result<Vec<ClaimRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV de claims: {}", path.display()))?;

    let mut claims = Vec::new();
    for record in reader.deserialize() {
        let claim: ClaimRecord = record.context("Fila de claim inválida en el CSV de entrada")?;
        claims.push(claim);
    }

    info!("Cargados {} claims desde {}", claims.len(), path.display());
    Ok(claims)
}

pub fn write_verdicts(path: &Path, verdicts: &[VerdictRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("No se pudo crear el CSV de salida: {}", path.display()))?;

    for verdict in verdicts {
        writer.serialize(verdict)?;
    }
    writer.flush()?;

    info!("Escritos {} veredictos en {}", verdicts.len(), path.display());
    Ok(())
}
