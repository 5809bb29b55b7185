//! Adaptador del almacén de evidencia: un servicio externo de búsqueda por
//! similitud con dos operaciones, ingesta de chunks y recuperación filtrada
//! por libro.
//!
//! API pública:
//!   - `EvidenceStoreClient::new(&AppConfig)`
//!   - `ingest_chunks(&[Chunk])`
//!   - `retrieve(query, k, book_name)` vía el trait `EvidenceRetriever`.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::config::AppConfig;
use crate::models::Chunk;

/// Cota superior de fragmentos por consulta, para acotar el coste de la
/// llamada de razonamiento posterior.
pub const MAX_RETRIEVAL_K: usize = 10;

/// Contrato de recuperación que consume el orquestador. Nunca falla:
/// un fallo de transporte o una respuesta no válida degradan a lista
/// vacía, y la ausencia de evidencia es una señal de primera clase para
/// el orquestador, no una avería.
#[async_trait]
pub trait EvidenceRetriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize, book_name: &str) -> Vec<String>;
}

// --- Esquemas del contrato HTTP ---

#[derive(Debug, Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
    k: usize,
    filters: RetrieveFilters<'a>,
}

#[derive(Debug, Serialize)]
struct RetrieveFilters<'a> {
    book_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct RetrievedDoc {
    text: String,
}

#[derive(Debug, Serialize)]
struct IngestRequest<'a> {
    chunks: Vec<ChunkPayload<'a>>,
}

#[derive(Debug, Serialize)]
struct ChunkPayload<'a> {
    text: &'a str,
    book_name: &'a str,
    chapter: &'a str,
}

/// Cliente HTTP del almacén de evidencia.
#[derive(Debug, Clone)]
pub struct EvidenceStoreClient {
    http: reqwest::Client,
    retrieve_url: Url,
    ingest_url: Url,
}

impl EvidenceStoreClient {
    pub fn new(cfg: &AppConfig) -> Result<Self> {
        let base = Url::parse(&cfg.evidence_store_url)
            .with_context(|| format!("URL del almacén de evidencia inválida: {}", cfg.evidence_store_url))?;
        let retrieve_url = base.join("/v1/retrieve")?;
        let ingest_url = base.join("/v1/ingest")?;

        // Timeout duro por llamada para que una consulta colgada no
        // detenga el pipeline completo.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.retrieve_timeout_secs))
            .build()
            .context("No se pudo construir el cliente HTTP")?;

        Ok(Self { http, retrieve_url, ingest_url })
    }

    /// Envía una tanda de chunks al índice. El almacén indexa de forma
    /// incremental; no hace falta reiniciar nada tras añadir un libro.
    pub async fn ingest_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let payload = IngestRequest {
            chunks: chunks
                .iter()
                .map(|c| ChunkPayload {
                    text: &c.text,
                    book_name: &c.book_name,
                    chapter: &c.chapter,
                })
                .collect(),
        };

        let response = self
            .http
            .post(self.ingest_url.clone())
            .json(&payload)
            .send()
            .await
            .context("Fallo de transporte al ingestar chunks")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "El almacén de evidencia rechazó la ingesta: HTTP {}",
                response.status()
            ));
        }

        Ok(chunks.len())
    }
}

#[async_trait]
impl EvidenceRetriever for EvidenceStoreClient {
    async fn retrieve(&self, query: &str, k: usize, book_name: &str) -> Vec<String> {
        let bounded_k = k.clamp(1, MAX_RETRIEVAL_K);
        let body = RetrieveRequest {
            query,
            k: bounded_k,
            filters: RetrieveFilters { book_name },
        };

        // Cada consulta va filtrada por el libro exacto del claim: un
        // resultado de otro libro corrompería el veredicto en silencio.
        let response = match self.http.post(self.retrieve_url.clone()).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Fallo de transporte recuperando evidencia: {e}");
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            warn!("El almacén de evidencia devolvió HTTP {}", response.status());
            return Vec::new();
        }

        match response.json::<Vec<RetrievedDoc>>().await {
            Ok(docs) => docs.into_iter().map(|d| d.text).collect(),
            Err(e) => {
                warn!("Respuesta no parseable del almacén de evidencia: {e}");
                Vec::new()
            }
        }
    }
}
