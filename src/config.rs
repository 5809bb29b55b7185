//! Carga y gestión de configuración de la aplicación (almacén de evidencia + LLM).

use anyhow::{anyhow, Result};
use std::env;

#[derive(Clone, Debug)]
pub enum LlmProvider {
    OpenAI,
    Gemini,
    Ollama,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(anyhow!("Proveedor LLM no soportado: {other}")),
        }
    }
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// URL base del servicio de búsqueda por similitud.
    pub evidence_store_url: String,
    /// Directorio con las novelas a indexar (txt / pdf).
    pub books_dir: String,
    /// CSV de claims de entrada y CSV de veredictos de salida.
    pub claims_csv: String,
    pub output_csv: String,

    pub llm_provider: LlmProvider,
    pub llm_chat_model: String,

    /// Número de fragmentos recuperados por consulta.
    pub retrieval_k: usize,
    /// Timeout duro de cada llamada de recuperación, en segundos.
    pub retrieve_timeout_secs: u64,
    /// Pausa entre claims para respetar los límites de tasa del proveedor.
    pub claim_delay_ms: u64,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let evidence_store_url = env::var("EVIDENCE_STORE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());
        let books_dir = env::var("BOOKS_DIR").unwrap_or_else(|_| "./data".to_string());
        let claims_csv = env::var("CLAIMS_CSV").unwrap_or_else(|_| "./claims.csv".to_string());
        let output_csv = env::var("OUTPUT_CSV").unwrap_or_else(|_| "./verdicts.csv".to_string());

        let llm_provider_str =
            env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let llm_provider = LlmProvider::from_str(&llm_provider_str)?;
        let llm_chat_model =
            env::var("LLM_CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let retrieval_k = parse_env_or("RETRIEVAL_K", 5)?;
        let retrieve_timeout_secs = parse_env_or("RETRIEVE_TIMEOUT_SECS", 10)?;
        let claim_delay_ms = parse_env_or("CLAIM_DELAY_MS", 500)?;

        Ok(Self {
            evidence_store_url,
            books_dir,
            claims_csv,
            output_csv,
            llm_provider,
            llm_chat_model,
            retrieval_k,
            retrieve_timeout_secs,
            claim_delay_ms,
        })
    }
}

fn parse_env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| anyhow!("Valor no numérico en {name}: '{raw}'")),
        Err(_) => Ok(default),
    }
}
