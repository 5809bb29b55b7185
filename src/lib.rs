//! Verificador RAG de consistencia entre trasfondos de personajes y el
//! texto de una novela: segmentación del libro en chunks anotados con su
//! contexto narrativo, recuperación adversarial de evidencia filtrada por
//! libro y veredicto razonado por claim.

pub mod chunker;
pub mod claims;
pub mod config;
pub mod evidence_store;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod signals;
