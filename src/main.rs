use std::path::Path;

use narrative_rag_verifier::{
    claims, config, evidence_store::EvidenceStoreClient, ingest, llm, pipeline,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env().expect("Error al cargar la configuración");
    info!("Ejecución iniciada a las {}", chrono::Utc::now().to_rfc3339());

    // 3. Cliente del almacén de evidencia
    let store = EvidenceStoreClient::new(&cfg)
        .expect("Error creando el cliente del almacén de evidencia");

    // 4. Indexar las novelas, si hay directorio; si no, se asume que el
    //    índice ya está poblado de una ejecución anterior.
    let books_dir = Path::new(&cfg.books_dir);
    if books_dir.is_dir() {
        match ingest::ingest_directory(&store, books_dir).await {
            Ok(summary) => info!("Indexación completada. {}", summary),
            Err(err) => warn!("La indexación falló ({err}); se continúa con el índice existente."),
        }
    } else {
        warn!(
            "Directorio de novelas no encontrado ({}); se continúa con el índice existente.",
            cfg.books_dir
        );
    }

    // 5. Inicializar gestor de LLMs
    let llm_manager = llm::LlmManager::from_config(&cfg).expect("Error inicializando LLM Manager");

    // 6. Claims de entrada. Su ausencia es la única condición fatal de la
    //    ejecución: sin claims no hay nada que verificar.
    let claim_list = claims::read_claims(Path::new(&cfg.claims_csv))
        .expect("No se pudo leer el CSV de claims");

    // 7. Verificación secuencial, claim a claim
    let (verdicts, summary) = pipeline::run_claims(
        &llm_manager,
        &store,
        &claim_list,
        cfg.retrieval_k,
        cfg.claim_delay_ms,
    )
    .await;

    // 8. Salida: exactamente una fila por claim de entrada
    claims::write_verdicts(Path::new(&cfg.output_csv), &verdicts)
        .expect("Error escribiendo el CSV de veredictos");

    info!("✅ {}", summary);
}
