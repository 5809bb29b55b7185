//! Tests de extremo a extremo del pipeline de verificación, con dobles del
//! colaborador de razonamiento y del almacén de evidencia, y con un
//! servidor HTTP simulado para el adaptador de recuperación.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use narrative_rag_verifier::config::{AppConfig, LlmProvider};
use narrative_rag_verifier::evidence_store::{EvidenceRetriever, EvidenceStoreClient};
use narrative_rag_verifier::llm::{JudgeVerdict, ReasoningService};
use narrative_rag_verifier::models::{ClaimRecord, Constraint, ConstraintKind, Verdict};
use narrative_rag_verifier::pipeline::{
    self, JUDGE_UNAVAILABLE_RATIONALE, NO_EVIDENCE_RATIONALE,
};
use narrative_rag_verifier::{chunker, claims};

// --- Dobles de prueba ---

#[derive(Clone, Copy, Default, PartialEq)]
enum JudgeMode {
    #[default]
    Consistent,
    Inconsistent,
    Fail,
}

#[derive(Default)]
struct MockReasoning {
    fail_constraints: bool,
    fail_queries: bool,
    queries_raw: Option<String>,
    judge_mode: JudgeMode,
    judge_evidence: Mutex<Vec<String>>,
}

#[async_trait]
impl ReasoningService for MockReasoning {
    async fn extract_constraints(
        &self,
        _character: &str,
        claim: &str,
        _caption: &str,
    ) -> Result<Vec<Constraint>> {
        if self.fail_constraints {
            return Err(anyhow!("extractor no disponible"));
        }
        Ok(vec![Constraint {
            kind: ConstraintKind::General,
            description: claim.to_string(),
        }])
    }

    async fn generate_queries(
        &self,
        _character: &str,
        _claim: &str,
        _constraints: &[Constraint],
    ) -> Result<String> {
        if self.fail_queries {
            return Err(anyhow!("generador no disponible"));
        }
        Ok(self
            .queries_raw
            .clone()
            .unwrap_or_else(|| "supporting passages ||| contradicting passages".to_string()))
    }

    async fn judge(&self, _character: &str, _claim: &str, evidence: &str) -> Result<JudgeVerdict> {
        self.judge_evidence.lock().unwrap().push(evidence.to_string());
        match self.judge_mode {
            JudgeMode::Fail => Err(anyhow!("fallo de transporte")),
            JudgeMode::Consistent => Ok(JudgeVerdict {
                prediction: 1,
                rationale: "supported by the excerpts".to_string(),
            }),
            JudgeMode::Inconsistent => Ok(JudgeVerdict {
                prediction: 0,
                rationale: "a major event is absent from the excerpts".to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct MockRetriever {
    per_book: HashMap<String, Vec<String>>,
    calls: Mutex<Vec<(String, usize, String)>>,
}

#[async_trait]
impl EvidenceRetriever for MockRetriever {
    async fn retrieve(&self, query: &str, k: usize, book_name: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), k, book_name.to_string()));
        self.per_book.get(book_name).cloned().unwrap_or_default()
    }
}

fn claim(id: &str, book: &str, character: &str, text: &str) -> ClaimRecord {
    ClaimRecord {
        id: id.to_string(),
        book_name: book.to_string(),
        character: character.to_string(),
        claim: text.to_string(),
        caption: String::new(),
    }
}

// --- Orquestador ---

#[tokio::test]
async fn sin_evidencia_se_cortocircuita_a_consistente() {
    let reasoning = MockReasoning::default();
    let retriever = MockRetriever::default();
    let c = claim("c1", "monte_cristo", "Edmond Dantes", "He secretly kept a journal");

    let outcome = pipeline::verify_claim(&reasoning, &retriever, &c, 5).await;

    assert!(outcome.short_circuited());
    assert_eq!(outcome.record.prediction, Verdict::Consistent.label());
    assert_eq!(outcome.record.rationale, NO_EVIDENCE_RATIONALE);
    // El juez no debe haberse invocado.
    assert!(reasoning.judge_evidence.lock().unwrap().is_empty());
}

#[tokio::test]
async fn el_juez_recibe_la_evidencia_recuperada() {
    // Escenario de argumento por silencio: la evidencia no menciona ni la
    // muerte ni 1820; la política del juez marca inconsistente.
    let reasoning = MockReasoning { judge_mode: JudgeMode::Inconsistent, ..Default::default() };
    let mut retriever = MockRetriever::default();
    retriever.per_book.insert(
        "monte_cristo".to_string(),
        vec!["He walked the quays of Marseille at dawn.".to_string()],
    );
    let c = claim("c2", "monte_cristo", "Character X", "Character X died in 1820");

    let outcome = pipeline::verify_claim(&reasoning, &retriever, &c, 5).await;

    assert_eq!(outcome.record.prediction, Verdict::Inconsistent.label());
    let seen = reasoning.judge_evidence.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].contains("He walked the quays of Marseille"));
    assert!(seen[0].contains("SUPPORTING EXCERPTS:"));
}

#[tokio::test]
async fn la_caida_del_juez_degrada_a_consistente_y_la_ejecucion_sigue() {
    let reasoning = MockReasoning { judge_mode: JudgeMode::Fail, ..Default::default() };
    let mut retriever = MockRetriever::default();
    retriever.per_book.insert(
        "monte_cristo".to_string(),
        vec!["Some excerpt about the character.".to_string()],
    );
    let batch = vec![
        claim("c1", "monte_cristo", "Edmond Dantes", "He hated the ocean"),
        claim("c2", "monte_cristo", "Edmond Dantes", "He was a sailor"),
    ];

    let (verdicts, summary) = pipeline::run_claims(&reasoning, &retriever, &batch, 5, 0).await;

    assert_eq!(verdicts.len(), 2);
    for verdict in &verdicts {
        assert_eq!(verdict.prediction, Verdict::Consistent.label());
        assert_eq!(verdict.rationale, JUDGE_UNAVAILABLE_RATIONALE);
    }
    assert_eq!(summary.claims_processed, 2);
    assert_eq!(summary.stage_fallbacks, 2);
}

#[tokio::test]
async fn una_fila_de_salida_por_claim_de_entrada() {
    let reasoning = MockReasoning::default();
    let mut retriever = MockRetriever::default();
    // Solo un libro tiene evidencia; el resto cortocircuita.
    retriever.per_book.insert(
        "monte_cristo".to_string(),
        vec!["An excerpt.".to_string()],
    );
    let batch = vec![
        claim("c1", "monte_cristo", "Edmond Dantes", "He was a sailor"),
        claim("c2", "moby_dick", "Ishmael", "He never went to sea"),
        claim("c3", "monte_cristo", "Mercedes", "She lived in the Catalans"),
    ];

    let (verdicts, summary) = pipeline::run_claims(&reasoning, &retriever, &batch, 3, 0).await;

    assert_eq!(verdicts.len(), batch.len());
    let ids: Vec<&str> = verdicts.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);
    assert_eq!(summary.short_circuits, 1);
}

#[tokio::test]
async fn toda_recuperacion_va_filtrada_por_el_libro_del_claim() {
    let reasoning = MockReasoning::default();
    let retriever = MockRetriever::default();
    let batch = vec![
        claim("c1", "monte_cristo", "Edmond Dantes", "He was a sailor"),
        claim("c2", "moby_dick", "Ishmael", "He sailed on the Pequod"),
    ];

    pipeline::run_claims(&reasoning, &retriever, &batch, 4, 0).await;

    let calls = retriever.calls.lock().unwrap();
    // Dos consultas (apoyo y contradicción) por claim.
    assert_eq!(calls.len(), 4);
    assert!(calls[..2].iter().all(|(_, k, book)| *k == 4 && book == "monte_cristo"));
    assert!(calls[2..].iter().all(|(_, k, book)| *k == 4 && book == "moby_dick"));
}

#[tokio::test]
async fn las_etapas_caidas_usan_sus_valores_de_reserva() {
    let reasoning = MockReasoning {
        fail_constraints: true,
        fail_queries: true,
        ..Default::default()
    };
    let retriever = MockRetriever::default();
    let c = claim("c1", "monte_cristo", "Edmond Dantes", "He was a sailor");

    let outcome = pipeline::verify_claim(&reasoning, &retriever, &c, 5).await;

    assert!(outcome.constraints.is_fallback());
    assert_eq!(outcome.constraints.value().len(), 1);
    assert_eq!(outcome.constraints.value()[0].kind, ConstraintKind::General);
    assert!(outcome.queries.is_fallback());
    assert_eq!(outcome.queries.value().support, "Edmond Dantes history");
    assert_eq!(outcome.queries.value().contradiction, "Edmond Dantes contradictions");
}

#[tokio::test]
async fn la_salida_sin_separador_duplica_la_consulta() {
    let reasoning = MockReasoning {
        queries_raw: Some("one single query without delimiter".to_string()),
        ..Default::default()
    };
    let retriever = MockRetriever::default();
    let c = claim("c1", "monte_cristo", "Edmond Dantes", "He was a sailor");

    let outcome = pipeline::verify_claim(&reasoning, &retriever, &c, 5).await;

    assert!(outcome.queries.is_fallback());
    assert_eq!(outcome.queries.value().support, outcome.queries.value().contradiction);
}

// --- Adaptador HTTP del almacén de evidencia ---

mod store_http {
    use super::*;
    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};

    type SeenBodies = Arc<Mutex<Vec<serde_json::Value>>>;

    async fn spawn_store(retrieve_status: u16) -> (String, SeenBodies) {
        let seen: SeenBodies = Arc::new(Mutex::new(Vec::new()));

        async fn retrieve_handler(
            State((seen, status)): State<(SeenBodies, u16)>,
            Json(body): Json<serde_json::Value>,
        ) -> (axum::http::StatusCode, Json<serde_json::Value>) {
            seen.lock().unwrap().push(body);
            let code = axum::http::StatusCode::from_u16(status).unwrap();
            let docs = serde_json::json!([
                {"text": "[SOURCE: CHAPTER I]\nHe was a sailor.", "score": 0.9},
                {"text": "[SOURCE: CHAPTER II]\nHe loved Mercedes.", "score": 0.7}
            ]);
            (code, Json(docs))
        }

        async fn ingest_handler(
            State((seen, _)): State<(SeenBodies, u16)>,
            Json(body): Json<serde_json::Value>,
        ) -> Json<serde_json::Value> {
            seen.lock().unwrap().push(body);
            Json(serde_json::json!({"indexed": true}))
        }

        let app = Router::new()
            .route("/v1/retrieve", post(retrieve_handler))
            .route("/v1/ingest", post(ingest_handler))
            .with_state((seen.clone(), retrieve_status));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), seen)
    }

    fn test_config(url: &str) -> AppConfig {
        AppConfig {
            evidence_store_url: url.to_string(),
            books_dir: "./data".to_string(),
            claims_csv: "./claims.csv".to_string(),
            output_csv: "./verdicts.csv".to_string(),
            llm_provider: LlmProvider::OpenAI,
            llm_chat_model: String::new(),
            retrieval_k: 5,
            retrieve_timeout_secs: 2,
            claim_delay_ms: 0,
        }
    }

    #[tokio::test]
    async fn recupera_textos_y_propaga_el_filtro_de_libro() {
        let (url, seen) = spawn_store(200).await;
        let client = EvidenceStoreClient::new(&test_config(&url)).unwrap();

        let texts = client.retrieve("sailor who loved the sea", 3, "monte_cristo").await;

        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("He was a sailor."));

        let bodies = seen.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["k"], 3);
        assert_eq!(bodies[0]["filters"]["book_name"], "monte_cristo");
    }

    #[tokio::test]
    async fn una_respuesta_no_exitosa_degrada_a_lista_vacia() {
        let (url, _seen) = spawn_store(500).await;
        let client = EvidenceStoreClient::new(&test_config(&url)).unwrap();

        let texts = client.retrieve("anything", 5, "monte_cristo").await;
        assert!(texts.is_empty());
    }

    #[tokio::test]
    async fn un_almacen_inalcanzable_degrada_a_lista_vacia() {
        // Puerto sin servicio: el timeout corto evita que el test se cuelgue.
        let client = EvidenceStoreClient::new(&test_config("http://127.0.0.1:9")).unwrap();
        let texts = client.retrieve("anything", 5, "monte_cristo").await;
        assert!(texts.is_empty());
    }

    #[tokio::test]
    async fn la_ingesta_envia_los_chunks_con_su_libro() {
        let (url, seen) = spawn_store(200).await;
        let client = EvidenceStoreClient::new(&test_config(&url)).unwrap();

        let text = "CHAPTER I\n\n".to_string()
            + &"A long opening paragraph about the harbour and the sea. ".repeat(10);
        let chunks = chunker::chunk_document("monte_cristo", &text);
        assert!(!chunks.is_empty());

        let indexed = client.ingest_chunks(&chunks).await.unwrap();
        assert_eq!(indexed, chunks.len());

        let bodies = seen.lock().unwrap();
        let sent = &bodies[0]["chunks"];
        assert_eq!(sent.as_array().unwrap().len(), chunks.len());
        assert_eq!(sent[0]["book_name"], "monte_cristo");
        assert_eq!(sent[0]["chapter"], "CHAPTER I");
    }
}

// --- Flujo CSV completo ---

#[tokio::test]
async fn el_recuento_de_filas_se_conserva_del_csv_de_entrada_al_de_salida() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("claims.csv");
    let output = dir.path().join("verdicts.csv");
    std::fs::write(
        &input,
        "id,book_name,character,claim,caption\n\
         c1,monte_cristo,Edmond Dantes,He was a sailor,\n\
         c2,monte_cristo,Edmond Dantes,He was born in New York,\n\
         c3,moby_dick,Ishmael,He signed on a whaler,\n",
    )
    .unwrap();

    let batch = claims::read_claims(&input).unwrap();
    let reasoning = MockReasoning::default();
    let retriever = MockRetriever::default();
    let (verdicts, _) = pipeline::run_claims(&reasoning, &retriever, &batch, 5, 0).await;
    claims::write_verdicts(&output, &verdicts).unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    // Cabecera + una fila por claim de entrada.
    assert_eq!(written.trim().lines().count(), batch.len() + 1);
}
