//! Orquestación de la verificación de claims contra el almacén de evidencia.
//!
//! Flujo por claim, lineal con un cortocircuito:
//!   1. Extracción de restricciones atómicas (con reserva determinista).
//!   2. Generación de dos consultas adversariales (apoyo / contradicción).
//!   3. Recuperación de evidencia, siempre filtrada por el libro del claim.
//!   4. Sin evidencia por ambos lados → veredicto consistente por defecto.
//!   5. Juicio del LLM sobre el bloque de evidencia acotado.
//!   6. Emisión del registro de veredicto, uno por claim, pase lo que pase.

use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::evidence_store::EvidenceRetriever;
use crate::llm::{JudgeVerdict, ReasoningService, QUERY_DELIMITER};
use crate::models::{
    ClaimRecord, Constraint, ConstraintKind, QueryPair, StageOutcome, Verdict, VerdictRecord,
};

/// Tope duro del bloque de evidencia enviado al juez, en caracteres.
pub const EVIDENCE_CHAR_CAP: usize = 4000;
/// Separador visible entre fragmentos dentro de un bloque de evidencia.
pub const EVIDENCE_SEPARATOR: &str = "\n---\n";
/// Marca añadida al final del bloque cuando ha habido recorte.
pub const TRUNCATION_MARKER: &str = "[EVIDENCE TRUNCATED]";

/// Rationale fija del cortocircuito sin evidencia: el silencio del libro
/// se trata como no-contradicción.
pub const NO_EVIDENCE_RATIONALE: &str =
    "No evidence found in the book for this claim; defaulting to consistent.";
/// Rationale fija cuando el juez no está disponible.
pub const JUDGE_UNAVAILABLE_RATIONALE: &str =
    "Consistency check unavailable; defaulting to consistent.";

/// Resultado completo de la verificación de un claim. Además del registro
/// emitido, conserva qué etapas degradaron a su valor por defecto.
#[derive(Debug)]
pub struct ClaimOutcome {
    pub record: VerdictRecord,
    pub constraints: StageOutcome<Vec<Constraint>>,
    pub queries: StageOutcome<QueryPair>,
    /// `None` cuando el claim se cortocircuitó por falta de evidencia.
    pub judgement: Option<StageOutcome<Verdict>>,
}

impl ClaimOutcome {
    pub fn short_circuited(&self) -> bool {
        self.judgement.is_none()
    }

    fn fallback_count(&self) -> usize {
        let mut count = usize::from(self.constraints.is_fallback());
        count += usize::from(self.queries.is_fallback());
        if let Some(j) = &self.judgement {
            count += usize::from(j.is_fallback());
        }
        count
    }
}

/// Resumen de una ejecución completa del verificador.
#[derive(Debug, Default)]
pub struct VerificationSummary {
    pub claims_processed: usize,
    pub consistent: usize,
    pub inconsistent: usize,
    pub short_circuits: usize,
    pub stage_fallbacks: usize,
}

impl std::fmt::Display for VerificationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Resumen: {} claims verificados ({} consistentes, {} inconsistentes), {} sin evidencia, {} degradaciones de etapa.",
            self.claims_processed, self.consistent, self.inconsistent, self.short_circuits, self.stage_fallbacks
        )
    }
}

/// Verifica un claim. Total: ningún fallo interno escapa de esta función;
/// cada etapa degrada a su valor por defecto documentado.
pub async fn verify_claim<R, E>(
    reasoning: &R,
    retriever: &E,
    claim: &ClaimRecord,
    k: usize,
) -> ClaimOutcome
where
    R: ReasoningService + ?Sized,
    E: EvidenceRetriever + ?Sized,
{
    // 1) Restricciones atómicas. Reserva: una única restricción general
    //    con caption + claim concatenados.
    let constraints = match reasoning
        .extract_constraints(&claim.character, &claim.claim, &claim.caption)
        .await
    {
        Ok(list) => StageOutcome::Success(list),
        Err(e) => {
            warn!("Extracción de restricciones caída para el claim {}: {e}", claim.id);
            StageOutcome::Fallback {
                value: vec![fallback_constraint(claim)],
                reason: "extractor de restricciones caído",
            }
        }
    };

    // 2) Par de consultas adversariales.
    let queries = match reasoning
        .generate_queries(&claim.character, &claim.claim, constraints.value())
        .await
    {
        Ok(raw) => split_queries(&raw),
        Err(e) => {
            warn!("Generación de consultas caída para el claim {}: {e}", claim.id);
            StageOutcome::Fallback {
                value: QueryPair {
                    support: format!("{} history", claim.character),
                    contradiction: format!("{} contradictions", claim.character),
                },
                reason: "generador de consultas caído",
            }
        }
    };

    // 3) Recuperación, cada lado filtrado por el libro exacto del claim.
    let pair = queries.value();
    let supporting = retriever.retrieve(&pair.support, k, &claim.book_name).await;
    let contradicting = retriever.retrieve(&pair.contradiction, k, &claim.book_name).await;

    // 4) Cortocircuito: el silencio total del libro no es un fallo, es un
    //    veredicto consistente con rationale fija.
    if supporting.is_empty() && contradicting.is_empty() {
        info!("Claim {}: sin evidencia recuperada; consistente por defecto", claim.id);
        return ClaimOutcome {
            record: VerdictRecord {
                id: claim.id.clone(),
                prediction: Verdict::Consistent.label(),
                rationale: NO_EVIDENCE_RATIONALE.to_string(),
            },
            constraints,
            queries,
            judgement: None,
        };
    }

    // 5) Juicio sobre el bloque combinado y acotado.
    let evidence = build_evidence_block(&supporting, &contradicting);
    let (bounded, truncated) = truncate_evidence(&evidence, EVIDENCE_CHAR_CAP);
    if truncated {
        info!("Claim {}: evidencia recortada a {EVIDENCE_CHAR_CAP} caracteres", claim.id);
    }

    let (judged, rationale) = match reasoning.judge(&claim.character, &claim.claim, &bounded).await
    {
        Ok(JudgeVerdict { prediction, rationale }) => {
            (StageOutcome::Success(Verdict::from_label(prediction)), rationale)
        }
        Err(e) => {
            // Sesgo conservador: con el juez caído no se marcan contradicciones.
            warn!("Juez no disponible para el claim {}: {e}", claim.id);
            (
                StageOutcome::Fallback { value: Verdict::Consistent, reason: "juez caído" },
                JUDGE_UNAVAILABLE_RATIONALE.to_string(),
            )
        }
    };

    // 6) Emisión.
    ClaimOutcome {
        record: VerdictRecord {
            id: claim.id.clone(),
            prediction: judged.value().label(),
            rationale,
        },
        constraints,
        queries,
        judgement: Some(judged),
    }
}

/// Verifica una lista de claims en orden, uno a uno. Devuelve exactamente
/// un veredicto por claim de entrada: ningún fallo cruza la frontera de un
/// claim.
pub async fn run_claims<R, E>(
    reasoning: &R,
    retriever: &E,
    claims: &[ClaimRecord],
    k: usize,
    delay_ms: u64,
) -> (Vec<VerdictRecord>, VerificationSummary)
where
    R: ReasoningService + ?Sized,
    E: EvidenceRetriever + ?Sized,
{
    let total = claims.len();
    let mut verdicts = Vec::with_capacity(total);
    let mut summary = VerificationSummary::default();

    for (index, claim) in claims.iter().enumerate() {
        info!("[{}/{}] Verificando claim {} ({})...", index + 1, total, claim.id, claim.book_name);
        let outcome = verify_claim(reasoning, retriever, claim, k).await;

        summary.claims_processed += 1;
        match Verdict::from_label(outcome.record.prediction) {
            Verdict::Consistent => summary.consistent += 1,
            Verdict::Inconsistent => summary.inconsistent += 1,
        }
        if outcome.short_circuited() {
            summary.short_circuits += 1;
        }
        summary.stage_fallbacks += outcome.fallback_count();
        verdicts.push(outcome.record);

        // Pausa fija entre claims para respetar los límites de tasa del
        // colaborador de razonamiento.
        if index + 1 < total && delay_ms > 0 {
            sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    (verdicts, summary)
}

fn fallback_constraint(claim: &ClaimRecord) -> Constraint {
    let description = if claim.caption.is_empty() {
        claim.claim.clone()
    } else {
        format!("{} {}", claim.caption, claim.claim)
    };
    Constraint { kind: ConstraintKind::General, description }
}

/// Trocea la salida cruda del generador de consultas. Sin separador, las
/// dos posiciones reciben la misma cadena completa.
fn split_queries(raw: &str) -> StageOutcome<QueryPair> {
    match raw.split_once(QUERY_DELIMITER) {
        Some((support, contradiction))
            if !support.trim().is_empty() && !contradiction.trim().is_empty() =>
        {
            StageOutcome::Success(QueryPair {
                support: support.trim().to_string(),
                contradiction: contradiction.trim().to_string(),
            })
        }
        _ => StageOutcome::Fallback {
            value: QueryPair {
                support: raw.trim().to_string(),
                contradiction: raw.trim().to_string(),
            },
            reason: "separador ausente en las consultas",
        },
    }
}

/// Bloque único de cargo y descargo con separadores visibles entre
/// fragmentos.
fn build_evidence_block(supporting: &[String], contradicting: &[String]) -> String {
    let render = |side: &[String]| {
        if side.is_empty() {
            "(no excerpts retrieved)".to_string()
        } else {
            side.join(EVIDENCE_SEPARATOR)
        }
    };
    format!(
        "SUPPORTING EXCERPTS:\n{}\n\nCONTRADICTING EXCERPTS:\n{}",
        render(supporting),
        render(contradicting)
    )
}

/// Recorte determinista en un límite de carácter, con marca visible.
fn truncate_evidence(text: &str, cap: usize) -> (String, bool) {
    if text.chars().count() <= cap {
        return (text.to_string(), false);
    }
    let mut bounded: String = text.chars().take(cap).collect();
    bounded.push('\n');
    bounded.push_str(TRUNCATION_MARKER);
    (bounded, true)
}
