//! Abstracción sobre Rig para las etapas de razonamiento del verificador.
//! De momento se implementa OpenAI; Gemini/Ollama quedan preparados para el futuro.
//!
//! Cada etapa devuelve `Result`: el orquestador decide el valor por defecto
//! documentado cuando una llamada falla o la respuesta no es parseable.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rig::completion::Prompt;
use serde::Deserialize;
use tracing::warn;

use crate::config::{AppConfig, LlmProvider};
use crate::models::{Constraint, ConstraintKind};

/// Separador fijo entre la consulta de apoyo y la de contradicción en la
/// salida de la etapa de generación de consultas.
pub const QUERY_DELIMITER: &str = "|||";

/// Veredicto estructurado del juez: 0 = inconsistente, 1 = consistente.
#[derive(Debug, Clone, Deserialize)]
pub struct JudgeVerdict {
    pub prediction: u8,
    pub rationale: String,
}

/// Contrato de las etapas de razonamiento. El orquestador trabaja contra
/// este trait; los tests lo implementan sin red.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Descompone un claim en restricciones atómicas.
    async fn extract_constraints(
        &self,
        character: &str,
        claim: &str,
        caption: &str,
    ) -> Result<Vec<Constraint>>;

    /// Genera el texto crudo con las dos consultas adversariales separadas
    /// por `QUERY_DELIMITER`. El troceo lo hace el orquestador.
    async fn generate_queries(
        &self,
        character: &str,
        claim: &str,
        constraints: &[Constraint],
    ) -> Result<String>;

    /// Emite el veredicto de consistencia sobre el bloque de evidencia.
    async fn judge(&self, character: &str, claim: &str, evidence: &str) -> Result<JudgeVerdict>;
}

// --- Estructuras de la respuesta JSON del extractor de restricciones ---

#[derive(Debug, Clone, Deserialize)]
struct JsonConstraint {
    #[serde(rename = "type")]
    kind: String,
    description: String,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonConstraintList {
    constraints: Vec<JsonConstraint>,
}

/// Gestor de LLMs para las etapas de razonamiento.
#[derive(Debug, Clone)]
pub struct LlmManager {
    pub provider: LlmProvider,
    pub chat_model: String,
}

impl LlmManager {
    /// Construye el manager a partir de la configuración.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        Ok(Self {
            provider: cfg.llm_provider.clone(),
            chat_model: cfg.llm_chat_model.clone(),
        })
    }

    // ---------------------------------------------------------------------
    // LLAMADA BASE
    // ---------------------------------------------------------------------

    async fn complete(&self, preamble: &str, user: &str) -> Result<String> {
        match self.provider {
            LlmProvider::OpenAI => self.complete_with_openai(preamble, user).await,
            ref other => Err(anyhow!(
                "Proveedor LLM {:?} aún no implementado para el verificador",
                other
            )),
        }
    }

    async fn complete_with_openai(&self, preamble: &str, user: &str) -> Result<String> {
        use rig::providers::openai;
        // Trait para client.agent(...)
        use rig::client::CompletionClient as _;

        let client = openai::Client::from_env();

        // Modelo de chat por defecto si no se ha configurado otro
        let model_name = if self.chat_model.is_empty() {
            "gpt-4o-mini"
        } else {
            self.chat_model.as_str()
        };

        let agent = client.agent(model_name).preamble(preamble).build();
        let answer = agent.prompt(user).await?;
        Ok(answer)
    }
}

#[async_trait]
impl ReasoningService for LlmManager {
    async fn extract_constraints(
        &self,
        character: &str,
        claim: &str,
        caption: &str,
    ) -> Result<Vec<Constraint>> {
        const CONSTRAINTS_PROMPT: &str = r#"
You decompose a character backstory claim into atomic, checkable constraints.
Classify each constraint as one of: 'physical', 'temporal', 'relational', 'general'.

The output MUST be a single valid JSON object with one key, "constraints":
a list of objects, each with "type" and "description".
If the claim cannot be decomposed, return a single 'general' constraint.
No explanations, only the JSON.
"#;

        let user = format!(
            "CHARACTER: {character}\nCLAIM: \"{claim}\"\nCAPTION: \"{caption}\""
        );
        let response = self.complete(CONSTRAINTS_PROMPT, &user).await?;
        parse_constraints(&response)
    }

    async fn generate_queries(
        &self,
        character: &str,
        claim: &str,
        constraints: &[Constraint],
    ) -> Result<String> {
        const QUERIES_PROMPT: &str = r#"
You write semantic search queries against the full text of a novel.
Given a backstory claim and its constraints, output EXACTLY two queries
separated by '|||':
- the first oriented to find passages SUPPORTING the claim,
- the second oriented to find passages CONTRADICTING it.
Output only the two queries, nothing else.
"#;

        let rendered: Vec<String> = constraints
            .iter()
            .map(|c| format!("- [{}] {}", c.kind.as_str(), c.description))
            .collect();
        let user = format!(
            "CHARACTER: {character}\nCLAIM: \"{claim}\"\nCONSTRAINTS:\n{}",
            rendered.join("\n")
        );
        self.complete(QUERIES_PROMPT, &user).await
    }

    async fn judge(&self, character: &str, claim: &str, evidence: &str) -> Result<JudgeVerdict> {
        const JUDGE_PROMPT: &str = r#"
You are a rigorous Consistency Checker for a novel.
Your job is to validate a 'Backstory Claim' against 'Book Excerpts'.

Rules:
1. If the claim explicitly contradicts a physical or temporal fact in the
   excerpts, output prediction 0.
2. If the claim asserts a major canon-level event that is wholly absent from
   the excerpts, output prediction 0 (argument from silence).
3. If the claim concerns a minor or private detail that the excerpts simply
   do not mention, output prediction 1 (absence of evidence for subjective
   claims is not evidence of absence).
4. If the excerpts support the claim, or the claim is compatible with events
   outside the narrated text, output prediction 1.
5. You MUST quote the excerpt text that supports your decision.

The output MUST be a single valid JSON object with "prediction" (0 or 1)
and "rationale" (string). No explanations outside the JSON.
"#;

        let user = format!(
            "BACKSTORY CLAIM: \"{claim}\" (about {character})\n\nEVIDENCE FROM NOVEL:\n{evidence}\n\nTask:\n1. Analyze the evidence.\n2. Output a JSON with: \"prediction\" (0 or 1) and \"rationale\" (string)."
        );
        let response = self.complete(JUDGE_PROMPT, &user).await?;
        parse_judge(&response)
    }
}

// ---------------------------------------------------------------------
// PARSEO DE RESPUESTAS
// ---------------------------------------------------------------------

/// Limpia la respuesta del LLM para quedarse solo con el bloque JSON.
fn clean_json_block(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

fn parse_constraints(response: &str) -> Result<Vec<Constraint>> {
    let cleaned = clean_json_block(response);
    let parsed: JsonConstraintList = serde_json::from_str(cleaned).map_err(|e| {
        warn!("Respuesta de restricciones no parseable: {e}. Respuesta LLM: '{response}'");
        anyhow!("JSON de restricciones inválido: {e}")
    })?;

    if parsed.constraints.is_empty() {
        return Err(anyhow!("El extractor no devolvió ninguna restricción"));
    }

    Ok(parsed
        .constraints
        .into_iter()
        .map(|c| Constraint {
            kind: ConstraintKind::from_str_lossy(&c.kind),
            description: c.description,
        })
        .collect())
}

fn parse_judge(response: &str) -> Result<JudgeVerdict> {
    let cleaned = clean_json_block(response);
    let verdict: JudgeVerdict = serde_json::from_str(cleaned).map_err(|e| {
        warn!("Veredicto del juez no parseable: {e}. Respuesta LLM: '{response}'");
        anyhow!("JSON del juez inválido: {e}")
    })?;

    if verdict.prediction > 1 {
        return Err(anyhow!(
            "Predicción fuera de rango: {} (se esperaba 0 o 1)",
            verdict.prediction
        ));
    }
    if verdict.rationale.is_empty() {
        return Err(anyhow!("Veredicto sin rationale"));
    }
    Ok(verdict)
}
