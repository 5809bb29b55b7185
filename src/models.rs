//! Modelos de dominio (claims de entrada, chunks de evidencia y veredictos).

use serde::{Deserialize, Serialize};

/// Representa una fila del CSV de entrada: un claim de trasfondo
/// a verificar contra el texto de una novela.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaimRecord {
    pub id: String,
    pub book_name: String,
    pub character: String,
    pub claim: String,
    /// Contexto adicional opcional; ausente en muchas filas.
    #[serde(default)]
    pub caption: String,
}

/// Fila del CSV de salida: una por claim de entrada, siempre.
#[derive(Debug, Clone, Serialize)]
pub struct VerdictRecord {
    pub id: String,
    pub prediction: u8,
    pub rationale: String,
}

/// Etiqueta canónica del veredicto. En los CSV y en el contrato con el
/// LLM se codifica como entero: 0 = inconsistente, 1 = consistente.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Inconsistent,
    Consistent,
}

impl Verdict {
    pub fn label(self) -> u8 {
        match self {
            Verdict::Inconsistent => 0,
            Verdict::Consistent => 1,
        }
    }

    pub fn from_label(label: u8) -> Self {
        if label == 0 {
            Verdict::Inconsistent
        } else {
            Verdict::Consistent
        }
    }
}

/// Categoría de una restricción atómica extraída de un claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintKind {
    Physical,
    Temporal,
    Relational,
    General,
}

impl ConstraintKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Physical => "physical",
            Self::Temporal => "temporal",
            Self::Relational => "relational",
            Self::General => "general",
        }
    }

    /// Cualquier categoría desconocida degrada a `General`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "physical" => Self::Physical,
            "temporal" => Self::Temporal,
            "relational" => Self::Relational,
            _ => Self::General,
        }
    }
}

/// Hecho atómico derivado de un claim por el colaborador de razonamiento.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub description: String,
}

/// Par de consultas adversariales: una busca corroborar y la otra refutar.
/// Se regenera por claim; nunca se cachea entre claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPair {
    pub support: String,
    pub contradiction: String,
}

/// Resultado de una etapa del pipeline: o el colaborador respondió, o se
/// aplicó el valor por defecto documentado. Las dos variantes llevan un
/// valor utilizable; la distinción existe para que los tests y el resumen
/// de ejecución puedan separar "respondió" de "degradó en silencio".
#[derive(Debug, Clone)]
pub enum StageOutcome<T> {
    Success(T),
    Fallback { value: T, reason: &'static str },
}

impl<T> StageOutcome<T> {
    pub fn value(&self) -> &T {
        match self {
            StageOutcome::Success(v) => v,
            StageOutcome::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            StageOutcome::Success(v) => v,
            StageOutcome::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, StageOutcome::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<&'static str> {
        match self {
            StageOutcome::Success(_) => None,
            StageOutcome::Fallback { reason, .. } => Some(reason),
        }
    }
}

/// Unidad de evidencia recuperable: texto narrativo con su cabecera de
/// contexto ya incrustada. Inmutable una vez emitida por el chunker.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub id: String,
    pub book_name: String,
    pub chapter: String,
    /// Años detectados en el cuerpo, p. ej. "Timeline: 1815, 1821".
    pub timeline: Option<String>,
    /// Acciones y emociones detectadas en el cuerpo.
    pub themes: Option<String>,
    /// Cabecera + texto narrativo. Nunca se separan tras la emisión.
    pub text: String,
}
