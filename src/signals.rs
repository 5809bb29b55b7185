//! Extracción determinista de señales narrativas de un fragmento de texto:
//! marcadores temporales (años) y marcadores temáticos (acciones/emociones).
//! Funciones puras; la ausencia de señales no es un error.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Vocabulario fijo de verbos de acción relevantes en narrativa.
const ACTION_WORDS: [&str; 12] = [
    "sail", "travel", "fight", "escape", "betray", "marry",
    "love", "kill", "die", "return", "steal", "rescue",
];

/// Vocabulario fijo de palabras de emoción.
const EMOTION_WORDS: [&str; 10] = [
    "fear", "anger", "joy", "sorrow", "hate",
    "hope", "despair", "jealous", "grief", "shame",
];

fn year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([12]\d{3})\b").expect("regex de años inválida"))
}

/// Devuelve los años plausibles (1000–2999) mencionados en el texto,
/// deduplicados y en orden ascendente, como "Timeline: 1815, 1821".
/// `None` si el texto no menciona ningún año.
pub fn extract_timeline(text: &str) -> Option<String> {
    let years: BTreeSet<u32> = year_regex()
        .captures_iter(text)
        .filter_map(|cap| cap[1].parse::<u32>().ok())
        .filter(|y| (1000..=2999).contains(y))
        .collect();

    if years.is_empty() {
        return None;
    }

    let listed: Vec<String> = years.iter().map(u32::to_string).collect();
    Some(format!("Timeline: {}", listed.join(", ")))
}

/// Devuelve las acciones y emociones del vocabulario fijo que aparecen
/// como subcadena (sin distinguir mayúsculas) en el texto, p. ej.
/// "Actions: love, sail | Emotions: fear". `None` si no hay ninguna.
pub fn extract_themes(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();

    let actions: Vec<&str> = ACTION_WORDS
        .iter()
        .copied()
        .filter(|w| lowered.contains(w))
        .collect();
    let emotions: Vec<&str> = EMOTION_WORDS
        .iter()
        .copied()
        .filter(|w| lowered.contains(w))
        .collect();

    if actions.is_empty() && emotions.is_empty() {
        return None;
    }

    let mut parts = Vec::new();
    if !actions.is_empty() {
        parts.push(format!("Actions: {}", actions.join(", ")));
    }
    if !emotions.is_empty() {
        parts.push(format!("Emotions: {}", emotions.join(", ")));
    }
    Some(parts.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_deduplica_y_ordena_ascendente() {
        let text = "In 1821 he returned. He had left in 1815, and again in 1815.";
        assert_eq!(
            extract_timeline(text),
            Some("Timeline: 1815, 1821".to_string())
        );
    }

    #[test]
    fn timeline_ignora_numeros_fuera_de_rango() {
        assert_eq!(extract_timeline("He owned 3000 ducats and 0999 coins."), None);
        assert_eq!(extract_timeline("Sin años aquí."), None);
    }

    #[test]
    fn timeline_no_corta_numeros_largos() {
        // 18150 no es un año; no debe aportar "1815".
        assert_eq!(extract_timeline("The ship logged 18150 leagues."), None);
    }

    #[test]
    fn themes_detecta_acciones_y_emociones_sin_mayusculas() {
        let text = "The sailor LOVED the sea and feared nothing.";
        assert_eq!(
            extract_themes(text),
            Some("Actions: love | Emotions: fear".to_string())
        );
    }

    #[test]
    fn themes_solo_emociones() {
        assert_eq!(
            extract_themes("Hope and despair in equal measure."),
            Some("Emotions: hope, despair".to_string())
        );
    }

    #[test]
    fn themes_vacio_cuando_no_hay_vocabulario() {
        assert_eq!(extract_themes("A quiet afternoon of reading."), None);
    }
}
