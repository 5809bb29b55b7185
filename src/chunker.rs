//! Segmentación de una novela en chunks recuperables que conservan el
//! contexto narrativo. El escáner es secuencial y mantiene un único estado
//! mutable: la etiqueta del capítulo actual. Cada chunk emitido lleva una
//! cabecera con capítulo, años y señales temáticas, seguida del texto.

use uuid::Uuid;

use crate::models::Chunk;
use crate::signals;

/// Umbral de acumulación del buffer antes de emitir un chunk, en caracteres.
pub const CHUNK_CHAR_THRESHOLD: usize = 400;
/// Cola del buffer que se conserva tras cada emisión, como solape entre
/// chunks consecutivos.
pub const CHUNK_OVERLAP_CHARS: usize = 50;
/// Longitud mínima del residuo final para emitirlo como chunk de cierre;
/// por debajo se descarta.
pub const MIN_FINAL_CHUNK_CHARS: usize = 50;
/// Ventana inicial de un párrafo donde se busca el marcador de capítulo.
pub const HEADING_SCAN_CHARS: usize = 40;
/// Etiqueta de capítulo vigente hasta ver la primera cabecera.
pub const DEFAULT_CHAPTER: &str = "General Context";

/// Parámetros del escáner. Los valores por defecto son los de producción;
/// los tests pueden reducir los umbrales sin tocar el algoritmo.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerParams {
    pub chunk_threshold: usize,
    pub overlap_chars: usize,
    pub min_final_chars: usize,
}

impl Default for ChunkerParams {
    fn default() -> Self {
        Self {
            chunk_threshold: CHUNK_CHAR_THRESHOLD,
            overlap_chars: CHUNK_OVERLAP_CHARS,
            min_final_chars: MIN_FINAL_CHUNK_CHARS,
        }
    }
}

/// Segmenta el texto completo de una novela en chunks anotados, en orden
/// de lectura.
pub fn chunk_document(book_name: &str, text: &str) -> Vec<Chunk> {
    chunk_document_with(book_name, text, ChunkerParams::default())
}

pub fn chunk_document_with(book_name: &str, text: &str, params: ChunkerParams) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current_chapter = DEFAULT_CHAPTER.to_string();
    let mut buffer = String::new();

    // 1) Recorrido por párrafos (separados por línea en blanco), en orden.
    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        // 2) Una cabecera de capítulo actualiza el estado y no se acumula:
        //    es metadato, no narrativa.
        if is_chapter_heading(paragraph) {
            current_chapter = paragraph
                .lines()
                .next()
                .unwrap_or(paragraph)
                .trim()
                .to_string();
            continue;
        }

        // 3) Acumular el párrafo con un salto de línea separador.
        if !buffer.is_empty() {
            buffer.push('\n');
        }
        buffer.push_str(paragraph);

        // 4) Al alcanzar el umbral se emite el buffer completo y se
        //    conserva la cola como solape para el siguiente chunk.
        if buffer.chars().count() >= params.chunk_threshold {
            chunks.push(emit_chunk(book_name, &current_chapter, buffer.trim(), false));
            buffer = tail_chars(&buffer, params.overlap_chars).to_string();
        }
    }

    // 5) El residuo final solo se emite si supera la longitud mínima.
    let residual = buffer.trim();
    if residual.chars().count() > params.min_final_chars {
        chunks.push(emit_chunk(book_name, &current_chapter, residual, true));
    }

    chunks
}

/// Construye el chunk: cabecera `[SOURCE: … | Timeline: … | Actions: …]`
/// seguida del cuerpo. El chunk de cierre usa la misma construcción de
/// cabecera que el resto, más la marca de fin de documento.
fn emit_chunk(book_name: &str, chapter: &str, body: &str, is_final: bool) -> Chunk {
    let timeline = signals::extract_timeline(body);
    let themes = signals::extract_themes(body);

    let mut header = format!("[SOURCE: {chapter}");
    if let Some(t) = &timeline {
        header.push_str(" | ");
        header.push_str(t);
    }
    if let Some(t) = &themes {
        header.push_str(" | ");
        header.push_str(t);
    }
    if is_final {
        header.push_str(" | END OF DOCUMENT");
    }
    header.push(']');

    Chunk {
        id: Uuid::new_v4().to_string(),
        book_name: book_name.to_string(),
        chapter: chapter.to_string(),
        timeline,
        themes,
        text: format!("{header}\n{body}"),
    }
}

/// ¿Contiene la ventana inicial del párrafo el marcador "CHAPTER"
/// (sin distinguir mayúsculas)?
fn is_chapter_heading(paragraph: &str) -> bool {
    let head: String = paragraph.chars().take(HEADING_SCAN_CHARS).collect();
    head.to_uppercase().contains("CHAPTER")
}

/// Últimos `n` caracteres de `s`, respetando límites UTF-8.
fn tail_chars(s: &str, n: usize) -> &str {
    let total = s.chars().count();
    if total <= n {
        return s;
    }
    match s.char_indices().nth(total - n) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
