//! # Leitura de Manuscritos
//!
//! O manuscrito chega como texto colado ou como arquivo enviado. O formato do
//! arquivo é decidido pela extensão:
//!
//! | Extensão        | Leitura                                              |
//! |-----------------|------------------------------------------------------|
//! | `.docx`, `.doc` | Word (OOXML) via `docx-rs`                           |
//! | `.txt`          | UTF-8 (BOM removido)                                 |
//! | outras          | [`IngestError::UnsupportedFormat`]                   |
//!
//! No Word o corpo é percorrido em ordem de documento: o texto de cada
//! parágrafo e, em cada tabela, cada parágrafo de cada célula, linha a linha.
//! Todos os trechos são unidos com `", "`.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::IngestError;

/// Separador entre trechos de um documento Word.
pub const PIECE_SEPARATOR: &str = ", ";

/// Formato reconhecido de um arquivo enviado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Word,
    PlainText,
}

impl DocumentFormat {
    /// Formato pela extensão (sem diferenciar maiúsculas).
    pub fn from_name(name: &str) -> Result<Self, IngestError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("docx") | Some("doc") => Ok(DocumentFormat::Word),
            Some("txt") => Ok(DocumentFormat::PlainText),
            _ => Err(IngestError::UnsupportedFormat(name.to_string())),
        }
    }

    /// Tipo MIME usado ao anexar o original.
    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Word => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentFormat::PlainText => "text/plain; charset=utf-8",
        }
    }
}

/// A entrada de uma execução do pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManuscriptInput {
    Text(String),
    Document { name: String, bytes: Vec<u8> },
}

impl ManuscriptInput {
    pub fn text(text: impl Into<String>) -> Self {
        ManuscriptInput::Text(text.into())
    }

    pub fn document(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        ManuscriptInput::Document {
            name: name.into(),
            bytes,
        }
    }

    /// Lê um arquivo do disco, mantendo o nome para o anexo.
    pub fn read_path(path: &Path) -> Result<Self, IngestError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| IngestError::UnsupportedFormat(path.display().to_string()))?;
        DocumentFormat::from_name(name)?;
        let bytes = std::fs::read(path)?;
        Ok(Self::document(name, bytes))
    }

    /// Texto do manuscrito.
    pub fn into_text(self) -> Result<String, IngestError> {
        match self {
            ManuscriptInput::Text(text) => Ok(text),
            ManuscriptInput::Document { name, bytes } => read_document(&name, &bytes),
        }
    }
}

/// Extrai o texto de um arquivo conforme o formato do nome.
pub fn read_document(name: &str, bytes: &[u8]) -> Result<String, IngestError> {
    let text = match DocumentFormat::from_name(name)? {
        DocumentFormat::Word => read_word(bytes)?,
        DocumentFormat::PlainText => read_plain_text(bytes)?,
    };
    debug!(name, chars = text.chars().count(), "Documento lido");
    Ok(text)
}

fn read_plain_text(bytes: &[u8]) -> Result<String, IngestError> {
    let text = String::from_utf8(bytes.to_vec())?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

fn read_word(bytes: &[u8]) -> Result<String, IngestError> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| {
        warn!(error = %e, "Falha ao ler documento Word");
        IngestError::Docx(e.to_string())
    })?;

    let mut pieces = Vec::new();
    for child in &docx.document.children {
        match child {
            docx_rs::DocumentChild::Paragraph(para) => pieces.push(paragraph_text(para)),
            docx_rs::DocumentChild::Table(table) => collect_table(&mut pieces, table),
            _ => {}
        }
    }
    Ok(pieces.join(PIECE_SEPARATOR))
}

fn collect_table(pieces: &mut Vec<String>, table: &docx_rs::Table) {
    for row in &table.rows {
        let docx_rs::TableChild::TableRow(row) = row;
        for cell in &row.cells {
            let docx_rs::TableRowChild::TableCell(cell) = cell;
            for content in &cell.children {
                if let docx_rs::TableCellContent::Paragraph(para) = content {
                    pieces.push(paragraph_text(para));
                }
            }
        }
    }
}

fn paragraph_text(para: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    for child in &para.children {
        match child {
            docx_rs::ParagraphChild::Run(run) => push_run(&mut text, run),
            docx_rs::ParagraphChild::Hyperlink(link) => {
                for child in &link.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        push_run(&mut text, run);
                    }
                }
            }
            _ => {}
        }
    }
    text
}

fn push_run(text: &mut String, run: &docx_rs::Run) {
    for child in &run.children {
        if let docx_rs::RunChild::Text(t) = child {
            text.push_str(&t.text);
        }
    }
}
