//! # Taxonomia de Erros
//!
//! Cada etapa do pipeline tem o seu próprio enum de erro. Nenhuma etapa se
//! recupera localmente: o erro sobe até o chamador, que decide como exibi-lo.
//! Uma entidade pulada em silêncio produziria um relatório incompleto.

use std::path::PathBuf;

use thiserror::Error;

/// Erro geral do crate, agregando os erros de cada etapa.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Entrada ilegível: {0}")]
    Ingest(#[from] IngestError),

    #[error("Falha na extração de entidades: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Falha no oráculo de frequência: {0}")]
    Oracle(#[from] OracleError),

    #[error("Relatório inválido: {0}")]
    Report(#[from] ReportError),

    #[error("Falha na exportação: {0}")]
    Export(#[from] ExportError),

    #[error("Falha no envio: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Configuração inválida: {0}")]
    Config(#[from] ConfigError),
}

/// Resultado padrão do crate.
pub type Result<T> = std::result::Result<T, Error>;

/// O documento de entrada não pôde ser lido ("cannot read").
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("formato não suportado: {0}")]
    UnsupportedFormat(String),

    #[error("texto não está em UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("documento Word corrompido: {0}")]
    Docx(String),

    #[error("erro de leitura: {0}")]
    Io(#[from] std::io::Error),
}

/// Falhas do reconhecedor de entidades (local ou remoto).
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("reconhecedor '{recognizer}' falhou: {message}")]
    Recognizer { recognizer: String, message: String },

    #[error("span inválido [{start}, {end}) para '{text}' (texto com {len} caracteres)")]
    InvalidSpan {
        text: String,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("gazetteer inválido: {0}")]
    Gazetteer(String),
}

/// Falhas do oráculo de frequência.
#[derive(Error, Debug)]
pub enum OracleError {
    /// Timeout, falha de conexão ou qualquer erro de transporte.
    #[error("erro de rede ao consultar '{term}': {message}")]
    Network {
        term: String,
        message: String,
        transient: bool,
    },

    /// Resposta HTTP fora da faixa 2xx.
    #[error("status HTTP {status} ao consultar '{term}'")]
    Status { term: String, status: u16 },

    /// O elemento com a contagem não existe ou não é numérico.
    #[error("contagem ilegível para '{term}': {message}")]
    Parse { term: String, message: String },

    #[error("termo de busca vazio")]
    EmptyTerm,
}

impl OracleError {
    /// Erros que valem uma nova tentativa: timeouts, conexão, 5xx e 429.
    pub fn is_transient(&self) -> bool {
        match self {
            OracleError::Network { transient, .. } => *transient,
            OracleError::Status { status, .. } => *status == 429 || *status >= 500,
            OracleError::Parse { .. } | OracleError::EmptyTerm => false,
        }
    }
}

/// Violações do modelo de dados do relatório.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("registro {index} ('{text}') sem contagem")]
    UnresolvedCount { index: usize, text: String },

    #[error("contagem de '{text}' já foi atribuída")]
    CountAlreadyAssigned { text: String },
}

/// Falhas ao gravar ou reler a planilha.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("erro ao gerar xlsx: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("erro ao ler xlsx: {0}")]
    Read(#[from] calamine::XlsxError),

    #[error("linha {row} da planilha malformada: {message}")]
    MalformedRow { row: usize, message: String },

    #[error("erro de E/S em {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Falhas no envio do relatório por e-mail.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("endereço de destino não informado")]
    MissingRecipient,

    #[error("endereço inválido: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("falha ao montar a mensagem: {0}")]
    Message(String),

    #[error("falha no transporte SMTP: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("falha ao gravar na caixa de saída: {0}")]
    Outbox(#[from] lettre::transport::file::Error),

    #[error("erro de leitura do anexo {path}: {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Problemas na configuração carregada.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("falha ao ler {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("falha ao interpretar a configuração: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("campo obrigatório ausente: {0}")]
    MissingField(String),

    #[error("configuração inválida: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let timeout = OracleError::Network {
            term: "東京".into(),
            message: "timed out".into(),
            transient: true,
        };
        assert!(timeout.is_transient());
        assert!(OracleError::Status { term: "x".into(), status: 503 }.is_transient());
        assert!(OracleError::Status { term: "x".into(), status: 429 }.is_transient());
        assert!(!OracleError::Status { term: "x".into(), status: 404 }.is_transient());
        assert!(!OracleError::Parse { term: "x".into(), message: "sem span".into() }.is_transient());
    }

    #[test]
    fn test_umbrella_conversion() {
        let err: Error = OracleError::EmptyTerm.into();
        assert!(matches!(err, Error::Oracle(OracleError::EmptyTerm)));
        assert!(err.to_string().contains("vazio"));
    }
}
