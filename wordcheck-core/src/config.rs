//! # Configuração
//!
//! As configurações vêm de um arquivo TOML (`wordcheck.toml` no diretório
//! corrente ou o caminho em `WORDCHECK_CONFIG`); qualquer seção ausente usa
//! os valores padrão. Credenciais de e-mail nunca ficam no arquivo: são lidas
//! do ambiente (com `.env` carregado uma única vez na inicialização).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Variável de ambiente com o caminho do arquivo de configuração.
pub const CONFIG_ENV: &str = "WORDCHECK_CONFIG";
/// Usuário SMTP (também usado como remetente quando `mail.sender` está vazio).
pub const SMTP_USER_ENV: &str = "WORDCHECK_SMTP_USER";
/// Senha SMTP.
pub const SMTP_PASSWORD_ENV: &str = "WORDCHECK_SMTP_PASSWORD";

/// Configuração completa da aplicação.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub oracle: OracleSettings,
    pub report: ReportSettings,
    pub recognizer: RecognizerSettings,
    pub mail: MailSettings,
    pub server: ServerSettings,
}

impl Settings {
    /// Lê a configuração de um arquivo TOML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Interpreta a configuração a partir de uma string TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Carrega `.env`, procura o arquivo de configuração e aplica as
    /// credenciais do ambiente.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let candidate = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("wordcheck.toml"));

        let mut settings = if candidate.exists() {
            tracing::info!(path = %candidate.display(), "Carregando configuração");
            Self::from_file(&candidate)?
        } else {
            tracing::info!("Nenhum arquivo de configuração encontrado, usando padrões");
            Settings::default()
        };

        settings.mail.apply_env();
        Ok(settings)
    }

    /// Valida campos que, se errados, só falhariam no meio de uma execução.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oracle.endpoint.is_empty() {
            return Err(ConfigError::MissingField("oracle.endpoint".into()));
        }
        Url::parse(&self.oracle.endpoint)
            .map_err(|e| ConfigError::Invalid(format!("oracle.endpoint: {e}")))?;
        if self.oracle.query_param.is_empty() {
            return Err(ConfigError::MissingField("oracle.query_param".into()));
        }
        if self.oracle.selector.trim().is_empty() {
            return Err(ConfigError::MissingField("oracle.selector".into()));
        }
        if scraper::Selector::parse(&self.oracle.selector).is_err() {
            return Err(ConfigError::Invalid(format!(
                "oracle.selector não é um seletor CSS válido: {}",
                self.oracle.selector
            )));
        }
        if let Some(pattern) = &self.oracle.count_pattern {
            regex::Regex::new(pattern)
                .map_err(|e| ConfigError::Invalid(format!("oracle.count_pattern: {e}")))?;
        }
        if self.oracle.timeout_secs == 0 {
            return Err(ConfigError::Invalid("oracle.timeout_secs deve ser > 0".into()));
        }
        if let Some(endpoint) = &self.recognizer.endpoint {
            Url::parse(endpoint)
                .map_err(|e| ConfigError::Invalid(format!("recognizer.endpoint: {e}")))?;
        }
        if self.report.export_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("report.export_path".into()));
        }
        let sheet = &self.report.sheet_name;
        if sheet.is_empty() || sheet.chars().count() > 31 {
            return Err(ConfigError::Invalid(
                "report.sheet_name deve ter entre 1 e 31 caracteres".into(),
            ));
        }
        if let Some(c) = sheet.chars().find(|c| SHEET_NAME_FORBIDDEN.contains(c)) {
            return Err(ConfigError::Invalid(format!(
                "report.sheet_name não pode conter '{c}'"
            )));
        }
        if sheet.starts_with('\'') || sheet.ends_with('\'') {
            return Err(ConfigError::Invalid(
                "report.sheet_name não pode começar nem terminar com apóstrofo".into(),
            ));
        }
        Ok(())
    }
}

/// Oráculo de frequência: busca de notícias por palavra-chave.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    /// URL base da busca.
    pub endpoint: String,
    /// Parâmetro de query que recebe o termo.
    pub query_param: String,
    /// Parâmetros fixos acrescentados a toda busca.
    pub extra_params: BTreeMap<String, String>,
    /// Seletor CSS do elemento que contém a contagem.
    pub selector: String,
    /// Qual ocorrência do seletor usar (0 = primeira).
    pub occurrence: usize,
    /// Regex opcional aplicada ao texto do elemento; o primeiro grupo é a contagem.
    pub count_pattern: Option<String>,
    /// Intervalo mínimo entre o início de duas consultas.
    pub min_delay_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Novas tentativas em erros transitórios (0 = aborta na primeira falha).
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Reutiliza a contagem de termos repetidos dentro do mesmo processo.
    pub memoize: bool,
}

impl OracleSettings {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for OracleSettings {
    fn default() -> Self {
        let mut extra_params = BTreeMap::new();
        extra_params.insert("ei".to_string(), "utf-8".to_string());
        Self {
            endpoint: "https://news.yahoo.co.jp/search".to_string(),
            query_param: "p".to_string(),
            extra_params,
            selector: "span".to_string(),
            occurrence: 1,
            count_pattern: None,
            min_delay_ms: 3_000,
            timeout_secs: 10,
            user_agent: concat!("wordcheck/", env!("CARGO_PKG_VERSION")).to_string(),
            max_retries: 0,
            retry_backoff_ms: 1_000,
            memoize: false,
        }
    }
}

/// Caracteres que o Excel recusa em nomes de planilha.
const SHEET_NAME_FORBIDDEN: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Destino da planilha exportada.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub export_path: PathBuf,
    pub sheet_name: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            export_path: PathBuf::from("caution_words.xlsx"),
            sheet_name: "caution_words".to_string(),
        }
    }
}

/// Reconhecedor de entidades: serviço remoto ou gazetteer local.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerSettings {
    /// Serviço NLP externo; quando ausente usa o reconhecedor embutido.
    pub endpoint: Option<String>,
    /// Arquivo JSON com entradas extras de gazetteer.
    pub gazetteer_path: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

/// Envio do relatório por e-mail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Remetente; vazio usa o usuário SMTP.
    pub sender: String,
    pub subject: String,
    /// Link incluído no corpo HTML.
    pub news_site: String,
    /// Diretório dos `.eml` quando não há credenciais SMTP.
    pub outbox_dir: PathBuf,
    #[serde(skip)]
    pub username: Option<String>,
    #[serde(skip)]
    pub password: Option<String>,
}

impl MailSettings {
    /// Preenche as credenciais a partir do ambiente.
    pub fn apply_env(&mut self) {
        self.username = std::env::var(SMTP_USER_ENV).ok().filter(|v| !v.is_empty());
        self.password = std::env::var(SMTP_PASSWORD_ENV).ok().filter(|v| !v.is_empty());
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Remetente efetivo.
    pub fn from_address(&self) -> Option<&str> {
        if !self.sender.is_empty() {
            Some(self.sender.as_str())
        } else {
            self.username.as_deref()
        }
    }
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            sender: String::new(),
            subject: "注意ワードのチェック".to_string(),
            news_site: "https://news.yahoo.co.jp/".to_string(),
            outbox_dir: PathBuf::from("outbox"),
            username: None,
            password: None,
        }
    }
}

/// Servidor web.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    /// Onde os arquivos enviados são guardados para o anexo do e-mail.
    pub upload_dir: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_behaviour() {
        let settings = Settings::default();
        assert_eq!(settings.oracle.min_delay(), Duration::from_secs(3));
        assert_eq!(settings.oracle.selector, "span");
        assert_eq!(settings.oracle.occurrence, 1);
        assert_eq!(settings.oracle.max_retries, 0);
        assert!(!settings.oracle.memoize);
        assert_eq!(settings.report.export_path, PathBuf::from("caution_words.xlsx"));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            [oracle]
            min_delay_ms = 500
            count_pattern = '([\d,]+)件'

            [report]
            export_path = "out/report.xlsx"
            "#,
        )
        .unwrap();
        assert_eq!(settings.oracle.min_delay_ms, 500);
        assert_eq!(settings.oracle.query_param, "p");
        assert_eq!(settings.report.export_path, PathBuf::from("out/report.xlsx"));
        assert_eq!(settings.report.sheet_name, "caution_words");
        assert_eq!(settings.mail.smtp_port, 587);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Settings::from_toml("[oracle]\nselector = \"\"\n"),
            Err(ConfigError::MissingField(_))
        ));
        assert!(matches!(
            Settings::from_toml("[oracle]\ncount_pattern = \"([0-9\"\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Settings::from_toml("[oracle]\ntimeout_secs = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Settings::from_toml("[oracle]\nendpoint = \"not a url\"\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_sheet_name_rejects_excel_forbidden_names() {
        for name in ["a/b", "[x]", "q?", "c:d", "star*", "back\\\\slash", "'quoted'", "x'"] {
            let toml = format!("[report]\nsheet_name = \"{name}\"\n");
            assert!(
                matches!(Settings::from_toml(&toml), Err(ConfigError::Invalid(_))),
                "{name} deveria ser recusado"
            );
        }
        assert!(Settings::from_toml("[report]\nsheet_name = \"注意ワード\"\n").is_ok());
    }

    #[test]
    fn test_sender_falls_back_to_username() {
        let mut mail = MailSettings::default();
        assert_eq!(mail.from_address(), None);
        mail.username = Some("editor@example.com".into());
        assert_eq!(mail.from_address(), Some("editor@example.com"));
        mail.sender = "desk@example.com".into();
        assert_eq!(mail.from_address(), Some("desk@example.com"));
        assert!(!mail.has_credentials());
    }
}
