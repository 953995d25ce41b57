//! # Oráculo de Frequência
//!
//! Para cada entidade o oráculo pergunta a um buscador de notícias quantos
//! resultados existem para o termo. A contagem é raspada da página HTML por
//! uma regra estrutural configurável ([`CountSelector`]): um seletor CSS, a
//! ocorrência desejada e, opcionalmente, uma regex aplicada ao texto do
//! elemento.
//!
//! A regra padrão reproduz o comportamento de referência (o segundo `<span>`
//! da página) e é **frágil**: depende da estrutura atual do site. Por isso ela
//! fica atrás do trait [`FrequencyOracle`] e pode ser trocada sem tocar no
//! pipeline.
//!
//! Toda consulta passa pelo [`RateLimiter`] compartilhado, inclusive as novas
//! tentativas.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::OracleSettings;
use crate::error::{ConfigError, OracleError};
use crate::rate_limit::RateLimiter;

/// Fonte da contagem de frequência pública de um termo.
pub trait FrequencyOracle: Send + Sync {
    fn lookup(&self, term: &str) -> Result<u64, OracleError>;
}

/// Busca o HTML de uma URL.
pub trait PageFetcher: Send + Sync {
    fn fetch(&self, term: &str, url: &Url) -> Result<String, OracleError>;
}

/// Cliente HTTP bloqueante.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ConfigError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("falha ao criar cliente HTTP: {e}")))?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, term: &str, url: &Url) -> Result<String, OracleError> {
        let response = self.client.get(url.clone()).send().map_err(|e| OracleError::Network {
            term: term.to_string(),
            message: e.to_string(),
            transient: e.is_timeout() || e.is_connect(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status {
                term: term.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().map_err(|e| OracleError::Network {
            term: term.to_string(),
            message: format!("falha ao ler o corpo: {e}"),
            transient: e.is_timeout(),
        })
    }
}

/// Regra de extração da contagem.
#[derive(Debug, Clone)]
pub struct CountSelector {
    selector: Selector,
    selector_source: String,
    occurrence: usize,
    pattern: Option<Regex>,
}

impl CountSelector {
    /// `occurrence` começa em 0; `pattern`, se houver, precisa de um grupo de captura.
    pub fn new(selector: &str, occurrence: usize, pattern: Option<&str>) -> Result<Self, ConfigError> {
        let parsed = Selector::parse(selector)
            .map_err(|e| ConfigError::Invalid(format!("seletor '{selector}': {e}")))?;
        let pattern = pattern
            .map(Regex::new)
            .transpose()
            .map_err(|e| ConfigError::Invalid(format!("count_pattern: {e}")))?;
        Ok(Self {
            selector: parsed,
            selector_source: selector.to_string(),
            occurrence,
            pattern,
        })
    }

    /// Regra de referência: segundo `<span>` da página.
    pub fn reference() -> Self {
        Self {
            selector: Selector::parse("span").expect("seletor literal válido"),
            selector_source: "span".to_string(),
            occurrence: 1,
            pattern: None,
        }
    }

    pub fn from_settings(settings: &OracleSettings) -> Result<Self, ConfigError> {
        Self::new(&settings.selector, settings.occurrence, settings.count_pattern.as_deref())
    }

    /// Extrai a contagem do HTML.
    pub fn extract(&self, term: &str, html: &str) -> Result<u64, OracleError> {
        let document = Html::parse_document(html);
        let element = document.select(&self.selector).nth(self.occurrence).ok_or_else(|| {
            OracleError::Parse {
                term: term.to_string(),
                message: format!(
                    "elemento '{}' #{} não encontrado",
                    self.selector_source, self.occurrence
                ),
            }
        })?;

        let text: String = element.text().collect();
        let raw = match &self.pattern {
            Some(pattern) => pattern
                .captures(&text)
                .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
                .map(|m| m.as_str().to_string())
                .ok_or_else(|| OracleError::Parse {
                    term: term.to_string(),
                    message: format!("padrão não encontrado em '{}'", text.trim()),
                })?,
            None => text,
        };

        parse_count(&raw).ok_or_else(|| OracleError::Parse {
            term: term.to_string(),
            message: format!("'{}' não é numérico", raw.trim()),
        })
    }
}

/// Converte uma contagem livre ("1,234", "１２３", "12 345") em inteiro.
///
/// Separadores de milhar são removidos e dígitos de largura cheia viram ASCII.
/// Qualquer outro caractere torna a contagem inválida.
pub fn parse_count(raw: &str) -> Option<u64> {
    let mut digits = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        match ch {
            '0'..='9' => digits.push(ch),
            '０'..='９' => digits.push(char::from(b'0' + (ch as u32 - '０' as u32) as u8)),
            ',' | '，' | '.' | '\'' | ' ' | '\u{00A0}' | '\u{202F}' => {}
            _ => return None,
        }
    }
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Política de novas tentativas para erros transitórios.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Sem novas tentativas: a primeira falha aborta.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Espera antes da tentativa `attempt` (1 = primeira repetição), crescimento linear.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Oráculo baseado na busca de notícias por palavra-chave.
pub struct NewsSearchOracle {
    fetcher: Arc<dyn PageFetcher>,
    limiter: Arc<RateLimiter>,
    endpoint: Url,
    query_param: String,
    extra_params: Vec<(String, String)>,
    selector: CountSelector,
    retry: RetryPolicy,
    memo: Option<Mutex<HashMap<String, u64>>>,
}

impl NewsSearchOracle {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        limiter: Arc<RateLimiter>,
        endpoint: Url,
        query_param: impl Into<String>,
        selector: CountSelector,
    ) -> Self {
        Self {
            fetcher,
            limiter,
            endpoint,
            query_param: query_param.into(),
            extra_params: vec![],
            selector,
            retry: RetryPolicy::none(),
            memo: None,
        }
    }

    /// Monta o oráculo HTTP a partir da configuração.
    pub fn from_settings(settings: &OracleSettings, limiter: Arc<RateLimiter>) -> Result<Self, ConfigError> {
        let fetcher = Arc::new(HttpFetcher::new(settings.timeout(), &settings.user_agent)?);
        let endpoint = Url::parse(&settings.endpoint)
            .map_err(|e| ConfigError::Invalid(format!("oracle.endpoint: {e}")))?;
        let oracle = Self::new(
            fetcher,
            limiter,
            endpoint,
            settings.query_param.clone(),
            CountSelector::from_settings(settings)?,
        )
        .with_extra_params(settings.extra_params.clone())
        .with_retry(RetryPolicy {
            max_retries: settings.max_retries,
            backoff: Duration::from_millis(settings.retry_backoff_ms),
        });
        Ok(if settings.memoize { oracle.with_memo() } else { oracle })
    }

    pub fn with_extra_params(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.extra_params = params.into_iter().collect();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reaproveita a contagem de termos já consultados.
    pub fn with_memo(mut self) -> Self {
        self.memo = Some(Mutex::new(HashMap::new()));
        self
    }

    /// URL de busca para um termo.
    pub fn search_url(&self, term: &str) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair(&self.query_param, term);
            for (key, value) in &self.extra_params {
                query.append_pair(key, value);
            }
        }
        url
    }

    fn memo_get(&self, term: &str) -> Option<u64> {
        let memo = self.memo.as_ref()?;
        let cache = memo.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.get(term).copied()
    }

    fn memo_put(&self, term: &str, count: u64) {
        if let Some(memo) = &self.memo {
            let mut cache = memo.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            cache.insert(term.to_string(), count);
        }
    }

    fn attempt(&self, term: &str, url: &Url) -> Result<u64, OracleError> {
        self.limiter.acquire();
        let html = self.fetcher.fetch(term, url)?;
        self.selector.extract(term, &html)
    }
}

impl FrequencyOracle for NewsSearchOracle {
    fn lookup(&self, term: &str) -> Result<u64, OracleError> {
        if term.trim().is_empty() {
            return Err(OracleError::EmptyTerm);
        }
        if let Some(count) = self.memo_get(term) {
            debug!(term, count, "Contagem reaproveitada");
            return Ok(count);
        }

        let url = self.search_url(term);
        let mut attempt = 0;
        loop {
            match self.attempt(term, &url) {
                Ok(count) => {
                    info!(term, count, attempt, "Frequência obtida");
                    self.memo_put(term, count);
                    return Ok(count);
                }
                Err(err) if err.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    warn!(term, attempt, delay_ms = delay.as_millis() as u64, error = %err, "Falha transitória, repetindo");
                    self.limiter.pause(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
