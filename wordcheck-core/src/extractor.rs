//! # Extrator de Entidades
//!
//! O reconhecimento de entidades é uma capacidade externa: qualquer tipo que
//! implemente [`EntityRecognizer`] pode ser injetado no [`EntityExtractor`].
//! O extrator só garante o contrato do lado de cá:
//!
//! - texto vazio (ou só espaços) devolve lista vazia sem chamar o reconhecedor;
//! - toda entidade devolvida tem offsets de caractere válidos e o texto da
//!   entidade coincide com a fatia do original;
//! - nada é fundido, normalizado ou filtrado por categoria.
//!
//! Duas implementações acompanham o crate:
//! - [`GazetteerRecognizer`]: regras + gazetteer, roda no processo;
//! - [`RemoteRecognizer`]: serviço NLP externo via HTTP/JSON.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RecognizerSettings;
use crate::corpus::default_gazetteer;
use crate::entity::Entity;
use crate::error::ExtractionError;
use crate::rule_based::RuleEngine;
use crate::tagger::{tokens_to_entities, Tag, TaggedToken};
use crate::tokenizer::tokenize;

/// Capacidade de reconhecimento de entidades nomeadas.
///
/// Carregada uma vez por processo e compartilhada; implementações não devem
/// mutar estado em `recognize`.
pub trait EntityRecognizer: Send + Sync {
    /// Nome para logs e mensagens de erro.
    fn name(&self) -> &str;

    /// Entidades em ordem de documento, com offsets de caractere.
    fn recognize(&self, text: &str) -> Result<Vec<Entity>, ExtractionError>;
}

/// Fachada usada pelo pipeline.
#[derive(Clone)]
pub struct EntityExtractor {
    recognizer: Arc<dyn EntityRecognizer>,
}

impl EntityExtractor {
    pub fn new(recognizer: Arc<dyn EntityRecognizer>) -> Self {
        Self { recognizer }
    }

    /// Escolhe o reconhecedor conforme a configuração.
    pub fn from_settings(settings: &RecognizerSettings) -> Result<Self, ExtractionError> {
        let recognizer: Arc<dyn EntityRecognizer> = match &settings.endpoint {
            Some(endpoint) => {
                let timeout = Duration::from_secs(settings.timeout_secs.unwrap_or(30));
                Arc::new(RemoteRecognizer::new(endpoint, timeout)?)
            }
            None => {
                let mut recognizer = GazetteerRecognizer::new();
                if let Some(path) = &settings.gazetteer_path {
                    recognizer.load_gazetteer(path)?;
                }
                Arc::new(recognizer)
            }
        };
        Ok(Self::new(recognizer))
    }

    pub fn recognizer_name(&self) -> &str {
        self.recognizer.name()
    }

    /// Extrai as entidades de um texto.
    pub fn extract(&self, text: &str) -> Result<Vec<Entity>, ExtractionError> {
        if text.trim().is_empty() {
            return Ok(vec![]);
        }

        let entities = self.recognizer.recognize(text)?;
        let len = text.chars().count();
        for entity in &entities {
            let valid = entity.start < entity.end
                && entity.end <= len
                && char_slice(text, entity.start, entity.end) == Some(entity.text.as_str());
            if !valid {
                return Err(ExtractionError::InvalidSpan {
                    text: entity.text.clone(),
                    start: entity.start,
                    end: entity.end,
                    len,
                });
            }
        }

        debug!(
            recognizer = self.recognizer.name(),
            chars = len,
            entities = entities.len(),
            "Entidades extraídas"
        );
        Ok(entities)
    }
}

/// Fatia `[start, end)` em posições de caractere. `None` se o intervalo for
/// invertido ou passar do fim do texto.
pub fn char_slice(text: &str, start: usize, end: usize) -> Option<&str> {
    if end < start {
        return None;
    }
    let mut indices = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len()));
    let start_byte = indices.nth(start)?;
    let end_byte = if end == start {
        start_byte
    } else {
        indices.nth(end - start - 1)?
    };
    text.get(start_byte..end_byte)
}

/// Reconhecedor embutido: tokenizador por sistema de escrita + motor de regras.
pub struct GazetteerRecognizer {
    engine: RuleEngine,
}

impl GazetteerRecognizer {
    /// Motor com o gazetteer padrão.
    pub fn new() -> Self {
        let mut engine = RuleEngine::new();
        engine.extend(default_gazetteer());
        Self { engine }
    }

    pub fn load_gazetteer(&mut self, path: &Path) -> Result<usize, ExtractionError> {
        let added = self.engine.load_gazetteer_file(path)?;
        debug!(path = %path.display(), added, "Gazetteer carregado");
        Ok(added)
    }

    /// Tokens com suas tags, útil para inspecionar as regras.
    pub fn tag(&self, text: &str) -> Vec<TaggedToken> {
        let tokens = self.engine.segment(tokenize(text));
        let matches = self.engine.apply(&tokens);
        tokens
            .into_iter()
            .zip(matches)
            .map(|(token, m)| TaggedToken {
                token,
                tag: m.map(|m| m.tag).unwrap_or(Tag::Outside),
            })
            .collect()
    }
}

impl Default for GazetteerRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRecognizer for GazetteerRecognizer {
    fn name(&self) -> &str {
        "gazetteer"
    }

    fn recognize(&self, text: &str) -> Result<Vec<Entity>, ExtractionError> {
        Ok(tokens_to_entities(&self.tag(text), text))
    }
}

#[derive(Serialize)]
struct RemoteRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct RemoteResponse {
    entities: Vec<Entity>,
}

/// Serviço NLP externo.
///
/// Contrato: `POST {"text": ...}` → `{"entities": [{"text", "label", "start", "end"}]}`
/// com offsets de caractere, fim exclusivo.
pub struct RemoteRecognizer {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl RemoteRecognizer {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ExtractionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExtractionError::Recognizer {
                recognizer: "remote".into(),
                message: format!("falha ao criar cliente HTTP: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    fn failure(&self, message: String) -> ExtractionError {
        ExtractionError::Recognizer {
            recognizer: self.endpoint.clone(),
            message,
        }
    }
}

impl EntityRecognizer for RemoteRecognizer {
    fn name(&self) -> &str {
        "remote"
    }

    fn recognize(&self, text: &str) -> Result<Vec<Entity>, ExtractionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RemoteRequest { text })
            .send()
            .map_err(|e| self.failure(format!("requisição falhou: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.failure(format!("status HTTP {status}")));
        }

        let body: RemoteResponse = response
            .json()
            .map_err(|e| self.failure(format!("resposta inválida: {e}")))?;
        Ok(body.entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubRecognizer {
        entities: Vec<Entity>,
        calls: AtomicUsize,
    }

    impl StubRecognizer {
        fn new(entities: Vec<Entity>) -> Self {
            Self {
                entities,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl EntityRecognizer for StubRecognizer {
        fn name(&self) -> &str {
            "stub"
        }

        fn recognize(&self, _text: &str) -> Result<Vec<Entity>, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.entities.clone())
        }
    }

    #[test]
    fn test_empty_text_skips_recognizer() {
        let stub = Arc::new(StubRecognizer::new(vec![Entity::new("x", "MISC", 0, 1)]));
        let extractor = EntityExtractor::new(stub.clone());
        assert!(extractor.extract("").unwrap().is_empty());
        assert!(extractor.extract("  \n\t").unwrap().is_empty());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_duplicates_pass_through() {
        let text = "東京と東京";
        let stub = Arc::new(StubRecognizer::new(vec![
            Entity::new("東京", "LOC", 0, 2),
            Entity::new("東京", "LOC", 3, 5),
        ]));
        let entities = EntityExtractor::new(stub).extract(text).unwrap();
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn test_invalid_spans_rejected() {
        let text = "東京都";
        for bad in [
            Entity::new("東京都", "LOC", 0, 4),
            Entity::new("", "LOC", 1, 1),
            Entity::new("京都", "LOC", 0, 2),
        ] {
            let extractor = EntityExtractor::new(Arc::new(StubRecognizer::new(vec![bad])));
            assert!(matches!(
                extractor.extract(text),
                Err(ExtractionError::InvalidSpan { .. })
            ));
        }
    }

    #[test]
    fn test_char_slice() {
        assert_eq!(char_slice("東京都で会議", 4, 6), Some("会議"));
        assert_eq!(char_slice("東京都で会議", 0, 0), Some(""));
        assert_eq!(char_slice("abc", 1, 3), Some("bc"));
        assert_eq!(char_slice("abc", 2, 5), None);
        assert_eq!(char_slice("abc", 2, 1), None);
        assert_eq!(char_slice("東京都", 3, 0), None);
    }

    #[test]
    fn test_gazetteer_recognizer_reference_sentence() {
        let extractor = EntityExtractor::new(Arc::new(GazetteerRecognizer::new()));
        let entities = extractor.extract("東京都で会議が開かれた。").unwrap();
        assert_eq!(
            entities,
            vec![
                Entity::new("東京都", "LOC", 0, 3),
                Entity::new("会議", "EVENT", 4, 6),
            ]
        );
    }

    #[test]
    fn test_gazetteer_recognizer_document_order() {
        let recognizer = GazetteerRecognizer::new();
        let text = "岸田文雄首相は大阪市でトヨタ自動車の社長と会った。";
        let entities = recognizer.recognize(text).unwrap();
        let surfaces: Vec<&str> = entities.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(surfaces, vec!["岸田文雄", "大阪市", "トヨタ自動車"]);
        assert!(entities.windows(2).all(|w| w[0].start < w[1].start));
        for entity in &entities {
            assert_eq!(char_slice(text, entity.start, entity.end), Some(entity.text.as_str()));
        }
    }
}
