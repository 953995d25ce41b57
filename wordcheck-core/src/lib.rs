//! # wordcheck-core — Verificação de Palavras de Atenção em Manuscritos
//!
//! Este crate implementa o pipeline que ajuda um editor a revisar nomes
//! próprios pouco conhecidos antes da publicação: extrai as entidades
//! nomeadas do manuscrito, consulta quantas vezes cada uma aparece num
//! buscador de notícias e destaca as raras.
//!
//! ## Arquitetura do Sistema
//!
//! O dado flui em linha reta, sem voltar a etapas anteriores:
//!
//! 1.  **Entrada** ([`document`]): texto colado ou arquivo (`.docx`, `.doc`, `.txt`).
//! 2.  **Extração** ([`extractor`]): entidades com offsets de caractere. O
//!     reconhecedor é injetado; o embutido usa [`tokenizer`], [`rule_based`]
//!     e [`tagger`].
//! 3.  **Frequência** ([`oracle`]): uma consulta por menção, espaçadas pelo
//!     [`rate_limit::RateLimiter`].
//! 4.  **Classificação** ([`classifier`]): `ZERO`, `LOW` (< 10) ou `NORMAL`.
//! 5.  **Relatório** ([`report`]): tabela em ordem de documento, exportada
//!     para planilha.
//!
//! O envio por e-mail ([`delivery`]) fica fora do pipeline e é acionado pelo
//! chamador.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use std::sync::Arc;
//! use wordcheck_core::{
//!     classify, EntityExtractor, FrequencyOracle, GazetteerRecognizer, ManuscriptInput,
//!     OracleError, Pipeline, Tier,
//! };
//!
//! // Oráculo fixo para o exemplo; em produção use `Pipeline::from_settings`.
//! struct Fixed;
//! impl FrequencyOracle for Fixed {
//!     fn lookup(&self, term: &str) -> Result<u64, OracleError> {
//!         Ok(if term == "東京都" { 0 } else { 15 })
//!     }
//! }
//!
//! let dir = std::env::temp_dir().join("wordcheck-doc-example");
//! let pipeline = Pipeline::new(
//!     EntityExtractor::new(Arc::new(GazetteerRecognizer::new())),
//!     Arc::new(Fixed),
//!     dir.join("caution_words.xlsx"),
//!     "caution_words",
//! );
//!
//! let outcome = pipeline.run(ManuscriptInput::text("東京都で会議が開かれた。")).unwrap();
//! for row in outcome.report.rows() {
//!     println!("{} ({}) → {} [{}]", row.text, row.label, row.count, classify(row.count));
//! }
//! assert_eq!(outcome.report.tier(0), Some(Tier::Zero));
//! ```
//!
//! ## Módulos Principais
//!
//! - [`pipeline`]: orquestrador com estados e eventos observáveis.
//! - [`config`]: configuração TOML + credenciais do ambiente.
//! - [`error`]: taxonomia de erros por etapa.
//! - [`corpus`]: gazetteer padrão e textos de demonstração.

pub mod classifier;
pub mod config;
pub mod corpus;
pub mod delivery;
pub mod document;
pub mod entity;
pub mod error;
pub mod extractor;
pub mod oracle;
pub mod pipeline;
pub mod rate_limit;
pub mod report;
pub mod rule_based;
pub mod tagger;
pub mod tokenizer;

pub use classifier::{classify, Tier, LOW_THRESHOLD};
pub use config::Settings;
pub use document::ManuscriptInput;
pub use entity::{Entity, EntityRecord};
pub use error::{Error, OracleError, Result};
pub use extractor::{EntityExtractor, EntityRecognizer, GazetteerRecognizer, RemoteRecognizer};
pub use oracle::{FrequencyOracle, NewsSearchOracle};
pub use pipeline::{Pipeline, PipelineEvent, PipelineFailure, PipelineOutcome, PipelineState};
pub use rate_limit::RateLimiter;
pub use report::{Report, ReportBuilder, ReportRow};
