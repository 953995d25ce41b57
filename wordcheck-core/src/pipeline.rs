//! # Pipeline de Verificação — Orquestrador com Eventos Observáveis
//!
//! Sequencia as etapas: manuscrito → entidades → frequências → relatório
//! classificado → planilha exportada. Os estados são lineares:
//!
//! ```text
//! INPUT_RECEIVED → EXTRACTED → FREQUENCIES_RESOLVED → CLASSIFIED_AND_RENDERED → EXPORTED
//!        └──────────────┴──────────────┴────────────────────────┴──→ FAILED
//! ```
//!
//! Qualquer falha abandona a execução: nada é exportado e o chamador recebe
//! um [`PipelineFailure`] com o estado em que a execução estava. Cada passo é
//! emitido como [`PipelineEvent`] por um canal (`mpsc`), o que permite ao
//! servidor transmitir o progresso por WebSocket.

use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::classifier::{classify, Tier};
use crate::config::Settings;
use crate::document::ManuscriptInput;
use crate::entity::{Entity, EntityRecord};
use crate::error::Error;
use crate::extractor::EntityExtractor;
use crate::oracle::{FrequencyOracle, NewsSearchOracle};
use crate::rate_limit::RateLimiter;
use crate::report::{Report, ReportBuilder, StyledRow, TierSummary};

/// Estado de uma execução.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    InputReceived,
    Extracted,
    FrequenciesResolved,
    ClassifiedAndRendered,
    Exported,
    Failed,
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::InputReceived => "INPUT_RECEIVED",
            PipelineState::Extracted => "EXTRACTED",
            PipelineState::FrequenciesResolved => "FREQUENCIES_RESOLVED",
            PipelineState::ClassifiedAndRendered => "CLASSIFIED_AND_RENDERED",
            PipelineState::Exported => "EXPORTED",
            PipelineState::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Eventos emitidos durante a execução.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PipelineEvent {
    /// Transição de estado.
    StateChanged { state: PipelineState },
    /// Entidades encontradas, em ordem de documento.
    Extracted { entities: Vec<Entity>, total: usize },
    /// Contagem obtida para a linha `index`.
    FrequencyResolved {
        index: usize,
        text: String,
        count: u64,
        tier: Tier,
    },
    /// Relatório montado.
    Classified { summary: TierSummary },
    /// Planilha gravada.
    Exported { path: String },
    /// Conclusão com sucesso.
    Done {
        rows: Vec<StyledRow>,
        summary: TierSummary,
        export_path: String,
        processing_ms: u64,
    },
    /// Falha irrecuperável; a execução foi abandonada.
    Failed { stage: PipelineState, message: String },
}

/// Resultado de uma execução bem-sucedida.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub report: Report,
    pub export_path: PathBuf,
    /// Texto do manuscrito (necessário para regenerar o anexo).
    pub text: String,
    pub processing_ms: u64,
}

/// Falha de uma execução, com o estado em que ela estava.
#[derive(Error, Debug)]
#[error("execução abandonada em {stage}: {source}")]
pub struct PipelineFailure {
    pub stage: PipelineState,
    #[source]
    pub source: Error,
}

/// O pipeline de verificação.
pub struct Pipeline {
    extractor: EntityExtractor,
    oracle: Arc<dyn FrequencyOracle>,
    export_path: PathBuf,
    sheet_name: String,
}

impl Pipeline {
    pub fn new(
        extractor: EntityExtractor,
        oracle: Arc<dyn FrequencyOracle>,
        export_path: impl Into<PathBuf>,
        sheet_name: impl Into<String>,
    ) -> Self {
        Self {
            extractor,
            oracle,
            export_path: export_path.into(),
            sheet_name: sheet_name.into(),
        }
    }

    /// Monta o pipeline de produção: reconhecedor configurado, oráculo HTTP e
    /// um único limitador de taxa para todas as consultas.
    pub fn from_settings(settings: &Settings) -> crate::Result<Self> {
        let extractor = EntityExtractor::from_settings(&settings.recognizer)?;
        let limiter = Arc::new(RateLimiter::new(settings.oracle.min_delay()));
        let oracle = NewsSearchOracle::from_settings(&settings.oracle, limiter)?;
        info!(
            recognizer = extractor.recognizer_name(),
            endpoint = %settings.oracle.endpoint,
            min_delay_ms = settings.oracle.min_delay_ms,
            "Pipeline configurado"
        );
        Ok(Self::new(
            extractor,
            Arc::new(oracle),
            settings.report.export_path.clone(),
            settings.report.sheet_name.clone(),
        ))
    }

    pub fn export_path(&self) -> &Path {
        &self.export_path
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Executa sem observar eventos.
    pub fn run(&self, input: ManuscriptInput) -> Result<PipelineOutcome, PipelineFailure> {
        let (tx, _rx) = mpsc::channel();
        self.run_streaming(input, tx)
    }

    /// Executa emitindo um [`PipelineEvent`] a cada passo.
    ///
    /// Um receptor descartado não interrompe a execução.
    pub fn run_streaming(
        &self,
        input: ManuscriptInput,
        tx: mpsc::Sender<PipelineEvent>,
    ) -> Result<PipelineOutcome, PipelineFailure> {
        let mut run = Run::new(tx);
        let result = self.execute(input, &mut run);
        if let Err(failure) = &result {
            run.fail(failure);
        }
        result
    }

    fn execute(&self, input: ManuscriptInput, run: &mut Run) -> Result<PipelineOutcome, PipelineFailure> {
        run.advance(PipelineState::InputReceived);
        let text = input.into_text().map_err(|e| run.failure(e))?;

        let entities = self.extractor.extract(&text).map_err(|e| run.failure(e))?;
        run.emit(PipelineEvent::Extracted {
            total: entities.len(),
            entities: entities.clone(),
        });
        run.advance(PipelineState::Extracted);

        let mut records = Vec::with_capacity(entities.len());
        for (index, entity) in entities.into_iter().enumerate() {
            let count = self.oracle.lookup(&entity.text).map_err(|e| run.failure(e))?;
            let mut record = EntityRecord::pending(entity);
            record.assign_count(count).map_err(|e| run.failure(e))?;
            run.emit(PipelineEvent::FrequencyResolved {
                index,
                text: record.entity.text.clone(),
                count,
                tier: classify(count),
            });
            records.push(record);
        }
        run.advance(PipelineState::FrequenciesResolved);

        let report = ReportBuilder::build(records).map_err(|e| run.failure(e))?;
        let summary = report.summary();
        run.emit(PipelineEvent::Classified { summary });
        run.advance(PipelineState::ClassifiedAndRendered);

        let export_path = report
            .export_xlsx(&self.export_path, &self.sheet_name)
            .map_err(|e| run.failure(e))?;
        run.emit(PipelineEvent::Exported {
            path: export_path.display().to_string(),
        });
        run.advance(PipelineState::Exported);

        let processing_ms = run.start.elapsed().as_millis() as u64;
        run.emit(PipelineEvent::Done {
            rows: report.styled_rows().collect(),
            summary,
            export_path: export_path.display().to_string(),
            processing_ms,
        });
        info!(
            rows = report.len(),
            zero = summary.zero,
            low = summary.low,
            attention = summary.needs_attention(),
            processing_ms,
            "Verificação concluída"
        );

        Ok(PipelineOutcome {
            report,
            export_path,
            text,
            processing_ms,
        })
    }
}

/// Estado mutável de uma execução.
struct Run {
    tx: mpsc::Sender<PipelineEvent>,
    state: PipelineState,
    start: Instant,
}

impl Run {
    fn new(tx: mpsc::Sender<PipelineEvent>) -> Self {
        Self {
            tx,
            state: PipelineState::InputReceived,
            start: Instant::now(),
        }
    }

    fn emit(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    fn advance(&mut self, state: PipelineState) {
        self.state = state;
        info!(state = %state, "Estado do pipeline");
        self.emit(PipelineEvent::StateChanged { state });
    }

    fn failure(&self, source: impl Into<Error>) -> PipelineFailure {
        PipelineFailure {
            stage: self.state,
            source: source.into(),
        }
    }

    fn fail(&mut self, failure: &PipelineFailure) {
        error!(stage = %failure.stage, error = %failure.source, "Execução abandonada");
        self.emit(PipelineEvent::Failed {
            stage: failure.stage,
            message: failure.source.to_string(),
        });
        self.advance(PipelineState::Failed);
    }
}
