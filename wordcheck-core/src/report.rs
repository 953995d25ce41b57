//! # Relatório de Palavras de Atenção
//!
//! Uma tabela com uma linha por registro, na ordem de extração (ordem do
//! documento), sem ordenação nem deduplicação. Colunas:
//! `text, label, start, end, count`.
//!
//! O destaque visual é uma **anotação de apresentação**: é derivado do nível
//! ([`Tier`]) na hora de renderizar e não vira coluna. A exportação para
//! planilha aplica a cor de fundo às linhas, mas a releitura
//! ([`read_xlsx`]) devolve só os dados.

use std::path::{Path, PathBuf};

use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::{Color, Format, FormatPattern, Workbook, Worksheet};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::{classify, Tier};
use crate::entity::{Entity, EntityRecord};
use crate::error::{ExportError, ReportError};

/// Cabeçalho da planilha exportada.
pub const COLUMNS: [&str; 5] = ["text", "label", "start", "end", "count"];

/// Uma linha do relatório, sempre com contagem resolvida.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub text: String,
    pub label: String,
    pub start: usize,
    pub end: usize,
    pub count: u64,
}

impl ReportRow {
    pub fn tier(&self) -> Tier {
        classify(self.count)
    }
}

/// Dica de renderização de uma linha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowStyle {
    /// Cor de fundo em RGB, `None` = sem destaque.
    pub background: Option<u32>,
}

impl RowStyle {
    pub const ZERO_BACKGROUND: u32 = 0xFFC0CB; // rosa
    pub const LOW_BACKGROUND: u32 = 0xFFA500; // laranja

    pub fn for_tier(tier: Tier) -> Self {
        let background = match tier {
            Tier::Zero => Some(Self::ZERO_BACKGROUND),
            Tier::Low => Some(Self::LOW_BACKGROUND),
            Tier::Normal => None,
        };
        Self { background }
    }

    /// Declaração CSS equivalente (ex: `background-color: #FFC0CB`).
    pub fn css(&self) -> Option<String> {
        self.background.map(|rgb| format!("background-color: #{rgb:06X}"))
    }
}

/// Linha com nível e estilo, pronta para serializar para a interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledRow {
    #[serde(flatten)]
    pub row: ReportRow,
    pub tier: Tier,
    pub style: Option<String>,
}

/// Quantidade de linhas por nível.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSummary {
    pub total: usize,
    pub zero: usize,
    pub low: usize,
    pub normal: usize,
}

impl TierSummary {
    pub fn needs_attention(&self) -> usize {
        self.zero + self.low
    }
}

/// O relatório final.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    rows: Vec<ReportRow>,
}

impl Report {
    pub fn from_rows(rows: Vec<ReportRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Nível da linha `index`.
    pub fn tier(&self, index: usize) -> Option<Tier> {
        self.rows.get(index).map(ReportRow::tier)
    }

    /// Linhas com nível e estilo, na ordem original.
    pub fn styled_rows(&self) -> impl Iterator<Item = StyledRow> + '_ {
        self.rows.iter().map(|row| {
            let tier = row.tier();
            StyledRow {
                row: row.clone(),
                tier,
                style: RowStyle::for_tier(tier).css(),
            }
        })
    }

    pub fn summary(&self) -> TierSummary {
        let mut summary = TierSummary {
            total: self.rows.len(),
            ..TierSummary::default()
        };
        for row in &self.rows {
            match row.tier() {
                Tier::Zero => summary.zero += 1,
                Tier::Low => summary.low += 1,
                Tier::Normal => summary.normal += 1,
            }
        }
        summary
    }

    /// Grava a planilha em `path`, sobrescrevendo. Linhas ZERO/LOW recebem cor de fundo.
    ///
    /// O arquivo é escrito primeiro num irmão temporário e depois renomeado:
    /// uma falha nunca deixa uma planilha parcial no destino.
    pub fn export_xlsx(&self, path: &Path, sheet_name: &str) -> Result<PathBuf, ExportError> {
        let buffer = self.to_xlsx_bytes(sheet_name)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ExportError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        std::fs::write(&tmp, &buffer).map_err(|source| ExportError::Io {
            path: tmp.clone(),
            source,
        })?;
        if let Err(source) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(ExportError::Io {
                path: path.to_path_buf(),
                source,
            });
        }

        info!(path = %path.display(), rows = self.rows.len(), "Relatório exportado");
        Ok(path.to_path_buf())
    }

    /// Conteúdo xlsx em memória.
    pub fn to_xlsx_bytes(&self, sheet_name: &str) -> Result<Vec<u8>, ExportError> {
        let mut workbook = Workbook::new();
        let header = Format::new().set_bold();
        let zero = highlight(RowStyle::ZERO_BACKGROUND);
        let low = highlight(RowStyle::LOW_BACKGROUND);
        let plain = Format::new();

        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet_name)?;
        for (col, name) in COLUMNS.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *name, &header)?;
        }
        worksheet.set_column_width(0, 30)?;
        worksheet.set_column_width(1, 12)?;

        for (i, row) in self.rows.iter().enumerate() {
            let r = (i + 1) as u32;
            let format = match row.tier() {
                Tier::Zero => &zero,
                Tier::Low => &low,
                Tier::Normal => &plain,
            };
            worksheet.write_string_with_format(r, 0, &row.text, format)?;
            worksheet.write_string_with_format(r, 1, &row.label, format)?;
            write_integer(worksheet, r, 2, row.start as u64, format)?;
            write_integer(worksheet, r, 3, row.end as u64, format)?;
            write_integer(worksheet, r, 4, row.count, format)?;
        }

        Ok(workbook.save_to_buffer()?)
    }
}

/// Maior inteiro que um número do Excel (f64) representa sem perda.
const MAX_EXACT_NUMBER: u64 = 1 << 53;

/// Inteiros acima de 2^53 vão como texto para não perder dígitos.
fn write_integer(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: u64,
    format: &Format,
) -> Result<(), ExportError> {
    if value <= MAX_EXACT_NUMBER {
        worksheet.write_number_with_format(row, col, value as f64, format)?;
    } else {
        worksheet.write_string_with_format(row, col, value.to_string(), format)?;
    }
    Ok(())
}

fn highlight(rgb: u32) -> Format {
    Format::new()
        .set_pattern(FormatPattern::Solid)
        .set_background_color(Color::RGB(rgb))
}

/// Monta o relatório a partir dos registros.
pub struct ReportBuilder;

impl ReportBuilder {
    /// Uma linha por registro, na mesma ordem. Todo registro precisa de contagem.
    pub fn build(records: Vec<EntityRecord>) -> Result<Report, ReportError> {
        let mut rows = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            let count = record.count().ok_or_else(|| ReportError::UnresolvedCount {
                index,
                text: record.entity.text.clone(),
            })?;
            let Entity { text, label, start, end } = record.entity;
            rows.push(ReportRow {
                text,
                label,
                start,
                end,
                count,
            });
        }
        Ok(Report::from_rows(rows))
    }
}

/// Relê as linhas de uma planilha exportada (sem estilos).
pub fn read_xlsx(path: &Path, sheet_name: &str) -> Result<Vec<ReportRow>, ExportError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook.worksheet_range(sheet_name)?;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .map(|cells| cells.iter().map(cell_string).collect())
        .unwrap_or_default();
    if header != COLUMNS {
        return Err(ExportError::MalformedRow {
            row: 0,
            message: format!("cabeçalho inesperado: {header:?}"),
        });
    }

    rows.enumerate()
        .map(|(i, cells)| {
            let row = i + 1;
            let number = |col: usize| {
                cells.get(col).and_then(cell_u64).ok_or_else(|| ExportError::MalformedRow {
                    row,
                    message: format!("coluna '{}' não numérica", COLUMNS[col]),
                })
            };
            Ok(ReportRow {
                text: cells.first().map(cell_string).unwrap_or_default(),
                label: cells.get(1).map(cell_string).unwrap_or_default(),
                start: number(2)? as usize,
                end: number(3)? as usize,
                count: number(4)?,
            })
        })
        .collect()
}

fn cell_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn cell_u64(cell: &Data) -> Option<u64> {
    match cell {
        Data::Int(v) => u64::try_from(*v).ok(),
        Data::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Some(*v as u64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str, label: &str, start: usize, end: usize, count: u64) -> EntityRecord {
        EntityRecord::resolved(Entity::new(text, label, start, end), count)
    }

    #[test]
    fn test_build_empty() {
        let report = ReportBuilder::build(vec![]).unwrap();
        assert!(report.is_empty());
        assert_eq!(report.summary(), TierSummary::default());
    }

    #[test]
    fn test_reference_example_tiers() {
        let report = ReportBuilder::build(vec![
            record("東京都", "LOC", 0, 3, 0),
            record("会議", "EVENT", 4, 6, 15),
        ])
        .unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report.tier(0), Some(Tier::Zero));
        assert_eq!(report.tier(1), Some(Tier::Normal));
        assert_eq!(report.tier(2), None);
    }

    #[test]
    fn test_order_is_preserved() {
        let base = vec![
            record("b", "X", 5, 6, 3),
            record("a", "X", 0, 1, 100),
            record("b", "X", 5, 6, 3),
            record("c", "X", 2, 3, 0),
            record("d", "X", 9, 10, 42),
        ];

        let mut orders = Vec::new();
        for shift in 0..base.len() {
            let mut rotated = base.clone();
            rotated.rotate_left(shift);
            orders.push(rotated.clone());
            rotated.reverse();
            orders.push(rotated);
        }

        for records in orders {
            let expected: Vec<(String, u64)> = records
                .iter()
                .map(|r| (r.entity.text.clone(), r.count().unwrap()))
                .collect();
            let report = ReportBuilder::build(records).unwrap();
            let rows: Vec<(String, u64)> =
                report.rows().iter().map(|r| (r.text.clone(), r.count)).collect();
            assert_eq!(rows, expected);
        }
    }

    #[test]
    fn test_unresolved_record_rejected() {
        let result = ReportBuilder::build(vec![
            record("東京都", "LOC", 0, 3, 0),
            EntityRecord::pending(Entity::new("会議", "EVENT", 4, 6)),
        ]);
        assert!(matches!(result, Err(ReportError::UnresolvedCount { index: 1, .. })));
    }

    #[test]
    fn test_styles_follow_tier() {
        let report = ReportBuilder::build(vec![
            record("a", "X", 0, 1, 0),
            record("b", "X", 1, 2, 9),
            record("c", "X", 2, 3, 10),
        ])
        .unwrap();
        let styles: Vec<Option<String>> = report.styled_rows().map(|r| r.style).collect();
        assert_eq!(
            styles,
            vec![
                Some("background-color: #FFC0CB".to_string()),
                Some("background-color: #FFA500".to_string()),
                None,
            ]
        );
        let summary = report.summary();
        assert_eq!((summary.zero, summary.low, summary.normal), (1, 1, 1));
        assert_eq!(summary.needs_attention(), 2);
    }

    #[test]
    fn test_styled_row_serializes_flat() {
        let report = ReportBuilder::build(vec![record("東京都", "LOC", 0, 3, 0)]).unwrap();
        let json = serde_json::to_value(report.styled_rows().collect::<Vec<_>>()).unwrap();
        assert_eq!(json[0]["text"], "東京都");
        assert_eq!(json[0]["count"], 0);
        assert_eq!(json[0]["tier"], "ZERO");
    }

    #[test]
    fn test_export_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caution_words.xlsx");
        let report = ReportBuilder::build(vec![
            record("東京都", "LOC", 0, 3, 0),
            record("会議", "EVENT", 4, 6, 15),
            record("Apple Inc", "ORG", 8, 17, 1_234_567),
            record("白波町", "LOC", 20, 23, 3),
        ])
        .unwrap();

        report.export_xlsx(&path, "caution_words").unwrap();
        let rows = read_xlsx(&path, "caution_words").unwrap();
        assert_eq!(rows, report.rows());
        assert!(!dir.path().join("caution_words.xlsx.tmp").exists());
    }

    #[test]
    fn test_huge_counts_survive_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caution_words.xlsx");
        let report = ReportBuilder::build(vec![
            record("a", "X", 0, 1, MAX_EXACT_NUMBER),
            record("b", "X", 1, 2, MAX_EXACT_NUMBER + 1),
            record("c", "X", 2, 3, u64::MAX),
        ])
        .unwrap();

        report.export_xlsx(&path, "caution_words").unwrap();
        let counts: Vec<u64> = read_xlsx(&path, "caution_words")
            .unwrap()
            .iter()
            .map(|r| r.count)
            .collect();
        assert_eq!(counts, vec![MAX_EXACT_NUMBER, MAX_EXACT_NUMBER + 1, u64::MAX]);
    }

    #[test]
    fn test_export_overwrites_and_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.xlsx");

        let first = ReportBuilder::build(vec![record("a", "X", 0, 1, 1)]).unwrap();
        first.export_xlsx(&path, "caution_words").unwrap();
        let second = ReportBuilder::build(vec![]).unwrap();
        second.export_xlsx(&path, "caution_words").unwrap();

        assert!(read_xlsx(&path, "caution_words").unwrap().is_empty());
    }

    #[test]
    fn test_read_rejects_foreign_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("caution_words").unwrap();
        sheet.write_string(0, 0, "nome").unwrap();
        workbook.save(&path).unwrap();

        assert!(matches!(
            read_xlsx(&path, "caution_words"),
            Err(ExportError::MalformedRow { row: 0, .. })
        ));
    }
}
