//! # Motor de Regras — Gazetteers e Padrões
//!
//! O reconhecedor embutido não tem modelo estatístico: combina listas de
//! entidades conhecidas (gazetteers) com padrões de sufixo típicos do japonês
//! (都・県・市 → local, 銀行・大学 → organização, 会議・選挙 → evento) e
//! títulos honoríficos (氏・首相・社長 depois de um nome → pessoa).
//!
//! As regras são aplicadas em ordem de prioridade; um token marcado por uma
//! regra anterior não é remarcado.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;
use crate::tagger::{EntityCategory, Tag};
use crate::tokenizer::{tokenize, Script, Token};

/// Uma correspondência de regra: qual token foi marcado e com qual tag.
#[derive(Debug, Clone, Serialize)]
pub struct RuleMatch {
    pub token_index: usize,
    pub tag: Tag,
    pub rule_name: &'static str,
}

/// Arquivo de gazetteer: rótulo → lista de nomes.
///
/// ```json
/// {"PER": ["岸田文雄"], "ORG": ["日本銀行"], "LOC": ["富士山"]}
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GazetteerFile(pub HashMap<String, Vec<String>>);

/// Motor de regras com gazetteers e padrões de sufixo.
pub struct RuleEngine {
    /// Entradas já tokenizadas (texto em minúsculas), por categoria.
    gazetteer: Vec<(EntityCategory, Vec<String>)>,
    /// Títulos que seguem um nome de pessoa.
    honorifics: Vec<&'static str>,
    /// Títulos latinos que precedem um nome ("Dr. Smith").
    latin_titles: Vec<&'static str>,
    /// Formas societárias latinas ("Apple Inc").
    latin_org_forms: Vec<&'static str>,
    /// Sufixos de kanji por categoria, na ordem em que são testados.
    suffixes: Vec<(EntityCategory, Vec<&'static str>)>,
    /// Palavras que formam organização com o token vizinho.
    corporate_forms: Vec<&'static str>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self {
            gazetteer: vec![],
            honorifics: vec![
                "氏", "さん", "様", "君", "首相", "大統領", "社長", "会長", "知事",
                "市長", "議員", "監督", "選手", "教授", "容疑者", "被告",
            ],
            latin_titles: vec!["mr", "mrs", "ms", "dr", "prof", "sir"],
            latin_org_forms: vec!["inc", "corp", "ltd", "llc", "co", "plc", "gmbh"],
            suffixes: vec![
                (
                    EntityCategory::Event,
                    vec!["会議", "大会", "選挙", "総会", "五輪", "博覧会", "サミット", "祭"],
                ),
                (
                    EntityCategory::Org,
                    vec![
                        "会社", "銀行", "大学", "学校", "病院", "協会", "委員会", "新聞",
                        "省", "庁", "党", "社", "団",
                    ],
                ),
                (
                    EntityCategory::Loc,
                    vec!["都", "道", "府", "県", "市", "区", "町", "村", "国", "島", "川", "山", "湖", "駅"],
                ),
            ],
            corporate_forms: vec!["株式会社", "有限会社", "合同会社"],
        }
    }

    /// Adiciona uma entrada ao gazetteer.
    pub fn add(&mut self, category: EntityCategory, name: &str) {
        self.push(category, name);
        self.sort_gazetteer();
    }

    /// Adiciona várias entradas e reordena uma única vez.
    pub fn extend<'n>(&mut self, entries: impl IntoIterator<Item = (EntityCategory, &'n str)>) {
        for (category, name) in entries {
            self.push(category, name);
        }
        self.sort_gazetteer();
    }

    fn push(&mut self, category: EntityCategory, name: &str) -> bool {
        let parts: Vec<String> = tokenize(name).into_iter().map(|t| t.text.to_lowercase()).collect();
        if parts.is_empty() {
            return false;
        }
        self.gazetteer.push((category, parts));
        true
    }

    // Entradas mais longas primeiro: "東京都庁" vence "東京都". Ordenação estável.
    fn sort_gazetteer(&mut self) {
        self.gazetteer.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    }

    /// Carrega entradas extras de um arquivo JSON (ver [`GazetteerFile`]).
    pub fn load_gazetteer_file(&mut self, path: &Path) -> Result<usize, ExtractionError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ExtractionError::Gazetteer(format!("{}: {e}", path.display())))?;
        let file: GazetteerFile = serde_json::from_str(&content)
            .map_err(|e| ExtractionError::Gazetteer(format!("{}: {e}", path.display())))?;

        let mut added = 0;
        for (label, names) in file.0 {
            let category = EntityCategory::parse(&label).ok_or_else(|| {
                ExtractionError::Gazetteer(format!("rótulo desconhecido '{label}'"))
            })?;
            for name in names {
                if self.push(category, &name) {
                    added += 1;
                }
            }
        }
        self.sort_gazetteer();
        Ok(added)
    }

    /// Separa honoríficos colados a um nome em kanji ("岸田氏" → "岸田", "氏").
    ///
    /// O tokenizador agrupa kanji consecutivos, então sem este passo o título
    /// entraria no texto da entidade.
    pub fn segment(&self, tokens: Vec<Token>) -> Vec<Token> {
        let mut out = Vec::with_capacity(tokens.len());
        for token in tokens {
            let split = if token.script == Script::Kanji {
                self.honorifics
                    .iter()
                    .filter(|h| token.text.ends_with(*h))
                    .filter(|h| token.text.chars().count() >= h.chars().count() + 2)
                    .max_by_key(|h| h.len())
            } else {
                None
            };

            match split {
                Some(honorific) => {
                    let cut = token.end - honorific.len();
                    let head_len = cut - token.start;
                    out.push(Token {
                        text: token.text[..head_len].to_string(),
                        start: token.start,
                        end: cut,
                        index: 0,
                        script: Script::Kanji,
                    });
                    out.push(Token {
                        text: honorific.to_string(),
                        start: cut,
                        end: token.end,
                        index: 0,
                        script: Script::Kanji,
                    });
                }
                None => out.push(token),
            }
        }
        for (i, token) in out.iter_mut().enumerate() {
            token.index = i;
        }
        out
    }

    /// Aplica todas as regras à sequência de tokens.
    pub fn apply(&self, tokens: &[Token]) -> Vec<Option<RuleMatch>> {
        let mut result: Vec<Option<RuleMatch>> = vec![None; tokens.len()];
        let lowered: Vec<String> = tokens.iter().map(|t| t.text.to_lowercase()).collect();

        // 1. Gazetteer (n-gramas, mais longos primeiro)
        let mut i = 0;
        while i < tokens.len() {
            let hit = self.gazetteer.iter().find(|(_, parts)| {
                i + parts.len() <= tokens.len()
                    && parts.iter().enumerate().all(|(j, part)| lowered[i + j] == *part)
                    && (i..i + parts.len()).all(|k| result[k].is_none())
            });
            match hit {
                Some((category, parts)) => {
                    mark(&mut result, i, parts.len(), *category, "gazetteer");
                    i += parts.len();
                }
                None => i += 1,
            }
        }

        // 2. Forma societária: "株式会社トヨタ" / "トヨタ株式会社"
        for i in 0..tokens.len() {
            if !self.corporate_forms.contains(&tokens[i].text.as_str()) || result[i].is_some() {
                continue;
            }
            if i + 1 < tokens.len() && result[i + 1].is_none() && is_name_like(&tokens[i + 1]) {
                mark(&mut result, i, 2, EntityCategory::Org, "corporate_form");
            } else if i > 0 && result[i - 1].is_none() && is_name_like(&tokens[i - 1]) {
                mark(&mut result, i - 1, 2, EntityCategory::Org, "corporate_form");
            }
        }

        // 3. Honorífico depois do nome: "バイデン大統領", "岸田氏"
        for i in 1..tokens.len() {
            if result[i - 1].is_some() || !self.honorifics.contains(&tokens[i].text.as_str()) {
                continue;
            }
            if matches!(tokens[i - 1].script, Script::Kanji | Script::Katakana) {
                mark(&mut result, i - 1, 1, EntityCategory::Per, "honorific");
            }
        }

        // 4. Sufixos de kanji: "東京都", "日本銀行", "会議"
        for (i, token) in tokens.iter().enumerate() {
            if result[i].is_some() || !matches!(token.script, Script::Kanji | Script::Katakana) {
                continue;
            }
            if let Some(category) = self.suffix_category(token) {
                mark(&mut result, i, 1, category, "suffix");
            }
        }

        // 5. Título latino: "Dr. Smith" → Smith é PER
        for i in 0..tokens.len() {
            if !self.latin_titles.contains(&lowered[i].as_str()) {
                continue;
            }
            let name = if tokens.get(i + 1).map(|t| t.text == ".").unwrap_or(false) { i + 2 } else { i + 1 };
            if name < tokens.len()
                && result[name].is_none()
                && tokens[name].script == Script::Latin
                && tokens[name].is_capitalized()
            {
                mark(&mut result, name, 1, EntityCategory::Per, "latin_title");
            }
        }

        // 6. Forma societária latina: "Apple Inc" → ORG
        for i in 1..tokens.len() {
            if !self.latin_org_forms.contains(&lowered[i].as_str()) || result[i].is_some() {
                continue;
            }
            let prev = &tokens[i - 1];
            if result[i - 1].is_none() && prev.script == Script::Latin && prev.is_capitalized() {
                mark(&mut result, i - 1, 2, EntityCategory::Org, "latin_org_form");
            }
        }

        // 7. Palavras latinas capitalizadas soltas no texto japonês → MISC
        let mut i = 0;
        while i < tokens.len() {
            let starts = result[i].is_none()
                && tokens[i].script == Script::Latin
                && tokens[i].is_capitalized()
                && tokens[i].text.chars().count() >= 2
                && !self.latin_titles.contains(&lowered[i].as_str());
            if !starts {
                i += 1;
                continue;
            }
            let mut len = 1;
            while i + len < tokens.len()
                && result[i + len].is_none()
                && tokens[i + len].script == Script::Latin
                && tokens[i + len].is_capitalized()
            {
                len += 1;
            }
            mark(&mut result, i, len, EntityCategory::Misc, "capitalized_latin");
            i += len;
        }

        result
    }

    fn suffix_category(&self, token: &Token) -> Option<EntityCategory> {
        self.suffixes.iter().find_map(|(category, suffixes)| {
            suffixes
                .iter()
                .any(|suffix| {
                    token.text.ends_with(suffix)
                        // Sufixos de um caractere exigem um radical ("都" sozinho não é local).
                        && (token.text.chars().count() > suffix.chars().count()
                            || suffix.chars().count() >= 2)
                })
                .then_some(*category)
        })
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Marca `len` tokens a partir de `start` como uma entidade B-/I-.
fn mark(
    result: &mut [Option<RuleMatch>],
    start: usize,
    len: usize,
    category: EntityCategory,
    rule_name: &'static str,
) {
    for offset in 0..len {
        let tag = if offset == 0 { Tag::Begin(category) } else { Tag::Inside(category) };
        result[start + offset] = Some(RuleMatch {
            token_index: start + offset,
            tag,
            rule_name,
        });
    }
}

fn is_name_like(token: &Token) -> bool {
    matches!(token.script, Script::Kanji | Script::Katakana | Script::Latin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tags(engine: &RuleEngine, text: &str) -> Vec<(String, Option<Tag>)> {
        let tokens = engine.segment(tokenize(text));
        let matches = engine.apply(&tokens);
        tokens
            .into_iter()
            .zip(matches)
            .map(|(t, m)| (t.text, m.map(|m| m.tag)))
            .collect()
    }

    #[test]
    fn test_suffix_rules() {
        let engine = RuleEngine::new();
        let result = tags(&engine, "東京都で会議が開かれた。");
        assert_eq!(result[0], ("東京都".into(), Some(Tag::Begin(EntityCategory::Loc))));
        assert_eq!(result[2], ("会議".into(), Some(Tag::Begin(EntityCategory::Event))));
        assert_eq!(result[4].1, None, "'開' não deve ser marcado");
    }

    #[test]
    fn test_gazetteer_multi_token_wins() {
        let mut engine = RuleEngine::new();
        engine.add(EntityCategory::Org, "トヨタ自動車");
        let result = tags(&engine, "トヨタ自動車が発表");
        assert_eq!(result[0].1, Some(Tag::Begin(EntityCategory::Org)));
        assert_eq!(result[1].1, Some(Tag::Inside(EntityCategory::Org)));
        assert_eq!(result[2].1, None);
    }

    #[test]
    fn test_bulk_loaded_longer_entry_wins() {
        let mut engine = RuleEngine::new();
        engine.extend([
            (EntityCategory::Loc, "トヨタ"),
            (EntityCategory::Org, "トヨタ自動車"),
            (EntityCategory::Org, "ソニー"),
        ]);
        let result = tags(&engine, "トヨタ自動車とソニー");
        assert_eq!(result[0].1, Some(Tag::Begin(EntityCategory::Org)));
        assert_eq!(result[1].1, Some(Tag::Inside(EntityCategory::Org)));
        assert_eq!(result[3], ("ソニー".into(), Some(Tag::Begin(EntityCategory::Org))));
    }

    #[test]
    fn test_honorific_split_and_person() {
        let engine = RuleEngine::new();
        let result = tags(&engine, "岸田文雄首相とバイデン大統領が会談");
        assert_eq!(result[0], ("岸田文雄".into(), Some(Tag::Begin(EntityCategory::Per))));
        assert_eq!(result[1], ("首相".into(), None));
        assert_eq!(result[3].0, "バイデン");
        assert_eq!(result[3], ("ソニー".into(), Some(Tag::Begin(EntityCategory::Org))));
    }

    #[test]
    fn test_corporate_form() {
        let engine = RuleEngine::new();
        let result = tags(&engine, "株式会社メルカリは");
        assert_eq!(result[0].1, Some(Tag::Begin(EntityCategory::Org)));
        assert_eq!(result[1].1, Some(Tag::Inside(EntityCategory::Org)));
    }

    #[test]
    fn test_latin_rules() {
        let engine = RuleEngine::new();
        let result = tags(&engine, "Dr. Smith はApple Inc の New York 支社へ");
        let smith = result.iter().find(|(t, _)| t == "Smith").unwrap();
        assert_eq!(smith.1, Some(Tag::Begin(EntityCategory::Per)));
        let apple = result.iter().position(|(t, _)| t == "Apple").unwrap();
        assert_eq!(result[apple].1, Some(Tag::Begin(EntityCategory::Org)));
        assert_eq!(result[apple + 1].1, Some(Tag::Inside(EntityCategory::Org)));
        let new = result.iter().position(|(t, _)| t == "New").unwrap();
        assert_eq!(result[new].1, Some(Tag::Begin(EntityCategory::Misc)));
        assert_eq!(result[new + 1].1, Some(Tag::Inside(EntityCategory::Misc)));
    }

    #[test]
    fn test_load_gazetteer_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"PER": ["大谷翔平"], "EVENT": ["ワールドシリーズ"]}}"#).unwrap();

        let mut engine = RuleEngine::new();
        assert_eq!(engine.load_gazetteer_file(file.path()).unwrap(), 2);
        let result = tags(&engine, "大谷翔平がワールドシリーズに出場");
        assert_eq!(result[0].1, Some(Tag::Begin(EntityCategory::Per)));
        assert_eq!(result[2].1, Some(Tag::Begin(EntityCategory::Event)));
    }

    #[test]
    fn test_unknown_gazetteer_label_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"GPE": ["日本"]}}"#).unwrap();
        let mut engine = RuleEngine::new();
        assert!(matches!(
            engine.load_gazetteer_file(file.path()),
            Err(ExtractionError::Gazetteer(_))
        ));
    }
}
