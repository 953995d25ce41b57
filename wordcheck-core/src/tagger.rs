//! # Esquema de Tags BIO e Categorias do Reconhecedor Embutido
//!
//! O reconhecedor embutido rotula cada token com uma tag **BIO**
//! (Beginning-Inside-Outside) e depois agrupa as tags em [`Entity`].
//!
//! | Rótulo | Significado        | Exemplos                        |
//! |--------|--------------------|---------------------------------|
//! | PER    | Pessoa             | 岸田文雄, 大谷翔平               |
//! | ORG    | Organização        | トヨタ自動車, 日本銀行           |
//! | LOC    | Local              | 東京都, 大阪市, 富士山           |
//! | EVENT  | Evento             | 会議, 東京五輪, 衆議院選挙       |
//! | MISC   | Miscelânea         | 新型コロナウイルス                |
//!
//! Outros reconhecedores (ex: um serviço remoto) podem usar rótulos próprios;
//! o restante do pipeline trata `label` como texto livre.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::tokenizer::Token;

/// Categorias conhecidas pelo reconhecedor embutido.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityCategory {
    Per,
    Org,
    Loc,
    Event,
    Misc,
}

impl EntityCategory {
    /// Nome da categoria como string (vai para a coluna `label`).
    pub fn name(&self) -> &'static str {
        match self {
            EntityCategory::Per => "PER",
            EntityCategory::Org => "ORG",
            EntityCategory::Loc => "LOC",
            EntityCategory::Event => "EVENT",
            EntityCategory::Misc => "MISC",
        }
    }

    /// Tenta parsear a partir de string (ex: "PER" → Some(Per)).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PER" => Some(EntityCategory::Per),
            "ORG" => Some(EntityCategory::Org),
            "LOC" => Some(EntityCategory::Loc),
            "EVENT" => Some(EntityCategory::Event),
            "MISC" => Some(EntityCategory::Misc),
            _ => None,
        }
    }

    pub fn all() -> [EntityCategory; 5] {
        [
            EntityCategory::Per,
            EntityCategory::Org,
            EntityCategory::Loc,
            EntityCategory::Event,
            EntityCategory::Misc,
        ]
    }
}

/// Tag BIO aplicada a um token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tag {
    /// Início de uma entidade.
    Begin(EntityCategory),
    /// Continuação da entidade aberta pelo `Begin` anterior.
    Inside(EntityCategory),
    Outside,
}

impl Tag {
    /// Representação textual da tag (ex: "B-PER", "I-ORG", "O").
    pub fn label(&self) -> String {
        match self {
            Tag::Begin(cat) => format!("B-{}", cat.name()),
            Tag::Inside(cat) => format!("I-{}", cat.name()),
            Tag::Outside => "O".to_string(),
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Um token com sua tag BIO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggedToken {
    pub token: Token,
    pub tag: Tag,
}

/// Converte tokens rotulados (BIO) em entidades com offsets de caractere.
///
/// - `B-X` abre uma entidade;
/// - `I-X` consecutivos da **mesma** categoria a estendem;
/// - qualquer outra tag a encerra. Um `I-X` órfão é ignorado.
///
/// O texto da entidade é a fatia do original entre o primeiro e o último
/// token, então espaços internos ("Apple Inc") são preservados.
pub fn tokens_to_entities(tagged: &[TaggedToken], original_text: &str) -> Vec<Entity> {
    let mut entities = Vec::new();
    let mut i = 0;

    while i < tagged.len() {
        if let Tag::Begin(cat) = tagged[i].tag {
            let start_byte = tagged[i].token.start;
            let mut end_byte = tagged[i].token.end;

            let mut j = i + 1;
            while j < tagged.len() {
                match tagged[j].tag {
                    Tag::Inside(next_cat) if next_cat == cat => {
                        end_byte = tagged[j].token.end;
                        j += 1;
                    }
                    _ => break,
                }
            }

            let start = byte_to_char(original_text, start_byte);
            let end = start + original_text[start_byte..end_byte].chars().count();
            entities.push(Entity::new(
                &original_text[start_byte..end_byte],
                cat.name(),
                start,
                end,
            ));

            i = j;
        } else {
            i += 1;
        }
    }

    entities
}

/// Posição de caractere correspondente a um offset de byte.
pub fn byte_to_char(text: &str, byte_offset: usize) -> usize {
    text[..byte_offset].chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    fn tag_all(text: &str, tags: &[Tag]) -> Vec<TaggedToken> {
        tokenize(text)
            .into_iter()
            .zip(tags.iter().copied())
            .map(|(token, tag)| TaggedToken { token, tag })
            .collect()
    }

    #[test]
    fn test_tag_labels() {
        assert_eq!(Tag::Outside.label(), "O");
        assert_eq!(Tag::Begin(EntityCategory::Per).label(), "B-PER");
        assert_eq!(Tag::Inside(EntityCategory::Event).to_string(), "I-EVENT");
    }

    #[test]
    fn test_category_round_trip() {
        for cat in EntityCategory::all() {
            assert_eq!(EntityCategory::parse(cat.name()), Some(cat));
        }
        assert_eq!(EntityCategory::parse("GPE"), None);
    }

    #[test]
    fn test_spans_use_char_offsets() {
        let text = "東京都で会議が開かれた。";
        let tags = [
            Tag::Begin(EntityCategory::Loc),
            Tag::Outside,
            Tag::Begin(EntityCategory::Event),
            Tag::Outside,
            Tag::Outside,
            Tag::Outside,
            Tag::Outside,
        ];
        let entities = tokens_to_entities(&tag_all(text, &tags), text);
        assert_eq!(
            entities,
            vec![
                Entity::new("東京都", "LOC", 0, 3),
                Entity::new("会議", "EVENT", 4, 6),
            ]
        );
    }

    #[test]
    fn test_multi_token_span_and_orphan_inside() {
        let text = "Apple Inc が 来日";
        let tags = [
            Tag::Begin(EntityCategory::Org),
            Tag::Inside(EntityCategory::Org),
            Tag::Inside(EntityCategory::Loc),
            Tag::Outside,
        ];
        let entities = tokens_to_entities(&tag_all(text, &tags), text);
        assert_eq!(entities, vec![Entity::new("Apple Inc", "ORG", 0, 9)]);
    }
}
