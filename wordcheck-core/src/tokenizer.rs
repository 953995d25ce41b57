//! # Tokenizador por Sistema de Escrita
//!
//! Divide o texto em tokens para o reconhecedor embutido. Textos em japonês
//! não separam palavras por espaço, então a unidade é a **sequência contínua
//! de um mesmo sistema de escrita**: kanji, hiragana, katakana, latino ou
//! dígitos. Pontuação vira um token próprio e espaços são descartados.
//!
//! ## Exemplo
//!
//! ```rust
//! use wordcheck_core::tokenizer::tokenize;
//!
//! let tokens = tokenize("東京都で会議が開かれた。");
//! let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
//! assert_eq!(texts, vec!["東京都", "で", "会議", "が", "開", "かれた", "。"]);
//! ```
//!
//! Cada token guarda seus offsets de **byte** no texto original; a conversão
//! para offsets de caractere acontece na montagem dos spans.

use serde::{Deserialize, Serialize};

/// Sistema de escrita de um caractere (ou de um token inteiro).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Script {
    Kanji,
    Hiragana,
    Katakana,
    Latin,
    Digit,
    /// Pontuação e símbolos; cada caractere é um token isolado.
    Other,
}

impl Script {
    /// Classifica um caractere.
    pub fn of(ch: char) -> Self {
        match ch {
            '\u{3041}'..='\u{309F}' => Script::Hiragana,
            // 'ー' (U+30FC) prolonga tanto katakana quanto hiragana; aqui fica com katakana.
            '\u{30A0}'..='\u{30FF}' | '\u{31F0}'..='\u{31FF}' | '\u{FF66}'..='\u{FF9F}' => {
                Script::Katakana
            }
            '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}' | '々' | '〆' => {
                Script::Kanji
            }
            '0'..='9' | '０'..='９' => Script::Digit,
            c if c.is_alphabetic() => Script::Latin,
            _ => Script::Other,
        }
    }

    /// Sistemas cujas sequências são agrupadas num único token.
    fn groups(self) -> bool {
        !matches!(self, Script::Other)
    }
}

/// Um token extraído do texto original.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    /// O texto do token (ex: "東京都", "で", "Apple").
    pub text: String,
    /// Índice de byte inicial no texto original (inclusive).
    pub start: usize,
    /// Índice de byte final no texto original (exclusivo).
    pub end: usize,
    /// Índice sequencial do token na lista.
    pub index: usize,
    /// Sistema de escrita predominante.
    pub script: Script,
}

impl Token {
    /// Primeira letra maiúscula (só faz sentido para tokens latinos).
    pub fn is_capitalized(&self) -> bool {
        self.text.chars().next().map(char::is_uppercase).unwrap_or(false)
    }
}

/// Tokeniza um texto em sequências do mesmo sistema de escrita.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = tokenize_script(text);
    for (i, token) in tokens.iter_mut().enumerate() {
        token.index = i;
    }
    tokens
}

fn tokenize_script(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current: Option<(usize, Script)> = None;

    for (byte_pos, ch) in text.char_indices() {
        if ch.is_whitespace() {
            flush_token(&mut tokens, text, current.take(), byte_pos);
            continue;
        }

        let script = Script::of(ch);
        match current {
            Some((_, open)) if open == script && script.groups() => {}
            // Hífen e apóstrofo dentro de palavra latina ("Coca-Cola", "O'Neil").
            Some((_, Script::Latin)) if (ch == '-' || ch == '\'') && next_is_latin(text, byte_pos, ch) => {}
            // Ponto decimal ou separador de milhar entre dígitos.
            Some((_, Script::Digit)) if (ch == '.' || ch == ',') && next_is_digit(text, byte_pos, ch) => {}
            _ => {
                flush_token(&mut tokens, text, current.take(), byte_pos);
                if script.groups() {
                    current = Some((byte_pos, script));
                } else {
                    push_token(&mut tokens, ch, byte_pos);
                }
            }
        }
    }

    flush_token(&mut tokens, text, current.take(), text.len());
    tokens
}

fn next_is_latin(text: &str, byte_pos: usize, ch: char) -> bool {
    text[byte_pos + ch.len_utf8()..]
        .chars()
        .next()
        .map(|c| Script::of(c) == Script::Latin)
        .unwrap_or(false)
}

fn next_is_digit(text: &str, byte_pos: usize, ch: char) -> bool {
    text[byte_pos + ch.len_utf8()..]
        .chars()
        .next()
        .map(|c| Script::of(c) == Script::Digit)
        .unwrap_or(false)
}

/// Fecha a sequência aberta (se houver) e adiciona o token.
fn flush_token(tokens: &mut Vec<Token>, text: &str, open: Option<(usize, Script)>, end: usize) {
    if let Some((start, script)) = open {
        if start < end {
            tokens.push(Token {
                text: text[start..end].to_string(),
                start,
                end,
                index: 0,
                script,
            });
        }
    }
}

/// Adiciona um token de pontuação diretamente.
fn push_token(tokens: &mut Vec<Token>, ch: char, start: usize) {
    tokens.push(Token {
        text: ch.to_string(),
        start,
        end: start + ch.len_utf8(),
        index: 0,
        script: Script::Other,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_tokenize_japanese_by_script() {
        let tokens = tokenize("東京都で会議が開かれた。");
        assert_eq!(texts(&tokens), vec!["東京都", "で", "会議", "が", "開", "かれた", "。"]);
        assert_eq!(tokens[0].script, Script::Kanji);
        assert_eq!(tokens[1].script, Script::Hiragana);
        assert_eq!(tokens[6].script, Script::Other);
        // Offsets de byte: cada kanji ocupa 3 bytes.
        assert_eq!((tokens[0].start, tokens[0].end), (0, 9));
        assert_eq!(tokens[2].index, 2);
    }

    #[test]
    fn test_tokenize_katakana_and_latin() {
        let tokens = tokenize("トヨタ自動車とApple Inc.が提携");
        assert_eq!(
            texts(&tokens),
            vec!["トヨタ", "自動車", "と", "Apple", "Inc", ".", "が", "提携"]
        );
        assert_eq!(tokens[0].script, Script::Katakana);
        assert_eq!(tokens[3].script, Script::Latin);
    }

    #[test]
    fn test_tokenize_keeps_numbers_and_hyphenated_words() {
        let tokens = tokenize("Coca-Cola sold 1,234.5 units");
        assert_eq!(texts(&tokens), vec!["Coca-Cola", "sold", "1,234.5", "units"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \n").is_empty());
    }
}
