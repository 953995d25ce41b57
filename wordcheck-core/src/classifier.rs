//! # Classificador de Atenção
//!
//! Mapeia a contagem do oráculo para um nível de atenção. O nível é derivado,
//! nunca armazenado: é recalculado a partir de `count` sempre que necessário.
//!
//! | Contagem      | Nível    | Destaque |
//! |---------------|----------|----------|
//! | 0             | `Zero`   | rosa     |
//! | 1 ..= 9       | `Low`    | laranja  |
//! | 10 ou mais    | `Normal` | nenhum   |

use serde::{Deserialize, Serialize};

/// Abaixo deste valor (e acima de zero) a entidade é pouco conhecida.
pub const LOW_THRESHOLD: u64 = 10;

/// Nível de atenção de uma entidade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Normal,
    Low,
    Zero,
}

impl Tier {
    pub fn name(&self) -> &'static str {
        match self {
            Tier::Normal => "NORMAL",
            Tier::Low => "LOW",
            Tier::Zero => "ZERO",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Classifica uma contagem. `Zero` é um caso distinto de `Low`.
pub fn classify(count: u64) -> Tier {
    match count {
        0 => Tier::Zero,
        c if c < LOW_THRESHOLD => Tier::Low,
        _ => Tier::Normal,
    }
}
