//! # Entidades e Registros
//!
//! - [`Entity`]: uma menção detectada no texto. Imutável.
//! - [`EntityRecord`]: a entidade mais a contagem do oráculo, atribuída uma
//!   única vez.
//!
//! Menções repetidas **não** são fundidas: cada ocorrência é um registro.

use serde::{Deserialize, Serialize};

use crate::error::ReportError;

/// Uma menção de entidade nomeada.
///
/// `start`/`end` são posições de **caractere** no texto original, com `end`
/// exclusivo. O vocabulário de `label` pertence ao reconhecedor e não é
/// validado aqui.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: String,
    pub start: usize,
    pub end: usize,
}

impl Entity {
    pub fn new(text: impl Into<String>, label: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
            start,
            end,
        }
    }
}

/// Entidade com a contagem do oráculo de frequência.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity: Entity,
    count: Option<u64>,
}

impl EntityRecord {
    /// Registro ainda sem contagem.
    pub fn pending(entity: Entity) -> Self {
        Self { entity, count: None }
    }

    /// Registro já resolvido (útil para testes e para reler planilhas).
    pub fn resolved(entity: Entity, count: u64) -> Self {
        Self {
            entity,
            count: Some(count),
        }
    }

    pub fn count(&self) -> Option<u64> {
        self.count
    }

    pub fn is_resolved(&self) -> bool {
        self.count.is_some()
    }

    /// Atribui a contagem. Uma segunda atribuição é erro.
    pub fn assign_count(&mut self, count: u64) -> Result<(), ReportError> {
        if self.count.is_some() {
            return Err(ReportError::CountAlreadyAssigned {
                text: self.entity.text.clone(),
            });
        }
        self.count = Some(count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_assigned_once() {
        let mut record = EntityRecord::pending(Entity::new("東京都", "LOC", 0, 3));
        assert!(!record.is_resolved());
        record.assign_count(42).unwrap();
        assert_eq!(record.count(), Some(42));

        let second = record.assign_count(7);
        assert!(matches!(second, Err(ReportError::CountAlreadyAssigned { .. })));
        assert_eq!(record.count(), Some(42));
    }
}
