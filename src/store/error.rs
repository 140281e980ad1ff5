//! Tipos de erro da camada de armazenamento de registros.
//!
//! Define [`StoreError`] com variantes para falhas do SQLite, inserções que
//! não gravaram nenhuma linha e timestamps ilegíveis. Usa `thiserror` para
//! derivar `Display` e `Error` a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao consultar ou gravar no armazenamento.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Falha subjacente do SQLite (arquivo bloqueado, SQL inválido, disco cheio).
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A inserção foi executada mas nenhuma linha foi afetada.
    #[error("insert affected no rows")]
    NotInserted,

    /// O armazenamento retornou um timestamp que não pôde ser interpretado.
    #[error("invalid timestamp from store: {0}")]
    InvalidTimestamp(String),

    /// A tarefa bloqueante que executava a consulta falhou ou foi cancelada.
    #[error("store worker failed: {0}")]
    Worker(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_timestamp_display() {
        let err = StoreError::InvalidTimestamp("yesterday".into());
        assert_eq!(err.to_string(), "invalid timestamp from store: yesterday");
    }

    #[test]
    fn not_inserted_display() {
        assert_eq!(StoreError::NotInserted.to_string(), "insert affected no rows");
    }
}
