use super::tables::Tables;

/// Storage abstraction so the service can be exercised in isolation.
///
/// `transaction` is the unit of work: the closure sees a private working set
/// which becomes visible only if it returns `Ok`. Implementations serialize
/// transactions, so a read-then-write inside one closure cannot interleave
/// with another writer.
pub trait EntityStore: Send + Sync {
    fn read<T, F>(&self, query: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&Tables) -> T;

    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Tables) -> Result<T, E>,
        E: From<RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} already exists ({constraint} = '{value}')")]
    Conflict {
        entity: &'static str,
        constraint: &'static str,
        value: String,
    },
    #[error("{entity} references missing {reference} {id}")]
    ForeignKey {
        entity: &'static str,
        reference: &'static str,
        id: String,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
