use thiserror::Error;

#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// A UNIQUE or PRIMARY KEY constraint rejected the statement.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A FOREIGN KEY constraint rejected the statement: either a delete of a
    /// still-referenced row or an insert pointing at a missing row.
    #[error("foreign key violation: {0}")]
    ForeignKey(String),
}
