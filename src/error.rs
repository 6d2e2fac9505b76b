// Domain errors raised by the board engine.
//
// Plumbing code returns anyhow::Result; these variants are the failures a
// caller may want to match on (via downcast_ref) rather than just print.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("No kitchen stages are configured")]
    EmptyPipeline,

    #[error("Order {0} is not on the board")]
    UnknownOrder(i64),

    #[error("Order {order_id} has no line {line_id}")]
    UnknownLine { order_id: i64, line_id: i64 },

    #[error("Display {0} does not exist")]
    UnknownDisplay(i64),

    #[error("No display selected. Run 'kboard displays' and 'kboard select <id>'")]
    NoActiveDisplay,

    #[error("Order {0} is not done yet and cannot be cleared")]
    NotDone(i64),

    #[error("Invalid timestamp: '{0}'")]
    InvalidTimestamp(String),

    #[error("Invalid configuration value for '{key}': '{value}'")]
    Config { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(BoardError::UnknownOrder(7).to_string(), "Order 7 is not on the board");
        assert_eq!(
            BoardError::UnknownLine { order_id: 1, line_id: 2 }.to_string(),
            "Order 1 has no line 2"
        );
        let err = BoardError::Config { key: "sla.warning".into(), value: "soon".into() };
        assert!(err.to_string().contains("sla.warning"));
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = BoardError::NotDone(3).into();
        assert!(matches!(err.downcast_ref::<BoardError>(), Some(BoardError::NotDone(3))));
    }
}
