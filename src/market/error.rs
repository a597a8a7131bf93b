use thiserror::Error;

use crate::core_types::{Amount, OrderId, PlayerId, TeamId};

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Order {0} is not open for bidding")]
    OrderNotAvailable(OrderId),

    #[error("Bid too low: offered {offered}, minimum required {min_required}")]
    BidTooLow {
        offered: Amount,
        min_required: Amount,
    },

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Team {team_id} does not hold an active slot for player {player_id}")]
    InvalidOwnership {
        team_id: TeamId,
        player_id: PlayerId,
    },

    #[error("Player {0} is not eligible for this league's pool")]
    PlayerNotEligible(PlayerId),

    #[error("Team not found: {0}")]
    TeamNotFound(TeamId),

    #[error("Player {0} is clause-locked")]
    PlayerLocked(PlayerId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Amount arithmetic overflow")]
    Overflow,
}

impl MarketError {
    /// Whether the caller should retry the operation.
    ///
    /// Transient store conditions (serialization failure, lock or statement
    /// timeout, pool exhaustion) are retryable; domain violations are
    /// terminal and retrying them without a state change cannot succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            MarketError::Database(e) => is_transient(e),
            _ => false,
        }
    }
}

fn is_transient(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => {
            // 40001 serialization_failure, 40P01 deadlock_detected,
            // 55P03 lock_not_available, 57014 query_canceled (statement timeout)
            matches!(
                db.code().as_deref(),
                Some("40001") | Some("40P01") | Some("55P03") | Some("57014")
            )
        }
        _ => false,
    }
}

impl From<validator::ValidationErrors> for MarketError {
    fn from(e: validator::ValidationErrors) -> Self {
        MarketError::InvalidInput(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_are_terminal() {
        let errs = [
            MarketError::OrderNotAvailable(1),
            MarketError::BidTooLow {
                offered: 5,
                min_required: 10,
            },
            MarketError::InsufficientFunds,
            MarketError::PlayerNotEligible(9),
            MarketError::TeamNotFound(3),
            MarketError::PlayerLocked(9),
            MarketError::Overflow,
        ];
        for e in errs {
            assert!(!e.is_retryable(), "{e} should be terminal");
        }
    }

    #[test]
    fn pool_timeout_is_retryable() {
        let e = MarketError::Database(sqlx::Error::PoolTimedOut);
        assert!(e.is_retryable());
    }

    #[test]
    fn bid_too_low_display_names_both_amounts() {
        let e = MarketError::BidTooLow {
            offered: 1_400_000,
            min_required: 2_000_001,
        };
        let msg = e.to_string();
        assert!(msg.contains("1400000"));
        assert!(msg.contains("2000001"));
    }
}
