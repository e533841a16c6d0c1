use serde::{Deserialize, Serialize};

/// Order lifecycle state as reported by the venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    /// Resting on the book (possibly partially filled)
    Open,
    /// Completely filled
    Filled,
    /// Rejected by the matching engine
    Rejected,
    /// Cancelled by the user or the venue
    Cancelled,
    /// Conditional order waiting for its trigger
    Untriggered,
    /// Conditional order whose trigger fired
    Triggered,
}

impl OrderState {
    /// Returns true if no further updates are expected for the order
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Rejected | OrderState::Cancelled
        )
    }

    /// Returns true if the order can still trade or trigger
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            OrderState::Open | OrderState::Untriggered | OrderState::Triggered
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        let state: OrderState = serde_json::from_str("\"untriggered\"").unwrap();
        assert_eq!(state, OrderState::Untriggered);
        assert_eq!(serde_json::to_string(&OrderState::Cancelled).unwrap(), "\"cancelled\"");
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderState::Filled.is_terminal());
        assert!(OrderState::Cancelled.is_terminal());
        assert!(!OrderState::Open.is_terminal());
        assert!(OrderState::Untriggered.is_active());
    }
}
