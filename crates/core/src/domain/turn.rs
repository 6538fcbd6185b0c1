use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker of a persisted turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One message in a session's history. Immutable once stored; ordering is
/// creation order and is never edited.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub session_id: String,
    pub role: Role,
    pub text: String,
    pub creation_order: i64,
    pub created_at: DateTime<Utc>,
}

/// The bounded recent slice of a session, oldest-first. This is the only
/// context any downstream decision ever sees; anything older is invisible.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryWindow {
    turns: Vec<Turn>,
}

impl HistoryWindow {
    /// Builds a window from oldest-first turns, keeping at most `cap` of the
    /// most recent ones.
    pub fn new(mut turns: Vec<Turn>, cap: usize) -> Self {
        if turns.len() > cap {
            turns.drain(..turns.len() - cap);
        }
        Self { turns }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The last `count` turns, still oldest-first. Used for the classifier's
    /// shorter rolling window.
    pub fn tail(&self, count: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(count);
        &self.turns[start..]
    }

    /// Most recent prior user turn matching `predicate`, scanning backwards.
    pub fn last_user_turn_where<F>(&self, predicate: F) -> Option<&Turn>
    where
        F: Fn(&Turn) -> bool,
    {
        self.turns.iter().rev().find(|turn| turn.role == Role::User && predicate(turn))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{HistoryWindow, Role, Turn};

    fn turn(order: i64, role: Role, text: &str) -> Turn {
        Turn {
            session_id: "+60123".to_string(),
            role,
            text: text.to_string(),
            creation_order: order,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn window_caps_to_most_recent_turns() {
        let turns = (0..14).map(|i| turn(i, Role::User, "hi")).collect();
        let window = HistoryWindow::new(turns, 10);

        assert_eq!(window.len(), 10);
        assert_eq!(window.turns().first().map(|t| t.creation_order), Some(4));
        assert_eq!(window.turns().last().map(|t| t.creation_order), Some(13));
    }

    #[test]
    fn window_order_is_non_decreasing() {
        let turns = (0..10).map(|i| turn(i, Role::User, "hi")).collect();
        let window = HistoryWindow::new(turns, 10);
        let orders: Vec<i64> = window.turns().iter().map(|t| t.creation_order).collect();
        assert!(orders.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn tail_returns_last_turns_oldest_first() {
        let turns = (0..8).map(|i| turn(i, Role::User, "hi")).collect();
        let window = HistoryWindow::new(turns, 10);
        let tail = window.tail(5);

        assert_eq!(tail.len(), 5);
        assert_eq!(tail[0].creation_order, 3);
        assert_eq!(tail[4].creation_order, 7);
    }

    #[test]
    fn last_user_turn_where_scans_backwards_and_skips_assistant() {
        let turns = vec![
            turn(0, Role::User, "see https://a.example"),
            turn(1, Role::Assistant, "noted https://b.example"),
            turn(2, Role::User, "thanks"),
        ];
        let window = HistoryWindow::new(turns, 10);
        let found = window.last_user_turn_where(|t| t.text.contains("https://"));

        assert_eq!(found.map(|t| t.creation_order), Some(0));
    }

    #[test]
    fn role_round_trips_through_store_labels() {
        assert_eq!(Role::parse(Role::User.as_str()), Some(Role::User));
        assert_eq!(Role::parse(Role::Assistant.as_str()), Some(Role::Assistant));
        assert_eq!(Role::parse("system"), None);
    }
}
