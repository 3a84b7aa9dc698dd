use anyhow::{Context, Result};
use tracing::debug;

use crate::db::{Database, KEY_API_KEY, KEY_GOAL};
use crate::models::GoalState;

/// The single stored goal record. Saving overwrites; there is no history.
pub struct GoalStore<'a> {
    db: &'a Database,
}

impl<'a> GoalStore<'a> {
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn save(&self, goal: Option<&str>, goal_custom: Option<&str>) -> Result<GoalState> {
        let state = GoalState {
            goal: goal.map(ToString::to_string),
            goal_custom: goal_custom.map(ToString::to_string),
        };
        let json = serde_json::to_string(&state).context("Failed to serialize goal")?;
        self.db.set_item(KEY_GOAL, &json)?;
        Ok(state)
    }

    /// The stored goal, or an empty record when missing or corrupt.
    #[must_use]
    pub fn load(&self) -> GoalState {
        match self.db.get_item(KEY_GOAL) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                debug!(error = %e, "stored goal is corrupt; using empty goal");
                GoalState::default()
            }),
            Ok(None) => GoalState::default(),
            Err(e) => {
                debug!(error = %e, "goal storage unreadable; using empty goal");
                GoalState::default()
            }
        }
    }
}

/// The analysis API credential, stored locally as entered.
pub struct CredentialStore<'a> {
    db: &'a Database,
}

impl<'a> CredentialStore<'a> {
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Store a trimmed key. A blank key clears the stored one; returns whether
    /// a key is now stored.
    pub fn save(&self, key: &str) -> Result<bool> {
        let key = key.trim();
        if key.is_empty() {
            self.db.remove_item(KEY_API_KEY)?;
            return Ok(false);
        }
        self.db.set_item(KEY_API_KEY, key)?;
        Ok(true)
    }

    #[must_use]
    pub fn load(&self) -> Option<String> {
        self.db
            .get_item(KEY_API_KEY)
            .ok()
            .flatten()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    pub fn clear(&self) -> Result<bool> {
        self.db.remove_item(KEY_API_KEY)
    }
}
