//! User models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A GitHub user who has signed in at least once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// GitHub login
    pub login: String,

    /// Never holds a real secret; access tokens live in the session store only
    pub credential: String,

    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}
