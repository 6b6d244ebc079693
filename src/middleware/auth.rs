// Authenticated caller identity, attached to the request by `auth_middleware`
// after the access token verifies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub device_id: String,
}
