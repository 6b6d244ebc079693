// CollectionSharing — widens a persistent collection's visibility to a second
// user. `(owner_user_id, collection_name, shared_with_user_id)` unique.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::collection_sharing;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = collection_sharing)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CollectionSharing {
    pub id: Uuid,
    pub owner_user_id: String,
    pub collection_name: String,
    pub shared_with_user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = collection_sharing)]
pub struct NewCollectionSharing {
    pub owner_user_id: String,
    pub collection_name: String,
    pub shared_with_user_id: String,
}

impl CollectionSharing {
    pub async fn share(
        conn: &mut AsyncPgConnection,
        owner: &str,
        collection: &str,
        shared_with: &str,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::collection_sharing::dsl::*;

        diesel::insert_into(collection_sharing)
            .values(&NewCollectionSharing {
                owner_user_id: owner.to_string(),
                collection_name: collection.to_string(),
                shared_with_user_id: shared_with.to_string(),
            })
            .get_result::<CollectionSharing>(conn)
            .await
    }

    pub async fn collections_shared_with(
        conn: &mut AsyncPgConnection,
        requester: &str,
    ) -> Result<Vec<(String, String)>, diesel::result::Error> {
        use crate::schema::collection_sharing::dsl::*;

        collection_sharing
            .filter(shared_with_user_id.eq(requester))
            .select((owner_user_id, collection_name))
            .load::<(String, String)>(conn)
            .await
    }
}
