// @generated manually — pgvector's `embedding` column on `vector_documents` has no
// Diesel SqlType and is intentionally omitted here; it is read/written through
// `diesel::sql_query` in `services/vector_store.rs`.

diesel::table! {
    use diesel::sql_types::*;

    users (user_id) {
        #[max_length = 40]
        user_id -> Varchar,
        #[max_length = 255]
        google_id -> Nullable<Varchar>,
        #[max_length = 320]
        email -> Nullable<Varchar>,
        #[max_length = 255]
        display_name -> Nullable<Varchar>,
        profile_picture_url -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    devices (device_id) {
        device_id -> Uuid,
        #[max_length = 40]
        user_id -> Varchar,
        #[max_length = 255]
        device_name -> Nullable<Varchar>,
        #[max_length = 16]
        device_type -> Nullable<Varchar>,
        is_active -> Bool,
        created_at -> Timestamptz,
        last_login_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    credits (user_id) {
        #[max_length = 40]
        user_id -> Varchar,
        credits -> Int8,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    token_balances (id) {
        id -> Uuid,
        #[max_length = 40]
        user_id -> Varchar,
        #[max_length = 100]
        model_id -> Varchar,
        allocated_tokens -> Int8,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    pricing (model_id) {
        #[max_length = 100]
        model_id -> Varchar,
        price_per_m_token -> Int8,
        #[max_length = 16]
        category -> Varchar,
        exchange_rate -> Nullable<Float8>,
        margin_percent -> Nullable<Float8>,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    transactions (id) {
        id -> Uuid,
        #[max_length = 40]
        user_id -> Varchar,
        #[max_length = 16]
        transaction_type -> Varchar,
        amount -> Int8,
        #[max_length = 100]
        model_id -> Nullable<Varchar>,
        #[max_length = 255]
        iap_transaction_id -> Nullable<Varchar>,
        metadata -> Nullable<Jsonb>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    token_blacklist (token_hash) {
        #[max_length = 64]
        token_hash -> Varchar,
        expires_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    oauth_states (state) {
        #[max_length = 64]
        state -> Varchar,
        device_id -> Uuid,
        created_at -> Timestamptz,
        expires_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    // `embedding vector(768)` exists in the live schema; it is not declared
    // here because Diesel's table! macro has no SqlType for it. Access it
    // only through raw sql_query in services/vector_store.rs.
    vector_documents (id) {
        id -> Uuid,
        #[max_length = 40]
        user_id -> Nullable<Varchar>,
        #[max_length = 255]
        collection_name -> Varchar,
        #[max_length = 16]
        collection_type -> Varchar,
        content -> Text,
        metadata -> Jsonb,
        created_at -> Timestamptz,
        expires_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    collection_sharing (id) {
        id -> Uuid,
        #[max_length = 40]
        owner_user_id -> Varchar,
        #[max_length = 255]
        collection_name -> Varchar,
        #[max_length = 40]
        shared_with_user_id -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(devices -> users (user_id));
diesel::joinable!(credits -> users (user_id));
diesel::joinable!(token_balances -> users (user_id));
diesel::joinable!(transactions -> users (user_id));
diesel::joinable!(vector_documents -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    collection_sharing,
    credits,
    devices,
    oauth_states,
    pricing,
    token_balances,
    token_blacklist,
    transactions,
    users,
    vector_documents,
);
