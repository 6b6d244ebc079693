// Pricing — immutable except through admin update; read-heavy, cached by the
// billing service at steady state.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::schema::pricing;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PricingCategory {
    Quick,
    Think,
}

impl PricingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingCategory::Quick => "quick",
            PricingCategory::Think => "think",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "quick" => Some(PricingCategory::Quick),
            "think" => Some(PricingCategory::Think),
            _ => None,
        }
    }

    /// `TOKEN_CAPACITY_LIMITS` — the documented per-category allocation cap.
    pub fn capacity_limit(&self) -> i64 {
        match self {
            PricingCategory::Quick => 5_000_000,
            PricingCategory::Think => 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = pricing)]
#[diesel(primary_key(model_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Pricing {
    pub model_id: String,
    pub price_per_m_token: i64,
    pub category: String,
    pub exchange_rate: Option<f64>,
    pub margin_percent: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl Pricing {
    pub fn category(&self) -> Option<PricingCategory> {
        PricingCategory::from_str(&self.category)
    }

    /// `tokens = floor(credits * 1_000_000 / price_per_m_token)`. Tokens never
    /// convert back to credits.
    pub fn credits_to_tokens(&self, credits: i64) -> i64 {
        (credits * 1_000_000) / self.price_per_m_token
    }

    pub async fn find(
        conn: &mut AsyncPgConnection,
        model: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::pricing::dsl::*;

        pricing
            .filter(model_id.eq(model))
            .first::<Pricing>(conn)
            .await
            .optional()
    }

    pub async fn list_for_models(
        conn: &mut AsyncPgConnection,
        models: &[String],
    ) -> Result<Vec<Self>, diesel::result::Error> {
        use crate::schema::pricing::dsl::*;

        pricing
            .filter(model_id.eq_any(models))
            .load::<Pricing>(conn)
            .await
    }

    pub async fn list_all(
        conn: &mut AsyncPgConnection,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        use crate::schema::pricing::dsl::*;

        pricing.load::<Pricing>(conn).await
    }

    /// Every `model_id` priced under a category, used to compute the
    /// category-wide token total across *all* of a user's models, not just
    /// the models touched by one `allocate()` call.
    pub async fn list_model_ids_for_category(
        conn: &mut AsyncPgConnection,
        category_value: PricingCategory,
    ) -> Result<Vec<String>, diesel::result::Error> {
        use crate::schema::pricing::dsl::*;

        pricing
            .filter(category.eq(category_value.as_str()))
            .select(model_id)
            .load::<String>(conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_formula_floors_division() {
        let model = Pricing {
            model_id: "gemini-1.5-flash".to_string(),
            price_per_m_token: 300,
            category: "quick".to_string(),
            exchange_rate: None,
            margin_percent: None,
            updated_at: Utc::now(),
        };
        // 1000 * 1_000_000 / 300 = 3_333_333.33 -> floors to 3_333_333
        assert_eq!(model.credits_to_tokens(1000), 3_333_333);
    }

    #[test]
    fn category_capacity_limits_match_documented_values() {
        assert_eq!(PricingCategory::Quick.capacity_limit(), 5_000_000);
        assert_eq!(PricingCategory::Think.capacity_limit(), 1_000_000);
    }
}
