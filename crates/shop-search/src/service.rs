use std::sync::Arc;

use tracing::info;

use search_common::ai::AiCapability;

use crate::detail;
use crate::error::AppError;
use crate::extract;
use crate::model::{
    GroundingInfo, InitialSearchResponse, SearchQuery, ShopDetailSearchResponse,
};
use crate::prompts;
use crate::rate_limit::RateLimiter;

/// Entry point for both search stages. Holds no per-request state.
#[derive(Clone)]
pub struct SearchService {
    ai: Arc<dyn AiCapability>,
    limiter: RateLimiter,
}

impl SearchService {
    pub fn new(ai: Arc<dyn AiCapability>, limiter: RateLimiter) -> Self {
        Self { ai, limiter }
    }

    pub fn model_name(&self) -> &str {
        self.ai.model_name()
    }

    /// Broad grounding search for the query, then shop-name extraction.
    ///
    /// A failed grounding search is returned to the caller; extraction failures are
    /// recovered inside [`extract::extract_shops`].
    pub async fn initial_search(&self, input_text: &str) -> Result<InitialSearchResponse, AppError> {
        let query = SearchQuery::parse(input_text)?;
        info!(step = "initial_search", query = %query, "initial search started");

        let prompt = prompts::initial_search(query.as_str());
        let search = self.ai.grounding_search(&prompt).await?;
        info!(
            step = "initial_search",
            chars = search.text.chars().count(),
            sources = search.sources.len(),
            "initial grounding search completed"
        );

        let shop_list = extract::extract_shops(self.ai.as_ref(), &search.text).await?;
        info!(step = "initial_search", shops = shop_list.shops.len(), "initial search completed");

        let model = self.model_name().to_string();
        Ok(InitialSearchResponse {
            input_text: query,
            prompt_used: prompt,
            model_name: model.clone(),
            raw_response: search.text,
            grounding_metadata: GroundingInfo {
                search_enabled: true,
                model,
            },
            shop_list,
        })
    }

    /// Detail search and judgement for each shop, in order.
    pub async fn detail_search(
        &self,
        input_text: &str,
        shop_names: Vec<String>,
    ) -> Result<ShopDetailSearchResponse, AppError> {
        let query = SearchQuery::parse(input_text)?;
        if shop_names.is_empty() {
            return Err(AppError::InvalidRequest(
                "shop_names must contain at least one shop".to_string(),
            ));
        }
        info!(step = "detail_search", query = %query, shops = shop_names.len(), "detail search started");

        let summaries =
            detail::detail_search(self.ai.as_ref(), &self.limiter, &query, &shop_names).await;
        info!(step = "detail_search", summaries = summaries.len(), "detail search completed");

        Ok(ShopDetailSearchResponse {
            input_text: query,
            shop_names,
            summaries,
        })
    }
}
