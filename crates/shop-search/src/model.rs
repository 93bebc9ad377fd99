use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use search_common::ai::{ResponseSchema, SourceCitation};

use crate::error::AppError;

pub const MAX_SHOPS: usize = 10;
pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

/// User-supplied search text. Never empty or whitespace-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct SearchQuery(String);

impl SearchQuery {
    pub fn parse(input: impl Into<String>) -> Result<Self, AppError> {
        let input = input.into();
        if input.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "input_text must not be empty".to_string(),
            ));
        }
        Ok(Self(input))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// --- AI response schemas ---

/// Shop names extracted from a grounding search reply.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ShopListSchema {
    /// 抽出された飲食店の店舗名リスト(最大10件)
    pub shops: Vec<String>,
}

impl ResponseSchema for ShopListSchema {}

/// Match judgement for one shop against the user's query.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct JudgementSchema {
    /// 合致度スコア(1:まったく合致しない ～ 5:完全に合致)
    #[schemars(range(min = 1, max = 5))]
    pub score: i64,
    /// 判定理由(100文字以内)
    pub reason: String,
}

impl ResponseSchema for JudgementSchema {
    fn validate(&self) -> Result<(), String> {
        let range = i64::from(MIN_SCORE)..=i64::from(MAX_SCORE);
        if range.contains(&self.score) {
            Ok(())
        } else {
            Err(format!(
                "score must be between {MIN_SCORE} and {MAX_SCORE}, got {}",
                self.score
            ))
        }
    }
}

// --- Requests ---

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchRequest {
    /// The user's search query.
    pub input_text: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ShopDetailRequest {
    /// The original search query.
    pub input_text: String,
    /// Shop names to search, as returned by `initial_search`.
    pub shop_names: Vec<String>,
}

// --- Responses ---

/// Candidate shop names: at most [`MAX_SHOPS`], none empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ShopList {
    pub shops: Vec<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GroundingInfo {
    pub search_enabled: bool,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct InitialSearchResponse {
    pub input_text: SearchQuery,
    pub prompt_used: String,
    pub model_name: String,
    pub raw_response: String,
    pub grounding_metadata: GroundingInfo,
    pub shop_list: ShopList,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct MatchJudgement {
    pub shop_name: String,
    /// Always within 1..=5.
    pub score: u8,
    /// Advisory limit of 100 characters; not enforced.
    pub reason: String,
    /// The detail text the score was judged against.
    pub search_result: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ShopSummary {
    pub shop_name: String,
    pub detail_search_result: String,
    pub judgement: MatchJudgement,
    pub sources: Vec<SourceCitation>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ShopDetailSearchResponse {
    pub input_text: SearchQuery,
    pub shop_names: Vec<String>,
    pub summaries: Vec<ShopSummary>,
}
