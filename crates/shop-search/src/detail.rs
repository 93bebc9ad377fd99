/// Per-shop detail search and match judgement.
///
/// Shops are processed strictly in input order, one at a time, with a fixed pause
/// between consecutive shops. A failure for one shop is turned into a sentinel
/// summary (score 1) and the batch carries on, so the output always has one summary
/// per input name in the same order.
use std::fmt::Display;

use tracing::{error, info};

use search_common::ai::{structured_response, AiCapability};
use search_common::error::AiError;

use crate::model::{JudgementSchema, MatchJudgement, SearchQuery, ShopSummary, MAX_SCORE, MIN_SCORE};
use crate::prompts;
use crate::rate_limit::RateLimiter;

const ERROR_REASON_CHARS: usize = 50;

pub async fn detail_search(
    ai: &dyn AiCapability,
    limiter: &RateLimiter,
    query: &SearchQuery,
    shop_names: &[String],
) -> Vec<ShopSummary> {
    let total = shop_names.len();
    let mut summaries = Vec::with_capacity(total);

    for (index, shop_name) in shop_names.iter().enumerate() {
        limiter.before_item(index).await;
        info!(step = "detail_search", shop = %shop_name, index = index + 1, total, "processing shop");

        let summary = match summarize_shop(ai, query, shop_name).await {
            Ok(summary) => summary,
            Err(e) => {
                error!(step = "detail_search", shop = %shop_name, error = %e, "detail search failed for shop");
                error_summary(shop_name, &e)
            }
        };
        summaries.push(summary);
    }

    summaries
}

async fn summarize_shop(
    ai: &dyn AiCapability,
    query: &SearchQuery,
    shop_name: &str,
) -> Result<ShopSummary, AiError> {
    let detail = ai
        .grounding_search(&prompts::shop_detail(shop_name, query.as_str()))
        .await?;
    info!(
        step = "shop_detail",
        shop = %shop_name,
        chars = detail.text.chars().count(),
        sources = detail.sources.len(),
        "shop detail search completed"
    );

    let judgement = judge_match(ai, query, shop_name, &detail.text).await?;
    info!(step = "judge_match", shop = %shop_name, score = judgement.score, "match judged");

    Ok(ShopSummary {
        shop_name: shop_name.to_string(),
        detail_search_result: detail.text,
        judgement,
        sources: detail.sources,
    })
}

async fn judge_match(
    ai: &dyn AiCapability,
    query: &SearchQuery,
    shop_name: &str,
    shop_detail: &str,
) -> Result<MatchJudgement, AiError> {
    let prompt = prompts::judge_match(query.as_str(), shop_name, shop_detail);
    let result: JudgementSchema = structured_response(ai, &prompt).await?;

    Ok(MatchJudgement {
        shop_name: shop_name.to_string(),
        score: result.score.clamp(i64::from(MIN_SCORE), i64::from(MAX_SCORE)) as u8,
        reason: result.reason,
        search_result: shop_detail.to_string(),
    })
}

/// Placeholder summary for a shop whose search or judgement failed.
pub fn error_summary(shop_name: &str, err: &dyn Display) -> ShopSummary {
    let message = err.to_string();
    ShopSummary {
        shop_name: shop_name.to_string(),
        detail_search_result: format!("検索エラー: {message}"),
        judgement: MatchJudgement {
            shop_name: shop_name.to_string(),
            score: MIN_SCORE,
            reason: format!(
                "検索中にエラーが発生しました: {}",
                truncate_chars(&message, ERROR_REASON_CHARS)
            ),
            search_result: String::new(),
        },
        sources: Vec::new(),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}
