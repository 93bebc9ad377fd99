/// Shop-name extraction from a free-text grounding search reply.
///
/// The primary path asks the AI service for a `{"shops": [...]}` object and cleans the
/// names. When that call fails or the reply does not validate, a line-based regex scan
/// of the raw text takes over. An empty but valid reply is not a failure.
use regex::Regex;
use tracing::{error, info, warn};

use search_common::ai::{structured_response, AiCapability};

use crate::error::AppError;
use crate::model::{ShopList, ShopListSchema, MAX_SHOPS};
use crate::prompts;

/// Extract up to [`MAX_SHOPS`] candidate shop names from `raw_search_text`.
///
/// Only a failure of the regex fallback itself is returned as an error.
pub async fn extract_shops(
    ai: &dyn AiCapability,
    raw_search_text: &str,
) -> Result<ShopList, AppError> {
    match structured_extraction(ai, raw_search_text).await {
        Ok(list) => {
            info!(step = "extract_shops", shops = list.shops.len(), "structured extraction succeeded");
            Ok(list)
        }
        Err(e) => {
            error!(step = "extract_shops", error = %e, "structured extraction failed");
            warn!(step = "extract_shops", "using fallback extraction");
            fallback_extraction(raw_search_text)
        }
    }
}

async fn structured_extraction(
    ai: &dyn AiCapability,
    raw_search_text: &str,
) -> Result<ShopList, AppError> {
    let prompt = prompts::extract_shop_names(raw_search_text);
    let result: ShopListSchema = structured_response(ai, &prompt).await?;
    clean_shop_names(&result.shops)
}

/// Strip enumeration markers, drop blanks and exact duplicates, keep first-seen order.
pub fn clean_shop_names(names: &[String]) -> Result<ShopList, AppError> {
    let marker_re = Regex::new(r"^[\d.)\-\s]+")?;

    let mut shops: Vec<String> = Vec::new();
    for name in names.iter().take(MAX_SHOPS) {
        let cleaned = marker_re.replace(name, "");
        let cleaned = cleaned.trim();
        if !cleaned.is_empty() && !shops.iter().any(|s| s == cleaned) {
            shops.push(cleaned.to_string());
        }
    }
    shops.truncate(MAX_SHOPS);

    Ok(ShopList { shops })
}

/// Line scan for `1. Name - description` and `・Name：detail` entries.
///
/// Unlike the structured path this neither deduplicates nor strips markers beyond
/// the pattern itself; blank captures are skipped.
pub fn fallback_extraction(text: &str) -> Result<ShopList, AppError> {
    let numbered_re = Regex::new(r"^\d+\.\s*([^-:：]+)")?;

    let mut shops: Vec<String> = Vec::new();
    for line in text.split('\n') {
        let candidate = if let Some(caps) = numbered_re.captures(line) {
            caps.get(1).map(|m| m.as_str().trim().to_string())
        } else if let Some(rest) = line.trim().strip_prefix('・') {
            rest.split([':', '：']).next().map(|s| s.trim().to_string())
        } else {
            None
        };

        match candidate {
            Some(shop) if !shop.is_empty() => shops.push(shop),
            _ => {}
        }
    }

    info!(step = "fallback_extraction", shops = shops.len(), "fallback extraction finished");
    shops.truncate(MAX_SHOPS);
    Ok(ShopList { shops })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{upstream_down, CallKind, ScriptedAi};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn strips_enumeration_markers() {
        let list = clean_shop_names(&names(&["1) Blue Note Cafe", "2. 一蘭 渋谷店", "- 鳥貴族"])).unwrap();
        assert_eq!(list.shops, names(&["Blue Note Cafe", "一蘭 渋谷店", "鳥貴族"]));
    }

    #[test]
    fn dedupes_keeping_first_position() {
        let list = clean_shop_names(&names(&["1. Alpha", "Beta", "2. Alpha", "Gamma"])).unwrap();
        assert_eq!(list.shops, names(&["Alpha", "Beta", "Gamma"]));
    }

    #[test]
    fn drops_names_that_are_only_markers() {
        let list = clean_shop_names(&names(&["3.", "  ", "Delta"])).unwrap();
        assert_eq!(list.shops, names(&["Delta"]));
    }

    #[test]
    fn cleaning_truncates_to_ten() {
        let raw: Vec<String> = (1..=14).map(|i| format!("Shop {i}")).collect();
        let list = clean_shop_names(&raw).unwrap();
        assert_eq!(list.shops.len(), MAX_SHOPS);
        assert_eq!(list.shops[0], "Shop 1");
        assert_eq!(list.shops[9], "Shop 10");
    }

    #[test]
    fn fallback_reads_numbered_lines() {
        let list = fallback_extraction("3. Sushi Tei - great fish").unwrap();
        assert_eq!(list.shops, names(&["Sushi Tei"]));
    }

    #[test]
    fn fallback_reads_bullet_lines() {
        let list = fallback_extraction("・Ramen House：Tokyo").unwrap();
        assert_eq!(list.shops, names(&["Ramen House"]));

        let list = fallback_extraction("  ・焼肉 叙々苑: 個室あり").unwrap();
        assert_eq!(list.shops, names(&["焼肉 叙々苑"]));
    }

    #[test]
    fn fallback_ignores_prose() {
        let text = "渋谷のおすすめ店です。\n\n1. 一蘭 渋谷店：とんこつ\n詳細は公式サイトへ\n・鳥貴族\n";
        let list = fallback_extraction(text).unwrap();
        assert_eq!(list.shops, names(&["一蘭 渋谷店", "鳥貴族"]));
    }

    #[test]
    fn fallback_keeps_duplicates_and_truncates() {
        // The fallback path does not deduplicate, unlike the structured path.
        let text: String = (0..12).map(|_| "1. Same Shop\n").collect();
        let list = fallback_extraction(&text).unwrap();
        assert_eq!(list.shops.len(), MAX_SHOPS);
        assert!(list.shops.iter().all(|s| s == "Same Shop"));
    }

    #[tokio::test]
    async fn structured_reply_is_cleaned() {
        let ai = ScriptedAi::new().json(r#"{"shops": ["1) Blue Note Cafe", "Blue Note Cafe", "2. Jazz Bar"]}"#);
        let list = extract_shops(&ai, "irrelevant").await.unwrap();
        assert_eq!(list.shops, names(&["Blue Note Cafe", "Jazz Bar"]));

        let calls = ai.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].kind, CallKind::Json);
        assert!(calls[0].prompt.contains("irrelevant"));
    }

    #[tokio::test]
    async fn empty_structured_reply_does_not_fall_back() {
        let ai = ScriptedAi::new().json(r#"{"shops": []}"#);
        let list = extract_shops(&ai, "1. Would Match Fallback").await.unwrap();
        assert!(list.shops.is_empty());
    }

    #[tokio::test]
    async fn invalid_reply_falls_back_to_regex() {
        let ai = ScriptedAi::new().json(r#"{"names": "wrong shape"}"#);
        let list = extract_shops(&ai, "1. Sushi Tei - great fish\n・Ramen House：Tokyo")
            .await
            .unwrap();
        assert_eq!(list.shops, names(&["Sushi Tei", "Ramen House"]));
    }

    #[tokio::test]
    async fn transport_error_falls_back_to_regex() {
        let ai = ScriptedAi::new().json_err(upstream_down());
        let list = extract_shops(&ai, "1. Sushi Tei\n1. Sushi Tei").await.unwrap();
        assert_eq!(list.shops, names(&["Sushi Tei", "Sushi Tei"]));
    }
}
