//! Prompt templates sent to the generative-AI service.

pub fn initial_search(input_text: &str) -> String {
    format!(
        "「{input_text}」に合う飲食店を10件リストアップしてください。

以下の条件を満たす飲食店を検索してください:
- 検索条件に合致する飲食店
- 実在する店舗
- できるだけ具体的な店舗名(支店名も含む)

各店舗について、簡潔な説明を添えて回答してください。"
    )
}

pub fn extract_shop_names(search_result: &str) -> String {
    format!(
        "以下のテキストから、飲食店の店舗名を抽出してください。
最大10件まで抽出してください。

テキスト:
{search_result}

注意:
- 店舗名のみを抽出(説明文は含めない)
- 「〇〇店」のように店舗を特定できる形式で
- 重複がある場合は除去"
    )
}

pub fn shop_detail(shop_name: &str, input_text: &str) -> String {
    format!(
        "「{shop_name}」について、以下の情報を検索してください。

【ユーザーの検索条件】
{input_text}

【検索項目】
- 店舗の基本情報(住所、営業時間、定休日など) 出典URL
- 料理のジャンルや特徴
- アクセス方法
- 評判や口コミ 出典URL
- 上記の検索条件との関連性

【回答形式】
- 検索項目の各情報の根拠となるURL（公式サイト、食べログ、Rettyなど）を必ず記載してください
- 情報の出典元がわかるよう「参照: [URL]」の形式で明記してください
- 丁寧かつ簡潔にまとめてください"
    )
}

pub fn judge_match(input_text: &str, shop_name: &str, shop_detail: &str) -> String {
    format!(
        "以下の検索条件と店舗情報を比較して、合致度を5段階で判定してください。

【検索条件】
{input_text}

【店舗名】
{shop_name}

【店舗情報】
{shop_detail}

【判定基準】
5: 完全に合致 - 検索条件のすべての要素を満たしている
4: ほぼ合致も一部相違あり - 主要な条件を満たすが、一部不明または相違がある
3: 半分程度合致 - 条件の約半分を満たす
2: 一部合致もほぼ相違 - 一部のみ該当し、多くの条件を満たさない
1: まったく合致しない - 検索条件とほぼ無関係

判定結果をスコアと理由(100文字以内)で回答してください。"
    )
}
