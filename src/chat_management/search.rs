use crate::models::ChatItem;
use crate::utils::normalize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// ユーザー検索条件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserQuery {
    /// チャンネルIDで検索（名前変更の影響を受けない）
    Id(String),
    /// 表示名で検索
    Name(String),
}

impl UserQuery {
    pub fn matches(&self, item: &ChatItem) -> bool {
        match self {
            UserQuery::Id(id) => item.author.id == *id,
            UserQuery::Name(name) => item.author.name == *name,
        }
    }
}

/// フレーズを含む（`exact` の場合は完全一致する）チャットを返す
pub fn find_messages<'a>(
    items: &'a [ChatItem],
    phrase: &str,
    exact: bool,
    ignore_case: bool,
) -> Vec<&'a ChatItem> {
    debug!(phrase, exact, ignore_case, "Finding messages");

    let phrase = if ignore_case {
        phrase.to_lowercase()
    } else {
        phrase.to_string()
    };

    items
        .iter()
        .filter(|item| {
            let text = if ignore_case {
                item.text.to_lowercase()
            } else {
                item.text.clone()
            };
            if exact {
                text == phrase
            } else {
                text.contains(&phrase)
            }
        })
        .collect()
}

/// 指定ユーザーのチャットを時刻順に返す
pub fn find_user_messages<'a>(items: &'a [ChatItem], query: &UserQuery) -> Vec<&'a ChatItem> {
    debug!(?query, "Finding user messages");
    items.iter().filter(|item| query.matches(item)).collect()
}

/// 最頻出の単語とその出現回数
///
/// 同数の場合は先に出現した単語を優先する。対象がなければ `None`。
pub fn most_used_phrase(
    items: &[ChatItem],
    exclude: &[&str],
    normalize_words: bool,
) -> Option<(String, usize)> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut order = 0usize;

    for word in items.iter().flat_map(|item| item.text.split_whitespace()) {
        let word = if normalize_words {
            normalize(word)
        } else {
            word.to_string()
        };
        if word.is_empty() || exclude.contains(&word.as_str()) {
            continue;
        }
        let entry = counts.entry(word).or_insert((0, order));
        entry.0 += 1;
        order += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(word, (count, _))| (word, count))
}

pub fn total_message_amount(items: &[ChatItem]) -> usize {
    items.len()
}
