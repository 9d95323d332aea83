use crate::error::{AnalyzerError, AnalyzerResult};
use crate::models::ChatItem;
use crate::utils::normalize;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// ルールファイル内の1エントリ（文字列、または完全一致指定付きオブジェクト）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RuleEntry {
    Phrase(String),
    Detailed {
        phrase: String,
        #[serde(default)]
        exact: bool,
    },
}

/// コンパイル済みのキーワードルール
#[derive(Debug, Clone, PartialEq)]
pub struct ContextRule {
    /// ルールファイルに書かれたままのフレーズ
    pub phrase: String,
    /// 完全一致のみ許可するか
    pub exact: bool,
    normalized: String,
}

impl ContextRule {
    pub fn new(phrase: impl Into<String>, exact: bool) -> Self {
        let phrase = phrase.into().trim().to_string();
        let normalized = normalize(&phrase);
        Self {
            phrase,
            exact,
            normalized,
        }
    }

    fn matches(&self, normalized_text: &str) -> bool {
        if self.exact {
            normalized_text == self.normalized
        } else {
            normalized_text.contains(&self.normalized)
        }
    }
}

impl From<RuleEntry> for ContextRule {
    fn from(entry: RuleEntry) -> Self {
        match entry {
            RuleEntry::Phrase(phrase) => ContextRule::new(phrase, false),
            RuleEntry::Detailed { phrase, exact } => ContextRule::new(phrase, exact),
        }
    }
}

/// 1テキストに対するマッチ結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMatch {
    /// マッチしたコンテキストラベル（重複なし）
    pub contexts: BTreeSet<String>,
    /// マッチしたキーワード（初出順、正規化後の表記で重複排除）
    pub keywords: Vec<String>,
}

impl ContextMatch {
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty() && self.keywords.is_empty()
    }
}

/// キーワードルールによるコンテキスト判定
///
/// ラベルはソート順、各ラベル内のフレーズはファイル記載順に評価するため、
/// 結果の順序はハッシュ順に依存しない。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextMatcher {
    rules: BTreeMap<String, Vec<ContextRule>>,
}

impl ContextMatcher {
    /// ルールなし（何にもマッチしない）のマッチャー
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: BTreeMap<String, Vec<RuleEntry>>) -> Self {
        let rules = rules
            .into_iter()
            .map(|(label, entries)| {
                let compiled: Vec<ContextRule> = entries
                    .into_iter()
                    .map(ContextRule::from)
                    .filter(|rule| {
                        if rule.normalized.is_empty() {
                            debug!(label = %label, "Empty context phrase ignored");
                            false
                        } else {
                            true
                        }
                    })
                    .collect();
                (label, compiled)
            })
            .collect();

        Self { rules }
    }

    /// JSON文字列からルールを読み込む
    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        let rules: BTreeMap<String, Vec<RuleEntry>> = serde_json::from_str(content)?;
        Ok(Self::from_rules(rules))
    }

    /// ルールファイルを読み込む（失敗時はエラーを返す）
    pub fn try_load(path: impl AsRef<Path>) -> AnalyzerResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AnalyzerError::rule_file(path.display().to_string(), e.to_string()))?;
        let matcher = Self::from_json_str(&content)
            .map_err(|e| AnalyzerError::rule_file(path.display().to_string(), e.to_string()))?;

        info!(
            path = %path.display(),
            labels = matcher.label_count(),
            phrases = matcher.phrase_count(),
            "🏷️ Context rules loaded"
        );
        Ok(matcher)
    }

    /// ルールファイルを読み込む
    ///
    /// ファイルが存在しない・解析できない場合は空のマッチャーに縮退する。
    pub fn load(path: impl AsRef<Path>) -> Self {
        match Self::try_load(path) {
            Ok(matcher) => matcher,
            Err(e) => {
                warn!("{}; continuing without contexts", e);
                Self::empty()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.values().all(|rules| rules.is_empty())
    }

    pub fn label_count(&self) -> usize {
        self.rules.len()
    }

    pub fn phrase_count(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    /// テキストにマッチするコンテキストとキーワードを返す
    pub fn match_text(&self, text: &str) -> ContextMatch {
        let mut result = ContextMatch::default();
        if self.rules.is_empty() {
            return result;
        }

        let normalized = normalize(text);
        if normalized.is_empty() {
            return result;
        }

        let mut seen_keywords = HashSet::new();
        for (label, rules) in &self.rules {
            for rule in rules.iter().filter(|rule| rule.matches(&normalized)) {
                result.contexts.insert(label.clone());
                if seen_keywords.insert(rule.normalized.as_str()) {
                    result.keywords.push(rule.phrase.clone());
                }
            }
        }

        result
    }

    pub fn match_item(&self, item: &ChatItem) -> ContextMatch {
        self.match_text(&item.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const RULES: &str = r#"{
        "funny": ["lol", "lmao", "草", {"phrase": "w", "exact": true}],
        "hype": ["pog", "let's go", "LOL"],
        "scary": [{"phrase": "scary"}]
    }"#;

    #[test]
    fn test_substring_match_is_case_and_punctuation_insensitive() {
        let matcher = ContextMatcher::from_json_str(RULES).unwrap();

        let result = matcher.match_text("LMAO!!! that was great");
        assert_eq!(result.contexts, BTreeSet::from(["funny".to_string()]));
        assert_eq!(result.keywords, vec!["lmao"]);

        let result = matcher.match_text("Lets GO chat");
        assert!(result.contexts.contains("hype"));
        assert_eq!(result.keywords, vec!["let's go"]);
    }

    #[test]
    fn test_multiple_labels_match() {
        let matcher = ContextMatcher::from_json_str(RULES).unwrap();

        let result = matcher.match_text("lol pog");
        assert_eq!(
            result.contexts,
            BTreeSet::from(["funny".to_string(), "hype".to_string()])
        );
        // "LOL" は正規化後 "lol" と同じなので重複として扱う
        assert_eq!(result.keywords, vec!["lol", "pog"]);
    }

    #[test]
    fn test_exact_rule_requires_whole_text() {
        let matcher = ContextMatcher::from_json_str(RULES).unwrap();

        assert!(matcher.match_text("w").contexts.contains("funny"));
        assert!(matcher.match_text("  W  ").contexts.contains("funny"));
        assert!(matcher.match_text("wow").is_empty());
    }

    #[test]
    fn test_non_latin_phrase() {
        let matcher = ContextMatcher::from_json_str(RULES).unwrap();
        let result = matcher.match_text("草草草");
        assert!(result.contexts.contains("funny"));
        assert_eq!(result.keywords, vec!["草"]);
    }

    #[test]
    fn test_no_match() {
        let matcher = ContextMatcher::from_json_str(RULES).unwrap();
        assert!(matcher.match_text("good evening").is_empty());
        assert!(matcher.match_text("").is_empty());
    }

    #[test]
    fn test_missing_rule_file_degrades_to_empty() {
        let matcher = ContextMatcher::load("definitely/not/here/contexts.json");
        assert!(matcher.is_empty());
        assert!(matcher.match_text("lol").is_empty());

        assert!(matches!(
            ContextMatcher::try_load("definitely/not/here/contexts.json"),
            Err(AnalyzerError::RuleFile { .. })
        ));
    }

    #[test]
    fn test_unparseable_rule_file_degrades_to_empty() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ this is not json").unwrap();

        let matcher = ContextMatcher::load(file.path());
        assert!(matcher.is_empty());
    }

    #[test]
    fn test_load_rule_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", RULES).unwrap();

        let matcher = ContextMatcher::load(file.path());
        assert_eq!(matcher.label_count(), 3);
        assert_eq!(matcher.phrase_count(), 8);
    }

    #[test]
    fn test_empty_phrases_are_ignored() {
        let matcher = ContextMatcher::from_json_str(r#"{"noise": ["", "   ", "!!"]}"#).unwrap();
        assert_eq!(matcher.phrase_count(), 1);
        assert!(matcher.match_text("anything").is_empty());
        assert!(matcher.match_text("wow !!").contexts.contains("noise"));
    }
}
