use crate::models::{
    Author, ChatItem, Emote, Icon, Money, SuperchatColor, MAX_TIME_OFFSET_SECS,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// 生レコードを破棄した理由
#[derive(Error, Debug)]
pub enum MalformedRecord {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record has an unexpected shape: {0}")]
    InvalidShape(#[from] serde_json::Error),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid time offset: {0}")]
    InvalidTime(f64),
}

/// 精製処理の統計
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RefineStats {
    /// 読み込んだ生レコード数
    pub total_records: usize,
    /// 採用したチャットアイテム数
    pub accepted: usize,
    /// 必須フィールド欠落などで破棄した数
    pub malformed: usize,
    /// ID重複で破棄した数
    pub duplicates: usize,
    /// 上限に達して読み込みを打ち切ったか
    pub limit_reached: bool,
}

impl RefineStats {
    /// 供給元を最後まで読み切ったか
    pub fn is_complete(&self) -> bool {
        !self.limit_reached
    }
}

/// 精製結果
#[derive(Debug, Clone, Default)]
pub struct RefinedChat {
    /// 時刻昇順のチャットアイテム
    pub items: Vec<ChatItem>,
    /// 初出順の投稿者レジストリ
    pub authors: Vec<Arc<Author>>,
    pub stats: RefineStats,
}

impl RefinedChat {
    pub fn into_parts(self) -> (Vec<ChatItem>, Vec<Arc<Author>>) {
        (self.items, self.authors)
    }
}

// 必須項目（ID・本文・時刻・投稿者）以外は型が合わなければ欠落として扱う

#[derive(Debug, Deserialize)]
struct RawRecord {
    message_id: Option<String>,
    message: Option<String>,
    time_in_seconds: Option<f64>,
    author: Option<RawAuthor>,
    #[serde(default, deserialize_with = "lenient")]
    money: Option<RawMoney>,
    #[serde(alias = "colours", default, deserialize_with = "lenient")]
    colors: Option<RawColors>,
    #[serde(default, deserialize_with = "lenient")]
    sticker_images: Option<Vec<Icon>>,
    #[serde(default, deserialize_with = "lenient")]
    sticker: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    welcome_text: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    header_secondary_text: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    emotes: Vec<Emote>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    id: Option<String>,
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    is_member: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    membership_info: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    badges: Vec<RawBadge>,
    #[serde(default, deserialize_with = "lenient")]
    images: Vec<Icon>,
}

#[derive(Debug, Deserialize)]
struct RawBadge {
    #[serde(default, deserialize_with = "lenient")]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMoney {
    #[serde(default, deserialize_with = "lenient")]
    amount: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    currency: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    currency_symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawColors {
    #[serde(
        alias = "header_background_colour",
        alias = "header_background_color",
        default,
        deserialize_with = "lenient"
    )]
    header: Option<String>,
    #[serde(
        alias = "body_background_colour",
        alias = "body_background_color",
        default,
        deserialize_with = "lenient"
    )]
    background: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// 検証済みレコード
struct ValidRecord {
    id: String,
    time: u64,
    author: Author,
    text: String,
    shape: RecordShape,
    raw: RawRecord,
}

/// 生レコードから判定した種別
enum RecordShape {
    Message,
    Superchat,
    Membership,
    Sticker,
}

impl RawRecord {
    /// フィールドの有無から種別を判定（判定はここでのみ行う）
    fn shape(&self) -> RecordShape {
        match (&self.money, &self.sticker_images, &self.sticker) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => RecordShape::Sticker,
            (Some(_), None, None) => RecordShape::Superchat,
            _ if self.welcome_text.is_some() || self.header_secondary_text.is_some() => {
                RecordShape::Membership
            }
            _ => RecordShape::Message,
        }
    }
}

impl RawMoney {
    fn into_money(self) -> Money {
        let amount = match self.amount {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        Money {
            amount,
            currency: self.currency.unwrap_or_default(),
            currency_symbol: self.currency_symbol.unwrap_or_default(),
            text: self.text.unwrap_or_default(),
        }
    }
}

impl RawColors {
    fn into_colors(self) -> SuperchatColor {
        SuperchatColor {
            background: self.background.unwrap_or_default(),
            header: self.header.unwrap_or_default(),
        }
    }
}

impl RawAuthor {
    fn into_author(self) -> Result<Author, MalformedRecord> {
        let id = self.id.ok_or(MalformedRecord::MissingField("author.id"))?;
        let name = self.name.ok_or(MalformedRecord::MissingField("author.name"))?;

        // バッジのタイトルからメンバーシップ情報を推定
        let member_badge = self
            .badges
            .into_iter()
            .filter_map(|badge| badge.title)
            .find(|title| title.starts_with("Member") || title.starts_with("New member"));

        let is_member = self.is_member.unwrap_or(member_badge.is_some());
        let membership_info = self
            .membership_info
            .or(member_badge)
            .unwrap_or_default();

        Ok(Author {
            id,
            name,
            is_member,
            membership_info,
            images: self.images,
        })
    }
}

/// 生チャットレコードを型付きチャットアイテムへ精製する
#[derive(Debug, Clone, Default)]
pub struct EventRefiner {
    limit: Option<usize>,
}

impl EventRefiner {
    pub fn new(limit: Option<usize>) -> Self {
        Self { limit }
    }

    /// 生レコード列を精製する
    ///
    /// 不正なレコードはスキップしてカウントし、処理は継続する。
    /// 生レコードは消費され、精製後には保持されない。
    pub fn refine<I>(&self, records: I) -> RefinedChat
    where
        I: IntoIterator<Item = Value>,
    {
        let mut stats = RefineStats::default();
        let mut items: Vec<ChatItem> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut registry: HashMap<String, Arc<Author>> = HashMap::new();
        let mut authors: Vec<Arc<Author>> = Vec::new();

        if self.limit == Some(0) {
            stats.limit_reached = true;
            return RefinedChat {
                items,
                authors,
                stats,
            };
        }

        for record in records {
            stats.total_records += 1;

            let valid = match Self::validate(record) {
                Ok(valid) => valid,
                Err(reason) => {
                    debug!(record = stats.total_records, %reason, "Malformed chat record skipped");
                    stats.malformed += 1;
                    continue;
                }
            };

            if !seen_ids.insert(valid.id.clone()) {
                stats.duplicates += 1;
                continue;
            }

            // 初出の投稿者情報を優先する
            let author = registry
                .entry(valid.author.id.clone())
                .or_insert_with(|| {
                    let author = Arc::new(valid.author);
                    authors.push(author.clone());
                    author
                })
                .clone();

            items.push(Self::build_item(
                valid.id,
                valid.time,
                author,
                valid.text,
                valid.shape,
                valid.raw,
            ));
            stats.accepted += 1;

            if self.limit.is_some_and(|limit| items.len() >= limit) {
                stats.limit_reached = true;
                break;
            }
        }

        if !items.windows(2).all(|pair| pair[0].time <= pair[1].time) {
            debug!("Chat items were not in time order, sorting");
            items.sort_by_key(|item| item.time);
        }

        info!(
            accepted = stats.accepted,
            malformed = stats.malformed,
            duplicates = stats.duplicates,
            authors = authors.len(),
            complete = stats.is_complete(),
            "🧹 Chat records refined"
        );

        RefinedChat {
            items,
            authors,
            stats,
        }
    }

    fn validate(record: Value) -> Result<ValidRecord, MalformedRecord> {
        if !record.is_object() {
            return Err(MalformedRecord::NotAnObject);
        }

        let mut raw: RawRecord = serde_json::from_value(record)?;
        let shape = raw.shape();

        let item_id = raw
            .message_id
            .take()
            .ok_or(MalformedRecord::MissingField("message_id"))?;
        let seconds = raw
            .time_in_seconds
            .ok_or(MalformedRecord::MissingField("time_in_seconds"))?;
        if !seconds.is_finite() || seconds < 0.0 || seconds > MAX_TIME_OFFSET_SECS as f64 {
            return Err(MalformedRecord::InvalidTime(seconds));
        }
        let author = raw
            .author
            .take()
            .ok_or(MalformedRecord::MissingField("author"))?
            .into_author()?;

        // メンバーシップは歓迎文でメッセージ本文を代替できる
        let text = match (raw.message.take(), &shape) {
            (Some(text), _) => text,
            (None, RecordShape::Membership) => raw
                .welcome_text
                .clone()
                .or_else(|| raw.header_secondary_text.clone())
                .unwrap_or_default(),
            // 本文なしのスーパーチャット・ステッカーは有効
            (None, RecordShape::Superchat | RecordShape::Sticker) => String::new(),
            (None, RecordShape::Message) => return Err(MalformedRecord::MissingField("message")),
        };

        Ok(ValidRecord {
            id: item_id,
            time: seconds.floor() as u64,
            author,
            text,
            shape,
            raw,
        })
    }

    fn build_item(
        id: String,
        time: u64,
        author: Arc<Author>,
        text: String,
        shape: RecordShape,
        raw: RawRecord,
    ) -> ChatItem {
        let colors = raw.colors.map(RawColors::into_colors).unwrap_or_default();
        let money = raw.money.map(RawMoney::into_money).unwrap_or_default();

        match shape {
            RecordShape::Message => ChatItem::message(id, time, author, text, raw.emotes),
            RecordShape::Superchat => {
                ChatItem::superchat(id, time, author, text, money, colors, raw.emotes)
            }
            RecordShape::Membership => {
                let welcome_text = raw
                    .welcome_text
                    .or(raw.header_secondary_text)
                    .unwrap_or_default();
                ChatItem::membership(id, time, author, text, welcome_text)
            }
            RecordShape::Sticker => ChatItem::sticker(
                id,
                time,
                author,
                text,
                money,
                colors,
                raw.sticker_images.unwrap_or_default(),
            ),
        }
    }
}
