use crate::error::{AnalyzerError, AnalyzerResult};
use crate::utils::format_hms;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

/// 配信開始からの経過秒数として受け付ける上限（30日）
pub const MAX_TIME_OFFSET_SECS: u64 = 30 * 24 * 60 * 60;

static STREAM_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[?&]v=|youtu\.be/|/live/)([A-Za-z0-9_-]{11})").expect("valid stream url regex")
});

static STREAM_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid stream id regex"));

/// 配信ID（YouTubeの動画ID）
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    /// 配信IDまたは配信URLからStreamIdを作成
    pub fn parse(input: &str) -> AnalyzerResult<Self> {
        let input = input.trim();

        if let Some(id) = STREAM_URL_PATTERN
            .captures(input)
            .and_then(|cap| cap.get(1))
        {
            return Ok(Self(id.as_str().to_string()));
        }

        if STREAM_ID_PATTERN.is_match(input) {
            return Ok(Self(input.to_string()));
        }

        Err(AnalyzerError::InvalidStreamId {
            input: input.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 画像情報（表示用メタデータ）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Icon {
    #[serde(default)]
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl fmt::Display for Icon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.width > 0 && self.height > 0 {
            write!(f, "{} ({}x{}): {}", self.id, self.width, self.height, self.url)
        } else {
            write!(f, "{}: {}", self.id, self.url)
        }
    }
}

/// スタンプ・絵文字
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Emote {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_custom_emoji: bool,
    #[serde(default)]
    pub images: Vec<Icon>,
}

/// 投稿者
///
/// 同一性はチャンネルIDのみで判定する（表示名の変更は同一人物として扱う）。
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub is_member: bool,
    pub membership_info: String,
    pub images: Vec<Icon>,
}

impl PartialEq for Author {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Author {}

impl Hash for Author {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_member {
            write!(f, "{}: {} [{}]", self.name, self.id, self.membership_info)
        } else {
            write!(f, "{}: {}", self.name, self.id)
        }
    }
}

/// Super Chat / Super Stickerの金額情報
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Money {
    pub amount: String,
    pub currency: String,
    pub currency_symbol: String,
    pub text: String,
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.text, self.currency)
    }
}

/// Super Chatの配色（表示専用）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SuperchatColor {
    pub background: String,
    pub header: String,
}

/// チャットアイテムの種別
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatItemKind {
    Message {
        emotes: Vec<Emote>,
    },
    Superchat {
        money: Money,
        colors: SuperchatColor,
        emotes: Vec<Emote>,
    },
    Membership {
        welcome_text: String,
    },
    Sticker {
        money: Money,
        colors: SuperchatColor,
        sticker_images: Vec<Icon>,
    },
}

impl ChatItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatItemKind::Message { .. } => "message",
            ChatItemKind::Superchat { .. } => "superchat",
            ChatItemKind::Membership { .. } => "membership",
            ChatItemKind::Sticker { .. } => "sticker",
        }
    }
}

/// 精製済みのチャットアイテム
///
/// `time` は配信開始からの経過秒数。同一性は `id` のみで判定する。
/// 投稿者は著者レジストリのエントリを共有する。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatItem {
    pub id: String,
    pub time: u64,
    pub author: Arc<Author>,
    pub text: String,
    #[serde(flatten)]
    pub kind: ChatItemKind,
}

impl ChatItem {
    /// 通常メッセージを作成
    pub fn message(
        id: impl Into<String>,
        time: u64,
        author: Arc<Author>,
        text: impl Into<String>,
        emotes: Vec<Emote>,
    ) -> Self {
        Self {
            id: id.into(),
            time,
            author,
            text: text.into(),
            kind: ChatItemKind::Message { emotes },
        }
    }

    /// Super Chatを作成
    pub fn superchat(
        id: impl Into<String>,
        time: u64,
        author: Arc<Author>,
        text: impl Into<String>,
        money: Money,
        colors: SuperchatColor,
        emotes: Vec<Emote>,
    ) -> Self {
        Self {
            id: id.into(),
            time,
            author,
            text: text.into(),
            kind: ChatItemKind::Superchat {
                money,
                colors,
                emotes,
            },
        }
    }

    /// メンバーシップ加入を作成
    pub fn membership(
        id: impl Into<String>,
        time: u64,
        author: Arc<Author>,
        text: impl Into<String>,
        welcome_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            time,
            author,
            text: text.into(),
            kind: ChatItemKind::Membership {
                welcome_text: welcome_text.into(),
            },
        }
    }

    /// Super Stickerを作成
    pub fn sticker(
        id: impl Into<String>,
        time: u64,
        author: Arc<Author>,
        text: impl Into<String>,
        money: Money,
        colors: SuperchatColor,
        sticker_images: Vec<Icon>,
    ) -> Self {
        Self {
            id: id.into(),
            time,
            author,
            text: text.into(),
            kind: ChatItemKind::Sticker {
                money,
                colors,
                sticker_images,
            },
        }
    }

    /// 金額情報（Super Chat / Super Stickerのみ）
    pub fn money(&self) -> Option<&Money> {
        match &self.kind {
            ChatItemKind::Superchat { money, .. } | ChatItemKind::Sticker { money, .. } => {
                Some(money)
            }
            _ => None,
        }
    }

    pub fn emotes(&self) -> &[Emote] {
        match &self.kind {
            ChatItemKind::Message { emotes } | ChatItemKind::Superchat { emotes, .. } => emotes,
            _ => &[],
        }
    }

    pub fn time_in_hms(&self) -> String {
        format_hms(self.time)
    }
}

impl PartialEq for ChatItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ChatItem {}

impl Hash for ChatItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ChatItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = self.time_in_hms();
        let name = &self.author.name;
        match &self.kind {
            ChatItemKind::Message { .. } => write!(f, "[{}] {}: {}", time, name, self.text),
            ChatItemKind::Superchat { money, .. } => {
                write!(f, "[{}] {}: {} ({})", time, name, self.text, money.text)
            }
            ChatItemKind::Membership { welcome_text } => write!(
                f,
                "[{}] {} has joined membership. {}",
                time, name, welcome_text
            ),
            ChatItemKind::Sticker { money, .. } => {
                write!(f, "[{}] {} sent a Sticker ({})", time, name, money.text)
            }
        }
    }
}
