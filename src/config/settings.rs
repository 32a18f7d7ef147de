//! 実行設定（ドメインモデル）
//!
//! # 責務
//!
//! 設定ストアから読み込んだスナップショットを検証し、デフォルト値を補完した
//! 不変の [`Settings`] として提供します。実行開始時に一度だけ読み込まれ、
//! 実行中は変更されません。
//!
//! ## 設定ファイルの例
//!
//! ```toml
//! ai_provider = "gemini"
//! gemini_keys = ["key-1", "key-2"]
//! tshirt_color = "Black"
//! hoodie_color = "AI_DECIDE"
//! supporting_tags_count = 8
//! description_length = "long"
//! autoflow_count = 10
//! autoflow_delay = "random"
//! auto_publish = true
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::engine::pacing::PacingDelay;
use crate::error::ConfigError;
use crate::metadata::record::ProductCategory;

use super::dto::{DelayDto, SettingsDto};
use super::provider::ProviderKind;

/// 「AI に任せる」を表す色ピン留めの値
pub const AI_DECIDE: &str = "AI_DECIDE";

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_OPENROUTER_MODEL: &str = "google/gemini-pro-vision";
const DEFAULT_GROQ_MODEL: &str = "mixtral-8x7b-32768";
const DEFAULT_TAGS_COUNT: u32 = 5;
const DEFAULT_AUTOFLOW_COUNT: u32 = 5;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;
const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 120;

/// 商品カテゴリごとの色指定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorPin {
    /// AI の選択をそのまま使う
    AiDecide,
    /// 指定色で上書きする
    Fixed(String),
}

impl ColorPin {
    fn as_setting(&self) -> String {
        match self {
            ColorPin::AiDecide => AI_DECIDE.to_string(),
            ColorPin::Fixed(color) => color.clone(),
        }
    }
}

/// 説明文の長さ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescriptionLength {
    /// 最大 13 語
    #[default]
    Short,
    /// 30〜50 語程度
    Long,
}

impl DescriptionLength {
    fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(DescriptionLength::Short),
            "long" => Ok(DescriptionLength::Long),
            other => Err(ConfigError::Validation(format!(
                "description_length は \"short\" または \"long\" です: {other}"
            ))),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            DescriptionLength::Short => "short",
            DescriptionLength::Long => "long",
        }
    }
}

/// 実行設定（バリデーション済み）
#[derive(Debug, Clone)]
pub struct Settings {
    provider: ProviderKind,
    gemini_keys: Vec<String>,
    gemini_model: String,
    openrouter_key: Option<String>,
    openrouter_model: String,
    groq_key: Option<String>,
    groq_model: String,

    color_pins: BTreeMap<ProductCategory, ColorPin>,
    enable_kids: bool,

    mature_content: bool,
    product_colors: String,
    supporting_tags_count: u32,
    description_length: DescriptionLength,
    avoid_copyright: bool,

    autoflow_count: u32,
    autoflow_delay: PacingDelay,
    auto_publish: bool,

    provider_timeout: Duration,
    navigation_timeout: Duration,
}

impl Settings {
    /// TOML ファイルから設定を読み込む
    ///
    /// # 処理フロー
    ///
    /// 1. ファイル読み込み
    /// 2. TOML デシリアライズ → [`SettingsDto`]
    /// 3. バリデーション & 変換 → [`Settings`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// TOML 文字列から設定を読み込む
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let dto: SettingsDto = toml::from_str(toml)?;
        Self::try_from(dto)
    }

    /// 設定を TOML 文字列に変換
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        let dto = SettingsDto::from(self.clone());
        Ok(toml::to_string_pretty(&dto)?)
    }

    /// 設定を TOML ファイルに保存
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    fn from_dto(dto: SettingsDto) -> Result<Self, ConfigError> {
        let provider = match dto.ai_provider.as_deref() {
            Some(name) => name.parse()?,
            None => ProviderKind::Gemini,
        };

        let pins = [
            (ProductCategory::Tshirt, dto.tshirt_color),
            (ProductCategory::Hoodie, dto.hoodie_color),
            (ProductCategory::Tank, dto.tank_color),
            (ProductCategory::Crewneck, dto.crewneck_color),
            (ProductCategory::Longsleeve, dto.longsleeve_color),
            (ProductCategory::Baseball, dto.baseball_color),
            (ProductCategory::KidsTshirt, dto.kids_tshirt_color),
            (ProductCategory::KidsHoodie, dto.kids_hoodie_color),
            (ProductCategory::KidsLongsleeve, dto.kids_longsleeve_color),
        ];
        let mut color_pins = BTreeMap::new();
        for (category, value) in pins {
            color_pins.insert(category, parse_pin(category, value)?);
        }

        let supporting_tags_count = dto.supporting_tags_count.unwrap_or(DEFAULT_TAGS_COUNT);
        if supporting_tags_count == 0 {
            return Err(ConfigError::Validation(
                "supporting_tags_count は 1 以上を指定してください".to_string(),
            ));
        }
        let autoflow_count = dto.autoflow_count.unwrap_or(DEFAULT_AUTOFLOW_COUNT);
        if autoflow_count == 0 {
            return Err(ConfigError::Validation(
                "autoflow_count は 1 以上を指定してください".to_string(),
            ));
        }

        let autoflow_delay = match dto.autoflow_delay {
            Some(DelayDto::Seconds(secs)) => PacingDelay::Fixed(secs),
            Some(DelayDto::Text(text)) => text.parse()?,
            None => PacingDelay::default(),
        };

        let description_length = match dto.description_length.as_deref() {
            Some(value) => DescriptionLength::parse(value)?,
            None => DescriptionLength::default(),
        };

        Ok(Self {
            provider,
            gemini_keys: dto
                .gemini_keys
                .into_iter()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty())
                .collect(),
            gemini_model: non_empty(dto.gemini_model).unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            openrouter_key: non_empty(dto.openrouter_key),
            openrouter_model: non_empty(dto.openrouter_model)
                .unwrap_or_else(|| DEFAULT_OPENROUTER_MODEL.to_string()),
            groq_key: non_empty(dto.groq_key),
            groq_model: non_empty(dto.groq_model).unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string()),
            color_pins,
            enable_kids: dto.enable_kids.unwrap_or(false),
            mature_content: dto.mature_content.unwrap_or(false),
            product_colors: non_empty(dto.product_colors).unwrap_or_else(|| "all".to_string()),
            supporting_tags_count,
            description_length,
            avoid_copyright: dto.avoid_copyright.unwrap_or(true),
            autoflow_count,
            autoflow_delay,
            auto_publish: dto.auto_publish.unwrap_or(false),
            provider_timeout: Duration::from_secs(
                dto.provider_timeout_secs.unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS),
            ),
            navigation_timeout: Duration::from_secs(
                dto.navigation_timeout_secs.unwrap_or(DEFAULT_NAVIGATION_TIMEOUT_SECS),
            ),
        })
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn gemini_keys(&self) -> &[String] {
        &self.gemini_keys
    }

    /// 単一キーのプロバイダーの API キー
    pub fn single_credential(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::Gemini => self.gemini_keys.first().map(String::as_str),
            ProviderKind::OpenRouter => self.openrouter_key.as_deref(),
            ProviderKind::Groq => self.groq_key.as_deref(),
        }
    }

    pub fn model(&self, kind: ProviderKind) -> &str {
        match kind {
            ProviderKind::Gemini => &self.gemini_model,
            ProviderKind::OpenRouter => &self.openrouter_model,
            ProviderKind::Groq => &self.groq_model,
        }
    }

    pub fn color_pin(&self, category: ProductCategory) -> &ColorPin {
        self.color_pins.get(&category).unwrap_or(&ColorPin::AiDecide)
    }

    /// 実際に適用すべき色の上書き
    ///
    /// `AI_DECIDE` のカテゴリは含みません。キッズ系は `enable_kids` が有効なときだけ含みます。
    pub fn color_overrides(&self) -> impl Iterator<Item = (ProductCategory, &str)> + '_ {
        self.color_pins.iter().filter_map(|(category, pin)| match pin {
            ColorPin::Fixed(color) if !category.is_kids() || self.enable_kids => {
                Some((*category, color.as_str()))
            }
            _ => None,
        })
    }

    pub fn enable_kids(&self) -> bool {
        self.enable_kids
    }

    pub fn mature_content(&self) -> bool {
        self.mature_content
    }

    pub fn product_colors(&self) -> &str {
        &self.product_colors
    }

    pub fn supporting_tags_count(&self) -> u32 {
        self.supporting_tags_count
    }

    pub fn description_length(&self) -> DescriptionLength {
        self.description_length
    }

    pub fn avoid_copyright(&self) -> bool {
        self.avoid_copyright
    }

    pub fn autoflow_count(&self) -> u32 {
        self.autoflow_count
    }

    pub fn autoflow_delay(&self) -> PacingDelay {
        self.autoflow_delay
    }

    pub fn auto_publish(&self) -> bool {
        self.auto_publish
    }

    pub fn provider_timeout(&self) -> Duration {
        self.provider_timeout
    }

    pub fn navigation_timeout(&self) -> Duration {
        self.navigation_timeout
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_pin(category: ProductCategory, value: Option<String>) -> Result<ColorPin, ConfigError> {
    match non_empty(value) {
        None => Ok(ColorPin::AiDecide),
        Some(v) if v == AI_DECIDE => Ok(ColorPin::AiDecide),
        Some(v) if category.is_legal(&v) => Ok(ColorPin::Fixed(v)),
        Some(v) => Err(ConfigError::Validation(format!(
            "{category} に指定できない色です: {v}"
        ))),
    }
}

/// DTO からドメインモデルへの変換（読み込み方向）
///
/// バリデーションを実施し、不正なデータの場合は [`ConfigError::Validation`] を返します。
impl TryFrom<SettingsDto> for Settings {
    type Error = ConfigError;

    fn try_from(dto: SettingsDto) -> Result<Self, Self::Error> {
        Self::from_dto(dto)
    }
}

/// ドメインモデルから DTO への変換（書き込み方向）
///
/// バリデーション済みのドメインモデルから DTO を生成するため、
/// この変換は失敗しません（`From` トレイトを使用）。
impl From<Settings> for SettingsDto {
    fn from(settings: Settings) -> Self {
        let pin = |category| Some(settings.color_pin(category).as_setting());
        SettingsDto {
            ai_provider: Some(settings.provider.as_str().to_string()),
            gemini_keys: settings.gemini_keys.clone(),
            gemini_model: Some(settings.gemini_model.clone()),
            openrouter_key: settings.openrouter_key.clone(),
            openrouter_model: Some(settings.openrouter_model.clone()),
            groq_key: settings.groq_key.clone(),
            groq_model: Some(settings.groq_model.clone()),
            tshirt_color: pin(ProductCategory::Tshirt),
            hoodie_color: pin(ProductCategory::Hoodie),
            tank_color: pin(ProductCategory::Tank),
            crewneck_color: pin(ProductCategory::Crewneck),
            longsleeve_color: pin(ProductCategory::Longsleeve),
            baseball_color: pin(ProductCategory::Baseball),
            kids_tshirt_color: pin(ProductCategory::KidsTshirt),
            kids_hoodie_color: pin(ProductCategory::KidsHoodie),
            kids_longsleeve_color: pin(ProductCategory::KidsLongsleeve),
            enable_kids: Some(settings.enable_kids),
            mature_content: Some(settings.mature_content),
            product_colors: Some(settings.product_colors.clone()),
            supporting_tags_count: Some(settings.supporting_tags_count),
            description_length: Some(settings.description_length.as_str().to_string()),
            avoid_copyright: Some(settings.avoid_copyright),
            autoflow_count: Some(settings.autoflow_count),
            autoflow_delay: Some(DelayDto::Text(settings.autoflow_delay.to_string())),
            auto_publish: Some(settings.auto_publish),
            provider_timeout_secs: Some(settings.provider_timeout.as_secs()),
            navigation_timeout_secs: Some(settings.navigation_timeout.as_secs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_toml("").unwrap();

        assert_eq!(settings.provider(), ProviderKind::Gemini);
        assert_eq!(settings.model(ProviderKind::Gemini), DEFAULT_GEMINI_MODEL);
        assert_eq!(settings.supporting_tags_count(), 5);
        assert_eq!(settings.autoflow_count(), 5);
        assert_eq!(settings.autoflow_delay(), PacingDelay::Fixed(5));
        assert_eq!(settings.description_length(), DescriptionLength::Short);
        assert!(settings.avoid_copyright());
        assert!(!settings.auto_publish());
        assert_eq!(settings.provider_timeout(), Duration::from_secs(30));
        assert_eq!(settings.color_overrides().count(), 0);
    }

    #[test]
    fn test_full_document() {
        let toml = r#"
            ai_provider = "groq"
            groq_key = "gsk-1"
            groq_model = "llama-vision"
            tshirt_color = "Navy"
            hoodie_color = "AI_DECIDE"
            kids_hoodie_color = "Navy"
            supporting_tags_count = 8
            description_length = "long"
            autoflow_count = 3
            autoflow_delay = "random"
            auto_publish = true
            mature_content = true
        "#;
        let settings = Settings::from_toml(toml).unwrap();

        assert_eq!(settings.provider(), ProviderKind::Groq);
        assert_eq!(settings.single_credential(ProviderKind::Groq), Some("gsk-1"));
        assert_eq!(settings.model(ProviderKind::Groq), "llama-vision");
        assert_eq!(settings.color_pin(ProductCategory::Tshirt), &ColorPin::Fixed("Navy".to_string()));
        assert_eq!(settings.color_pin(ProductCategory::Hoodie), &ColorPin::AiDecide);
        assert_eq!(settings.description_length(), DescriptionLength::Long);
        assert_eq!(settings.autoflow_delay(), PacingDelay::Random);
        assert!(settings.auto_publish());
        assert!(settings.mature_content());
    }

    #[test]
    fn test_kids_overrides_require_feature_flag() {
        let disabled = Settings::from_toml(
            "tank_color = \"Red\"\nkids_hoodie_color = \"Navy\"\n",
        )
        .unwrap();
        let overrides: Vec<_> = disabled.color_overrides().collect();
        assert_eq!(overrides, vec![(ProductCategory::Tank, "Red")]);

        let enabled = Settings::from_toml(
            "enable_kids = true\ntank_color = \"Red\"\nkids_hoodie_color = \"Navy\"\n",
        )
        .unwrap();
        let overrides: Vec<_> = enabled.color_overrides().collect();
        assert_eq!(
            overrides,
            vec![(ProductCategory::Tank, "Red"), (ProductCategory::KidsHoodie, "Navy")]
        );
    }

    #[test]
    fn test_numeric_delay() {
        let settings = Settings::from_toml("autoflow_delay = 7").unwrap();
        assert_eq!(settings.autoflow_delay(), PacingDelay::Fixed(7));

        let settings = Settings::from_toml("autoflow_delay = \"0\"").unwrap();
        assert_eq!(settings.autoflow_delay(), PacingDelay::Fixed(0));
    }

    #[test]
    fn test_validation_errors() {
        for toml in [
            "ai_provider = \"claude\"",
            "tank_color = \"Purple\"",
            "supporting_tags_count = 0",
            "autoflow_count = 0",
            "autoflow_delay = \"later\"",
            "description_length = \"medium\"",
        ] {
            assert!(
                matches!(Settings::from_toml(toml), Err(ConfigError::Validation(_))),
                "{toml}"
            );
        }
    }

    #[test]
    fn test_blank_keys_are_dropped() {
        let settings = Settings::from_toml("gemini_keys = [\"a\", \" \", \"b\"]\nopenrouter_key = \"\"").unwrap();
        assert_eq!(settings.gemini_keys(), &["a".to_string(), "b".to_string()]);
        assert_eq!(settings.single_credential(ProviderKind::OpenRouter), None);
    }

    #[test]
    fn test_toml_round_trip() {
        let original = Settings::from_toml(
            "ai_provider = \"openrouter\"\nopenrouter_key = \"or\"\nbaseball_color = \"White/Navy\"\nautoflow_delay = \"random\"\n",
        )
        .unwrap();

        let restored = Settings::from_toml(&original.to_toml_string().unwrap()).unwrap();

        assert_eq!(restored.provider(), ProviderKind::OpenRouter);
        assert_eq!(restored.single_credential(ProviderKind::OpenRouter), Some("or"));
        assert_eq!(
            restored.color_pin(ProductCategory::Baseball),
            &ColorPin::Fixed("White/Navy".to_string())
        );
        assert_eq!(restored.autoflow_delay(), PacingDelay::Random);
    }
}
