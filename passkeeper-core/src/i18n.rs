//! Translation lookup.
//!
//! Each locale has a nested string table addressed with dotted keys such as
//! `home.addSuccess`. A key that cannot be resolved comes back unchanged, so a
//! missing translation shows up on screen instead of failing.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

const ZH_TABLE: &str = include_str!("../locales/zh.json");
const JA_TABLE: &str = include_str!("../locales/ja.json");

/// Languages the interface ships in.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
    uniffi::Enum,
)]
#[strum(serialize_all = "lowercase")]
pub enum Locale {
    /// Simplified Chinese.
    #[default]
    Zh,
    /// Japanese.
    Ja,
}

impl Locale {
    /// The locale tag as persisted in settings (`zh`, `ja`).
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Zh => "zh",
            Self::Ja => "ja",
        }
    }

    /// The other locale; the language switch flips between the two.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Zh => Self::Ja,
            Self::Ja => Self::Zh,
        }
    }

    /// Resolves `key` in this locale's table.
    #[must_use]
    pub fn translate(self, key: &str) -> String {
        lookup(tables().get(&self), key).unwrap_or_else(|| key.to_string())
    }
}

fn tables() -> &'static HashMap<Locale, Value> {
    static TABLES: OnceLock<HashMap<Locale, Value>> = OnceLock::new();
    TABLES.get_or_init(|| {
        Locale::iter()
            .map(|locale| {
                let source = match locale {
                    Locale::Zh => ZH_TABLE,
                    Locale::Ja => JA_TABLE,
                };
                let table = serde_json::from_str(source).unwrap_or_else(|err| {
                    log::error!("string table for {locale} is malformed: {err}");
                    Value::Null
                });
                (locale, table)
            })
            .collect()
    })
}

fn lookup(table: Option<&Value>, key: &str) -> Option<String> {
    let value = key
        .split('.')
        .try_fold(table?, |node, segment| node.get(segment))?;
    value
        .as_str()
        .filter(|text| !text.is_empty())
        .map(ToString::to_string)
}

/// Resolves a dotted key for a locale tag.
///
/// Unknown locales and unknown keys both yield `key` itself.
#[uniffi::export]
#[must_use]
pub fn resolve(locale: &str, key: &str) -> String {
    locale
        .parse::<Locale>()
        .map_or_else(|_| key.to_string(), |locale| locale.translate(key))
}

/// String lookup bound to one locale.
#[derive(Debug, uniffi::Object)]
pub struct Translator {
    locale: Locale,
}

#[uniffi::export]
impl Translator {
    /// Creates a translator for `locale`.
    #[uniffi::constructor]
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    /// The locale this translator resolves against.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Resolves `key`, falling back to the key itself.
    #[must_use]
    pub fn t(&self, key: &str) -> String {
        self.locale.translate(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Locale::Zh, "home.addSuccess", "密码已添加" ; "zh nested")]
    #[test_case(Locale::Ja, "home.addSuccess", "パスワードを追加しました" ; "ja nested")]
    #[test_case(Locale::Zh, "confirm", "确定" ; "zh top level")]
    #[test_case(Locale::Ja, "biometric.cancel", "キャンセル" ; "ja biometric")]
    fn test_translate_known_keys(locale: Locale, key: &str, expected: &str) {
        assert_eq!(locale.translate(key), expected);
    }

    #[test]
    fn test_missing_key_falls_back_for_every_locale() {
        for locale in Locale::iter() {
            assert_eq!(
                locale.translate("home.nonexistent.key"),
                "home.nonexistent.key"
            );
            assert_eq!(resolve(locale.tag(), "home.nonexistent.key"), "home.nonexistent.key");
        }
    }

    #[test]
    fn test_branch_node_is_not_a_translation() {
        assert_eq!(Locale::Zh.translate("home"), "home");
        assert_eq!(Locale::Zh.translate("home.title.extra"), "home.title.extra");
    }

    #[test]
    fn test_unknown_locale_falls_back() {
        assert_eq!(resolve("fr", "home.title"), "home.title");
        assert_eq!(resolve("ja", "home.title"), "パス管");
    }

    #[test]
    fn test_locale_tags_round_trip_through_strum() {
        for locale in Locale::iter() {
            assert_eq!(locale.tag().parse::<Locale>().unwrap(), locale);
            assert_eq!(locale.to_string(), locale.tag());
            assert_eq!(locale.as_ref(), locale.tag());
        }
        assert_eq!(Locale::Zh.toggled(), Locale::Ja);
        assert_eq!(Locale::Ja.toggled(), Locale::Zh);
    }

    #[test]
    fn test_every_key_in_one_table_exists_in_the_other() {
        fn keys(prefix: &str, value: &Value, out: &mut Vec<String>) {
            if let Value::Object(map) = value {
                for (name, child) in map {
                    let path = if prefix.is_empty() {
                        name.clone()
                    } else {
                        format!("{prefix}.{name}")
                    };
                    keys(&path, child, out);
                }
            } else {
                out.push(prefix.to_string());
            }
        }

        let mut zh = Vec::new();
        keys("", &tables()[&Locale::Zh], &mut zh);
        assert!(zh.len() > 50);
        for key in zh {
            assert_ne!(Locale::Ja.translate(&key), key, "ja is missing {key}");
        }
    }

    #[test]
    fn test_translator_object() {
        let translator = Translator::new(Locale::Ja);
        assert_eq!(translator.locale(), Locale::Ja);
        assert_eq!(translator.t("home.pin"), "ピン留め");
    }
}
