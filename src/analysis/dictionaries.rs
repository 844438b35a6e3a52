// src/analysis/dictionaries.rs

//! Static pattern dictionaries used by the classification engine.
//!
//! Every group except `prefix_only` is matched against lowercased text, so its
//! patterns must be lowercase. `prefix_only` is matched against the raw text
//! and keeps its original casing.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Pattern groups, grouped by the role they play in classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dictionaries {
    /// Title openers naming the issuing official
    pub title_prefixes: Vec<String>,

    /// Verb forms of an order being issued
    pub verbs: Vec<String>,

    /// Procedural-code markers (case opened, report demanded...)
    pub procedural_codes: Vec<String>,

    /// Case-sensitive markers for the prefix-only strategy
    pub prefix_only: Vec<String>,

    /// Markers that identify the substantive paragraph of a report
    pub body_markers: Vec<String>,

    /// Canonical names that collapse the region set to themselves
    pub exceptions: Vec<String>,

    /// Markers of the special errand type
    pub errand_types: Vec<String>,

    /// Region alias (lowercase word stem) to canonical region name
    pub regions: BTreeMap<String, String>,
}

impl Dictionaries {
    /// Load dictionaries from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let dictionaries: Self = toml::from_str(&content)?;
        dictionaries.validate()?;
        Ok(dictionaries)
    }

    /// Load from `path` when given, otherwise use the built-in set.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                log::info!("Loading dictionaries from {}", path.display());
                Self::load(path)
            }
            None => Ok(Self::builtin()),
        }
    }

    /// Reject empty groups, uppercase patterns in lowercased groups and
    /// exceptions that no alias can produce.
    pub fn validate(&self) -> Result<()> {
        let groups: [(&str, &[String]); 7] = [
            ("title_prefixes", &self.title_prefixes),
            ("verbs", &self.verbs),
            ("procedural_codes", &self.procedural_codes),
            ("prefix_only", &self.prefix_only),
            ("body_markers", &self.body_markers),
            ("exceptions", &self.exceptions),
            ("errand_types", &self.errand_types),
        ];
        for (name, patterns) in groups {
            if patterns.is_empty() {
                return Err(AppError::validation(format!("dictionary {name} is empty")));
            }
            if patterns.iter().any(|p| p.is_empty()) {
                return Err(AppError::validation(format!(
                    "dictionary {name} contains an empty pattern"
                )));
            }
        }
        let lowercased: [(&str, &[String]); 5] = [
            ("title_prefixes", &self.title_prefixes),
            ("verbs", &self.verbs),
            ("procedural_codes", &self.procedural_codes),
            ("body_markers", &self.body_markers),
            ("errand_types", &self.errand_types),
        ];
        // these groups are matched against lowercased text
        for (name, patterns) in lowercased {
            if let Some(pattern) = patterns.iter().find(|p| p.to_lowercase() != **p) {
                return Err(AppError::validation(format!(
                    "pattern {pattern:?} in {name} must be lowercase"
                )));
            }
        }
        if self.regions.is_empty() {
            return Err(AppError::validation("dictionary regions is empty"));
        }
        if let Some(alias) = self.regions.keys().find(|k| k.to_lowercase() != **k) {
            return Err(AppError::validation(format!(
                "region alias {alias:?} must be lowercase"
            )));
        }
        for exception in &self.exceptions {
            if !self.regions.values().any(|c| c == exception) {
                return Err(AppError::validation(format!(
                    "exception {exception:?} is not a canonical region"
                )));
            }
        }
        Ok(())
    }

    /// Built-in dictionaries for the Investigative Committee channels.
    pub fn builtin() -> Self {
        Self {
            title_prefixes: strings(&[
                "председатель ск россии",
                "глава ск россии",
                "руководитель ск россии",
                "александр бастрыкин",
            ]),
            verbs: strings(&[
                "поручил",
                "поручено",
                "затребовал",
                "потребовал",
                "взял на контроль",
                "поставил на контроль",
            ]),
            procedural_codes: strings(&[
                "возбудить уголовное дело",
                "возбуждено уголовное дело",
                "уголовное дело",
                "доклад о ходе",
                "процессуальную проверку",
                "процессуальной проверки",
            ]),
            prefix_only: strings(&[
                "Председатель СК России",
                "Глава СК России",
                "Александр Бастрыкин поручил",
            ]),
            body_markers: strings(&[
                "руководител",
                "следственного управления",
                "следственного комитета",
                "ск россии по",
                "поручил",
                "доложить",
                "о ходе",
                "о результатах",
                "расследования",
            ]),
            regions: region_aliases(),
            exceptions: strings(&["ГВСУ СК России", "Центральный аппарат СК России"]),
            errand_types: strings(&[
                "доложить лично",
                "о результатах доложить лично",
                "на особый контроль",
                "на особом контроле",
            ]),
        }
    }
}

impl Default for Dictionaries {
    fn default() -> Self {
        Self::builtin()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Aliases are word stems chosen so that no alias is a substring of another.
fn region_aliases() -> BTreeMap<String, String> {
    const ALIASES: &[(&str, &str)] = &[
        ("москв", "г. Москва"),
        ("московской области", "Московская область"),
        ("подмосковь", "Московская область"),
        ("петербург", "г. Санкт-Петербург"),
        ("ленинградской области", "Ленинградская область"),
        ("краснодарск", "Краснодарский край"),
        ("кубан", "Краснодарский край"),
        ("ростовской области", "Ростовская область"),
        ("свердловской области", "Свердловская область"),
        ("екатеринбург", "Свердловская область"),
        ("новосибирск", "Новосибирская область"),
        ("татарстан", "Республика Татарстан"),
        ("башкортостан", "Республика Башкортостан"),
        ("башкири", "Республика Башкортостан"),
        ("дагестан", "Республика Дагестан"),
        ("чечн", "Чеченская Республика"),
        ("чеченской республик", "Чеченская Республика"),
        ("крым", "Республика Крым"),
        ("севастопол", "г. Севастополь"),
        ("нижегородской области", "Нижегородская область"),
        ("нижнем новгороде", "Нижегородская область"),
        ("самарской области", "Самарская область"),
        ("челябинск", "Челябинская область"),
        ("красноярск", "Красноярский край"),
        ("приморск", "Приморский край"),
        ("владивосток", "Приморский край"),
        ("хабаровск", "Хабаровский край"),
        ("иркутск", "Иркутская область"),
        ("воронеж", "Воронежская область"),
        ("волгоград", "Волгоградская область"),
        ("ставропол", "Ставропольский край"),
        ("белгород", "Белгородская область"),
        ("курской области", "Курская область"),
        ("брянск", "Брянская область"),
        ("калининград", "Калининградская область"),
        ("якути", "Республика Саха (Якутия)"),
        ("забайкаль", "Забайкальский край"),
        ("запорожск", "Запорожская область"),
        ("херсонск", "Херсонская область"),
        ("донецкой народной республик", "Донецкая Народная Республика"),
        ("луганской народной республик", "Луганская Народная Республика"),
        ("военного следственного управления", "ГВСУ СК России"),
        ("военнослужащ", "ГВСУ СК России"),
        ("центрального аппарата", "Центральный аппарат СК России"),
    ];

    ALIASES
        .iter()
        .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
        .collect()
}

/// Small English dictionaries for unit tests.
#[cfg(test)]
pub(crate) fn test_dictionaries() -> Dictionaries {
    Dictionaries {
        title_prefixes: strings(&["chief investigator"]),
        verbs: strings(&["ordered", "instructed"]),
        procedural_codes: strings(&["criminal case"]),
        prefix_only: strings(&["Chief Investigator"]),
        body_markers: strings(&["head of", "department", "report", "investigation"]),
        regions: [
            ("north", "Northland"),
            ("south", "Southland"),
            ("westvale", "Westvale"),
            ("capital", "Central Office"),
            ("garrison", "Military Office"),
        ]
        .iter()
        .map(|(a, c)| (a.to_string(), c.to_string()))
        .collect(),
        exceptions: strings(&["Central Office", "Military Office"]),
        errand_types: strings(&["personally"]),
    }
}
