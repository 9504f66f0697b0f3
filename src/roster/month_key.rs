use chrono::{Datelike, NaiveDate};
use std::str::FromStr;

use crate::models::MonthKey;

/// Maps a calendar date to the key of the roster record that holds it.
pub trait MonthKeyResolver: Send + Sync {
    fn month_key(&self, date: NaiveDate) -> MonthKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonthLocale {
    #[default]
    Spanish,
    English,
}

impl FromStr for MonthLocale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "es" | "es-es" | "spanish" => Ok(MonthLocale::Spanish),
            "en" | "en-gb" | "en-us" | "english" => Ok(MonthLocale::English),
            other => Err(format!("Unsupported roster locale: {}", other)),
        }
    }
}

const SPANISH_MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

const ENGLISH_MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// `<month name>-<year>` keys, lower case.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamedMonthKeys {
    locale: MonthLocale,
}

impl NamedMonthKeys {
    pub fn new(locale: MonthLocale) -> Self {
        Self { locale }
    }

    fn names(&self) -> &'static [&'static str; 12] {
        match self.locale {
            MonthLocale::Spanish => &SPANISH_MONTHS,
            MonthLocale::English => &ENGLISH_MONTHS,
        }
    }
}

impl MonthKeyResolver for NamedMonthKeys {
    fn month_key(&self, date: NaiveDate) -> MonthKey {
        let name = self.names()[date.month0() as usize];
        MonthKey::new(format!("{}-{}", name, date.year()))
    }
}
