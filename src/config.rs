use std::{env, path::PathBuf};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATA_PATH: &str = "data/reports.json";
const DEFAULT_BRANCHES: &[&str] = &["ACS", "ACSNW"];
const DEFAULT_REPS: &[&str] = &["Kari", "Ashley", "Ronda", "Lisa"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKind {
    File(PathBuf),
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store: StoreKind,
    /// Choices offered by the branch selects.
    pub branches: Vec<String>,
    /// Choices offered by the rep selects.
    pub reps: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup("PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let store = match lookup("APP_STORE").as_deref().map(str::trim) {
            Some(kind) if kind.eq_ignore_ascii_case("memory") => StoreKind::Memory,
            _ => StoreKind::File(
                lookup("APP_DATA_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH)),
            ),
        };

        Self {
            port,
            store,
            branches: list_or_default(lookup("KPI_BRANCHES"), DEFAULT_BRANCHES),
            reps: list_or_default(lookup("KPI_REPS"), DEFAULT_REPS),
        }
    }
}

fn list_or_default(value: Option<String>, default: &[&str]) -> Vec<String> {
    let items: Vec<String> = value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();

    if items.is_empty() {
        default.iter().map(|item| item.to_string()).collect()
    } else {
        items
    }
}
