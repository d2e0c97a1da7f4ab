// src/domain/makes.rs

/// Manufacturers commonly listed on the island.
pub const DEFAULT_MAKES: &[&str] = &[
    "Acura",
    "Alfa Romeo",
    "Aston Martin",
    "Audi",
    "Bentley",
    "BMW",
    "Buick",
    "Cadillac",
    "Chevrolet",
    "Chrysler",
    "Daihatsu",
    "Dodge",
    "Ferrari",
    "Fiat",
    "Ford",
    "Genesis",
    "GMC",
    "Honda",
    "Hummer",
    "Hyundai",
    "Infiniti",
    "Isuzu",
    "Jaguar",
    "Jeep",
    "Kia",
    "Lamborghini",
    "Land Rover",
    "Lexus",
    "Lincoln",
    "Maserati",
    "Mazda",
    "McLaren",
    "Mercedes-Benz",
    "Mini",
    "Mitsubishi",
    "Nissan",
    "Peugeot",
    "Porsche",
    "RAM",
    "Renault",
    "Rolls-Royce",
    "Scion",
    "Smart",
    "Subaru",
    "Suzuki",
    "Tesla",
    "Toyota",
    "Volkswagen",
    "Volvo",
];

/// Informal spellings seen in titles, mapped to the canonical make.
const ALIASES: &[(&str, &str)] = &[
    ("mercedes", "Mercedes-Benz"),
    ("benz", "Mercedes-Benz"),
    ("chevy", "Chevrolet"),
    ("vw", "Volkswagen"),
    ("landrover", "Land Rover"),
    ("alfa", "Alfa Romeo"),
];

const MAX_MAKE_WORDS: usize = 3;

/// Immutable reference list of vehicle makes.
#[derive(Debug, Clone)]
pub struct KnownMakes {
    makes: Vec<String>,
}

impl Default for KnownMakes {
    fn default() -> Self {
        Self::new(DEFAULT_MAKES.iter().copied())
    }
}

impl KnownMakes {
    pub fn new<I, S>(makes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            makes: makes.into_iter().map(Into::into).collect(),
        }
    }

    /// Case-insensitive membership in the canonical list (aliases don't count).
    pub fn contains(&self, make: &str) -> bool {
        let make = make.trim();
        !make.is_empty() && self.makes.iter().any(|m| m.eq_ignore_ascii_case(make))
    }

    /// Matches the longest make (or alias) at the start of `words`.
    ///
    /// Returns the canonical make and how many words it consumed.
    pub fn match_prefix(&self, words: &[&str]) -> Option<(String, usize)> {
        for n in (1..=MAX_MAKE_WORDS.min(words.len())).rev() {
            let candidate = normalize(&words[..n].join(" "));

            if let Some(make) = self.makes.iter().find(|m| normalize(m) == candidate) {
                return Some((make.clone(), n));
            }
            if let Some((_, make)) = ALIASES.iter().find(|(alias, _)| *alias == candidate) {
                return Some((make.to_string(), n));
            }
        }
        None
    }
}

fn normalize(s: &str) -> String {
    s.to_lowercase()
        .replace('-', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
