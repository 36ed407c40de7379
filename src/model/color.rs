use serde::{Deserialize, Serialize};

/// The fixed palette a list can be tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListColor {
    #[default]
    Gray,
    Blue,
    Green,
    Yellow,
    Orange,
    Red,
}

impl ListColor {
    pub const ALL: [ListColor; 6] = [
        ListColor::Gray,
        ListColor::Blue,
        ListColor::Green,
        ListColor::Yellow,
        ListColor::Orange,
        ListColor::Red,
    ];

    /// The lowercase name used in list documents and config files
    pub fn name(self) -> &'static str {
        match self {
            ListColor::Gray => "gray",
            ListColor::Blue => "blue",
            ListColor::Green => "green",
            ListColor::Yellow => "yellow",
            ListColor::Orange => "orange",
            ListColor::Red => "red",
        }
    }

    /// Parse a color name (case-insensitive). `grey` is accepted as an alias.
    pub fn from_name(s: &str) -> Option<ListColor> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gray" | "grey" => Some(ListColor::Gray),
            "blue" => Some(ListColor::Blue),
            "green" => Some(ListColor::Green),
            "yellow" => Some(ListColor::Yellow),
            "orange" => Some(ListColor::Orange),
            "red" => Some(ListColor::Red),
            _ => None,
        }
    }
}

impl std::fmt::Display for ListColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ListColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ListColor::from_name(s).ok_or_else(|| format!("unknown color: {}", s))
    }
}
