//! UK pricing regions and address-based detection.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Full UK postcode; captures the area letters.
static RE_POSTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-z]{1,2})[0-9][0-9a-z]?\s*[0-9][a-z]{2}\b").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    London,
    SouthEast,
    SouthWest,
    East,
    WestMidlands,
    EastMidlands,
    Yorkshire,
    NorthWest,
    NorthEast,
    Wales,
    Scotland,
    NorthernIreland,
    UkAverage,
}

impl Default for Region {
    fn default() -> Self {
        Region::UkAverage
    }
}

impl Region {
    /// Price factor relative to the UK average.
    pub fn multiplier(self) -> f64 {
        match self {
            Region::London => 1.35,
            Region::SouthEast => 1.15,
            Region::SouthWest => 1.05,
            Region::East => 1.05,
            Region::WestMidlands => 0.95,
            Region::EastMidlands => 0.90,
            Region::Yorkshire => 0.90,
            Region::NorthWest => 0.90,
            Region::NorthEast => 0.85,
            Region::Wales => 0.85,
            Region::Scotland => 0.90,
            Region::NorthernIreland => 0.85,
            Region::UkAverage => 1.0,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Region::London => "London",
            Region::SouthEast => "South East",
            Region::SouthWest => "South West",
            Region::East => "East of England",
            Region::WestMidlands => "West Midlands",
            Region::EastMidlands => "East Midlands",
            Region::Yorkshire => "Yorkshire",
            Region::NorthWest => "North West",
            Region::NorthEast => "North East",
            Region::Wales => "Wales",
            Region::Scotland => "Scotland",
            Region::NorthernIreland => "Northern Ireland",
            Region::UkAverage => "UK Average",
        }
    }

    /// Detects the region from a free-form address: the postcode area
    /// first, then well-known place names. Unknown addresses price at the
    /// UK average.
    pub fn detect(address: &str) -> Region {
        if let Some(region) = RE_POSTCODE
            .captures_iter(address)
            .filter_map(|c| c.get(1))
            .find_map(|area| Self::from_postcode_area(area.as_str()))
        {
            return region;
        }

        let lower = address.to_lowercase();
        PLACE_NAMES
            .iter()
            .find(|(_, names)| names.iter().any(|n| contains_word(&lower, n)))
            .map(|(region, _)| *region)
            .unwrap_or(Region::UkAverage)
    }

    /// Maps a postcode area (the leading letters) to a region.
    pub fn from_postcode_area(area: &str) -> Option<Region> {
        let area = area.to_ascii_uppercase();
        POSTCODE_AREAS
            .iter()
            .find(|(_, areas)| areas.contains(&area.as_str()))
            .map(|(region, _)| *region)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

const POSTCODE_AREAS: &[(Region, &[&str])] = &[
    (
        Region::London,
        &[
            "E", "EC", "N", "NW", "SE", "SW", "W", "WC", "BR", "CR", "DA", "EN", "HA", "IG",
            "KT", "RM", "SM", "TW", "UB",
        ],
    ),
    (Region::NorthernIreland, &["BT"]),
    (
        Region::Scotland,
        &[
            "AB", "DD", "DG", "EH", "FK", "G", "HS", "IV", "KA", "KW", "KY", "ML", "PA", "PH",
            "TD", "ZE",
        ],
    ),
    (Region::Wales, &["CF", "LD", "LL", "NP", "SA", "SY"]),
    (Region::NorthEast, &["DH", "DL", "NE", "SR", "TS"]),
    (
        Region::NorthWest,
        &[
            "BB", "BL", "CA", "CH", "CW", "FY", "L", "LA", "M", "OL", "PR", "SK", "WA", "WN",
        ],
    ),
    (
        Region::Yorkshire,
        &["BD", "DN", "HD", "HG", "HU", "HX", "LS", "S", "WF", "YO"],
    ),
    (
        Region::WestMidlands,
        &["B", "CV", "DY", "HR", "ST", "TF", "WR", "WS", "WV"],
    ),
    (Region::EastMidlands, &["DE", "LE", "LN", "NG", "NN"]),
    (
        Region::SouthEast,
        &[
            "BN", "CT", "GU", "HP", "ME", "MK", "OX", "PO", "RG", "RH", "SL", "SO", "TN",
        ],
    ),
    (
        Region::SouthWest,
        &[
            "BA", "BH", "BS", "DT", "EX", "GL", "PL", "SN", "SP", "TA", "TQ", "TR",
        ],
    ),
    (
        Region::East,
        &["AL", "CB", "CM", "CO", "IP", "LU", "NR", "PE", "SG", "SS", "WD"],
    ),
];

const PLACE_NAMES: &[(Region, &[&str])] = &[
    (Region::London, &["london"]),
    (
        Region::NorthernIreland,
        &[
            "northern ireland", "belfast", "antrim", "derry", "londonderry", "lisburn", "newry",
            "armagh", "omagh", "enniskillen", "coleraine",
        ],
    ),
    (
        Region::Scotland,
        &[
            "scotland", "edinburgh", "glasgow", "aberdeen", "dundee", "inverness", "stirling",
            "perth",
        ],
    ),
    (
        Region::Wales,
        &["wales", "cardiff", "swansea", "newport", "wrexham"],
    ),
    (
        Region::NorthEast,
        &["newcastle", "sunderland", "durham", "middlesbrough", "gateshead"],
    ),
    (
        Region::NorthWest,
        &["manchester", "liverpool", "preston", "blackpool", "bolton", "wigan"],
    ),
    (
        Region::Yorkshire,
        &["leeds", "sheffield", "bradford", "york", "hull", "doncaster"],
    ),
    (
        Region::WestMidlands,
        &["birmingham", "coventry", "wolverhampton", "dudley", "walsall"],
    ),
    (
        Region::EastMidlands,
        &["nottingham", "leicester", "derby", "lincoln", "northampton"],
    ),
    (
        Region::SouthEast,
        &[
            "brighton", "southampton", "portsmouth", "oxford", "reading", "milton keynes",
            "guildford", "canterbury", "maidstone",
        ],
    ),
    (
        Region::SouthWest,
        &["bristol", "exeter", "plymouth", "bath", "bournemouth", "cheltenham"],
    ),
    (
        Region::East,
        &["cambridge", "norwich", "ipswich", "colchester", "peterborough"],
    ),
];

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(|c| c.is_alphanumeric()) && !after.is_some_and(|c| c.is_alphanumeric())
    })
}
