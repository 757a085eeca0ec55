//! Candidate, filter and result types for the filter engine.

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Unique identifier for candidates
pub type CandidateId = String;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// One posted opening window, in the venue's local time.
///
/// `open`/`close` are `HH:MM`. `24:00` closes at midnight of the next day, and
/// a close earlier than open runs past midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningPeriod {
    pub day: Weekday,
    pub open: String,
    pub close: String,
}

impl OpeningPeriod {
    pub fn new(day: Weekday, open: &str, close: &str) -> Self {
        Self {
            day,
            open: open.to_string(),
            close: close.to_string(),
        }
    }
}

/// Weekly posted hours.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    #[serde(default)]
    pub periods: Vec<OpeningPeriod>,
}

/// An item the group may pick, with the metadata filters look at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub dietary_tags: Vec<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub business_hours: Option<BusinessHours>,
    /// IANA timezone name of the venue (e.g. `Europe/Berlin`)
    #[serde(default)]
    pub timezone: Option<String>,
    /// Last time this candidate won a decision
    #[serde(default)]
    pub last_selected_at: Option<DateTime<Utc>>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_dietary(mut self, tags: &[&str]) -> Self {
        self.dietary_tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_location(mut self, lat: f64, lng: f64) -> Self {
        self.location = Some(GeoPoint::new(lat, lng));
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_hours(mut self, hours: BusinessHours, timezone: Option<&str>) -> Self {
        self.business_hours = Some(hours);
        self.timezone = timezone.map(str::to_string);
        self
    }

    pub fn with_last_selected(mut self, at: DateTime<Utc>) -> Self {
        self.last_selected_at = Some(at);
        self
    }
}

/// How a tag filter combines its tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagMatch {
    /// At least one tag present
    #[default]
    Any,
    /// Every tag present
    All,
    /// No tag present
    None,
}

/// Type-specific filter criteria. The variant is the filter's type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterCriteria {
    Category {
        #[serde(default)]
        include: Vec<String>,
        #[serde(default)]
        exclude: Vec<String>,
    },
    Dietary {
        required: Vec<String>,
    },
    Location {
        center: GeoPoint,
        max_distance_km: f64,
    },
    RecentActivity {
        exclude_within_days: u32,
    },
    OpeningHours,
    Tag {
        tags: Vec<String>,
        #[serde(default)]
        mode: TagMatch,
    },
}

/// Discriminant of [`FilterCriteria`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    Category,
    Dietary,
    Location,
    RecentActivity,
    OpeningHours,
    Tag,
}

impl FilterCriteria {
    pub fn filter_type(&self) -> FilterType {
        match self {
            Self::Category { .. } => FilterType::Category,
            Self::Dietary { .. } => FilterType::Dietary,
            Self::Location { .. } => FilterType::Location,
            Self::RecentActivity { .. } => FilterType::RecentActivity,
            Self::OpeningHours => FilterType::OpeningHours,
            Self::Tag { .. } => FilterType::Tag,
        }
    }
}

impl std::fmt::Display for FilterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Category => write!(f, "category"),
            Self::Dietary => write!(f, "dietary"),
            Self::Location => write!(f, "location"),
            Self::RecentActivity => write!(f, "recent_activity"),
            Self::OpeningHours => write!(f, "opening_hours"),
            Self::Tag => write!(f, "tag"),
        }
    }
}

/// A single user-supplied criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterItem {
    pub id: String,
    /// Hard filters exclude; soft filters only rank
    #[serde(default)]
    pub is_hard: bool,
    /// 0 is the highest priority. Only meaningful for soft filters.
    #[serde(default)]
    pub priority: u32,
    pub criteria: FilterCriteria,
    #[serde(default)]
    pub description: String,
}

impl FilterItem {
    pub fn hard(id: &str, criteria: FilterCriteria) -> Self {
        Self {
            id: id.to_string(),
            is_hard: true,
            priority: 0,
            criteria,
            description: String::new(),
        }
    }

    pub fn soft(id: &str, priority: u32, criteria: FilterCriteria) -> Self {
        Self {
            id: id.to_string(),
            is_hard: false,
            priority,
            criteria,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Scoring weight, `1 / (priority + 1)`.
    pub fn weight(&self) -> f64 {
        1.0 / (f64::from(self.priority) + 1.0)
    }
}

/// Filters plus the instant opening hours and recency are checked against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfiguration {
    #[serde(default)]
    pub filters: Vec<FilterItem>,
    /// Defaults to the engine clock's now
    #[serde(default)]
    pub check_time: Option<DateTime<Utc>>,
}

impl FilterConfiguration {
    pub fn new(filters: Vec<FilterItem>) -> Self {
        Self {
            filters,
            check_time: None,
        }
    }

    pub fn at(mut self, check_time: DateTime<Utc>) -> Self {
        self.check_time = Some(check_time);
        self
    }

    pub fn hard_filters(&self) -> impl Iterator<Item = &FilterItem> {
        self.filters.iter().filter(|f| f.is_hard)
    }

    /// Soft filters by priority ascending; equal priorities keep declaration order.
    pub fn soft_filters_by_priority(&self) -> Vec<&FilterItem> {
        let mut soft: Vec<&FilterItem> = self.filters.iter().filter(|f| !f.is_hard).collect();
        soft.sort_by_key(|f| f.priority);
        soft
    }
}

/// Outcome of one hard filter for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardFilterOutcome {
    pub filter_id: String,
    pub passed: bool,
}

/// Outcome of one soft filter for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftFilterOutcome {
    pub filter_id: String,
    pub priority: u32,
    pub passed: bool,
}

/// Per-candidate evaluation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterResult {
    pub candidate_id: CandidateId,
    pub hard_results: Vec<HardFilterOutcome>,
    pub passed_hard_filters: bool,
    /// Ordered by priority ascending
    pub soft_results: Vec<SoftFilterOutcome>,
    pub violation_count: u32,
    pub priority_score: f64,
}

impl FilterResult {
    /// Ids of the hard filters this candidate failed
    pub fn failed_hard_filters(&self) -> impl Iterator<Item = &str> {
        self.hard_results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.filter_id.as_str())
    }
}

/// What removing one hard filter would bring back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaxationSuggestion {
    pub filter_id: String,
    pub description: String,
    /// Candidates this filter rejected
    pub rejected_count: usize,
    /// Candidates for which this filter was the only failing hard filter
    pub restorable_count: usize,
}

/// Full output of applying a filter configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterReport {
    /// Ranked: score desc, violations asc, id asc
    pub admissible: Vec<FilterResult>,
    /// Hard-filter rejects, kept for diagnostics
    pub rejected: Vec<FilterResult>,
    /// Populated only when nothing is admissible
    pub relaxation: Vec<RelaxationSuggestion>,
}

impl FilterReport {
    pub fn admissible_ids(&self) -> Vec<CandidateId> {
        self.admissible
            .iter()
            .map(|r| r.candidate_id.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.admissible.is_empty()
    }
}
