//! Recognised feed resources and their per-kind import profile.
//!
//! Each [`ResourceKind`] maps to a static [`KindProfile`] holding the store
//! table name, whether the feed must provide it, and the index plan applied
//! once its import completes. Lookups go through the table rather than
//! per-kind branching in callers.

use std::fmt;

/// One index declared for a resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    /// Index name inside the store.
    pub name: &'static str,
    /// Indexed columns, in key order.
    pub columns: &'static [&'static str],
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

impl IndexSpec {
    const fn plain(name: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            name,
            columns,
            unique: false,
        }
    }

    const fn unique(name: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            name,
            columns,
            unique: true,
        }
    }

    /// Report whether every indexed column appears in `header`.
    #[must_use]
    pub fn is_covered_by<S: AsRef<str>>(&self, header: &[S]) -> bool {
        self.columns
            .iter()
            .all(|column| header.iter().any(|name| name.as_ref() == *column))
    }
}

/// Static configuration attached to a [`ResourceKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindProfile {
    /// The kind this profile describes.
    pub kind: ResourceKind,
    /// Store table name, also the resource name without `.txt`.
    pub table: &'static str,
    /// Whether a complete feed must contain the resource.
    pub required: bool,
    /// Indexes created after the import of this kind completes.
    pub indexes: &'static [IndexSpec],
}

/// A tabular resource recognised inside a transit feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// `agency.txt`
    Agency,
    /// `stops.txt`
    Stops,
    /// `routes.txt`
    Routes,
    /// `trips.txt`
    Trips,
    /// `stop_times.txt`
    StopTimes,
    /// `calendar.txt`
    Calendar,
    /// `calendar_dates.txt`
    CalendarDates,
    /// `fare_attributes.txt`
    FareAttributes,
    /// `fare_rules.txt`
    FareRules,
    /// `shapes.txt`
    Shapes,
    /// `frequencies.txt`
    Frequencies,
    /// `transfers.txt`
    Transfers,
    /// `feed_info.txt`
    FeedInfo,
}

const RESOURCE_SUFFIX: &str = ".txt";

const NO_INDEXES: &[IndexSpec] = &[];

const AGENCY: KindProfile = KindProfile {
    kind: ResourceKind::Agency,
    table: "agency",
    required: true,
    indexes: NO_INDEXES,
};
const STOPS: KindProfile = KindProfile {
    kind: ResourceKind::Stops,
    table: "stops",
    required: true,
    indexes: &[IndexSpec::unique("stop_idx", &["stop_id"])],
};
const ROUTES: KindProfile = KindProfile {
    kind: ResourceKind::Routes,
    table: "routes",
    required: true,
    indexes: &[IndexSpec::unique("route_idx", &["route_id"])],
};
const TRIPS: KindProfile = KindProfile {
    kind: ResourceKind::Trips,
    table: "trips",
    required: true,
    indexes: &[
        IndexSpec::unique("trip_idx", &["trip_id"]),
        IndexSpec::plain("t_shape_idx", &["shape_id"]),
        IndexSpec::plain("route_dir_idx", &["route_id", "direction_id"]),
    ],
};
const STOP_TIMES: KindProfile = KindProfile {
    kind: ResourceKind::StopTimes,
    table: "stop_times",
    required: true,
    indexes: &[
        IndexSpec::plain("st_trip_idx", &["trip_id"]),
        IndexSpec::plain("st_stop_idx", &["stop_id"]),
        IndexSpec::plain("stop_times_idx", &["trip_id", "stop_id"]),
    ],
};
const CALENDAR: KindProfile = KindProfile {
    kind: ResourceKind::Calendar,
    table: "calendar",
    required: true,
    indexes: NO_INDEXES,
};
const CALENDAR_DATES: KindProfile = KindProfile {
    kind: ResourceKind::CalendarDates,
    table: "calendar_dates",
    required: false,
    indexes: NO_INDEXES,
};
const FARE_ATTRIBUTES: KindProfile = KindProfile {
    kind: ResourceKind::FareAttributes,
    table: "fare_attributes",
    required: false,
    indexes: NO_INDEXES,
};
const FARE_RULES: KindProfile = KindProfile {
    kind: ResourceKind::FareRules,
    table: "fare_rules",
    required: false,
    indexes: NO_INDEXES,
};
const SHAPES: KindProfile = KindProfile {
    kind: ResourceKind::Shapes,
    table: "shapes",
    required: false,
    indexes: &[IndexSpec::plain("shape_idx", &["shape_id"])],
};
const FREQUENCIES: KindProfile = KindProfile {
    kind: ResourceKind::Frequencies,
    table: "frequencies",
    required: false,
    indexes: NO_INDEXES,
};
const TRANSFERS: KindProfile = KindProfile {
    kind: ResourceKind::Transfers,
    table: "transfers",
    required: false,
    indexes: &[
        IndexSpec::plain("trans_from_idx", &["from_stop_id"]),
        IndexSpec::plain("trans_to_idx", &["to_stop_id"]),
        IndexSpec::plain("trans_idx", &["from_stop_id", "to_stop_id"]),
    ],
};
const FEED_INFO: KindProfile = KindProfile {
    kind: ResourceKind::FeedInfo,
    table: "feed_info",
    required: false,
    indexes: NO_INDEXES,
};

impl ResourceKind {
    /// Every recognised kind, required kinds first.
    pub const ALL: [Self; 13] = [
        Self::Agency,
        Self::Stops,
        Self::Routes,
        Self::Trips,
        Self::StopTimes,
        Self::Calendar,
        Self::CalendarDates,
        Self::FareAttributes,
        Self::FareRules,
        Self::Shapes,
        Self::Frequencies,
        Self::Transfers,
        Self::FeedInfo,
    ];

    /// Resolve a resource name such as `stops.txt`.
    ///
    /// Names outside the allow-list, including those without the `.txt`
    /// suffix, resolve to `None`.
    ///
    /// # Examples
    /// ```
    /// use feedstore_core::ResourceKind;
    ///
    /// assert_eq!(
    ///     ResourceKind::from_resource_name("stop_times.txt"),
    ///     Some(ResourceKind::StopTimes)
    /// );
    /// assert_eq!(ResourceKind::from_resource_name("stops.csv"), None);
    /// assert_eq!(ResourceKind::from_resource_name("readme.txt"), None);
    /// ```
    #[must_use]
    pub fn from_resource_name(name: &str) -> Option<Self> {
        name.strip_suffix(RESOURCE_SUFFIX)
            .and_then(Self::from_table_name)
    }

    /// Resolve a store table name such as `stops`.
    #[must_use]
    pub fn from_table_name(table: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.profile().table == table)
    }

    /// Static profile for this kind.
    #[must_use]
    pub const fn profile(self) -> &'static KindProfile {
        match self {
            Self::Agency => &AGENCY,
            Self::Stops => &STOPS,
            Self::Routes => &ROUTES,
            Self::Trips => &TRIPS,
            Self::StopTimes => &STOP_TIMES,
            Self::Calendar => &CALENDAR,
            Self::CalendarDates => &CALENDAR_DATES,
            Self::FareAttributes => &FARE_ATTRIBUTES,
            Self::FareRules => &FARE_RULES,
            Self::Shapes => &SHAPES,
            Self::Frequencies => &FREQUENCIES,
            Self::Transfers => &TRANSFERS,
            Self::FeedInfo => &FEED_INFO,
        }
    }

    /// Store table name for this kind.
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        self.profile().table
    }

    /// Resource file name for this kind, e.g. `stops.txt`.
    #[must_use]
    pub fn resource_name(self) -> String {
        format!("{}{RESOURCE_SUFFIX}", self.table_name())
    }

    /// Whether a complete feed must contain this kind.
    #[must_use]
    pub const fn is_required(self) -> bool {
        self.profile().required
    }

    /// Indexes applied after this kind has been imported.
    #[must_use]
    pub const fn index_plan(self) -> &'static [IndexSpec] {
        self.profile().indexes
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}
