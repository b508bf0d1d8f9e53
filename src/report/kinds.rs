//! The five report kinds, each expressed as data for the shared engine.
//!
//! A [`ReportDescriptor`] carries the metric schema, the datasets to query on
//! every station, the grouping levels, and a pure derivation function that
//! turns one feature's properties into a [`Contribution`].

use crate::normalize::{self, CategoryRule, Properties, UNKNOWN};
use crate::report::aggregate::{Contribution, Metric, MetricKind, Schema};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

const CORE_WORKSPACE: &str = "dha_coregis";
const V2_WORKSPACE: &str = "dha_coregis_v2";

/// What a dataset's features represent, for kinds that query several layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetRole {
    Summary,
    Polygon,
    Line,
    Point,
}

/// One remote layer queried on every station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSpec {
    pub workspace: &'static str,
    pub layer: &'static str,
    pub max_features: Option<u32>,
    pub role: DatasetRole,
}

impl DatasetSpec {
    /// Fully-qualified WFS type name, `workspace:layer`.
    pub fn type_name(&self) -> String {
        format!("{}:{}", self.workspace, self.layer)
    }
}

pub type DeriveFn = fn(&DatasetSpec, &Properties) -> Option<Contribution>;

pub struct ReportDescriptor {
    pub kind: ReportKind,
    pub schema: &'static Schema,
    pub datasets: &'static [DatasetSpec],
    /// Output key of each grouping level, in [`Contribution::keys`] order.
    pub groupings: &'static [&'static str],
    /// Prepended to metric names in the global summary.
    pub summary_prefix: &'static str,
    pub timeout: Duration,
    pub derive: DeriveFn,
}

impl fmt::Debug for ReportDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportDescriptor")
            .field("kind", &self.kind)
            .field("schema", &self.schema.name)
            .field("datasets", &self.datasets)
            .field("groupings", &self.groupings)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    Land,
    TownPlan,
    Services,
    Horticulture,
    Security,
}

impl ReportKind {
    pub const ALL: [ReportKind; 5] = [
        ReportKind::Land,
        ReportKind::TownPlan,
        ReportKind::Services,
        ReportKind::Horticulture,
        ReportKind::Security,
    ];

    pub fn descriptor(self) -> &'static ReportDescriptor {
        match self {
            ReportKind::Land => &LAND,
            ReportKind::TownPlan => &TOWN_PLAN,
            ReportKind::Services => &SERVICES,
            ReportKind::Horticulture => &HORTICULTURE,
            ReportKind::Security => &SECURITY,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::Land => "land",
            ReportKind::TownPlan => "town-plan",
            ReportKind::Services => "services",
            ReportKind::Horticulture => "horticulture",
            ReportKind::Security => "security",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const fn amount(name: &'static str) -> Metric {
    Metric { name, kind: MetricKind::Amount }
}

const fn count(name: &'static str) -> Metric {
    Metric { name, kind: MetricKind::Count }
}

const PHASE_KEYS: &[&str] = &["Phase", "phase_name"];

// ---- land ----

static LAND_SCHEMA: Schema = Schema {
    name: "land",
    metrics: &[
        amount("possessed"),
        amount("unpossessed"),
        amount("purchased"),
        amount("unpurchased"),
        amount("hold"),
        amount("litigation"),
    ],
};

static LAND: ReportDescriptor = ReportDescriptor {
    kind: ReportKind::Land,
    schema: &LAND_SCHEMA,
    datasets: &[DatasetSpec {
        workspace: CORE_WORKSPACE,
        layer: "finalreport",
        max_features: None,
        role: DatasetRole::Summary,
    }],
    groupings: &["phase_summary", "land_provider_summary"],
    summary_prefix: "total_",
    timeout: Duration::from_secs(15),
    derive: derive_land,
};

/// `unpurchased` is the part of the total area not yet purchased. It is only
/// derived when the total is known, and may go negative on inconsistent data.
pub fn unpurchased(total_area: f64, purchased: f64) -> f64 {
    if total_area != 0.0 {
        total_area - purchased
    } else {
        0.0
    }
}

fn derive_land(_: &DatasetSpec, props: &Properties) -> Option<Contribution> {
    let total_area = normalize::number(props, &["totalarea"]);
    let purchased = normalize::number(props, &["purchasedarea"]);

    let provider = normalize::label(props, &["land_provider", "provider"])
        .unwrap_or_else(|| UNKNOWN.to_string());

    Some(
        Contribution::new(&LAND_SCHEMA)
            .add("possessed", normalize::number(props, &["totalpossessedland"]))
            .add("unpossessed", normalize::number(props, &["totalunpossessedland"]))
            .add("purchased", purchased)
            .add("unpurchased", unpurchased(total_area, purchased))
            .add("hold", normalize::number(props, &["totalholdland"]))
            .add("litigation", normalize::number(props, &["totallitigationland"]))
            .key(normalize::phase(props, PHASE_KEYS))
            .key(provider),
    )
}

// ---- town plan ----

static TOWN_PLAN_SCHEMA: Schema = Schema {
    name: "town-plan",
    metrics: &[
        count("Residential"),
        count("Commercial"),
        count("Education"),
        count("Amenities"),
        count("Parks"),
        count("Total_Plots"),
    ],
};

pub const PLOT_CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule { needles: &["resident"], label: "Residential" },
    CategoryRule { needles: &["commercial"], label: "Commercial" },
    CategoryRule { needles: &["education"], label: "Education" },
    CategoryRule { needles: &["amen"], label: "Amenities" },
    CategoryRule { needles: &["park"], label: "Parks" },
];

static TOWN_PLAN: ReportDescriptor = ReportDescriptor {
    kind: ReportKind::TownPlan,
    schema: &TOWN_PLAN_SCHEMA,
    datasets: &[DatasetSpec {
        workspace: V2_WORKSPACE,
        layer: "phase_plot_category_summary",
        max_features: Some(50),
        role: DatasetRole::Summary,
    }],
    groupings: &["phases"],
    summary_prefix: "",
    timeout: Duration::from_secs(10),
    derive: derive_town_plan,
};

fn derive_town_plan(_: &DatasetSpec, props: &Properties) -> Option<Contribution> {
    let category = normalize::label(props, &["Category"])?;
    let metric = normalize::classify(&category, PLOT_CATEGORY_RULES)?;

    Some(
        Contribution::new(&TOWN_PLAN_SCHEMA)
            .add(metric, normalize::count(props, &["Count_of_Plots"]) as f64)
            .add("Total_Plots", normalize::count(props, &["Total_Plots"]) as f64)
            .key(normalize::phase(props, PHASE_KEYS)),
    )
}

// ---- services ----

static SERVICES_SCHEMA: Schema = Schema {
    name: "services",
    metrics: &[
        amount("Roads"),
        amount("Water Supply"),
        amount("Electricity"),
        amount("Gas Supply"),
        amount("Sewerage"),
        amount("Drainage"),
        amount("Communication"),
        amount("Total_Length_Km"),
    ],
};

/// Drainage and sewerage come before water so "storm water drain" is not
/// counted as supply.
pub const SERVICE_RULES: &[CategoryRule] = &[
    CategoryRule { needles: &["sewer"], label: "Sewerage" },
    CategoryRule { needles: &["drain", "storm", "strom"], label: "Drainage" },
    CategoryRule { needles: &["road"], label: "Roads" },
    CategoryRule { needles: &["water"], label: "Water Supply" },
    CategoryRule { needles: &["electric"], label: "Electricity" },
    CategoryRule { needles: &["gas"], label: "Gas Supply" },
    CategoryRule { needles: &["telecom", "telcom", "commun"], label: "Communication" },
];

static SERVICES: ReportDescriptor = ReportDescriptor {
    kind: ReportKind::Services,
    schema: &SERVICES_SCHEMA,
    datasets: &[DatasetSpec {
        workspace: V2_WORKSPACE,
        layer: "phase_services_summary",
        max_features: Some(1000),
        role: DatasetRole::Summary,
    }],
    groupings: &["phases"],
    summary_prefix: "",
    timeout: Duration::from_secs(10),
    derive: derive_services,
};

fn derive_services(_: &DatasetSpec, props: &Properties) -> Option<Contribution> {
    let category = normalize::label(props, &["Category", "Service", "Type"])?;
    let metric = normalize::classify(&category, SERVICE_RULES)?;
    let length = normalize::number(props, &["Length_Km", "Length"]);

    Some(
        Contribution::new(&SERVICES_SCHEMA)
            .add(metric, length)
            .add("Total_Length_Km", length)
            .key(normalize::phase(props, PHASE_KEYS)),
    )
}

// ---- horticulture ----

static HORTICULTURE_SCHEMA: Schema = Schema {
    name: "horticulture",
    metrics: &[
        amount("Area_Kanals"),
        amount("Length_Km"),
        count("Points"),
        count("Total_Features"),
    ],
};

static HORTICULTURE: ReportDescriptor = ReportDescriptor {
    kind: ReportKind::Horticulture,
    schema: &HORTICULTURE_SCHEMA,
    datasets: &[
        DatasetSpec {
            workspace: V2_WORKSPACE,
            layer: "Horticulture Polygon",
            max_features: Some(1000),
            role: DatasetRole::Polygon,
        },
        DatasetSpec {
            workspace: V2_WORKSPACE,
            layer: "Horticulture Line",
            max_features: Some(1000),
            role: DatasetRole::Line,
        },
        DatasetSpec {
            workspace: V2_WORKSPACE,
            layer: "Horticulture Point",
            max_features: Some(1000),
            role: DatasetRole::Point,
        },
    ],
    groupings: &["phases", "status_summary"],
    summary_prefix: "",
    timeout: Duration::from_secs(20),
    derive: derive_horticulture,
};

fn derive_horticulture(dataset: &DatasetSpec, props: &Properties) -> Option<Contribution> {
    let contribution = Contribution::new(&HORTICULTURE_SCHEMA).add("Total_Features", 1.0);

    let contribution = match dataset.role {
        DatasetRole::Polygon => {
            contribution.add("Area_Kanals", normalize::number(props, &["Area_Kanals"]))
        }
        DatasetRole::Line => contribution.add("Length_Km", normalize::number(props, &["Length_Km"])),
        DatasetRole::Point => contribution.add("Points", 1.0),
        DatasetRole::Summary => return None,
    };

    let status = normalize::label(props, &["Status"]).unwrap_or_else(|| UNKNOWN.to_string());

    Some(
        contribution
            .key(normalize::phase(props, PHASE_KEYS))
            .key(status),
    )
}

// ---- security ----

static SECURITY_SCHEMA: Schema = Schema {
    name: "security",
    metrics: &[
        count("Camera"),
        count("Check Post"),
        count("Picquet"),
        count("QRF"),
        count("Incidents"),
        count("Total_Features"),
    ],
};

/// Matched whole-label: security categories are a closed list.
pub const SECURITY_RULES: &[CategoryRule] = &[
    CategoryRule { needles: &["camera"], label: "Camera" },
    CategoryRule { needles: &["check post"], label: "Check Post" },
    CategoryRule { needles: &["picquet", "picket"], label: "Picquet" },
    CategoryRule { needles: &["qrf"], label: "QRF" },
    CategoryRule { needles: &["incidents"], label: "Incidents" },
];

static SECURITY: ReportDescriptor = ReportDescriptor {
    kind: ReportKind::Security,
    schema: &SECURITY_SCHEMA,
    datasets: &[DatasetSpec {
        workspace: V2_WORKSPACE,
        layer: "phase_security_summary",
        max_features: Some(50),
        role: DatasetRole::Summary,
    }],
    groupings: &["phases"],
    summary_prefix: "",
    timeout: Duration::from_secs(10),
    derive: derive_security,
};

fn derive_security(_: &DatasetSpec, props: &Properties) -> Option<Contribution> {
    let category = normalize::label(props, &["Category"])?;
    let metric = normalize::classify_exact(&category, SECURITY_RULES)?;

    Some(
        Contribution::new(&SECURITY_SCHEMA)
            .add(metric, normalize::count(props, &["Count_of_Features"]) as f64)
            .add("Total_Features", normalize::count(props, &["Total_Features"]) as f64)
            .key(normalize::phase(props, PHASE_KEYS)),
    )
}
