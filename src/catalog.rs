use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::PortalError;
use self::ExportCategory as E;
use self::FieldCategory as C;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldCategory {
    Meta,
    Physical,
    Chemical,
    Biological,
    Meteorological,
    Geographical,
    Social,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExportCategory {
    Physical,
    Chemical,
    Biological,
    MeteorologicalGeo,
    Social,
    Geographical,
}

impl ExportCategory {
    pub const ALL: [ExportCategory; 6] = [
        ExportCategory::Physical,
        ExportCategory::Chemical,
        ExportCategory::Biological,
        ExportCategory::MeteorologicalGeo,
        ExportCategory::Social,
        ExportCategory::Geographical,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExportCategory::Physical => "Physical Parameters",
            ExportCategory::Chemical => "Chemical Parameters",
            ExportCategory::Biological => "Biological Parameters",
            ExportCategory::MeteorologicalGeo => "Meteorological & Geo",
            ExportCategory::Social => "Social Parameters",
            ExportCategory::Geographical => "Geographical Parameters",
        }
    }

    pub fn keys(self) -> Vec<&'static str> {
        FIELDS
            .iter()
            .filter(|field| field.export.contains(&self))
            .map(|field| field.key)
            .collect()
    }
}

impl fmt::Display for ExportCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ExportCategory {
    type Err = PortalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        ExportCategory::ALL
            .into_iter()
            .find(|category| category.name() == trimmed)
            .ok_or_else(|| PortalError::UnknownCategory(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub column: &'static str,
    pub category: FieldCategory,
    pub export: &'static [ExportCategory],
    // Official bulk-sheet headers, tried in order before the key and label.
    pub aliases: &'static [&'static str],
}

impl FieldSpec {
    pub fn is_measurement(&self) -> bool {
        self.category != FieldCategory::Meta
    }
}

const fn field(
    key: &'static str,
    label: &'static str,
    column: &'static str,
    category: FieldCategory,
    export: &'static [ExportCategory],
    aliases: &'static [&'static str],
) -> FieldSpec {
    FieldSpec {
        key,
        label,
        column,
        category,
        export,
        aliases,
    }
}

pub const CREATED_AT: &str = "created_at";
pub const DATE: &str = "Date";
pub const TIME: &str = "Time";
pub const REGION: &str = "Main_Location";
pub const SPOT: &str = "Location";
pub const LATITUDE: &str = "Latitude";
pub const LONGITUDE: &str = "Longitude";
pub const CONTRIBUTOR: &str = "Contributor";
pub const EMAIL: &str = "Email";
pub const PROFESSION: &str = "Profession";
pub const DESIGNATION: &str = "Designation";

pub const EXPORT_PREFIX: [&str; 7] = [CREATED_AT, DATE, TIME, REGION, SPOT, LATITUDE, LONGITUDE];

#[rustfmt::skip]
pub static FIELDS: &[FieldSpec] = &[
    field(CREATED_AT, "Upload Timestamp", "created_at", C::Meta, &[], &[]),
    field(DATE, "Collection Date", "date", C::Meta, &[], &[]),
    field(TIME, "Collection Time", "time", C::Meta, &[], &[]),
    field(REGION, "Region", "main_location", C::Meta, &[], &[]),
    field(SPOT, "Specific Spot", "location", C::Meta, &[], &[]),
    field(LATITUDE, "Latitude", "latitude", C::Meta, &[], &[]),
    field(LONGITUDE, "Longitude", "longitude", C::Meta, &[], &[]),
    field(CONTRIBUTOR, "Contributor", "contributor", C::Meta, &[], &[]),
    field(EMAIL, "Contributor Email", "email", C::Meta, &[], &[]),
    field(PROFESSION, "Profession", "profession", C::Meta, &[], &[]),
    field(DESIGNATION, "Designation", "designation", C::Meta, &[], &[]),

    field("Water_Temp", "Water Temperature (°C)", "water_temp", C::Physical, &[E::Physical], &["WQ Temp (°C)"]),
    field("Salinity", "Salinity (psu)", "salinity", C::Physical, &[E::Physical], &["Sal (psu)"]),
    field("pH", "pH Level", "ph", C::Physical, &[E::Physical], &["pH"]),
    field("Turbidity", "Turbidity (NTU)", "turbidity", C::Physical, &[E::Physical], &["Turbidity (NTU)", "Turbididt y (NTU)"]),
    field("Transparency", "Transparency (cm)", "transparency", C::Physical, &[E::Physical], &[]),
    field("TSS", "Total Suspended Solids (mg/L)", "tss", C::Physical, &[E::Physical], &["TSS (mg/L)"]),
    field("TDS", "Total Dissolved Solids (g/L)", "tds", C::Physical, &[E::Physical], &["TDS (g/L)"]),
    field("Color", "Water Color", "color", C::Physical, &[E::Physical], &[]),
    field("Odour", "Odour", "odour", C::Physical, &[E::Physical], &[]),

    field("DO", "Dissolved Oxygen (mg/L)", "do", C::Chemical, &[E::Chemical], &["Dissolved Oxygen (mg/L)"]),
    field("BOD", "Biochemical Oxygen Demand (mg/L)", "bod", C::Chemical, &[E::Chemical], &[]),
    field("COD", "Chemical Oxygen Demand (mg/L)", "cod", C::Chemical, &[E::Chemical], &[]),
    field("NH4_N", "Ammonium Nitrogen (µmol/L)", "nh4_n", C::Chemical, &[E::Chemical], &[]),
    field("NO3_N", "Nitrate Nitrogen (µmol/L)", "no3_n", C::Chemical, &[E::Chemical], &[]),
    field("NO2_N", "Nitrite Nitrogen (µmol/L)", "no2_n", C::Chemical, &[E::Chemical], &[]),
    field("PO4", "Phosphate (µmol/L)", "po4", C::Chemical, &[E::Chemical], &[]),
    field("SO4", "Sulphate (mg/L)", "so4", C::Chemical, &[E::Chemical], &[]),

    field("Chlorophyll", "Chlorophyll (ug/l)", "chlorophyll", C::Biological, &[E::Biological], &["Chl(ug/l)", "Chlorophy (mg/L)", "Chlorophy_RFU (ug/L)"]),
    field("BGA", "Blue Green Algae (mg/l)", "bga", C::Biological, &[E::Biological], &["BGA (mg/l)"]),
    field("Fecal_Coliform", "Fecal Coliform (MPN/100ml)", "fecal_coliform", C::Biological, &[E::Biological], &[]),
    field("Total_Coliform", "Total Coliform (MPN/100ml)", "total_coliform", C::Biological, &[E::Biological], &[]),
    field("Productivity", "Primary Productivity (mgC/m3/hr)", "productivity", C::Biological, &[E::Biological], &[]),
    field("Phytoplankton", "Phytoplankton Species", "phytoplankton", C::Biological, &[E::Biological], &[]),
    field("Zooplankton", "Zooplankton Species", "zooplankton", C::Biological, &[E::Biological], &[]),

    field("Wind_Speed", "Wind Speed (m/s)", "wind_speed", C::Meteorological, &[E::MeteorologicalGeo], &["Wind Speed (m/s)"]),
    field("Wind_Direction", "Wind Direction (Deg)", "wind_direction", C::Meteorological, &[E::MeteorologicalGeo], &["Wind Dir (Deg)"]),
    field("Air_Temp", "Air Temperature (°C)", "air_temp", C::Meteorological, &[E::MeteorologicalGeo], &["Air Temp (°C)"]),
    field("Humidity", "Relative Humidity (%)", "humidity", C::Meteorological, &[E::MeteorologicalGeo], &["Rel.Hum (%)"]),
    field("Precipitation", "Total Precipitation (mm)", "precipitation", C::Meteorological, &[E::MeteorologicalGeo], &["Total Precipitation (mm)"]),

    field("Shoreline_Status", "Shoreline Status", "shoreline_status", C::Geographical, &[E::MeteorologicalGeo, E::Geographical], &[]),
    field("Water_Bodies", "Nearby Water Bodies", "water_bodies", C::Geographical, &[E::Geographical], &[]),
    field("Industrial_Est", "Industrial Establishments", "industrial_est", C::Geographical, &[E::Geographical], &[]),
    field("Tourism_Status", "Tourism Status", "tourism_status", C::Geographical, &[E::Geographical], &[]),
    field("Tourist_Inflow", "Annual Tourist Inflow", "tourist_inflow", C::Geographical, &[E::Geographical], &[]),
    field("Optimum_Season", "Optimum Season", "optimum_season", C::Geographical, &[E::Geographical], &[]),

    field("Population", "Coastal Population", "population", C::Social, &[E::MeteorologicalGeo, E::Social], &[]),
    field("Coastal_Villages", "Coastal Villages", "coastal_villages", C::Social, &[E::Social], &[]),
    field("Panchayats", "Panchayats", "panchayats", C::Social, &[E::Social], &[]),
    field("Fishermen", "Fishermen Population", "fishermen", C::Social, &[E::Social], &[]),
    field("Fish_Catch", "Fish Catch", "fish_catch", C::Social, &[E::Social], &[]),
    field("Landing_Centers", "Landing Centers", "landing_centers", C::Social, &[E::Social], &[]),
];

pub fn by_key(key: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|field| field.key == key)
}

pub fn by_column(column: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|field| field.column == column)
}

pub fn label_for(key: &str) -> &str {
    by_key(key).map(|field| field.label).unwrap_or(key)
}

pub fn measurements() -> impl Iterator<Item = &'static FieldSpec> {
    FIELDS.iter().filter(|field| field.is_measurement())
}
