use serde::Serialize;

use crate::error::PortalError;

pub const OTHER: &str = "Other";
pub const OTHER_STATE: &str = "Other State/Region";

pub const DEFAULT_COORDS: (f64, f64) = (13.0827, 80.2707);

#[rustfmt::skip]
pub static COASTAL_STATES: &[(&str, &[&str])] = &[
    ("Kerala", &["Thiruvananthapuram Coast", "Kollam Coast", "Alappuzha Coast", "Kochi (Ernakulam) Coast", "Thrissur Coast", "Malappuram Coast", "Kozhikode Coast", "Kannur Coast", "Kasargod Coast", OTHER]),
    ("Tamil Nadu", &["Chennai Coast", "Thiruvallur Coast", "Kancheepuram Coast", "Villupuram Coast", "Cuddalore Coast", "Nagapattinam Coast", "Thiruvarur Coast", "Thanjavur Coast", "Pudukottai Coast", "Ramanathapuram Coast", "Thoothukudi Coast", "Tirunelveli Coast", "Kanyakumari Coast", OTHER]),
    ("Karnataka", &["Dakshina Kannada Coast", "Udupi Coast", "Uttara Kannada Coast", OTHER]),
    ("Maharashtra", &["Mumbai City Coast", "Mumbai Suburban Coast", "Thane Coast", "Palghar Coast", "Raigad Coast", "Ratnagiri Coast", "Sindhudurg Coast", OTHER]),
    ("Goa", &["North Goa Coast", "South Goa Coast", OTHER]),
    ("Gujarat", &["Kutch Coast", "Jamnagar Coast", "Porbandar Coast", "Junagadh Coast", "Amreli Coast", "Bhavnagar Coast", "Ahmedabad Coast", "Anand Coast", "Bharuch Coast", "Surat Coast", "Navsari Coast", "Valsad Coast", OTHER]),
    ("Andhra Pradesh", &["Srikakulam Coast", "Vizianagaram Coast", "Visakhapatnam Coast", "East Godavari Coast", "West Godavari Coast", "Krishna Coast", "Guntur Coast", "Prakasam Coast", "Nellore Coast", OTHER]),
    ("Odisha", &["Balasore Coast", "Bhadrak Coast", "Kendrapara Coast", "Jagatsinghpur Coast", "Puri Coast", "Ganjam Coast", OTHER]),
    ("West Bengal", &["Purba Medinipur Coast", "South 24 Parganas Coast", "North 24 Parganas Coast", OTHER]),
    ("Puducherry (UT)", &["Puducherry Region Coast", "Karaikal Coast", "Mahe Coast", "Yanam Coast", OTHER]),
    ("Daman & Diu (UT)", &["Daman Coast", "Diu Coast", OTHER]),
    ("Lakshadweep (UT)", &["Kavaratti", "Agatti", "Minicoy", "Amini", "Andrott", OTHER]),
    ("Andaman & Nicobar (UT)", &["Port Blair", "Havelock Island", "Neil Island", "Little Andaman", "Great Nicobar", OTHER]),
    (OTHER_STATE, &[OTHER]),
];

// Lookup order matters for substring matching: "Other" must stay last.
#[rustfmt::skip]
pub static REGION_COORDS: &[(&str, (f64, f64))] = &[
    ("Chennai Coast", (13.0827, 80.2707)), ("Thiruvallur Coast", (13.15, 80.30)), ("Kancheepuram Coast", (12.50, 80.15)),
    ("Villupuram Coast", (12.00, 79.80)), ("Cuddalore Coast", (11.7480, 79.7714)), ("Nagapattinam Coast", (10.7672, 79.8437)),
    ("Thiruvarur Coast", (10.70, 79.60)), ("Thanjavur Coast", (10.30, 79.30)), ("Pudukottai Coast", (10.00, 79.00)),
    ("Ramanathapuram Coast", (9.3639, 78.8395)), ("Thoothukudi Coast", (8.7642, 78.1348)), ("Tirunelveli Coast", (8.7139, 77.7567)),
    ("Kanyakumari Coast", (8.0883, 77.5385)),
    ("Thiruvananthapuram Coast", (8.5241, 76.9366)), ("Kollam Coast", (8.8932, 76.6141)), ("Alappuzha Coast", (9.4981, 76.3388)),
    ("Kochi (Ernakulam) Coast", (9.9312, 76.2673)), ("Thrissur Coast", (10.5276, 76.2144)), ("Malappuram Coast", (10.8505, 75.9265)),
    ("Kozhikode Coast", (11.2588, 75.7804)), ("Kannur Coast", (11.8745, 75.3704)), ("Kasargod Coast", (12.4996, 74.9869)),
    ("Dakshina Kannada Coast", (12.91, 74.85)), ("Udupi Coast", (13.34, 74.74)), ("Uttara Kannada Coast", (14.80, 74.13)),
    ("Visakhapatnam Coast", (17.6868, 83.2185)), ("Srikakulam Coast", (18.30, 83.90)), ("Vizianagaram Coast", (18.11, 83.39)),
    ("East Godavari Coast", (16.90, 82.20)), ("West Godavari Coast", (16.50, 81.50)), ("Krishna Coast", (16.10, 81.10)),
    ("Guntur Coast", (15.80, 80.50)), ("Prakasam Coast", (15.50, 80.05)), ("Nellore Coast", (14.4426, 79.9865)),
    ("Puri Coast", (19.8135, 85.8312)), ("Ganjam Coast", (19.35, 85.05)), ("Balasore Coast", (21.49, 87.00)),
    ("Bhadrak Coast", (20.90, 86.80)), ("Jagatsinghpur Coast", (20.00, 86.40)), ("Kendrapara Coast", (20.50, 86.60)),
    ("Mumbai City Coast", (18.93, 72.82)), ("Mumbai Suburban Coast", (19.10, 72.85)), ("Thane Coast", (19.21, 72.97)),
    ("Palghar Coast", (19.69, 72.76)), ("Raigad Coast", (18.50, 72.90)),
    ("Ratnagiri Coast", (16.99, 73.31)), ("Sindhudurg Coast", (16.10, 73.50)),
    ("North Goa Coast", (15.60, 73.75)), ("South Goa Coast", (15.20, 73.95)),
    ("Kutch Coast", (23.00, 69.50)), ("Jamnagar Coast", (22.47, 70.05)), ("Porbandar Coast", (21.64, 69.62)),
    ("Junagadh Coast", (21.52, 70.45)), ("Amreli Coast", (21.60, 71.21)), ("Bhavnagar Coast", (21.76, 72.15)),
    ("Ahmedabad Coast", (22.25, 72.50)), ("Anand Coast", (22.56, 72.92)), ("Bharuch Coast", (21.70, 72.99)),
    ("Surat Coast", (21.17, 72.83)), ("Navsari Coast", (20.94, 72.90)), ("Valsad Coast", (20.60, 72.90)),
    ("Purba Medinipur Coast", (21.90, 87.70)), ("South 24 Parganas Coast", (21.70, 88.50)), ("North 24 Parganas Coast", (22.61, 88.40)),
    ("Puducherry Region Coast", (11.9416, 79.8083)), ("Karaikal Coast", (10.92, 79.83)), ("Mahe Coast", (11.70, 75.53)), ("Yanam Coast", (16.73, 82.21)),
    ("Port Blair", (11.6234, 92.7265)), ("Havelock Island", (11.97, 92.98)), ("Neil Island", (11.83, 93.05)),
    ("Little Andaman", (10.74, 92.51)), ("Great Nicobar", (7.00, 93.80)),
    ("Kavaratti", (10.56, 72.64)), ("Agatti", (10.85, 72.19)), ("Minicoy", (8.28, 73.02)), ("Amini", (11.12, 72.72)), ("Andrott", (10.82, 73.66)),
    ("Daman Coast", (20.42, 72.83)), ("Diu Coast", (20.71, 70.98)),
    (OTHER, (20.59, 78.96)),
];

pub fn states() -> impl Iterator<Item = &'static str> {
    COASTAL_STATES.iter().map(|(state, _)| *state)
}

pub fn coasts(state: &str) -> Option<&'static [&'static str]> {
    COASTAL_STATES
        .iter()
        .find(|(name, _)| *name == state)
        .map(|(_, coasts)| *coasts)
}

pub fn coords(region: &str) -> Option<(f64, f64)> {
    REGION_COORDS
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, coords)| *coords)
}

pub fn match_coords(region: &str) -> Option<(f64, f64)> {
    coords(region).or_else(|| {
        REGION_COORDS
            .iter()
            .find(|(name, _)| region.contains(name))
            .map(|(_, coords)| *coords)
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionSelection {
    pub state: String,
    pub coast: String,
    pub custom: Option<String>,
}

impl RegionSelection {
    pub fn new(state: impl Into<String>, coast: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            coast: coast.into(),
            custom: None,
        }
    }

    pub fn with_custom(mut self, custom: impl Into<String>) -> Self {
        self.custom = Some(custom.into());
        self
    }

    pub fn validate(&self) -> Result<(), PortalError> {
        let coasts = coasts(&self.state)
            .ok_or_else(|| PortalError::UnknownState(self.state.clone()))?;
        if !coasts.contains(&self.coast.as_str()) {
            return Err(PortalError::UnknownCoast {
                state: self.state.clone(),
                coast: self.coast.clone(),
            });
        }
        Ok(())
    }

    pub fn is_custom(&self) -> bool {
        self.coast == OTHER || self.state == OTHER_STATE
    }

    pub fn compose(&self) -> Result<String, PortalError> {
        self.validate()?;
        if !self.is_custom() {
            return Ok(self.coast.clone());
        }
        let custom = self
            .custom
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or("Unknown");
        Ok(format!("{} - {}", self.state, custom))
    }

    pub fn default_coords(&self) -> (f64, f64) {
        if self.is_custom() {
            DEFAULT_COORDS
        } else {
            coords(&self.coast).unwrap_or(DEFAULT_COORDS)
        }
    }
}

pub fn regions_in_state(state: &str, available: &[String]) -> Vec<String> {
    let listed = coasts(state).unwrap_or(&[]);
    let prefix = format!("{state} -");
    available
        .iter()
        .filter(|region| listed.contains(&region.as_str()) || region.starts_with(&prefix))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CoverageReport {
    pub total: usize,
    pub covered: usize,
    pub missing: Vec<String>,
}

pub fn coverage() -> CoverageReport {
    let mut report = CoverageReport::default();
    for (state, coasts) in COASTAL_STATES {
        for coast in coasts.iter().filter(|coast| **coast != OTHER) {
            report.total += 1;
            if coords(coast).is_some() {
                report.covered += 1;
            } else {
                report.missing.push(format!("{state}: {coast}"));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn every_segment_has_coordinates() {
        let report = coverage();
        assert!(report.missing.is_empty(), "{:?}", report.missing);
        assert_eq!(report.total, report.covered);
    }

    #[test]
    fn compose_named_and_custom_regions() {
        let named = RegionSelection::new("Tamil Nadu", "Chennai Coast");
        assert_eq!(named.compose().unwrap(), "Chennai Coast");

        let custom = RegionSelection::new("Kerala", OTHER).with_custom("Vizhinjam");
        assert_eq!(custom.compose().unwrap(), "Kerala - Vizhinjam");

        let blank = RegionSelection::new(OTHER_STATE, OTHER);
        assert_eq!(blank.compose().unwrap(), "Other State/Region - Unknown");
        assert_eq!(blank.default_coords(), DEFAULT_COORDS);
    }

    #[test]
    fn compose_rejects_mismatched_coast() {
        let err = RegionSelection::new("Goa", "Chennai Coast")
            .compose()
            .unwrap_err();
        assert_matches!(err, PortalError::UnknownCoast { .. });
    }

    #[test]
    fn substring_match_for_composite_regions() {
        assert_eq!(
            match_coords("Tamil Nadu - Chennai Coast"),
            Some((13.0827, 80.2707))
        );
        assert_eq!(match_coords("Nowhere"), None);
    }

    #[test]
    fn state_filter_keeps_listed_and_custom_regions() {
        let available = vec![
            "Chennai Coast".to_string(),
            "Kollam Coast".to_string(),
            "Tamil Nadu - Pulicat".to_string(),
        ];
        assert_eq!(
            regions_in_state("Tamil Nadu", &available),
            vec!["Chennai Coast".to_string(), "Tamil Nadu - Pulicat".to_string()]
        );
    }
}
