pub mod table;

pub use table::{ResultTable, COLUMNS};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source of the property listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SiteName {
    #[serde(rename = "zillow")]
    Zillow,
    #[serde(rename = "redfin")]
    Redfin,
    #[serde(rename = "realtor.com")]
    Realtor,
}

impl SiteName {
    /// Every supported source, in default fetch order
    pub const ALL: [SiteName; 3] = [SiteName::Zillow, SiteName::Redfin, SiteName::Realtor];

    pub fn as_str(&self) -> &'static str {
        match self {
            SiteName::Zillow => "zillow",
            SiteName::Redfin => "redfin",
            SiteName::Realtor => "realtor.com",
        }
    }
}

impl fmt::Display for SiteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zillow" => Ok(SiteName::Zillow),
            "redfin" => Ok(SiteName::Redfin),
            "realtor.com" | "realtor" => Ok(SiteName::Realtor),
            _ => Err(s.to_string()),
        }
    }
}

/// Which market a search targets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    ForSale,
    ForRent,
    Sold,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::ForSale => "for_sale",
            ListingType::ForRent => "for_rent",
            ListingType::Sold => "sold",
        }
    }
}

impl fmt::Display for ListingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "for_sale" => Ok(ListingType::ForSale),
            "for_rent" => Ok(ListingType::ForRent),
            "sold" => Ok(ListingType::Sold),
            _ => Err(s.to_string()),
        }
    }
}

/// Canonical property classification. Source vocabulary that has no
/// counterpart lands in `Other`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    House,
    Apartment,
    Condo,
    Townhouse,
    SingleFamily,
    MultiFamily,
    Building,
    Land,
    Mobile,
    Other,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::House => "house",
            PropertyType::Apartment => "apartment",
            PropertyType::Condo => "condo",
            PropertyType::Townhouse => "townhouse",
            PropertyType::SingleFamily => "single_family",
            PropertyType::MultiFamily => "multi_family",
            PropertyType::Building => "building",
            PropertyType::Land => "land",
            PropertyType::Mobile => "mobile",
            PropertyType::Other => "other",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit a lot size is expressed in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LotUnit {
    Sqft,
    Acres,
}

impl LotUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotUnit::Sqft => "sqft",
            LotUnit::Acres => "acres",
        }
    }
}

/// Postal address; every part is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub street_address: Option<String>,
    pub unit: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

/// Aggregates over the units of a whole building
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BuildingDetails {
    pub unit_count: Option<u32>,
    pub min_beds: Option<f64>,
    pub min_baths: Option<f64>,
    pub min_area: Option<f64>,
}

/// Ranges across the floorplans of an apartment complex
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ApartmentDetails {
    pub min_beds: Option<f64>,
    pub max_beds: Option<f64>,
    pub min_baths: Option<f64>,
    pub max_baths: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_sqft: Option<f64>,
    pub max_sqft: Option<f64>,
}

/// Variant sub-schema. A record carries at most one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Variant {
    Building(BuildingDetails),
    Apartment(ApartmentDetails),
}

/// Core property data model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Property {
    pub property_url: String,
    pub site_name: SiteName,
    pub listing_type: ListingType,
    pub property_type: Option<PropertyType>,
    pub address: Address,

    pub price: Option<f64>,
    pub tax_assessed_value: Option<f64>,
    pub currency: Option<String>,
    pub price_per_sqft: Option<f64>,
    pub sqft: Option<f64>,
    pub beds: Option<f64>,
    pub baths: Option<f64>,
    pub lot_area_value: Option<f64>,
    pub lot_area_unit: Option<LotUnit>,
    pub stories: Option<u32>,
    pub year_built: Option<i32>,

    pub variant: Option<Variant>,

    pub mls_id: Option<String>,
    pub agent_name: Option<String>,
    pub img_src: Option<String>,
    pub description: Option<String>,
    pub status_text: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub posted_time: Option<DateTime<Utc>>,
}

impl Property {
    /// A property carrying only its identity; every optional field is empty
    pub fn new(property_url: impl Into<String>, site_name: SiteName, listing_type: ListingType) -> Self {
        Self {
            property_url: property_url.into(),
            site_name,
            listing_type,
            property_type: None,
            address: Address::default(),
            price: None,
            tax_assessed_value: None,
            currency: None,
            price_per_sqft: None,
            sqft: None,
            beds: None,
            baths: None,
            lot_area_value: None,
            lot_area_unit: None,
            stories: None,
            year_built: None,
            variant: None,
            mls_id: None,
            agent_name: None,
            img_src: None,
            description: None,
            status_text: None,
            latitude: None,
            longitude: None,
            posted_time: None,
        }
    }

    pub fn building(&self) -> Option<&BuildingDetails> {
        match &self.variant {
            Some(Variant::Building(details)) => Some(details),
            _ => None,
        }
    }

    pub fn apartment(&self) -> Option<&ApartmentDetails> {
        match &self.variant {
            Some(Variant::Apartment(details)) => Some(details),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_names_parse_case_insensitively() {
        assert_eq!("Zillow".parse::<SiteName>(), Ok(SiteName::Zillow));
        assert_eq!("REDFIN".parse::<SiteName>(), Ok(SiteName::Redfin));
        assert_eq!("realtor.com".parse::<SiteName>(), Ok(SiteName::Realtor));
        assert_eq!("realtor".parse::<SiteName>(), Ok(SiteName::Realtor));
        assert_eq!("trulia".parse::<SiteName>(), Err("trulia".to_string()));
    }

    #[test]
    fn listing_types_round_trip_through_display() {
        for listing_type in [ListingType::ForSale, ListingType::ForRent, ListingType::Sold] {
            assert_eq!(listing_type.to_string().parse::<ListingType>(), Ok(listing_type));
        }
        assert!("for_lease".parse::<ListingType>().is_err());
    }

    #[test]
    fn new_property_has_no_optional_fields() {
        let property = Property::new("https://example.com/1", SiteName::Redfin, ListingType::Sold);
        assert_eq!(property.address, Address::default());
        assert!(property.price.is_none());
        assert!(property.building().is_none());
        assert!(property.apartment().is_none());
    }
}
