use super::{absolute_url, coerce_number, min_max, FieldAnomaly, FieldReader, NormalizeContext};
use crate::error::NormalizeError;
use crate::models::{Address, ApartmentDetails, LotUnit, Property, PropertyType, SiteName, Variant};
use crate::scrapers::types::RecordKind;
use chrono::{DateTime, Duration, Utc};

const SITE_URL: &str = "https://www.zillow.com";

fn property_type(home_type: &str) -> PropertyType {
    match home_type.to_ascii_uppercase().as_str() {
        "SINGLE_FAMILY" => PropertyType::SingleFamily,
        "CONDO" | "COOPERATIVE" => PropertyType::Condo,
        "TOWNHOUSE" => PropertyType::Townhouse,
        "MULTI_FAMILY" => PropertyType::MultiFamily,
        "APARTMENT" => PropertyType::Apartment,
        "LOT" | "LAND" => PropertyType::Land,
        "MANUFACTURED" | "MOBILE" => PropertyType::Mobile,
        _ => PropertyType::Other,
    }
}

pub(super) fn normalize(
    kind: RecordKind,
    reader: &mut FieldReader<'_>,
    ctx: &NormalizeContext,
) -> Result<Property, NormalizeError> {
    let link = reader
        .text("property_url", &["detailUrl", "hdpUrl"])
        .ok_or(NormalizeError::MissingUrl)?;
    let mut property = Property::new(absolute_url(SITE_URL, &link), SiteName::Zillow, ctx.listing_type);

    property.address = Address {
        street_address: reader.text(
            "street_address",
            &["hdpData.homeInfo.streetAddress", "addressStreet", "streetAddress"],
        ),
        unit: reader.text("unit", &["hdpData.homeInfo.unit", "unit"]),
        city: reader.text("city", &["hdpData.homeInfo.city", "addressCity"]),
        state: reader.text("state", &["hdpData.homeInfo.state", "addressState"]),
        zip_code: reader.text("zip_code", &["hdpData.homeInfo.zipcode", "addressZipcode"]),
        country: reader.text("country", &["hdpData.homeInfo.country", "country"]),
    };
    property.latitude = reader.number("latitude", &["latLong.latitude", "hdpData.homeInfo.latitude"]);
    property.longitude = reader.number("longitude", &["latLong.longitude", "hdpData.homeInfo.longitude"]);
    property.img_src = reader.text("img_src", &["imgSrc"]);
    property.status_text = reader.text("status_text", &["statusText"]);
    property.agent_name = reader.text("agent_name", &["brokerName"]);
    property.mls_id = reader.text("mls_id", &["hdpData.homeInfo.zpid", "zpid"]);

    if let Some(on_market_ms) = reader.number("posted_time", &["timeOnZillow"]) {
        property.posted_time = posted_before(ctx, on_market_ms);
        if property.posted_time.is_none() {
            reader.anomalies.push(FieldAnomaly {
                field: "posted_time",
                raw: on_market_ms.to_string(),
            });
        }
    }

    if kind == RecordKind::Building {
        property.property_type = Some(PropertyType::Apartment);
        property.description = reader.prose("description", &["buildingName"]);
        property.variant = Some(Variant::Apartment(floorplans(reader)));
        return Ok(property);
    }

    property.property_type = reader
        .text("property_type", &["hdpData.homeInfo.homeType"])
        .map(|t| property_type(&t));
    property.price = reader.number("price", &["hdpData.homeInfo.price", "unformattedPrice", "price"]);
    property.tax_assessed_value = reader.number("tax_assessed_value", &["hdpData.homeInfo.taxAssessedValue"]);
    property.currency = reader.text("currency", &["hdpData.homeInfo.currency"]);
    property.sqft = reader.number("sqft", &["hdpData.homeInfo.livingArea", "area"]);
    property.beds = reader.number("beds", &["hdpData.homeInfo.bedrooms", "beds"]);
    property.baths = reader.number("baths", &["hdpData.homeInfo.bathrooms", "baths"]);
    property.year_built = reader.year("year_built", &["hdpData.homeInfo.yearBuilt"]);
    property.description = reader.prose("description", &["hdpData.homeInfo.description"]);

    property.lot_area_value = reader.number("lot_area_value", &["hdpData.homeInfo.lotAreaValue"]);
    if property.lot_area_value.is_some() {
        property.lot_area_unit = match reader.text("lot_area_unit", &["hdpData.homeInfo.lotAreaUnit"]) {
            Some(unit) if unit.eq_ignore_ascii_case("acres") => Some(LotUnit::Acres),
            _ => Some(LotUnit::Sqft),
        };
    }

    Ok(property)
}

/// Listing time from the milliseconds a home has been on the market;
/// negative or out-of-range durations yield `None`
fn posted_before(ctx: &NormalizeContext, on_market_ms: f64) -> Option<DateTime<Utc>> {
    if !(0.0..=i64::MAX as f64).contains(&on_market_ms) {
        return None;
    }
    let on_market = Duration::try_milliseconds(on_market_ms as i64)?;
    ctx.fetched_at.checked_sub_signed(on_market)
}

/// Ranges over the `units` floorplans of an apartment complex
fn floorplans(reader: &mut FieldReader<'_>) -> ApartmentDetails {
    let units = reader
        .get("units")
        .and_then(|units| units.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    let (min_beds, max_beds) = min_max(units.iter().filter_map(|u| u.get("beds").and_then(coerce_number)));
    let (min_price, max_price) = min_max(units.iter().filter_map(|u| u.get("price").and_then(coerce_number)));
    let (min_baths, max_baths) = min_max(units.iter().filter_map(|u| u.get("baths").and_then(coerce_number)));
    let (min_sqft, max_sqft) = min_max(units.iter().filter_map(|u| u.get("sqft").and_then(coerce_number)));

    ApartmentDetails {
        min_beds,
        max_beds,
        min_baths: min_baths.or_else(|| reader.number("apt_min_baths", &["minBaths"])),
        max_baths: max_baths.or_else(|| reader.number("apt_max_baths", &["maxBaths"])),
        min_price,
        max_price,
        min_sqft: min_sqft.or_else(|| reader.number("apt_min_sqft", &["minArea"])),
        max_sqft: max_sqft.or_else(|| reader.number("apt_max_sqft", &["maxArea"])),
    }
}
