use super::{absolute_url, FieldReader, NormalizeContext};
use crate::error::NormalizeError;
use crate::models::{Address, BuildingDetails, LotUnit, Property, PropertyType, SiteName, Variant};
use crate::scrapers::types::RecordKind;
use serde_json::Value;

const SITE_URL: &str = "https://www.redfin.com";

/// Redfin's numeric `propertyType` codes
fn property_type(code: u32) -> PropertyType {
    match code {
        1 => PropertyType::House,
        2 => PropertyType::Condo,
        3 => PropertyType::Townhouse,
        4 => PropertyType::MultiFamily,
        5 => PropertyType::Land,
        8 | 13 => PropertyType::SingleFamily,
        10 => PropertyType::Mobile,
        _ => PropertyType::Other,
    }
}

pub(super) fn normalize(
    kind: RecordKind,
    reader: &mut FieldReader<'_>,
    ctx: &NormalizeContext,
) -> Result<Property, NormalizeError> {
    let link = reader.text("property_url", &["url"]).ok_or(NormalizeError::MissingUrl)?;
    let mut property = Property::new(absolute_url(SITE_URL, &link), SiteName::Redfin, ctx.listing_type);

    if kind == RecordKind::Building {
        building(&mut property, reader);
        return Ok(property);
    }

    property.address = Address {
        street_address: reader.text(
            "street_address",
            &["streetLine.value", "streetLine", "streetAddress.assembledAddress"],
        ),
        unit: reader.text("unit", &["unitNumber.value", "streetAddress.unitValue"]),
        city: reader.text("city", &["city"]),
        state: reader.text("state", &["state"]),
        zip_code: reader.text("zip_code", &["zip", "postalCode.value"]),
        country: reader.text("country", &["countryCode"]),
    };
    property.property_type = reader.count("property_type", &["propertyType"]).map(property_type);
    property.price = reader.number("price", &["price", "priceInfo.amount"]);
    property.price_per_sqft = reader.number("price_per_sqft", &["pricePerSqFt"]);
    property.sqft = reader.number("sqft", &["sqFt"]);
    property.beds = reader.number("beds", &["beds"]);
    property.baths = reader.number("baths", &["baths"]);
    property.stories = reader.count("stories", &["stories"]);
    property.year_built = reader.year("year_built", &["yearBuilt"]);
    property.mls_id = reader.text("mls_id", &["mlsId.value", "mlsId"]);
    property.status_text = reader.text("status_text", &["mlsStatus", "listingType"]);
    property.description = reader.prose("description", &["listingRemarks"]);
    property.latitude = reader.number("latitude", &["latLong.value.latitude", "latLong.latitude"]);
    property.longitude = reader.number("longitude", &["latLong.value.longitude", "latLong.longitude"]);
    property.agent_name = reader.text("agent_name", &["listingAgent.name", "listingAgent.value"]);

    // lotSize arrives either bare or wrapped in {"value": ...}
    property.lot_area_value = reader.number("lot_area_value", &["lotSize"]);
    if property.lot_area_value.is_some() {
        property.lot_area_unit = Some(LotUnit::Sqft);
    }

    Ok(property)
}

fn address_part(reader: &FieldReader<'_>, key: &str) -> Option<String> {
    reader
        .get(&format!("address.{key}"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn join_parts<const N: usize>(parts: [Option<String>; N]) -> Option<String> {
    let joined = parts.into_iter().flatten().collect::<Vec<_>>().join(" ");
    (!joined.is_empty()).then_some(joined)
}

fn building(property: &mut Property, reader: &mut FieldReader<'_>) {
    property.address = Address {
        street_address: join_parts([
            address_part(reader, "streetNumber"),
            address_part(reader, "directionalPrefix"),
            address_part(reader, "streetName"),
            address_part(reader, "streetType"),
        ]),
        unit: join_parts([address_part(reader, "unitType"), address_part(reader, "unitValue")]),
        city: address_part(reader, "city"),
        state: address_part(reader, "stateOrProvinceCode"),
        zip_code: address_part(reader, "postalCode"),
        country: address_part(reader, "countryCode"),
    };
    property.property_type = Some(PropertyType::Building);
    property.latitude = reader.number("latitude", &["latLong.latitude"]);
    property.longitude = reader.number("longitude", &["latLong.longitude"]);
    property.variant = Some(Variant::Building(BuildingDetails {
        unit_count: reader.count("bldg_unit_count", &["numUnitsForSale"]),
        min_beds: reader.number("bldg_min_beds", &["minBeds"]),
        min_baths: reader.number("bldg_min_baths", &["minBaths"]),
        min_area: reader.number("bldg_min_area", &["minSqFt"]),
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListingType;
    use crate::normalize::normalize as normalize_record;
    use crate::normalize::tests::ctx;
    use crate::scrapers::types::RawRecord;
    use serde_json::json;

    #[test]
    fn maps_a_gis_home() {
        let raw = RawRecord::listing(json!({
            "url": "/AZ/Tempe/1250-E-Apache-Blvd-85281/home/12345",
            "streetLine": { "value": "1250 E Apache Blvd", "level": 1 },
            "city": "Tempe",
            "state": "AZ",
            "zip": "85281",
            "countryCode": "US",
            "price": { "value": 425000, "level": 1 },
            "sqFt": { "value": 1700, "level": 1 },
            "pricePerSqFt": { "value": 250, "level": 1 },
            "beds": 3,
            "baths": 2.5,
            "stories": 2,
            "yearBuilt": { "value": 1998, "level": 1 },
            "lotSize": { "value": 6098, "level": 1 },
            "propertyType": 6,
            "mlsId": { "value": "6612345", "level": 1 },
            "mlsStatus": "Active",
            "listingRemarks": "<p>Remodeled&nbsp;kitchen</p>",
            "latLong": { "value": { "latitude": 33.41, "longitude": -111.92 }, "level": 1 },
            "listingAgent": { "name": "Pat Doe", "redfinAgentId": 0 }
        }));

        let normalized = normalize_record(&raw, SiteName::Redfin, &ctx(ListingType::ForSale)).unwrap();
        assert!(normalized.anomalies.is_empty(), "{:?}", normalized.anomalies);
        let p = normalized.property;
        assert_eq!(p.property_url, "https://www.redfin.com/AZ/Tempe/1250-E-Apache-Blvd-85281/home/12345");
        assert_eq!(p.address.street_address.as_deref(), Some("1250 E Apache Blvd"));
        assert_eq!(p.property_type, Some(PropertyType::Other));
        assert_eq!(p.price, Some(425_000.0));
        assert_eq!(p.price_per_sqft, Some(250.0));
        assert_eq!(p.stories, Some(2));
        assert_eq!(p.year_built, Some(1998));
        assert_eq!(p.lot_area_value, Some(6098.0));
        assert_eq!(p.lot_area_unit, Some(LotUnit::Sqft));
        assert_eq!(p.mls_id.as_deref(), Some("6612345"));
        assert_eq!(p.description.as_deref(), Some("Remodeled kitchen"));
        assert_eq!(p.agent_name.as_deref(), Some("Pat Doe"));
        assert_eq!(p.latitude, Some(33.41));
        assert!(p.posted_time.is_none());
    }

    #[test]
    fn maps_a_building_to_the_building_variant() {
        let raw = RawRecord::building(json!({
            "url": "/TX/Austin/70-Rainey-St-78701/building/1234",
            "numUnitsForSale": 7,
            "address": {
                "streetNumber": "70",
                "directionalPrefix": "",
                "streetName": "Rainey",
                "streetType": "St",
                "city": "Austin",
                "stateOrProvinceCode": "TX",
                "postalCode": "78701",
                "unitType": "",
                "unitValue": ""
            }
        }));

        let p = normalize_record(&raw, SiteName::Redfin, &ctx(ListingType::ForSale)).unwrap().property;
        assert_eq!(p.property_type, Some(PropertyType::Building));
        assert_eq!(p.address.street_address.as_deref(), Some("70 Rainey St"));
        assert_eq!(p.address.unit, None);
        assert_eq!(p.price, None);
        let building = p.building().unwrap();
        assert_eq!(building.unit_count, Some(7));
        assert_eq!(building.min_beds, None);
        assert!(p.apartment().is_none());
    }

    #[test]
    fn maps_a_single_address_lookup() {
        let raw = RawRecord::detail(json!({
            "url": "/TX/Austin/70-Rainey-St-78701/unit-1608/home/147337694",
            "streetAddress": { "assembledAddress": "70 Rainey St #1608" },
            "city": "Austin",
            "state": "TX",
            "zip": "78701",
            "beds": 2,
            "baths": 2.0,
            "sqFt": { "value": 1250 },
            "yearBuilt": 2009,
            "priceInfo": { "amount": 899000 }
        }));
        let p = normalize_record(&raw, SiteName::Redfin, &ctx(ListingType::ForSale)).unwrap().property;
        assert_eq!(p.address.street_address.as_deref(), Some("70 Rainey St #1608"));
        assert_eq!(p.year_built, Some(2009));
        assert_eq!(p.price, Some(899_000.0));
        assert_eq!(p.price_per_sqft, Some(719.2));
    }
}
