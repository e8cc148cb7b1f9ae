use super::{absolute_url, FieldReader, NormalizeContext};
use crate::error::NormalizeError;
use crate::models::{Address, ListingType, LotUnit, Property, PropertyType, SiteName};
use crate::scrapers::types::RecordKind;

const DETAIL_URL: &str = "https://www.realtor.com/realestateandhomes-detail";

fn property_type(raw: &str) -> PropertyType {
    match raw.to_ascii_lowercase().as_str() {
        "single_family" => PropertyType::SingleFamily,
        "condo" | "condos" | "condo_townhome_rowhome_coop" | "coop" => PropertyType::Condo,
        "townhome" | "townhomes" | "townhouse" | "condo_townhome" => PropertyType::Townhouse,
        "multi_family" => PropertyType::MultiFamily,
        "apartment" => PropertyType::Apartment,
        "land" => PropertyType::Land,
        "mobile" => PropertyType::Mobile,
        _ => PropertyType::Other,
    }
}

pub(super) fn normalize(
    kind: RecordKind,
    reader: &mut FieldReader<'_>,
    ctx: &NormalizeContext,
) -> Result<Property, NormalizeError> {
    let slug = reader
        .text("property_url", &["permalink", "details.permalink", "property_id"])
        .ok_or(NormalizeError::MissingUrl)?;
    let mut property = Property::new(absolute_url(DETAIL_URL, &slug), SiteName::Realtor, ctx.listing_type);

    match kind {
        RecordKind::Detail => detail(&mut property, reader),
        RecordKind::Listing | RecordKind::Building => search_result(&mut property, reader, ctx),
    }
    Ok(property)
}

fn search_result(property: &mut Property, reader: &mut FieldReader<'_>, ctx: &NormalizeContext) {
    property.address = Address {
        street_address: reader.text("street_address", &["location.address.line"]),
        unit: reader.text("unit", &["location.address.unit"]),
        city: reader.text("city", &["location.address.city"]),
        state: reader.text("state", &["location.address.state_code"]),
        zip_code: reader.text("zip_code", &["location.address.postal_code"]),
        country: reader.text("country", &["location.address.country"]),
    };
    property.latitude = reader.number("latitude", &["location.address.coordinate.lat"]);
    property.longitude = reader.number("longitude", &["location.address.coordinate.lon"]);

    property.property_type = reader.text("property_type", &["description.type"]).map(|t| property_type(&t));
    property.price = match ctx.listing_type {
        ListingType::Sold => reader.number("price", &["description.sold_price", "last_sold_price", "list_price"]),
        _ => reader.number("price", &["list_price"]),
    };
    property.price_per_sqft = reader.number("price_per_sqft", &["price_per_sqft"]);
    property.sqft = reader.number("sqft", &["description.sqft"]);
    property.beds = reader.number("beds", &["description.beds"]);
    property.baths = reader.number("baths", &["description.baths_consolidated", "description.baths"]);
    property.stories = reader.count("stories", &["description.stories"]);
    property.year_built = reader.year("year_built", &["description.year_built"]);
    property.description = reader.prose("description", &["description.text"]);
    property.status_text = reader.text("status_text", &["status"]);
    property.img_src = reader.text("img_src", &["primary_photo.href"]);
    property.mls_id = reader.text("mls_id", &["source.listing_id", "property_id"]);
    property.agent_name = reader.text("agent_name", &["advertisers.0.name"]);

    property.lot_area_value = reader.number("lot_area_value", &["description.lot_sqft"]);
    if property.lot_area_value.is_some() {
        property.lot_area_unit = Some(LotUnit::Sqft);
    }
}

fn detail(property: &mut Property, reader: &mut FieldReader<'_>) {
    property.address = Address {
        street_address: reader.text("street_address", &["address.line"]),
        unit: reader.text("unit", &["address.unit_value", "address.unit"]),
        city: reader.text("city", &["address.city"]),
        state: reader.text("state", &["address.state_code"]),
        zip_code: reader.text("zip_code", &["address.postal_code"]),
        country: reader.text("country", &["address.country"]),
    };
    property.property_type = reader.text("property_type", &["basic.type"]).map(|t| property_type(&t));
    property.price = reader.number("price", &["basic.price", "basic.sold_price"]);
    property.tax_assessed_value = reader.number("tax_assessed_value", &["public_record.assessed_value"]);
    property.sqft = reader.number("sqft", &["basic.sqft", "public_record.sqft"]);
    property.beds = reader.number("beds", &["basic.beds"]);
    property.baths = reader.number("baths", &["basic.baths"]);
    property.stories = reader.count("stories", &["details.stories", "public_record.stories"]);
    property.year_built = reader.year("year_built", &["details.year_built", "public_record.year_built"]);
    property.mls_id = reader.text("mls_id", &["property_id"]);

    property.lot_area_value = reader.number("lot_area_value", &["basic.lot_sqft", "public_record.lot_size"]);
    if property.lot_area_value.is_some() {
        property.lot_area_unit = Some(LotUnit::Sqft);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize as normalize_record;
    use crate::normalize::tests::ctx;
    use crate::scrapers::types::RawRecord;
    use serde_json::json;

    fn home() -> serde_json::Value {
        json!({
            "property_id": "9512345678",
            "permalink": "1234-Elm-St_Dallas_TX_75201_M95123-45678",
            "status": "sold",
            "list_price": 510000,
            "last_sold_price": 498000,
            "price_per_sqft": null,
            "description": {
                "beds": 3, "baths": 2, "sqft": "1,800", "lot_sqft": 7405,
                "stories": 1, "year_built": 1965, "type": "single_family",
                "sold_price": 498000, "text": "Updated ranch"
            },
            "location": { "address": {
                "line": "1234 Elm St", "city": "Dallas", "state_code": "TX",
                "postal_code": "75201", "country": "USA",
                "coordinate": { "lat": 32.78, "lon": -96.8 }
            } },
            "primary_photo": { "href": "https://ap.rdcpix.com/abc.jpg" },
            "source": { "listing_id": "20412345" },
            "advertisers": [ { "name": "Jordan Agent" } ]
        })
    }

    #[test]
    fn maps_a_sold_search_result() {
        let raw = RawRecord::listing(home());
        let normalized = normalize_record(&raw, SiteName::Realtor, &ctx(ListingType::Sold)).unwrap();
        assert!(normalized.anomalies.is_empty(), "{:?}", normalized.anomalies);
        let p = normalized.property;
        assert_eq!(
            p.property_url,
            "https://www.realtor.com/realestateandhomes-detail/1234-Elm-St_Dallas_TX_75201_M95123-45678"
        );
        assert_eq!(p.listing_type, ListingType::Sold);
        assert_eq!(p.price, Some(498_000.0));
        assert_eq!(p.sqft, Some(1800.0));
        assert_eq!(p.price_per_sqft, Some(276.67));
        assert_eq!(p.property_type, Some(PropertyType::SingleFamily));
        assert_eq!(p.mls_id.as_deref(), Some("20412345"));
        assert_eq!(p.agent_name.as_deref(), Some("Jordan Agent"));
        assert_eq!(p.status_text.as_deref(), Some("sold"));
        assert_eq!(p.longitude, Some(-96.8));
    }

    #[test]
    fn for_sale_uses_list_price() {
        let raw = RawRecord::listing(home());
        let p = normalize_record(&raw, SiteName::Realtor, &ctx(ListingType::ForSale))
            .unwrap()
            .property;
        assert_eq!(p.price, Some(510_000.0));
    }

    #[test]
    fn maps_a_property_detail_lookup() {
        let raw = RawRecord::detail(json!({
            "property_id": "9512345678",
            "details": { "permalink": "55-Oak-Ave_Tempe_AZ_85281_M1", "year_built": 2001, "stories": 2 },
            "address": { "line": "55 Oak Ave", "city": "Tempe", "state_code": "AZ", "postal_code": "85281" },
            "basic": { "beds": 4, "baths": 3, "price": 640000, "sqft": 2400, "lot_sqft": null, "type": "townhomes" },
            "public_record": { "lot_size": 5000, "assessed_value": 512000 }
        }));
        let p = normalize_record(&raw, SiteName::Realtor, &ctx(ListingType::ForSale))
            .unwrap()
            .property;
        assert_eq!(p.property_url, "https://www.realtor.com/realestateandhomes-detail/55-Oak-Ave_Tempe_AZ_85281_M1");
        assert_eq!(p.property_type, Some(PropertyType::Townhouse));
        assert_eq!(p.lot_area_value, Some(5000.0));
        assert_eq!(p.tax_assessed_value, Some(512_000.0));
        assert_eq!(p.mls_id.as_deref(), Some("9512345678"));
        assert_eq!(p.year_built, Some(2001));
    }

    #[test]
    fn unknown_vocabulary_becomes_other() {
        assert_eq!(property_type("farm"), PropertyType::Other);
        assert_eq!(property_type("CONDOS"), PropertyType::Condo);
    }
}
