use chrono::{TimeZone, Utc};
use housing_harvest::models::table::read_csv_columns;
use housing_harvest::models::{Address, BuildingDetails, Variant};
use housing_harvest::{ListingType, Property, PropertyType, ResultTable, SiteName, COLUMNS};
use std::fs::File;
use std::io::BufReader;

fn sample() -> ResultTable {
    let mut house = Property::new(
        "https://www.realtor.com/realestateandhomes-detail/1-Main-St_Dallas_TX_75219_M1",
        SiteName::Realtor,
        ListingType::ForSale,
    );
    house.property_type = Some(PropertyType::SingleFamily);
    house.address = Address {
        street_address: Some("1 Main St".to_string()),
        city: Some("Dallas".to_string()),
        state: Some("TX".to_string()),
        zip_code: Some("75219".to_string()),
        ..Address::default()
    };
    house.price = Some(400_000.0);
    house.description = Some("Corner lot, \"quiet\" street".to_string());
    house.posted_time = Some(Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap());

    let mut building = Property::new("https://www.redfin.com/TX/Dallas/building/77", SiteName::Redfin, ListingType::ForSale);
    building.property_type = Some(PropertyType::Building);
    building.variant = Some(Variant::Building(BuildingDetails {
        unit_count: Some(4),
        ..BuildingDetails::default()
    }));

    ResultTable::new(vec![house, building], Vec::new())
}

#[test]
fn csv_export_carries_the_full_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("HomeHarvest_test.csv");

    sample().write_csv(File::create(&path).unwrap()).unwrap();

    let columns = read_csv_columns(BufReader::new(File::open(&path).unwrap())).unwrap();
    assert_eq!(columns, COLUMNS.to_vec());
}

#[test]
fn csv_rows_keep_nulls_empty_and_quote_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");
    sample().write_csv(File::create(&path).unwrap()).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let headers = reader.headers().unwrap().clone();
    let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>().unwrap();
    let column = |name: &str| headers.iter().position(|h| h == name).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][column("description")], "Corner lot, \"quiet\" street");
    assert_eq!(&rows[0][column("posted_time")], "2024-02-29T12:00:00Z");
    assert_eq!(&rows[0][column("currency")], "");
    assert_eq!(&rows[1][column("property_type")], "building");
    assert_eq!(&rows[1][column("bldg_unit_count")], "4");
    assert_eq!(&rows[1][column("price")], "");
}

#[test]
fn json_export_is_an_array_of_full_objects() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.json");
    sample().write_json(File::create(&path).unwrap()).unwrap();

    let parsed: Vec<serde_json::Map<String, serde_json::Value>> =
        serde_json::from_reader(BufReader::new(File::open(&path).unwrap())).unwrap();

    assert_eq!(parsed.len(), 2);
    for object in &parsed {
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        let mut expected = COLUMNS.to_vec();
        keys.sort_unstable();
        expected.sort_unstable();
        assert_eq!(keys, expected);
    }
    assert_eq!(parsed[0]["site_name"], "realtor.com");
    assert_eq!(parsed[0]["price"], 400000.0);
    assert!(parsed[1]["price"].is_null());
}

#[test]
fn empty_table_still_writes_the_header() {
    let table = ResultTable::new(Vec::new(), Vec::new());
    let mut buffer = Vec::new();
    table.write_csv(&mut buffer).unwrap();

    let columns = read_csv_columns(buffer.as_slice()).unwrap();
    assert_eq!(columns.len(), COLUMNS.len());
}
