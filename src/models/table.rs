use crate::models::{Property, SiteName};
use crate::orchestrator::SourceReport;
use chrono::SecondsFormat;
use serde_json::{Map, Value};
use std::fmt;
use std::io;

/// Every column of the canonical schema, in export order
pub const COLUMNS: [&str; 41] = [
    "property_url",
    "site_name",
    "listing_type",
    "property_type",
    "street_address",
    "unit",
    "city",
    "state",
    "zip_code",
    "country",
    "price",
    "tax_assessed_value",
    "currency",
    "price_per_sqft",
    "sqft",
    "beds",
    "baths",
    "lot_area_value",
    "lot_area_unit",
    "stories",
    "year_built",
    "bldg_unit_count",
    "bldg_min_beds",
    "bldg_min_baths",
    "bldg_min_area",
    "apt_min_beds",
    "apt_max_beds",
    "apt_min_baths",
    "apt_max_baths",
    "apt_min_price",
    "apt_max_price",
    "apt_min_sqft",
    "apt_max_sqft",
    "mls_id",
    "agent_name",
    "img_src",
    "description",
    "status_text",
    "latitude",
    "longitude",
    "posted_time",
];

/// One cell of the flat table
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Number(f64),
}

impl Cell {
    fn text(value: Option<&str>) -> Self {
        value.map_or(Cell::Null, |v| Cell::Text(v.to_string()))
    }

    fn number(value: Option<f64>) -> Self {
        value.map_or(Cell::Null, Cell::Number)
    }

    fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Text(text) => Value::String(text.clone()),
            Cell::Number(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Text(text) => f.write_str(text),
            Cell::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Flatten a property into cells, in `COLUMNS` order
pub fn cells(p: &Property) -> Vec<Cell> {
    let building = p.building();
    let apartment = p.apartment();
    let count = |v: Option<u32>| Cell::number(v.map(f64::from));

    vec![
        Cell::Text(p.property_url.clone()),
        Cell::Text(p.site_name.to_string()),
        Cell::Text(p.listing_type.to_string()),
        Cell::text(p.property_type.map(|t| t.as_str())),
        Cell::text(p.address.street_address.as_deref()),
        Cell::text(p.address.unit.as_deref()),
        Cell::text(p.address.city.as_deref()),
        Cell::text(p.address.state.as_deref()),
        Cell::text(p.address.zip_code.as_deref()),
        Cell::text(p.address.country.as_deref()),
        Cell::number(p.price),
        Cell::number(p.tax_assessed_value),
        Cell::text(p.currency.as_deref()),
        Cell::number(p.price_per_sqft),
        Cell::number(p.sqft),
        Cell::number(p.beds),
        Cell::number(p.baths),
        Cell::number(p.lot_area_value),
        Cell::text(p.lot_area_unit.map(|u| u.as_str())),
        count(p.stories),
        Cell::number(p.year_built.map(f64::from)),
        count(building.and_then(|b| b.unit_count)),
        Cell::number(building.and_then(|b| b.min_beds)),
        Cell::number(building.and_then(|b| b.min_baths)),
        Cell::number(building.and_then(|b| b.min_area)),
        Cell::number(apartment.and_then(|a| a.min_beds)),
        Cell::number(apartment.and_then(|a| a.max_beds)),
        Cell::number(apartment.and_then(|a| a.min_baths)),
        Cell::number(apartment.and_then(|a| a.max_baths)),
        Cell::number(apartment.and_then(|a| a.min_price)),
        Cell::number(apartment.and_then(|a| a.max_price)),
        Cell::number(apartment.and_then(|a| a.min_sqft)),
        Cell::number(apartment.and_then(|a| a.max_sqft)),
        Cell::text(p.mls_id.as_deref()),
        Cell::text(p.agent_name.as_deref()),
        Cell::text(p.img_src.as_deref()),
        Cell::text(p.description.as_deref()),
        Cell::text(p.status_text.as_deref()),
        Cell::number(p.latitude),
        Cell::number(p.longitude),
        Cell::text(
            p.posted_time
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                .as_deref(),
        ),
    ]
}

/// Summary statistics of one numeric column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub column: &'static str,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Rows ordered by source completion, then by each source's emission order
#[derive(Debug, Clone)]
pub struct ResultTable {
    rows: Vec<Property>,
    reports: Vec<SourceReport>,
}

impl ResultTable {
    pub fn new(rows: Vec<Property>, reports: Vec<SourceReport>) -> Self {
        Self { rows, reports }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Property] {
        &self.rows
    }

    pub fn columns(&self) -> &'static [&'static str] {
        &COLUMNS
    }

    pub fn has_column(&self, name: &str) -> bool {
        COLUMNS.contains(&name)
    }

    /// Per-source outcomes, in completion order
    pub fn source_reports(&self) -> &[SourceReport] {
        &self.reports
    }

    pub fn report(&self, site: SiteName) -> Option<&SourceReport> {
        self.reports.iter().find(|r| r.site == site)
    }

    /// Every row as text cells; null becomes the empty string
    pub fn to_records(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|p| cells(p).iter().map(Cell::to_string).collect())
            .collect()
    }

    pub fn head(&self, n: usize) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .take(n)
            .map(|p| cells(p).iter().map(Cell::to_string).collect())
            .collect()
    }

    /// Count, min, max and mean of every column holding at least one number
    pub fn describe(&self) -> Vec<ColumnSummary> {
        let table: Vec<Vec<Cell>> = self.rows.iter().map(cells).collect();

        COLUMNS
            .iter()
            .enumerate()
            .filter_map(|(i, column)| {
                let values: Vec<f64> = table
                    .iter()
                    .filter_map(|row| match row[i] {
                        Cell::Number(n) => Some(n),
                        _ => None,
                    })
                    .collect();
                if values.is_empty() {
                    return None;
                }
                Some(ColumnSummary {
                    column,
                    count: values.len(),
                    min: values.iter().copied().fold(f64::INFINITY, f64::min),
                    max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    mean: values.iter().sum::<f64>() / values.len() as f64,
                })
            })
            .collect()
    }

    /// CSV with the full canonical header, whatever was populated
    pub fn write_csv<W: io::Write>(&self, writer: W) -> csv::Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(COLUMNS)?;
        for record in self.to_records() {
            csv.write_record(&record)?;
        }
        csv.flush()?;
        Ok(())
    }

    /// JSON array of objects carrying every column key
    pub fn write_json<W: io::Write>(&self, writer: W) -> serde_json::Result<()> {
        let objects: Vec<Value> = self
            .rows
            .iter()
            .map(|p| {
                let object: Map<String, Value> = COLUMNS
                    .iter()
                    .zip(cells(p))
                    .map(|(column, cell)| (column.to_string(), cell.to_json()))
                    .collect();
                Value::Object(object)
            })
            .collect();
        serde_json::to_writer_pretty(writer, &objects)
    }
}

/// Header row of a CSV export
pub fn read_csv_columns<R: io::Read>(reader: R) -> csv::Result<Vec<String>> {
    let mut csv = csv::Reader::from_reader(reader);
    Ok(csv.headers()?.iter().map(str::to_string).collect())
}
