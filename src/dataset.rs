use std::path::Path;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::PlannerError;
use crate::schema::{campaign, derived};

/// One campaign row, used to build a [`Dataset`] in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub source: String,
    pub objective: String,
    pub kpi: String,
    pub spend: f64,
    pub leads: f64,
    pub ad_clicks: f64,
}

impl CampaignRecord {
    pub fn new(
        source: impl Into<String>,
        objective: impl Into<String>,
        kpi: impl Into<String>,
        spend: f64,
        leads: f64,
        ad_clicks: f64,
    ) -> Self {
        Self {
            source: source.into(),
            objective: objective.into(),
            kpi: kpi.into(),
            spend,
            leads,
            ad_clicks,
        }
    }
}

/// Historical campaign performance, loaded once and read-only afterwards.
///
/// Invariants after construction:
///   - every column in `campaign::REQUIRED` is present
///   - `source`, `objective`, `kpi` are trimmed lowercase strings
///   - `spends`, `leads`, `ad_clicks` are finite non-negative Float64 (blank cells become 0;
///     any other unparseable cell is rejected)
///   - `cost_per_lead` / `cost_per_click` are Float64, null where the divisor is 0
#[derive(Debug, Clone)]
pub struct Dataset {
    df: DataFrame,
}

impl Dataset {
    /// Load a CSV with every column read as a string, then normalize.
    pub fn from_csv(path: &Path) -> Result<Self, PlannerError> {
        let raw = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0)) // all columns as String
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        let dataset = Self::from_frame(raw)?;
        info!(
            path = %path.display(),
            rows = dataset.height(),
            "loaded campaign dataset"
        );
        Ok(dataset)
    }

    pub fn from_records(records: &[CampaignRecord]) -> Result<Self, PlannerError> {
        let df = df!(
            campaign::SOURCE => records.iter().map(|r| r.source.as_str()).collect::<Vec<_>>(),
            campaign::OBJECTIVE => records.iter().map(|r| r.objective.as_str()).collect::<Vec<_>>(),
            campaign::KPI => records.iter().map(|r| r.kpi.as_str()).collect::<Vec<_>>(),
            campaign::SPENDS => records.iter().map(|r| r.spend).collect::<Vec<_>>(),
            campaign::LEADS => records.iter().map(|r| r.leads).collect::<Vec<_>>(),
            campaign::AD_CLICKS => records.iter().map(|r| r.ad_clicks).collect::<Vec<_>>(),
        )?;
        Self::from_frame(df)
    }

    /// Normalize an arbitrary frame into the campaign schema.
    ///
    /// Column names are trimmed, lowercased and have spaces replaced by `_`
    /// before the required-column check, so "Ad Clicks" satisfies `ad_clicks`.
    pub fn from_frame(mut df: DataFrame) -> Result<Self, PlannerError> {
        let normalized: Vec<String> = df
            .get_column_names_str()
            .iter()
            .map(|c| normalize_column_name(c))
            .collect();
        df.set_column_names(normalized.as_slice())?;

        require_columns(&df, &campaign::REQUIRED)?;

        let categorical: Vec<Expr> = campaign::CATEGORICAL
            .iter()
            .map(|&name| {
                col(name)
                    .cast(DataType::String)
                    .str()
                    .strip_chars(lit(" \t\r\n"))
                    .str()
                    .to_lowercase()
            })
            .collect();

        // Numeric cells as trimmed text, blanks as null
        let numeric_text: Vec<Expr> = campaign::NUMERIC
            .iter()
            .map(|&name| {
                let trimmed = col(name)
                    .cast(DataType::String)
                    .str()
                    .strip_chars(lit(" \t\r\n"));
                when(trimmed.clone().eq(lit("")))
                    .then(lit(NULL).cast(DataType::String))
                    .otherwise(trimmed)
                    .alias(name)
            })
            .collect();

        let df = df
            .lazy()
            .with_columns(categorical)
            .with_columns(numeric_text)
            .collect()?;

        for &name in campaign::NUMERIC.iter() {
            check_numeric(&df, name)?;
        }

        let numeric: Vec<Expr> = campaign::NUMERIC
            .iter()
            .map(|&name| col(name).cast(DataType::Float64).fill_null(lit(0.0)))
            .collect();

        let df = df
            .lazy()
            .with_columns(numeric)
            .with_columns([
                ratio_or_null(campaign::SPENDS, campaign::LEADS).alias(derived::COST_PER_LEAD),
                ratio_or_null(campaign::SPENDS, campaign::AD_CLICKS)
                    .alias(derived::COST_PER_CLICK),
            ])
            .collect()?;

        debug!(rows = df.height(), "normalized campaign frame");
        Ok(Self { df })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }
}

fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), PlannerError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| df.column(name).is_err())
        .map(|name| name.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PlannerError::SchemaError(missing))
    }
}

/// Every non-blank cell of a text column must parse to a finite,
/// non-negative number. Blank cells are allowed and later read as 0.
fn check_numeric(df: &DataFrame, name: &str) -> Result<(), PlannerError> {
    let column = df.column(name)?;
    let parsed = column.cast(&DataType::Float64)?;
    let text = column.str()?;
    let values = parsed.f64()?;

    for (row, (raw, value)) in text.into_iter().zip(values.into_iter()).enumerate() {
        match (raw, value) {
            (Some(raw), None) => {
                return Err(PlannerError::InvalidData(format!(
                    "Column '{name}' has a non-numeric value '{raw}' at row {row}"
                )));
            }
            (Some(raw), Some(v)) if !v.is_finite() => {
                return Err(PlannerError::InvalidData(format!(
                    "Column '{name}' has a non-finite value '{raw}' at row {row}"
                )));
            }
            (_, Some(v)) if v < 0.0 => {
                return Err(PlannerError::InvalidData(format!(
                    "Column '{name}' has a negative value at row {row}"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// `numerator / denominator`, or null when the denominator is not positive.
fn ratio_or_null(numerator: &str, denominator: &str) -> Expr {
    when(col(denominator).gt(lit(0.0)))
        .then(col(numerator) / col(denominator))
        .otherwise(lit(NULL).cast(DataType::Float64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn from_records_derives_cost_columns() {
        let ds = Dataset::from_records(&[
            CampaignRecord::new("Meta", "Conversion", "Leads", 100.0, 4.0, 50.0),
            CampaignRecord::new("Snapchat", "Traffic", "Clicks", 80.0, 0.0, 40.0),
        ])
        .unwrap();

        let cpl = ds.frame().column(derived::COST_PER_LEAD).unwrap().f64().unwrap();
        assert_eq!(cpl.get(0), Some(25.0));
        assert_eq!(cpl.get(1), None);

        let cpc = ds.frame().column(derived::COST_PER_CLICK).unwrap().f64().unwrap();
        assert_eq!(cpc.get(1), Some(2.0));

        let source = ds.frame().column(campaign::SOURCE).unwrap().str().unwrap();
        assert_eq!(source.get(0), Some("meta"));
        let kpi = ds.frame().column(campaign::KPI).unwrap().str().unwrap();
        assert_eq!(kpi.get(1), Some("clicks"));
    }

    #[test]
    fn missing_columns_fail_with_schema_error() {
        let df = df!(
            "Source" => ["meta"],
            "Spends" => [1.0],
        )
        .unwrap();
        let err = Dataset::from_frame(df).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaError);
        let msg = err.to_string();
        assert!(msg.contains("objective"));
        assert!(msg.contains("ad_clicks"));
        assert!(!msg.contains("spends"));
    }

    #[test]
    fn column_names_are_normalized() {
        let df = df!(
            " Source " => ["Meta"],
            "Objective" => ["Conversion"],
            "KPI" => ["Leads"],
            "Spends" => ["10"],
            "Leads" => ["2"],
            "Ad Clicks" => [" "],
        )
        .unwrap();
        let ds = Dataset::from_frame(df).unwrap();
        let clicks = ds.frame().column(campaign::AD_CLICKS).unwrap().f64().unwrap();
        assert_eq!(clicks.get(0), Some(0.0));
        let spends = ds.frame().column(campaign::SPENDS).unwrap().f64().unwrap();
        assert_eq!(spends.get(0), Some(10.0));
    }

    fn write_csv(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("campaigns.csv");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn formatted_number_is_rejected_not_zeroed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "source,objective,kpi,spends,leads,ad_clicks\n\
             meta,conversion,leads,\"9,400\",2145,0\n\
             snapchat,conversion,leads,2650,300,0\n",
        );
        let err = Dataset::from_csv(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        let msg = err.to_string();
        assert!(msg.contains("spends"));
        assert!(msg.contains("9,400"));
        assert!(msg.contains("row 0"));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "source,objective,kpi,spends,leads,ad_clicks\n\
             meta,conversion,leads,100,inf,0\n",
        );
        let err = Dataset::from_csv(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(err.to_string().contains("leads"));

        let err = Dataset::from_records(&[CampaignRecord::new(
            "meta",
            "conversion",
            "leads",
            100.0,
            f64::INFINITY,
            0.0,
        )])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn blank_numeric_cells_read_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "source,objective,kpi,spends,leads,ad_clicks\n\
             meta,conversion,leads,100,,\n",
        );
        let ds = Dataset::from_csv(&path).unwrap();
        let leads = ds.frame().column(campaign::LEADS).unwrap().f64().unwrap();
        assert_eq!(leads.get(0), Some(0.0));
        let cpl = ds.frame().column(derived::COST_PER_LEAD).unwrap().f64().unwrap();
        assert_eq!(cpl.get(0), None);
    }

    #[test]
    fn negative_spend_is_rejected() {
        let err = Dataset::from_records(&[CampaignRecord::new(
            "meta",
            "conversion",
            "leads",
            -5.0,
            1.0,
            1.0,
        )])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
