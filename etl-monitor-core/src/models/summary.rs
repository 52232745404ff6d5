use serde::{Deserialize, Serialize};

/// Filters shared by the chart and table endpoints. Also the full chart query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SummaryFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fakultas_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prodi_id: Option<String>,
    /// Comma-separated subject ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_ids: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_start: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_end: Option<String>,
}

impl SummaryFilter {
    pub fn subject_id_list(&self) -> Vec<String> {
        split_ids(self.subject_ids.as_deref())
    }
}

pub type ChartQuery = SummaryFilter;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Query of the summary table endpoint: the shared filter plus paging, sorting and search.
///
/// Kept flat (no `#[serde(flatten)]`) so it decodes from a query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TableQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fakultas_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prodi_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_ids: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_dir: Option<SortDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl TableQuery {
    pub fn subject_id_list(&self) -> Vec<String> {
        split_ids(self.subject_ids.as_deref())
    }
}

fn split_ids(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

/// One course row of the summary table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourseSummaryRow {
    pub course_id: String,
    pub course_name: String,
    pub course_shortname: String,
    pub fakultas_id: String,
    pub prodi_id: String,
    pub num_students: u32,
    pub num_teachers: u32,
    pub num_activities: u32,
    pub num_submissions: u32,
    pub avg_grade: f64,
}

/// The `{status, message, data}` wrapper of every summary response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryEnvelope<T> {
    pub status: bool,
    pub message: String,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub series: Vec<ChartSeries>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChartSeries {
    pub name: String,
    pub data: Vec<u32>,
}
