//! Deterministic stand-in data for the summary analytics endpoints.
//!
//! Used only when the summary upstream cannot answer and the fallback is enabled.
//! Every value comes from a linear congruential generator with a fixed seed, so the
//! same query always yields the same rows.

use std::cmp::Ordering;

use chrono::{Duration, NaiveDate};

use crate::models::*;

pub const DEFAULT_SEED: u32 = 0x5EED_2024;

/// Message carried by every mock response.
pub const MOCK_MESSAGE: &str = "Summary upstream unavailable, serving mock data";

const POOL_SIZE: usize = 240;
const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;
const DEFAULT_CHART_DAYS: i64 = 14;
const MAX_CHART_DAYS: i64 = 92;

const SUBJECTS: &[(&str, &str)] = &[
    ("PPB", "Pemrograman Perangkat Bergerak"),
    ("ALPRO", "Algoritma dan Pemrograman"),
    ("BASDAT", "Basis Data"),
    ("KALKULUS", "Kalkulus"),
    ("RPL", "Rekayasa Perangkat Lunak"),
    ("JARKOM", "Jaringan Komputer"),
    ("SISOP", "Sistem Operasi"),
    ("PBO", "Pemrograman Berorientasi Objek"),
    ("STATS", "Statistika"),
    ("IMK", "Interaksi Manusia dan Komputer"),
];

const FACULTIES: &[&str] = &["FIF", "FTE", "FEB", "FIK"];
const PRODI_PER_FACULTY: u32 = 3;

/// Numerical Recipes LCG over `u32`.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(1_664_525)
            .wrapping_add(1_013_904_223);
        self.state
    }

    /// Uniform-ish value in `lo..=hi`.
    pub fn next_in(&mut self, lo: u32, hi: u32) -> u32 {
        debug_assert!(lo <= hi);
        let span = hi - lo + 1;
        lo + self.next_u32() % span
    }
}

/// Generates mock table and chart payloads.
#[derive(Debug, Clone)]
pub struct MockGenerator {
    seed: u32,
    pool: Vec<CourseSummaryRow>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl MockGenerator {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            pool: build_pool(seed),
        }
    }

    /// Filter, search, sort and paginate the fixed course pool.
    pub fn table(&self, query: &TableQuery) -> SummaryEnvelope<Vec<CourseSummaryRow>> {
        let subject_ids = query.subject_id_list();
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut rows: Vec<&CourseSummaryRow> = self
            .pool
            .iter()
            .filter(|row| matches_eq(&query.fakultas_id, &row.fakultas_id))
            .filter(|row| matches_eq(&query.prodi_id, &row.prodi_id))
            .filter(|row| subject_ids.is_empty() || subject_ids.contains(&row.course_id))
            .filter(|row| match &needle {
                Some(needle) => {
                    row.course_name.to_lowercase().contains(needle)
                        || row.course_shortname.to_lowercase().contains(needle)
                }
                None => true,
            })
            .collect();

        let sort_by = query.sort_by.as_deref().unwrap_or("course_name");
        rows.sort_by(|a, b| compare_rows(a, b, sort_by));
        if query.sort_dir == Some(SortDirection::Desc) {
            rows.reverse();
        }

        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let page = query.page.unwrap_or(1).max(1);
        let total = rows.len() as u32;
        let start = (page - 1).saturating_mul(limit) as usize;

        let data: Vec<CourseSummaryRow> = rows
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .cloned()
            .collect();

        SummaryEnvelope {
            status: true,
            message: MOCK_MESSAGE.to_string(),
            data,
            pagination: Some(Pagination {
                page,
                limit,
                total,
                total_pages: total.div_ceil(limit),
            }),
        }
    }

    /// Daily activity series for the requested range. `today` anchors a missing `date_end`.
    ///
    /// Ranges reaching past the calendar limits are cut at `NaiveDate::MIN`/`MAX`.
    pub fn chart(&self, query: &ChartQuery, today: NaiveDate) -> SummaryEnvelope<ChartData> {
        let end = parse_date(query.date_end.as_deref()).unwrap_or(today);
        let start = parse_date(query.date_start.as_deref())
            .unwrap_or_else(|| days_before(end, DEFAULT_CHART_DAYS - 1));
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        let start = start.max(days_before(end, MAX_CHART_DAYS - 1));

        let mut rng = Lcg::new(self.seed ^ fnv1a(query));
        let mut labels = Vec::new();
        let mut activities = Vec::new();
        let mut submissions = Vec::new();
        let mut logins = Vec::new();

        let mut day = start;
        loop {
            labels.push(day.format("%Y-%m-%d").to_string());
            activities.push(rng.next_in(20, 400));
            submissions.push(rng.next_in(5, 150));
            logins.push(rng.next_in(50, 600));
            match day.succ_opt() {
                Some(next) if next <= end => day = next,
                _ => break,
            }
        }

        SummaryEnvelope {
            status: true,
            message: MOCK_MESSAGE.to_string(),
            data: ChartData {
                labels,
                series: vec![
                    ChartSeries {
                        name: "activities".to_string(),
                        data: activities,
                    },
                    ChartSeries {
                        name: "submissions".to_string(),
                        data: submissions,
                    },
                    ChartSeries {
                        name: "logins".to_string(),
                        data: logins,
                    },
                ],
            },
            pagination: None,
        }
    }
}

fn build_pool(seed: u32) -> Vec<CourseSummaryRow> {
    let mut rng = Lcg::new(seed);
    (0..POOL_SIZE)
        .map(|i| {
            let (code, name) = SUBJECTS[i % SUBJECTS.len()];
            let class = i / SUBJECTS.len() + 1;
            let faculty = FACULTIES[rng.next_in(0, FACULTIES.len() as u32 - 1) as usize];
            let prodi = rng.next_in(1, PRODI_PER_FACULTY);
            let num_students = rng.next_in(15, 120);

            CourseSummaryRow {
                course_id: (1000 + i).to_string(),
                course_name: format!("{} Kelas {:02}", name, class),
                course_shortname: format!("{}-{:02}", code, class),
                fakultas_id: faculty.to_string(),
                prodi_id: format!("{}-{}", faculty, prodi),
                num_students,
                num_teachers: rng.next_in(1, 4),
                num_activities: rng.next_in(5, 80),
                num_submissions: rng.next_in(0, num_students * 6),
                avg_grade: f64::from(rng.next_in(5_500, 9_500)) / 100.0,
            }
        })
        .collect()
}

fn matches_eq(wanted: &Option<String>, actual: &str) -> bool {
    match wanted.as_deref().map(str::trim) {
        Some(w) if !w.is_empty() => w == actual,
        _ => true,
    }
}

fn compare_rows(a: &CourseSummaryRow, b: &CourseSummaryRow, sort_by: &str) -> Ordering {
    let primary = match sort_by {
        "course_id" => a.course_id.cmp(&b.course_id),
        "course_shortname" => a.course_shortname.cmp(&b.course_shortname),
        "fakultas_id" => a.fakultas_id.cmp(&b.fakultas_id),
        "prodi_id" => a.prodi_id.cmp(&b.prodi_id),
        "num_students" => a.num_students.cmp(&b.num_students),
        "num_teachers" => a.num_teachers.cmp(&b.num_teachers),
        "num_activities" => a.num_activities.cmp(&b.num_activities),
        "num_submissions" => a.num_submissions.cmp(&b.num_submissions),
        "avg_grade" => a.avg_grade.total_cmp(&b.avg_grade),
        _ => a.course_name.cmp(&b.course_name),
    };
    // Ties fall back to the id so pages never overlap.
    primary.then_with(|| a.course_id.cmp(&b.course_id))
}

fn days_before(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_sub_signed(Duration::days(days))
        .unwrap_or(NaiveDate::MIN)
}

fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

/// FNV-1a over the filter fields, stable across runs and platforms.
fn fnv1a(filter: &SummaryFilter) -> u32 {
    let fields = [
        &filter.university,
        &filter.fakultas_id,
        &filter.prodi_id,
        &filter.subject_ids,
        &filter.date_start,
        &filter.date_end,
    ];
    let mut hash: u32 = 0x811c_9dc5;
    for field in fields {
        for byte in field.as_deref().unwrap_or("").bytes().chain(std::iter::once(0xff)) {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(0x0100_0193);
        }
    }
    hash
}
