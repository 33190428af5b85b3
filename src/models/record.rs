//! Harvested record structures.

use serde::{Deserialize, Serialize};

/// A startup entry from the directory listing.
///
/// Fields missing from the page default to empty/zero; extraction
/// never fails a crawl.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Startup {
    /// Display name
    pub name: String,

    /// Short pitch from the listing card
    pub description: String,

    /// External website link
    pub website: String,

    /// Comma-joined category tags
    pub categories: String,

    /// Vote count
    pub votes: u32,

    /// Location (usually city)
    pub location: String,

    /// Detail page URL, used as the dedup key; excluded from exports
    pub detail_url: String,

    /// Founder name from the detail page
    pub founder: String,

    /// Twitter/X profile link
    pub twitter: String,

    /// LinkedIn profile link
    pub linkedin: String,
}

impl Startup {
    /// Stable key used to deduplicate entries across pages and
    /// categories. The detail URL is unique per startup; the name is
    /// the fallback when a card carries no hitbox link.
    pub fn identity_key(&self) -> &str {
        if self.detail_url.is_empty() {
            &self.name
        } else {
            &self.detail_url
        }
    }

    /// Merge detail-page fields into this record.
    ///
    /// A non-empty incoming value overwrites; an empty one never
    /// clobbers an existing field.
    pub fn merge_details(&mut self, details: &DetailFields) {
        merge_field(&mut self.founder, &details.founder);
        merge_field(&mut self.twitter, &details.twitter);
        merge_field(&mut self.linkedin, &details.linkedin);
        merge_field(&mut self.location, &details.location);
        merge_field(&mut self.website, &details.website);
    }
}

fn merge_field(target: &mut String, incoming: &str) {
    if !incoming.is_empty() {
        *target = incoming.to_string();
    }
}

/// Enrichment fields extracted from a startup detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailFields {
    pub founder: String,
    pub twitter: String,
    pub linkedin: String,
    pub location: String,
    pub website: String,
}

/// A school-head entry from the national education directory API.
///
/// Rows are unique per API page within one harvest, so no separate
/// dedup key exists for this source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct School {
    /// Head-of-school title derived from the establishment type
    pub role: String,

    /// Head-of-school name
    pub head_name: String,

    /// Establishment name
    pub school_name: String,

    /// Establishment type (lycée, collège, ...)
    pub school_type: String,

    /// Street address
    pub address: String,

    /// Postal code
    pub postal_code: String,

    /// City
    pub city: String,

    /// Department name
    pub department: String,

    /// Region name
    pub region: String,

    /// Phone number
    pub phone: String,

    /// Contact email
    pub email: String,

    /// Student headcount, when published
    pub student_count: Option<u32>,
}

/// A harvested record, tagged by source schema.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Record {
    Startup(Startup),
    School(School),
}

impl Record {
    /// Column headers for tabular export. The internal `detail_url`
    /// field is deliberately absent from the startup schema.
    pub fn headers(&self) -> &'static [&'static str] {
        match self {
            Record::Startup(_) => &[
                "name",
                "description",
                "website",
                "categories",
                "votes",
                "location",
                "founder",
                "twitter",
                "linkedin",
            ],
            Record::School(_) => &[
                "role",
                "head_name",
                "school_name",
                "school_type",
                "address",
                "postal_code",
                "city",
                "department",
                "region",
                "phone",
                "email",
                "student_count",
            ],
        }
    }

    /// Cell values in header order.
    pub fn row(&self) -> Vec<String> {
        match self {
            Record::Startup(s) => vec![
                s.name.clone(),
                s.description.clone(),
                s.website.clone(),
                s.categories.clone(),
                s.votes.to_string(),
                s.location.clone(),
                s.founder.clone(),
                s.twitter.clone(),
                s.linkedin.clone(),
            ],
            Record::School(s) => vec![
                s.role.clone(),
                s.head_name.clone(),
                s.school_name.clone(),
                s.school_type.clone(),
                s.address.clone(),
                s.postal_code.clone(),
                s.city.clone(),
                s.department.clone(),
                s.region.clone(),
                s.phone.clone(),
                s.email.clone(),
                s.student_count.map(|n| n.to_string()).unwrap_or_default(),
            ],
        }
    }
}

impl From<Startup> for Record {
    fn from(s: Startup) -> Self {
        Record::Startup(s)
    }
}

impl From<School> for Record {
    fn from(s: School) -> Self {
        Record::School(s)
    }
}
