//! Business records and lead projections.

use serde::{Deserialize, Serialize};

use crate::status::CheckResult;

/// One business record from the directory-discovery side.
///
/// The checker only interprets `place_id` and `website`; everything else is
/// passthrough metadata carried into the export unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    /// Stable external identifier (places-directory id). Unique per run.
    pub place_id: String,
    /// Business name.
    pub name: String,
    /// Formatted address.
    #[serde(default)]
    pub address: String,
    /// Contact phone number.
    #[serde(default)]
    pub phone: String,
    /// Website URL; `None` means the business has no site on record.
    #[serde(default)]
    pub website: Option<String>,
    /// Average review rating (0-5).
    #[serde(default)]
    pub rating: f64,
    /// Total review count.
    #[serde(default)]
    pub review_count: i64,
    /// Business category label.
    #[serde(default)]
    pub category: String,
}

impl Business {
    /// Whether the record carries a non-empty website URL.
    pub fn has_website(&self) -> bool {
        self.website
            .as_deref()
            .map(|w| !w.trim().is_empty())
            .unwrap_or(false)
    }
}

/// A sales lead: a business whose website check came back dead.
///
/// Flat projection of `Business` + `CheckResult` in the column order the
/// sales-facing CSV uses.
#[derive(Debug, Clone, Serialize)]
pub struct Lead {
    pub business_name: String,
    pub category: String,
    pub phone: String,
    pub website_url: String,
    pub website_status: String,
    pub status_reason: String,
    pub address: String,
    pub rating: f64,
    pub review_count: i64,
    pub place_id: String,
}

impl Lead {
    /// Builds a lead from a record and its finished check.
    pub fn from_business(business: &Business, result: &CheckResult) -> Self {
        Lead {
            business_name: business.name.clone(),
            category: business.category.clone(),
            phone: business.phone.clone(),
            website_url: business.website.clone().unwrap_or_default(),
            website_status: result.status.to_string(),
            status_reason: result.reason.clone(),
            address: business.address.clone(),
            rating: business.rating,
            review_count: business.review_count,
            place_id: business.place_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::WebsiteStatus;

    fn sample_business() -> Business {
        Business {
            place_id: "place-1".into(),
            name: "Somchai Restaurant".into(),
            address: "123 Sukhumvit Rd".into(),
            phone: "02-123-4567".into(),
            website: Some("https://somchai-restaurant.com".into()),
            rating: 4.5,
            review_count: 156,
            category: "restaurant".into(),
        }
    }

    #[test]
    fn test_has_website() {
        let mut b = sample_business();
        assert!(b.has_website());
        b.website = Some("   ".into());
        assert!(!b.has_website());
        b.website = None;
        assert!(!b.has_website());
    }

    #[test]
    fn test_lead_from_business() {
        let b = sample_business();
        let result = CheckResult::new(WebsiteStatus::NoDns, "DNS resolution failed: NXDOMAIN");
        let lead = Lead::from_business(&b, &result);
        assert_eq!(lead.website_status, "NO_DNS");
        assert_eq!(lead.website_url, "https://somchai-restaurant.com");
        assert_eq!(lead.place_id, "place-1");
    }

    #[test]
    fn test_business_jsonl_round_trip() {
        let line = r#"{"place_id":"p1","name":"Cafe","website":"cafe.example"}"#;
        let b: Business = serde_json::from_str(line).unwrap();
        assert_eq!(b.place_id, "p1");
        assert_eq!(b.website.as_deref(), Some("cafe.example"));
        assert_eq!(b.rating, 0.0);
        assert_eq!(b.phone, "");
    }
}
