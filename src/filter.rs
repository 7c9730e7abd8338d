//! Lead filtering: which dead-website businesses are worth contacting.

use crate::models::{Business, Lead};
use crate::status::CheckResult;

/// Thresholds a business must clear to become a lead.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub min_rating: Option<f64>,
    pub min_reviews: Option<i64>,
    pub require_phone: bool,
}

impl FilterCriteria {
    /// Preset for established businesses: decent rating, some review volume,
    /// and a phone number to actually call.
    pub fn quality() -> Self {
        FilterCriteria {
            min_rating: Some(3.5),
            min_reviews: Some(5),
            require_phone: true,
        }
    }
}

/// Counts of why records were rejected, for the summary report.
#[derive(Debug, Default)]
pub struct FilterStats {
    pub leads: u64,
    pub healthy_site: u64,
    pub no_website: u64,
    pub unchecked: u64,
    pub below_rating: u64,
    pub below_reviews: u64,
    pub missing_phone: u64,
}

pub struct LeadFilter {
    criteria: FilterCriteria,
}

impl LeadFilter {
    pub fn new(criteria: FilterCriteria) -> Self {
        LeadFilter { criteria }
    }

    /// Whether a checked business qualifies as a lead, counting the rejection
    /// reason into `stats`. The first failing test wins; status is judged
    /// before business-quality thresholds.
    fn is_potential_lead(
        &self,
        business: &Business,
        result: &CheckResult,
        stats: &mut FilterStats,
    ) -> bool {
        if !result.is_dead() {
            if business.has_website() {
                stats.healthy_site += 1;
            } else {
                stats.no_website += 1;
            }
            return false;
        }
        if let Some(min) = self.criteria.min_rating {
            if business.rating < min {
                stats.below_rating += 1;
                return false;
            }
        }
        if let Some(min) = self.criteria.min_reviews {
            if business.review_count < min {
                stats.below_reviews += 1;
                return false;
            }
        }
        if self.criteria.require_phone && business.phone.trim().is_empty() {
            stats.missing_phone += 1;
            return false;
        }
        true
    }

    /// Projects every qualifying record into a [`Lead`].
    pub fn filter_leads(
        &self,
        records: &[(Business, Option<CheckResult>)],
    ) -> (Vec<Lead>, FilterStats) {
        let mut stats = FilterStats::default();
        let mut leads = Vec::new();
        for (business, result) in records {
            match result {
                Some(result) => {
                    if self.is_potential_lead(business, result, &mut stats) {
                        leads.push(Lead::from_business(business, result));
                        stats.leads += 1;
                    }
                }
                None => stats.unchecked += 1,
            }
        }
        (leads, stats)
    }
}
