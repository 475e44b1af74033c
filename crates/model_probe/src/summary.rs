//! Partition of probe results by status code, plus the overall verdict

use crate::probe::ProbeResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Available,
    NeedsPermission,
    AuthFailed,
    NotFound,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Available,
        Category::NeedsPermission,
        Category::AuthFailed,
        Category::NotFound,
        Category::Other,
    ];

    pub fn of(result: &ProbeResult) -> Self {
        if result.is_success() {
            return Category::Available;
        }
        match result.status_code() {
            Some(403) => Category::NeedsPermission,
            Some(401) => Category::AuthFailed,
            Some(404) => Category::NotFound,
            _ => Category::Other,
        }
    }
}

/// Overall credential health, first matching rule wins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Auth failures and nothing available
    Invalid,
    /// At least one model answered
    Ready,
    /// Key accepted, but model access still has to be granted
    Restricted,
    Unknown,
}

/// Results split into five disjoint buckets, each keeping probe order
#[derive(Debug, Default)]
pub struct RunSummary<'a> {
    pub available: Vec<&'a ProbeResult>,
    pub needs_permission: Vec<&'a ProbeResult>,
    pub auth_failed: Vec<&'a ProbeResult>,
    pub not_found: Vec<&'a ProbeResult>,
    pub other: Vec<&'a ProbeResult>,
}

impl<'a> RunSummary<'a> {
    pub fn from_results(results: &'a [ProbeResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.bucket_mut(Category::of(result)).push(result);
        }
        summary
    }

    pub fn bucket(&self, category: Category) -> &[&'a ProbeResult] {
        match category {
            Category::Available => &self.available,
            Category::NeedsPermission => &self.needs_permission,
            Category::AuthFailed => &self.auth_failed,
            Category::NotFound => &self.not_found,
            Category::Other => &self.other,
        }
    }

    fn bucket_mut(&mut self, category: Category) -> &mut Vec<&'a ProbeResult> {
        match category {
            Category::Available => &mut self.available,
            Category::NeedsPermission => &mut self.needs_permission,
            Category::AuthFailed => &mut self.auth_failed,
            Category::NotFound => &mut self.not_found,
            Category::Other => &mut self.other,
        }
    }

    pub fn total(&self) -> usize {
        Category::ALL.iter().map(|c| self.bucket(*c).len()).sum()
    }

    pub fn verdict(&self) -> Verdict {
        if !self.auth_failed.is_empty() && self.available.is_empty() {
            Verdict::Invalid
        } else if !self.available.is_empty() {
            Verdict::Ready
        } else if !self.needs_permission.is_empty() {
            Verdict::Restricted
        } else {
            Verdict::Unknown
        }
    }
}
